//! Cross-cutting lookups kept next to the tree: qualified names, the global
//! attribute index and the namespace table.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::NodeKey;

const XMLNS: &str = "xmlns";

/// Prefix-qualified XML name (`dc:title`, or `title` without a prefix)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedName {
    pub prefix: String,
    pub local: String,
}

impl QualifiedName {
    pub fn new(prefix: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            local: local.into(),
        }
    }

    /// Split a raw `prefix:local` name at the first colon
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((prefix, local)) => Self::new(prefix, local),
            None => Self::new("", raw),
        }
    }

    pub fn has_prefix(&self) -> bool {
        !self.prefix.is_empty()
    }

    /// `xmlns` or `xmlns:p`
    pub fn is_namespace_declaration(&self) -> bool {
        self.prefix == XMLNS || (self.prefix.is_empty() && self.local == XMLNS)
    }

    /// Prefix bound by a namespace declaration; `""` for the default namespace
    pub fn declared_prefix(&self) -> Option<&str> {
        if self.prefix == XMLNS {
            Some(&self.local)
        } else if self.prefix.is_empty() && self.local == XMLNS {
            Some("")
        } else {
            None
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefix.is_empty() {
            f.write_str(&self.local)
        } else {
            write!(f, "{}:{}", self.prefix, self.local)
        }
    }
}

/// Attribute names seen per node, in first-seen order.
///
/// Includes namespace declarations, which never become fields.
#[derive(Debug, Clone, Default)]
pub struct AttributeIndex {
    by_key: HashMap<NodeKey, Vec<QualifiedName>>,
}

impl AttributeIndex {
    pub fn record(&mut self, key: &NodeKey, name: &QualifiedName) {
        let names = self.by_key.entry(key.clone()).or_default();
        if !names.contains(name) {
            names.push(name.clone());
        }
    }

    /// All attribute descriptors seen for a node
    pub fn get(&self, key: &NodeKey) -> &[QualifiedName] {
        self.by_key.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Namespace-declaring attributes carried by a node
    pub fn namespace_declarations<'a>(
        &'a self,
        key: &NodeKey,
    ) -> impl Iterator<Item = &'a QualifiedName> + 'a {
        self.get(key).iter().filter(|n| n.is_namespace_declaration())
    }

    pub fn declares_namespaces(&self, key: &NodeKey) -> bool {
        self.namespace_declarations(key).next().is_some()
    }
}

/// Namespace prefix to URI bindings collected from every document.
///
/// The first binding of a prefix wins; the default namespace lives under `""`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamespaceTable {
    bindings: BTreeMap<String, String>,
}

impl NamespaceTable {
    /// Bind a prefix; returns false when the prefix was already bound elsewhere
    pub fn declare(&mut self, prefix: &str, uri: &str) -> bool {
        match self.bindings.get(prefix) {
            Some(existing) => existing == uri,
            None => {
                self.bindings.insert(prefix.to_string(), uri.to_string());
                true
            }
        }
    }

    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.bindings.get(prefix).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_qualified_name() {
        assert_eq!(QualifiedName::parse("dc:title"), QualifiedName::new("dc", "title"));
        assert_eq!(QualifiedName::parse("title"), QualifiedName::new("", "title"));
        assert_eq!(QualifiedName::parse("dc:title").to_string(), "dc:title");
    }

    #[test]
    fn test_namespace_declarations() {
        let default_ns = QualifiedName::parse("xmlns");
        let prefixed = QualifiedName::parse("xmlns:dc");
        let plain = QualifiedName::parse("lang");

        assert_eq!(default_ns.declared_prefix(), Some(""));
        assert_eq!(prefixed.declared_prefix(), Some("dc"));
        assert!(plain.declared_prefix().is_none());
        assert!(!plain.is_namespace_declaration());
    }

    #[test]
    fn test_attribute_index_deduplicates() {
        let key = NodeKey::root("a");
        let mut index = AttributeIndex::default();
        index.record(&key, &QualifiedName::parse("x"));
        index.record(&key, &QualifiedName::parse("xmlns:dc"));
        index.record(&key, &QualifiedName::parse("x"));

        assert_eq!(index.get(&key).len(), 2);
        assert!(index.declares_namespaces(&key));
        assert!(index.get(&NodeKey::root("b")).is_empty());
    }

    #[test]
    fn test_first_namespace_binding_wins() {
        let mut table = NamespaceTable::default();
        assert!(table.declare("dc", "http://purl.org/dc/elements/1.1/"));
        assert!(!table.declare("dc", "urn:other"));
        assert_eq!(table.resolve("dc"), Some("http://purl.org/dc/elements/1.1/"));
    }
}
