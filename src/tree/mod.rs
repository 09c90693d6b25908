//! Schema Tree
//!
//! Incrementally built map of every distinct element seen in the sample
//! documents. An element's identity is its path from the document root
//! (`/catalog/book/dc:title`); every occurrence reachable through the same
//! path is merged into one `ElementNode`.
//!
//! The tree owns all nodes in a single `NodeKey -> ElementNode` map. Parents
//! refer to children by key only, so the finished tree can be handed to the
//! emitter as a plain shared reference.
//!
//! Lifecycle: `SchemaTree` is mutated by one scanner at a time, then
//! `finalize()` consumes it into a read-only `FinalizedTree`.

pub mod index;
pub mod infer;
pub mod model;

pub use index::{AttributeIndex, NamespaceTable, QualifiedName};
pub use infer::{TypeInference, ValueType};
pub use model::{ModelAttribute, ModelNode, SchemaModel};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::config::GeneratorConfig;

// =============================================================================
// Node Key
// =============================================================================

/// Path-qualified element identity: ancestor chain plus the element's name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey(String);

impl NodeKey {
    /// Key of a document root element
    pub fn root(segment: &str) -> Self {
        Self(format!("/{}", segment))
    }

    /// Key of a child element below this one
    pub fn child(&self, segment: &str) -> Self {
        Self(format!("{}/{}", self.0, segment))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of path segments (1 for roots)
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Element Node
// =============================================================================

/// One attribute of an element with its widened type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    pub name: QualifiedName,
    pub value_type: ValueType,
    pub occurrences: usize,
    /// Longest value seen, in characters
    pub max_length: usize,
}

/// One distinct element identity
#[derive(Debug, Clone)]
pub struct ElementNode {
    pub key: NodeKey,
    pub name: QualifiedName,
    pub parent: Option<NodeKey>,
    /// Position at which the element was first seen in the run
    pub discovery_index: usize,
    /// Attribute fields by qualified name; namespace declarations excluded
    pub attributes: IndexMap<String, AttributeInfo>,
    /// Child segment -> child key
    pub children: IndexMap<String, NodeKey>,
    pub occurrences: usize,
    /// Most instances of this element seen under a single parent instance
    pub max_siblings: usize,
    pub text_instances: usize,
    pub text_type: ValueType,
    /// Longest trimmed text seen, in characters
    pub max_text_length: usize,
}

impl ElementNode {
    fn new(key: NodeKey, name: QualifiedName, parent: Option<NodeKey>, discovery_index: usize) -> Self {
        Self {
            key,
            name,
            parent,
            discovery_index,
            attributes: IndexMap::new(),
            children: IndexMap::new(),
            occurrences: 0,
            max_siblings: 0,
            text_instances: 0,
            text_type: ValueType::Unknown,
            max_text_length: 0,
        }
    }

    pub fn has_text(&self) -> bool {
        self.text_instances > 0
    }

    pub fn has_attributes(&self) -> bool {
        !self.attributes.is_empty()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// More than one instance was seen below the same parent instance
    pub fn is_repeated(&self) -> bool {
        self.max_siblings > 1
    }

    /// Text seen, and never any attributes or child elements
    pub fn is_string_only_leaf(&self) -> bool {
        self.has_text() && !self.has_attributes() && !self.has_children()
    }

    pub fn attribute(&self, qualified: &str) -> Option<&AttributeInfo> {
        self.attributes.get(qualified)
    }
}

// =============================================================================
// Observations
// =============================================================================

/// Element start as delivered by the decoder
#[derive(Debug, Clone)]
pub struct ElementStart {
    pub name: QualifiedName,
    pub attributes: Vec<(QualifiedName, String)>,
}

impl ElementStart {
    pub fn new(name: QualifiedName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((QualifiedName::parse(name), value.to_string()));
        self
    }
}

/// What one element instance contained, known once its end tag is read
#[derive(Debug, Clone, Default)]
pub struct InstanceSummary {
    pub text: Option<String>,
    pub child_counts: HashMap<NodeKey, usize>,
}

/// Tags excluded from the tree together with their subtrees
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    tags: HashSet<String>,
    lowercase_tags: bool,
}

impl IgnoreSet {
    pub fn new<I, S>(tags: I, lowercase_tags: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            lowercase_tags,
        }
    }

    /// Matches on the local name or the prefixed name
    pub fn contains(&self, name: &QualifiedName) -> bool {
        if self.lowercase_tags && name.local.starts_with(|c: char| c.is_lowercase()) {
            return true;
        }
        self.tags.contains(&name.local) || (name.has_prefix() && self.tags.contains(&name.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && !self.lowercase_tags
    }
}

// =============================================================================
// Schema Tree (mutable)
// =============================================================================

/// Mutable schema tree fed by the extractor
#[derive(Debug)]
pub struct SchemaTree {
    nodes: HashMap<NodeKey, ElementNode>,
    roots: Vec<NodeKey>,
    attribute_index: AttributeIndex,
    namespaces: NamespaceTable,
    ignore: IgnoreSet,
    inference: TypeInference,
    next_index: usize,
}

impl SchemaTree {
    /// Tree configured from the input and inference sections
    pub fn new(config: &GeneratorConfig) -> Self {
        Self::with_settings(config.ignore_set(), TypeInference::new(config.inference.use_types))
    }

    pub fn with_settings(ignore: IgnoreSet, inference: TypeInference) -> Self {
        Self {
            nodes: HashMap::new(),
            roots: Vec::new(),
            attribute_index: AttributeIndex::default(),
            namespaces: NamespaceTable::default(),
            ignore,
            inference,
            next_index: 0,
        }
    }

    pub fn is_ignored(&self, name: &QualifiedName) -> bool {
        self.ignore.contains(name)
    }

    /// Register or update the node for an element start.
    ///
    /// Returns `None` for ignored or nameless tags; the caller must then skip
    /// the whole subtree without observing it.
    pub fn observe(&mut self, parent: Option<&NodeKey>, element: &ElementStart) -> Option<NodeKey> {
        if element.name.local.is_empty() || self.is_ignored(&element.name) {
            return None;
        }

        let segment = element.name.to_string();
        let key = match parent {
            Some(parent) => parent.child(&segment),
            None => NodeKey::root(&segment),
        };

        if !self.nodes.contains_key(&key) {
            let index = self.next_index;
            self.next_index += 1;
            self.nodes.insert(
                key.clone(),
                ElementNode::new(key.clone(), element.name.clone(), parent.cloned(), index),
            );
            match parent.and_then(|p| self.nodes.get_mut(p)) {
                Some(parent_node) => {
                    parent_node.children.insert(segment, key.clone());
                }
                None => self.roots.push(key.clone()),
            }
        }

        for (name, value) in &element.attributes {
            self.attribute_index.record(&key, name);
            if let Some(prefix) = name.declared_prefix() {
                if !self.namespaces.declare(prefix, value) {
                    tracing::debug!(prefix, uri = %value, "namespace prefix already bound, keeping first binding");
                }
            }
        }

        let inference = self.inference;
        let node = self.nodes.get_mut(&key)?;
        node.occurrences += 1;
        for (name, value) in &element.attributes {
            if name.is_namespace_declaration() {
                continue;
            }
            let attr = node
                .attributes
                .entry(name.to_string())
                .or_insert_with(|| AttributeInfo {
                    name: name.clone(),
                    value_type: ValueType::Unknown,
                    occurrences: 0,
                    max_length: 0,
                });
            attr.value_type = inference.classify(attr.value_type, value);
            attr.occurrences += 1;
            attr.max_length = attr.max_length.max(value.chars().count());
        }

        Some(key)
    }

    /// Record the end-of-element summary of one instance
    pub fn complete(&mut self, key: &NodeKey, instance: &InstanceSummary) {
        let inference = self.inference;
        if let Some(node) = self.nodes.get_mut(key) {
            if let Some(text) = instance.text.as_deref() {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    node.text_instances += 1;
                    node.text_type = inference.classify(node.text_type, text);
                    node.max_text_length = node.max_text_length.max(trimmed.chars().count());
                }
            }
        }
        for (child_key, count) in &instance.child_counts {
            if let Some(child) = self.nodes.get_mut(child_key) {
                child.max_siblings = child.max_siblings.max(*count);
            }
        }
    }

    pub fn node(&self, key: &NodeKey) -> Option<&ElementNode> {
        self.nodes.get(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Freeze the tree; no mutation is possible afterwards
    pub fn finalize(self) -> FinalizedTree {
        tracing::debug!(
            nodes = self.nodes.len(),
            roots = self.roots.len(),
            namespaces = self.namespaces.len(),
            "schema tree finalized"
        );
        FinalizedTree {
            nodes: self.nodes,
            roots: self.roots,
            attribute_index: self.attribute_index,
            namespaces: self.namespaces,
        }
    }
}

// =============================================================================
// Finalized Tree (read-only)
// =============================================================================

/// Read-only tree handed to the emission stage
#[derive(Debug)]
pub struct FinalizedTree {
    nodes: HashMap<NodeKey, ElementNode>,
    roots: Vec<NodeKey>,
    attribute_index: AttributeIndex,
    namespaces: NamespaceTable,
}

impl FinalizedTree {
    /// Root keys in discovery order
    pub fn roots(&self) -> &[NodeKey] {
        &self.roots
    }

    pub fn root_nodes(&self) -> impl Iterator<Item = &ElementNode> {
        self.roots.iter().filter_map(|k| self.nodes.get(k))
    }

    /// First-observed root, used by outputs that need a single root type
    pub fn primary_root(&self) -> Option<&ElementNode> {
        self.root_nodes().next()
    }

    pub fn node(&self, key: &NodeKey) -> Option<&ElementNode> {
        self.nodes.get(key)
    }

    /// Look up a node by its path string, e.g. `/a/b`
    pub fn find(&self, path: &str) -> Option<&ElementNode> {
        self.nodes.get(&NodeKey(path.to_string()))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ElementNode> {
        self.nodes.values()
    }

    pub fn children_of<'a>(&'a self, node: &'a ElementNode) -> impl Iterator<Item = &'a ElementNode> + 'a {
        node.children.values().filter_map(|k| self.nodes.get(k))
    }

    pub fn parent_of(&self, node: &ElementNode) -> Option<&ElementNode> {
        node.parent.as_ref().and_then(|k| self.nodes.get(k))
    }

    pub fn attribute_index(&self) -> &AttributeIndex {
        &self.attribute_index
    }

    pub fn namespaces(&self) -> &NamespaceTable {
        &self.namespaces
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed_tree() -> SchemaTree {
        SchemaTree::with_settings(IgnoreSet::default(), TypeInference::new(true))
    }

    fn start(name: &str) -> ElementStart {
        ElementStart::new(QualifiedName::parse(name))
    }

    #[test]
    fn test_node_key_paths() {
        let root = NodeKey::root("a");
        let child = root.child("dc:b");
        assert_eq!(child.as_str(), "/a/dc:b");
        assert_eq!(child.depth(), 2);
        assert_eq!(child.segments().collect::<Vec<_>>(), vec!["a", "dc:b"]);
    }

    #[test]
    fn test_same_path_merges() {
        let mut tree = typed_tree();
        let a = tree.observe(None, &start("a").with_attribute("x", "1")).unwrap();
        let a2 = tree.observe(None, &start("a").with_attribute("y", "yes")).unwrap();
        assert_eq!(a, a2);

        let node = tree.node(&a).unwrap();
        assert_eq!(node.occurrences, 2);
        assert_eq!(node.attributes.len(), 2);
        assert_eq!(node.attribute("x").unwrap().value_type, ValueType::Integer);
        assert_eq!(node.discovery_index, 0);
    }

    #[test]
    fn test_same_name_different_parent_is_distinct() {
        let mut tree = typed_tree();
        let a = tree.observe(None, &start("a")).unwrap();
        let b = tree.observe(Some(&a), &start("b")).unwrap();
        let c = tree.observe(Some(&a), &start("c")).unwrap();
        let bn = tree.observe(Some(&b), &start("name")).unwrap();
        let cn = tree.observe(Some(&c), &start("name")).unwrap();
        assert_ne!(bn, cn);
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn test_discovery_index_is_stable() {
        let mut tree = typed_tree();
        let a = tree.observe(None, &start("a")).unwrap();
        let b = tree.observe(Some(&a), &start("b")).unwrap();
        tree.observe(Some(&a), &start("c")).unwrap();
        tree.observe(Some(&a), &start("b")).unwrap();
        assert_eq!(tree.node(&b).unwrap().discovery_index, 1);
    }

    #[test]
    fn test_ignored_tag_creates_nothing() {
        let mut tree = SchemaTree::with_settings(IgnoreSet::new(["skip"], false), TypeInference::new(true));
        let a = tree.observe(None, &start("a")).unwrap();
        assert!(tree.observe(Some(&a), &start("skip")).is_none());
        assert!(tree.observe(Some(&a), &start("ns:skip")).is_none());
        assert_eq!(tree.len(), 1);
        assert!(tree.node(&a).unwrap().children.is_empty());
    }

    #[test]
    fn test_ignore_lowercase_tags() {
        let ignore = IgnoreSet::new(Vec::<String>::new(), true);
        assert!(ignore.contains(&QualifiedName::parse("item")));
        assert!(!ignore.contains(&QualifiedName::parse("Item")));
    }

    #[test]
    fn test_namespace_declarations_are_indexed_not_fields() {
        let mut tree = typed_tree();
        let a = tree
            .observe(
                None,
                &start("a")
                    .with_attribute("xmlns", "urn:default")
                    .with_attribute("xmlns:dc", "urn:dc")
                    .with_attribute("dc:lang", "en"),
            )
            .unwrap();
        let finalized = tree.finalize();
        let node = finalized.node(&a).unwrap();
        assert_eq!(node.attributes.len(), 1);
        assert!(node.attribute("dc:lang").is_some());
        assert!(finalized.attribute_index().declares_namespaces(&a));
        assert_eq!(finalized.namespaces().resolve(""), Some("urn:default"));
        assert_eq!(finalized.namespaces().resolve("dc"), Some("urn:dc"));
    }

    #[test]
    fn test_complete_records_text_and_siblings() {
        let mut tree = typed_tree();
        let a = tree.observe(None, &start("a")).unwrap();
        let b = tree.observe(Some(&a), &start("b")).unwrap();
        tree.complete(&b, &InstanceSummary { text: Some("12".into()), ..Default::default() });
        tree.observe(Some(&a), &start("b")).unwrap();
        tree.complete(&b, &InstanceSummary { text: Some("13".into()), ..Default::default() });

        let mut counts = HashMap::new();
        counts.insert(b.clone(), 2);
        tree.complete(&a, &InstanceSummary { text: None, child_counts: counts });

        let node = tree.node(&b).unwrap();
        assert!(node.is_repeated());
        assert!(node.is_string_only_leaf());
        assert_eq!(node.text_type, ValueType::Integer);
        assert!(!tree.node(&a).unwrap().is_string_only_leaf());
    }

    #[test]
    fn test_longest_value_is_tracked_in_characters() {
        let mut tree = typed_tree();
        let a = tree.observe(None, &start("a").with_attribute("code", "ab")).unwrap();
        tree.complete(&a, &InstanceSummary { text: Some("  héllo ".into()), ..Default::default() });
        tree.observe(None, &start("a").with_attribute("code", "abcd")).unwrap();
        tree.complete(&a, &InstanceSummary { text: Some("hi".into()), ..Default::default() });

        let node = tree.node(&a).unwrap();
        assert_eq!(node.attribute("code").unwrap().max_length, 4);
        assert_eq!(node.max_text_length, 5);
    }

    #[test]
    fn test_multiple_roots_kept_in_discovery_order() {
        let mut tree = typed_tree();
        tree.observe(None, &start("feed")).unwrap();
        tree.observe(None, &start("rss")).unwrap();
        tree.observe(None, &start("feed")).unwrap();
        let finalized = tree.finalize();
        let names: Vec<_> = finalized.root_nodes().map(|n| n.name.local.clone()).collect();
        assert_eq!(names, vec!["feed", "rss"]);
        assert_eq!(finalized.primary_root().unwrap().name.local, "feed");
    }
}
