//! Name Resolution Pass
//!
//! Builds a canonical mapping from node keys to type names, handling:
//! - Prefix/suffix decoration and first-letter case policy
//! - Identifier sanitization (anything outside `[A-Za-z0-9_]` becomes `_`)
//! - Name collision detection and resolution
//!
//! This pass runs after the tree is finalized and before any dialect sees a
//! declaration. Like the rest of the walker it is language-agnostic; dialect
//! casing and keyword escaping are done by `RenderProfile`.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use crate::config::NamingConfig;
use crate::tree::{ElementNode, FinalizedTree, NodeKey, QualifiedName};

static NON_IDENTIFIER: OnceLock<Regex> = OnceLock::new();

fn non_identifier() -> &'static Regex {
    NON_IDENTIFIER.get_or_init(|| Regex::new(r"[^A-Za-z0-9_]").expect("static pattern"))
}

// =============================================================================
// Resolved Name Entry
// =============================================================================

/// Entry in the name resolution map
#[derive(Debug, Clone)]
pub struct ResolvedName {
    pub type_name: String,

    /// Whether ancestors or a counter had to be added to make the name unique
    pub disambiguated: bool,
}

// =============================================================================
// Name Resolver
// =============================================================================

/// Resolves node keys to unique type names.
///
/// Names are assigned shallowest key first, then by key string, so the
/// outcome does not depend on the order in which documents were scanned.
#[derive(Debug)]
pub struct NameResolver {
    naming: NamingConfig,

    /// node key -> resolved name entry
    resolved: HashMap<NodeKey, ResolvedName>,

    /// Names already handed out
    taken: HashSet<String>,
}

impl NameResolver {
    pub fn new(naming: &NamingConfig) -> Self {
        Self {
            naming: naming.clone(),
            resolved: HashMap::new(),
            taken: HashSet::new(),
        }
    }

    /// Build the resolution map for every node that gets a declaration
    pub fn build<'a, I>(naming: &NamingConfig, tree: &FinalizedTree, nodes: I) -> Self
    where
        I: IntoIterator<Item = &'a ElementNode>,
    {
        let mut resolver = Self::new(naming);
        let mut nodes: Vec<&ElementNode> = nodes.into_iter().collect();
        nodes.sort_by(|a, b| {
            a.key
                .depth()
                .cmp(&b.key.depth())
                .then_with(|| a.key.cmp(&b.key))
        });

        for node in nodes {
            resolver.assign(tree, node);
        }
        resolver
    }

    fn assign(&mut self, tree: &FinalizedTree, node: &ElementNode) {
        let mut parts = vec![node.name.local.as_str()];
        let candidate = self.type_name_for(&parts);
        if self.claim(&node.key, candidate, false) {
            return;
        }

        // Collision! Prepend ancestor names, nearest first
        let mut ancestor = tree.parent_of(node);
        while let Some(a) = ancestor {
            parts.insert(0, a.name.local.as_str());
            let candidate = self.type_name_for(&parts);
            if self.claim(&node.key, candidate, true) {
                return;
            }
            ancestor = tree.parent_of(a);
        }

        let full = self.type_name_for(&parts);
        let mut n = 2;
        while !self.claim(&node.key, format!("{}{}", full, n), true) {
            n += 1;
        }
    }

    fn claim(&mut self, key: &NodeKey, name: String, disambiguated: bool) -> bool {
        if !self.taken.insert(name.clone()) {
            return false;
        }
        if disambiguated {
            tracing::debug!(key = %key, name = %name, "type name disambiguated");
        }
        self.resolved.insert(
            key.clone(),
            ResolvedName {
                type_name: name,
                disambiguated,
            },
        );
        true
    }

    /// Decorated type name for a chain of local names
    pub fn type_name_for(&self, parts: &[&str]) -> String {
        let mut name = self.naming.prefix.clone();
        for part in parts {
            let part = sanitize_identifier(part);
            if self.naming.keep_first_letter_case {
                name.push_str(&part);
            } else {
                name.push_str(&upper_first(&part));
            }
        }
        name.push_str(&self.naming.suffix);
        name
    }

    /// Get the resolved type name for a node
    pub fn type_name(&self, key: &NodeKey) -> Option<&str> {
        self.resolved.get(key).map(|r| r.type_name.as_str())
    }

    pub fn get(&self, key: &NodeKey) -> Option<&ResolvedName> {
        self.resolved.get(key)
    }

    /// Neutral field name for an attribute: marker plus local name
    pub fn attribute_field_name(&self, name: &QualifiedName) -> String {
        format!("{}{}", self.naming.attribute_prefix, self.field_base(name))
    }

    /// Neutral field name for an inline (flattened) child element
    pub fn element_field_name(&self, name: &QualifiedName) -> String {
        self.field_base(name)
    }

    /// Serialized (JSON) name; folds the namespace prefix in when configured
    pub fn json_name(&self, name: &QualifiedName) -> String {
        if self.naming.namespace_in_field_name && name.has_prefix() {
            format!("{}__{}", name.prefix, name.local)
        } else {
            name.local.clone()
        }
    }

    fn field_base(&self, name: &QualifiedName) -> String {
        let local = upper_first(&sanitize_identifier(&name.local));
        if self.naming.namespace_in_field_name && name.has_prefix() {
            format!("{}{}", upper_first(&sanitize_identifier(&name.prefix)), local)
        } else {
            local
        }
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    /// Number of names that needed disambiguation
    pub fn disambiguated_count(&self) -> usize {
        self.resolved.values().filter(|r| r.disambiguated).count()
    }
}

// =============================================================================
// Case Helpers
// =============================================================================

/// Replace every non-identifier character with `_`; a leading digit gets a `_` in front
pub fn sanitize_identifier(raw: &str) -> String {
    let cleaned = non_identifier().replace_all(raw, "_");
    if cleaned.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{}", cleaned)
    } else {
        cleaned.into_owned()
    }
}

pub fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().chain(chars).collect(),
    }
}

pub fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_lowercase().chain(chars).collect(),
    }
}

/// Convert to snake_case
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let mut prev_lower = false;

    for c in s.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else if c == '-' || c == ' ' {
            result.push('_');
            prev_lower = false;
        } else {
            result.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }

    result
}
