//! Serializable snapshot of the inferred schema (`--model` output)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{FinalizedTree, ValueType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaModel {
    pub roots: Vec<String>,
    pub namespaces: BTreeMap<String, String>,
    /// Nodes in discovery order
    pub nodes: Vec<ModelNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelNode {
    pub key: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub namespace_prefix: String,
    pub discovery_index: usize,
    pub occurrences: usize,
    pub repeated: bool,
    pub string_only_leaf: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub text_type: Option<ValueType>,
    pub attributes: Vec<ModelAttribute>,
    pub children: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelAttribute {
    pub name: String,
    pub value_type: ValueType,
}

impl FinalizedTree {
    /// Snapshot the tree for inspection or export
    pub fn model(&self) -> SchemaModel {
        let mut nodes: Vec<_> = self.nodes().collect();
        nodes.sort_by_key(|n| n.discovery_index);

        SchemaModel {
            roots: self.roots().iter().map(|k| k.to_string()).collect(),
            namespaces: self
                .namespaces()
                .iter()
                .map(|(p, u)| (p.to_string(), u.to_string()))
                .collect(),
            nodes: nodes
                .into_iter()
                .map(|n| ModelNode {
                    key: n.key.to_string(),
                    name: n.name.local.clone(),
                    namespace_prefix: n.name.prefix.clone(),
                    discovery_index: n.discovery_index,
                    occurrences: n.occurrences,
                    repeated: n.is_repeated(),
                    string_only_leaf: n.is_string_only_leaf(),
                    text_type: n.has_text().then(|| n.text_type.resolved()),
                    attributes: n
                        .attributes
                        .values()
                        .map(|a| ModelAttribute {
                            name: a.name.to_string(),
                            value_type: a.value_type.resolved(),
                        })
                        .collect(),
                    children: n.children.values().map(|k| k.to_string()).collect(),
                })
                .collect(),
        }
    }
}

impl SchemaModel {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn node(&self, key: &str) -> Option<&ModelNode> {
        self.nodes.iter().find(|n| n.key == key)
    }
}
