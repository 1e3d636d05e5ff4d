use crate::Node;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Catalog of available node types, keyed by type id
#[derive(Clone, Default)]
pub struct NodeRegistry {
    nodes: HashMap<String, Arc<dyn Node>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node type. A later registration with the same id replaces
    /// the earlier one.
    pub fn register(&mut self, node: Arc<dyn Node>) {
        let node_type = node.node_type().to_string();
        if self.nodes.insert(node_type.clone(), node).is_some() {
            tracing::debug!("Replacing node type: {}", node_type);
        } else {
            tracing::debug!("Registering node type: {}", node_type);
        }
    }

    pub fn get(&self, node_type: &str) -> Option<Arc<dyn Node>> {
        self.nodes.get(node_type).cloned()
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.nodes.contains_key(node_type)
    }

    /// All registered node types, ordered by id
    pub fn list(&self) -> Vec<Arc<dyn Node>> {
        let mut nodes: Vec<_> = self.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.node_type().cmp(b.node_type()));
        nodes
    }

    /// Node types grouped by their descriptor's category
    pub fn list_by_category(&self) -> BTreeMap<String, Vec<Arc<dyn Node>>> {
        let mut groups: BTreeMap<String, Vec<Arc<dyn Node>>> = BTreeMap::new();
        for node in self.list() {
            groups.entry(node.descriptor().category).or_default().push(node);
        }
        groups
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
