//! Static structural checks over a workflow document.
//!
//! Every check runs and all findings are returned, in a fixed order:
//! empty graph, unknown node types, dangling edges, cycles, duplicate ids.

use crate::resolver;
use std::collections::HashSet;
use weftcore::{NodeRegistry, WorkflowDsl};

/// Validate `dsl` against the node types known to `registry`.
///
/// Returns human-readable errors; an empty list means the workflow may run.
pub fn validate(dsl: &WorkflowDsl, registry: &NodeRegistry) -> Vec<String> {
    let mut errors = Vec::new();

    if dsl.nodes.is_empty() {
        errors.push("Workflow has no nodes".to_string());
    }

    for node in &dsl.nodes {
        if !registry.contains(&node.node_type) {
            errors.push(format!(
                "Unknown node type: {} (node {})",
                node.node_type, node.id
            ));
        }
    }

    let node_ids: HashSet<&str> = dsl.nodes.iter().map(|n| n.id.as_str()).collect();
    for edge in &dsl.edges {
        let source_known = node_ids.contains(edge.source.as_str());
        let target_known = node_ids.contains(edge.target.as_str());
        match (source_known, target_known) {
            (true, true) => {}
            (false, true) => errors.push(format!(
                "Edge {} references unknown source node: {}",
                edge.id, edge.source
            )),
            (true, false) => errors.push(format!(
                "Edge {} references unknown target node: {}",
                edge.id, edge.target
            )),
            (false, false) => errors.push(format!(
                "Edge {} references unknown source node: {} and unknown target node: {}",
                edge.id, edge.source, edge.target
            )),
        }
    }

    if resolver::has_cycle(&dsl.nodes, &dsl.edges) {
        errors.push("Workflow contains cycles".to_string());
    }

    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for node in &dsl.nodes {
        if !seen.insert(node.id.as_str()) && reported.insert(node.id.as_str()) {
            errors.push(format!("Duplicate node id: {}", node.id));
        }
    }

    errors
}
