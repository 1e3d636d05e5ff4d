//! Execution ordering and value resolution.
//!
//! Ordering is Kahn's algorithm over a `petgraph` graph whose node indices
//! follow declaration order, so ties between ready nodes always break
//! toward the node declared first. The validator's cycle check goes
//! through the same code path.

use crate::state::ExecutionState;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap, HashSet};
use weftcore::{ParamValue, ResolveError, Value, WorkflowEdge, WorkflowError, WorkflowNode};

/// Build a dependency graph; index `i` is `nodes[i]`.
///
/// Edges whose endpoints are not declared nodes are left out.
fn build_graph<'a>(nodes: &'a [WorkflowNode], edges: &[WorkflowEdge]) -> DiGraph<&'a str, ()> {
    let mut graph = DiGraph::with_capacity(nodes.len(), edges.len());
    let mut node_to_index: HashMap<&str, NodeIndex> = HashMap::new();

    for node in nodes {
        let idx = graph.add_node(node.id.as_str());
        node_to_index.entry(node.id.as_str()).or_insert(idx);
    }

    for edge in edges {
        match (
            node_to_index.get(edge.source.as_str()),
            node_to_index.get(edge.target.as_str()),
        ) {
            (Some(from), Some(to)) => {
                graph.add_edge(*from, *to, ());
            }
            _ => tracing::debug!("Ignoring dangling edge {} for ordering", edge.id),
        }
    }

    graph
}

/// Topological order of node ids.
///
/// Fails with [`WorkflowError::CyclicDependency`] instead of returning a
/// partial order when any cycle exists.
pub fn build_execution_order(
    nodes: &[WorkflowNode],
    edges: &[WorkflowEdge],
) -> Result<Vec<String>, WorkflowError> {
    let graph = build_graph(nodes, edges);

    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|idx| graph.edges_directed(idx, Direction::Incoming).count())
        .collect();

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(index, _)| Reverse(index))
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(Reverse(index)) = ready.pop() {
        order.push(nodes[index].id.clone());

        for edge in graph.edges_directed(NodeIndex::new(index), Direction::Outgoing) {
            let target = edge.target().index();
            in_degree[target] -= 1;
            if in_degree[target] == 0 {
                ready.push(Reverse(target));
            }
        }
    }

    if order.len() < nodes.len() {
        return Err(WorkflowError::CyclicDependency);
    }

    Ok(order)
}

pub fn has_cycle(nodes: &[WorkflowNode], edges: &[WorkflowEdge]) -> bool {
    matches!(
        build_execution_order(nodes, edges),
        Err(WorkflowError::CyclicDependency)
    )
}

/// Direct successors of `node_id`.
pub fn find_dependent_nodes(node_id: &str, edges: &[WorkflowEdge]) -> BTreeSet<String> {
    edges
        .iter()
        .filter(|e| e.source == node_id && e.target != node_id)
        .map(|e| e.target.clone())
        .collect()
}

/// Direct predecessors of `node_id`.
pub fn find_dependencies(node_id: &str, edges: &[WorkflowEdge]) -> BTreeSet<String> {
    edges
        .iter()
        .filter(|e| e.target == node_id && e.source != node_id)
        .map(|e| e.source.clone())
        .collect()
}

/// Turn declared parameters into concrete values.
///
/// A missing secret is an error. A missing input path leaves the parameter
/// out of the result.
pub fn resolve_params(
    params: &BTreeMap<String, ParamValue>,
    state: &ExecutionState,
) -> Result<HashMap<String, Value>, ResolveError> {
    let mut resolved = HashMap::with_capacity(params.len());

    for (name, param) in params {
        match param {
            ParamValue::Static { value } => {
                resolved.insert(name.clone(), value.clone());
            }
            ParamValue::Secret { key } => {
                let secret = state
                    .secrets
                    .get(key)
                    .ok_or_else(|| ResolveError::SecretNotFound(key.clone()))?;
                resolved.insert(name.clone(), Value::String(secret.clone()));
            }
            ParamValue::Input { path } => match state.inputs.get_path(path) {
                Some(value) => {
                    resolved.insert(name.clone(), value.clone());
                }
                None => tracing::debug!("Input path '{}' for param '{}' is absent", path, name),
            },
        }
    }

    Ok(resolved)
}

/// Gather a node's inputs from upstream outputs along incoming edges.
pub fn resolve_node_inputs(
    node: &WorkflowNode,
    edges: &[WorkflowEdge],
    state: &ExecutionState,
) -> HashMap<String, Value> {
    let mut inputs = HashMap::new();
    let mut fed = HashSet::new();

    for edge in edges.iter().filter(|e| e.target == node.id) {
        if !fed.insert(edge.target_handle.as_str()) {
            tracing::warn!(
                "Input '{}' of node {} is fed by more than one edge; edge {} wins",
                edge.target_handle,
                node.id,
                edge.id
            );
        }

        let value = state
            .outputs
            .get(&edge.source)
            .and_then(|outputs| outputs.get(&edge.source_handle));

        // A later edge without a value still overrides earlier ones.
        match value {
            Some(value) => inputs.insert(edge.target_handle.clone(), value.clone()),
            None => inputs.remove(&edge.target_handle),
        };
    }

    inputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(id: &str) -> WorkflowNode {
        WorkflowNode::new(id, "mock")
    }

    fn edge(source: &str, target: &str) -> WorkflowEdge {
        handle_edge(source, "out", target, "in")
    }

    fn handle_edge(source: &str, source_handle: &str, target: &str, target_handle: &str) -> WorkflowEdge {
        WorkflowEdge {
            id: format!("{}-{}-{}", source, target, target_handle),
            source: source.into(),
            source_handle: source_handle.into(),
            target: target.into(),
            target_handle: target_handle.into(),
        }
    }

    fn position(order: &[String], id: &str) -> usize {
        order.iter().position(|n| n == id).unwrap()
    }

    fn state_with(inputs: serde_json::Value, secrets: &[(&str, &str)]) -> ExecutionState {
        ExecutionState::new(
            Value::from(inputs),
            secrets
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn linear_graph_orders_in_sequence() {
        let nodes = vec![node("a"), node("b"), node("c")];
        let edges = vec![edge("a", "b"), edge("b", "c")];

        assert_eq!(build_execution_order(&nodes, &edges).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn linear_graph_declared_backwards_still_orders_sources_first() {
        let nodes = vec![node("c"), node("b"), node("a")];
        let edges = vec![edge("a", "b"), edge("b", "c")];

        assert_eq!(build_execution_order(&nodes, &edges).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn diamond_places_branches_between_start_and_end() {
        let nodes = vec![node("start"), node("branch1"), node("branch2"), node("end")];
        let edges = vec![
            edge("start", "branch1"),
            edge("start", "branch2"),
            edge("branch1", "end"),
            edge("branch2", "end"),
        ];

        let order = build_execution_order(&nodes, &edges).unwrap();

        assert_eq!(order.first().map(String::as_str), Some("start"));
        assert_eq!(order.last().map(String::as_str), Some("end"));
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn independent_nodes_keep_declaration_order() {
        let nodes = vec![node("z"), node("m"), node("a")];

        assert_eq!(build_execution_order(&nodes, &[]).unwrap(), vec!["z", "m", "a"]);
    }

    #[test]
    fn ready_ties_break_toward_earlier_declaration() {
        // once `root` releases `late`, both are ready and `late` was declared earlier
        let nodes = vec![node("root"), node("late"), node("early")];
        let edges = vec![edge("root", "late")];

        assert_eq!(
            build_execution_order(&nodes, &edges).unwrap(),
            vec!["root", "late", "early"]
        );
    }

    #[test]
    fn two_node_cycle_is_rejected() {
        let nodes = vec![node("a"), node("b")];
        let edges = vec![edge("a", "b"), edge("b", "a")];

        assert_eq!(
            build_execution_order(&nodes, &edges),
            Err(WorkflowError::CyclicDependency)
        );
        assert!(has_cycle(&nodes, &edges));
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let nodes = vec![node("a")];

        assert!(has_cycle(&nodes, &[edge("a", "a")]));
    }

    #[test]
    fn cycle_downstream_of_valid_nodes_is_rejected() {
        let nodes = vec![node("a"), node("b"), node("c")];
        let edges = vec![edge("a", "b"), edge("b", "c"), edge("c", "b")];

        assert!(build_execution_order(&nodes, &edges).is_err());
    }

    #[test]
    fn dangling_edges_do_not_affect_order() {
        let nodes = vec![node("a"), node("b")];
        let edges = vec![edge("ghost", "a"), edge("a", "b"), edge("b", "nowhere")];

        assert_eq!(build_execution_order(&nodes, &edges).unwrap(), vec!["a", "b"]);
        assert!(!has_cycle(&nodes, &edges));
    }

    #[test]
    fn parallel_edges_between_same_nodes_are_counted_once_each() {
        let nodes = vec![node("a"), node("b")];
        let edges = vec![
            handle_edge("a", "x", "b", "left"),
            handle_edge("a", "y", "b", "right"),
        ];

        assert_eq!(build_execution_order(&nodes, &edges).unwrap(), vec!["a", "b"]);
    }

    // Small deterministic generator so the property runs without extra crates.
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self) -> u64 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            self.0 >> 33
        }
    }

    #[test]
    fn every_generated_dag_orders_all_nodes_with_sources_first() {
        let mut rng = Lcg(7);

        for _ in 0..200 {
            let count = (rng.next() % 12 + 1) as usize;
            // A random rank per node; edges only go from lower to higher rank.
            let mut ranks: Vec<usize> = (0..count).collect();
            for i in (1..count).rev() {
                let j = (rng.next() as usize) % (i + 1);
                ranks.swap(i, j);
            }

            let nodes: Vec<_> = (0..count).map(|i| node(&format!("n{}", i))).collect();
            let mut edges = Vec::new();
            for s in 0..count {
                for t in 0..count {
                    if ranks[s] < ranks[t] && rng.next() % 3 == 0 {
                        edges.push(edge(&nodes[s].id, &nodes[t].id));
                    }
                }
            }

            let order = build_execution_order(&nodes, &edges).unwrap();

            assert_eq!(order.len(), count);
            let unique: BTreeSet<_> = order.iter().collect();
            assert_eq!(unique.len(), count);
            for e in &edges {
                assert!(position(&order, &e.source) < position(&order, &e.target));
            }
        }
    }

    #[test]
    fn dependency_queries_are_direct_and_deduplicated() {
        let edges = vec![
            handle_edge("a", "x", "b", "one"),
            handle_edge("a", "y", "b", "two"),
            edge("a", "c"),
            edge("b", "d"),
            edge("a", "a"),
        ];

        let dependents: Vec<_> = find_dependent_nodes("a", &edges).into_iter().collect();
        assert_eq!(dependents, vec!["b", "c"]);

        let dependencies: Vec<_> = find_dependencies("b", &edges).into_iter().collect();
        assert_eq!(dependencies, vec!["a"]);

        assert!(find_dependencies("a", &edges).is_empty());
        assert!(find_dependent_nodes("d", &edges).is_empty());
    }

    #[test]
    fn params_resolve_from_each_source() {
        let state = state_with(json!({ "user": { "name": "Ada" } }), &[("TOKEN", "s3cr3t")]);
        let mut params = BTreeMap::new();
        params.insert("greeting".to_string(), ParamValue::Static { value: "hi".into() });
        params.insert("token".to_string(), ParamValue::Secret { key: "TOKEN".into() });
        params.insert("who".to_string(), ParamValue::Input { path: "user.name".into() });

        let resolved = resolve_params(&params, &state).unwrap();

        assert_eq!(resolved["greeting"], Value::from("hi"));
        assert_eq!(resolved["token"], Value::from("s3cr3t"));
        assert_eq!(resolved["who"], Value::from("Ada"));
    }

    #[test]
    fn missing_secret_fails_naming_the_key() {
        let state = state_with(json!({}), &[]);
        let mut params = BTreeMap::new();
        params.insert("token".to_string(), ParamValue::Secret { key: "MISSING".into() });

        let err = resolve_params(&params, &state).unwrap_err();

        assert_eq!(err, ResolveError::SecretNotFound("MISSING".into()));
        assert!(err.to_string().contains("MISSING"));
    }

    #[test]
    fn missing_input_path_is_absent_not_an_error() {
        let state = state_with(json!({ "user": {} }), &[]);
        let mut params = BTreeMap::new();
        params.insert("who".to_string(), ParamValue::Input { path: "user.name".into() });
        params.insert("deep".to_string(), ParamValue::Input { path: "a.b.c".into() });

        let resolved = resolve_params(&params, &state).unwrap();

        assert!(resolved.is_empty());
    }

    #[test]
    fn resolving_twice_gives_identical_results() {
        let state = state_with(json!({ "n": 3 }), &[("K", "v")]);
        let mut params = BTreeMap::new();
        params.insert("a".to_string(), ParamValue::Static { value: Value::from(1.5) });
        params.insert("b".to_string(), ParamValue::Secret { key: "K".into() });
        params.insert("c".to_string(), ParamValue::Input { path: "n".into() });

        let first = resolve_params(&params, &state).unwrap();
        let second = resolve_params(&params, &state).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn node_inputs_come_from_upstream_handles() {
        let mut state = state_with(json!({}), &[]);
        state.merge_outputs("a", HashMap::from([("out".to_string(), Value::from("X"))]));
        let target = node("b");

        let inputs = resolve_node_inputs(&target, &[handle_edge("a", "out", "b", "in")], &state);

        assert_eq!(inputs, HashMap::from([("in".to_string(), Value::from("X"))]));
    }

    #[test]
    fn node_without_incoming_edges_has_no_inputs() {
        let state = state_with(json!({}), &[]);

        assert!(resolve_node_inputs(&node("solo"), &[edge("solo", "other")], &state).is_empty());
    }

    #[test]
    fn not_yet_executed_upstream_yields_absent_input() {
        let state = state_with(json!({}), &[]);

        let inputs = resolve_node_inputs(&node("b"), &[edge("a", "b")], &state);

        assert!(inputs.is_empty());
    }

    #[test]
    fn duplicate_target_handle_is_last_write_wins() {
        let mut state = state_with(json!({}), &[]);
        state.merge_outputs("a", HashMap::from([("out".to_string(), Value::from("from a"))]));
        state.merge_outputs("b", HashMap::from([("out".to_string(), Value::from("from b"))]));
        let edges = vec![handle_edge("a", "out", "c", "in"), handle_edge("b", "out", "c", "in")];

        let inputs = resolve_node_inputs(&node("c"), &edges, &state);

        assert_eq!(inputs["in"], Value::from("from b"));
    }

    #[test]
    fn later_edge_without_value_clears_earlier_input() {
        let mut state = state_with(json!({}), &[]);
        state.merge_outputs("a", HashMap::from([("out".to_string(), Value::from("from a"))]));
        let edges = vec![
            handle_edge("a", "out", "c", "in"),
            handle_edge("b", "missing", "c", "in"),
        ];

        let inputs = resolve_node_inputs(&node("c"), &edges, &state);

        assert!(!inputs.contains_key("in"));
    }
}
