// crates/speedfog-resolve/src/flags.rs
// ============================================================================
// Module: SpeedFog Event-Flag Resolver
// Description: Maps an inbound `event_flag` id to a DAG node, or detects
// the finish event (spec.md section 4.4).
// Purpose: Pure, stateless flag-to-outcome resolution.
// Dependencies: speedfog-core::graph
// ============================================================================

use speedfog_core::graph::SeedGraph;
use speedfog_core::identifiers::FlagId;
use speedfog_core::identifiers::NodeId;

/// Outcome of resolving an event flag against a seed's graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagResolution {
    /// The flag is the seed's finish event.
    Finish,
    /// The flag maps to a DAG node.
    Node(NodeId),
    /// The flag is not present in the seed's event map; logged and ignored.
    Unknown,
}

/// Resolves `flag_id` against `graph` (spec.md section 4.4).
#[must_use]
pub fn resolve_event_flag(graph: &SeedGraph, flag_id: FlagId) -> FlagResolution {
    if flag_id == graph.finish_event {
        return FlagResolution::Finish;
    }
    match graph.event_map.get(&flag_id) {
        Some(node_id) => FlagResolution::Node(node_id.clone()),
        None => FlagResolution::Unknown,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "test-only assertions")]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample_graph() -> SeedGraph {
        let mut event_map = BTreeMap::new();
        event_map.insert(FlagId::new(1001), NodeId::from_raw("n_a"));
        event_map.insert(FlagId::new(1002), NodeId::from_raw("n_b"));
        SeedGraph {
            start_node: NodeId::from_raw("n_s"),
            nodes: BTreeMap::new(),
            event_map,
            finish_event: FlagId::new(1010),
            total_layers: 3,
            total_nodes: 3,
            total_paths: 1,
        }
    }

    #[test]
    fn finish_event_takes_priority() {
        let graph = sample_graph();
        assert_eq!(resolve_event_flag(&graph, FlagId::new(1010)), FlagResolution::Finish);
    }

    #[test]
    fn mapped_flag_resolves_to_node() {
        let graph = sample_graph();
        assert_eq!(
            resolve_event_flag(&graph, FlagId::new(1001)),
            FlagResolution::Node(NodeId::from_raw("n_a"))
        );
    }

    #[test]
    fn unmapped_flag_is_unknown() {
        let graph = sample_graph();
        assert_eq!(resolve_event_flag(&graph, FlagId::new(9999)), FlagResolution::Unknown);
    }
}
