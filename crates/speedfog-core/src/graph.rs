// crates/speedfog-core/src/graph.rs
// ============================================================================
// Module: SpeedFog Seed Graph
// Description: The DAG layout of a seed: zones (nodes), fog-gate traversals
// (edges), and the event-flag map used to resolve gameplay events to nodes.
// Purpose: Provide the read-only graph model shared by the resolver, the
// leaderboard/gap engine, and the mod/spectator wire payloads.
// Dependencies: serde, std::collections::BTreeMap
// ============================================================================

//! ## Overview
//! A seed's graph is generated offline (out of scope; see spec.md section 1)
//! and stored as a JSON column. This module only models the shape the core
//! needs to read: per-node layer/tier/zones and the flag -> node mapping.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::FlagId;
use crate::identifiers::NodeId;

/// One traversal exit out of a node, as sent to the mod in `zone_update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exit {
    /// Human-facing exit label.
    pub text: String,
    /// Target node id.
    pub to: NodeId,
    /// Target node's display name.
    pub to_name: String,
    /// Whether this exit has already been discovered by the viewing
    /// participant (populated per-viewer at send time, not stored on the
    /// node itself).
    #[serde(default)]
    pub discovered: bool,
}

/// A single DAG node (zone) in a seed's graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Node identifier.
    pub id: NodeId,
    /// Depth from the start node (0) to the final boss (`total_layers`).
    pub layer: u32,
    /// Node type (e.g. "normal", "boss", "branch"); opaque beyond display.
    pub node_type: String,
    /// Optional difficulty/variant tier.
    pub tier: Option<String>,
    /// Grace-lookup zone ids contained within this node, used by the grace
    /// resolver's cascade (spec.md section 4.3).
    pub zones: Vec<String>,
    /// Display name shown in `zone_update`.
    pub display_name: String,
    /// Outbound traversal exits.
    pub exits: Vec<Exit>,
}

/// The full DAG for one seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedGraph {
    /// Start node, assigned to a participant on READY -> PLAYING (I4).
    pub start_node: NodeId,
    /// All nodes keyed by id for O(log n) lookup.
    pub nodes: BTreeMap<NodeId, GraphNode>,
    /// `flag_id -> node_id`, used by the event-flag resolver (C4).
    pub event_map: BTreeMap<FlagId, NodeId>,
    /// The flag id that signals a finish.
    pub finish_event: FlagId,
    /// Total layer depth of the final boss.
    pub total_layers: u32,
    /// Metadata total node count, always included in spectator snapshots.
    pub total_nodes: u64,
    /// Metadata total distinct path count, always included in spectator
    /// snapshots.
    pub total_paths: u64,
}

impl SeedGraph {
    /// Returns the node for `id`, if present in the graph.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    /// Returns the sorted list of event flag ids the mod should poll, per
    /// the `auth_ok.seed.event_ids` wire contract (spec.md section 6.1).
    #[must_use]
    pub fn sorted_event_ids(&self) -> Vec<FlagId> {
        self.event_map.keys().copied().collect()
    }

    /// Finds the unique node whose `zones` contains `zone_id`, if exactly
    /// one such node exists. Used by the grace-lookup resolver strategy.
    #[must_use]
    pub fn node_containing_zone(&self, zone_id: &str) -> Option<&NodeId> {
        let mut found = None;
        for node in self.nodes.values() {
            if node.zones.iter().any(|z| z == zone_id) {
                if found.is_some() {
                    return None;
                }
                found = Some(&node.id);
            }
        }
        found
    }
}
