// crates/speedfog-resolve/src/grace.rs
// ============================================================================
// Module: SpeedFog Grace / Map Resolver
// Description: Resolves a mod's `zone_query` hint to a DAG node via a
// three-strategy cascade (spec.md section 4.3).
// Purpose: Pure, stateless hint-to-node resolution. No I/O, no locks.
// Dependencies: speedfog-core::graph, std::collections::BTreeMap
// ============================================================================

//! ## Overview
//! The grace-entity and map-id lookup tables are static game data (offline
//! seed generation and data extraction are out of scope), so they are
//! injected as [`ResolverTables`] rather than hardcoded here. A caller
//! assembles one `ResolverTables` at startup and shares it read-only across
//! every race.
//!
//! Returning `None` from [`resolve_zone_query`] means the caller must not
//! mutate any participant state (spec.md section 4.3 strategy 3).

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use speedfog_core::graph::SeedGraph;
use speedfog_core::identifiers::NodeId;

/// Inbound hint fields from a mod's `zone_query` message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoneQueryHint {
    /// In-game grace (bonfire-equivalent) entity id, if the mod is resting.
    pub grace_entity_id: Option<String>,
    /// In-game map id.
    pub map_id: Option<String>,
    /// Opaque submap/position discriminator used to narrow a map lookup.
    pub play_region_id: Option<String>,
}

/// One candidate zone a map id may resolve to, optionally scoped to a submap.
#[derive(Debug, Clone)]
pub struct MapZoneCandidate {
    /// Candidate zone id within the seed's graph.
    pub zone_id: String,
    /// Submap/region this candidate is scoped to, if the map has more than
    /// one region sharing the same `map_id`.
    pub play_region_id: Option<String>,
}

/// Static lookup tables the grace resolver cascades through.
#[derive(Debug, Clone, Default)]
pub struct ResolverTables {
    /// `grace_entity_id -> zone_id`.
    pub grace_zones: BTreeMap<String, String>,
    /// `map_id -> candidate zones`.
    pub map_zones: BTreeMap<String, Vec<MapZoneCandidate>>,
}

/// Resolves `hint` against `graph` using the three-strategy cascade.
///
/// `visited` is the querying participant's own zone history node ids, used
/// to disambiguate a map lookup that still yields multiple candidate nodes
/// after submap narrowing (a player cannot be standing in an unvisited node
/// when no fog-gate event fired for it).
#[must_use]
pub fn resolve_zone_query(
    tables: &ResolverTables,
    hint: &ZoneQueryHint,
    graph: &SeedGraph,
    visited: &[NodeId],
) -> Option<NodeId> {
    if let Some(node) = resolve_via_grace(tables, hint, graph) {
        return Some(node);
    }
    resolve_via_map(tables, hint, graph, visited)
}

fn resolve_via_grace(tables: &ResolverTables, hint: &ZoneQueryHint, graph: &SeedGraph) -> Option<NodeId> {
    let grace_entity_id = hint.grace_entity_id.as_ref()?;
    let zone_id = tables.grace_zones.get(grace_entity_id)?;
    graph.node_containing_zone(zone_id).cloned()
}

fn resolve_via_map(
    tables: &ResolverTables,
    hint: &ZoneQueryHint,
    graph: &SeedGraph,
    visited: &[NodeId],
) -> Option<NodeId> {
    let map_id = hint.map_id.as_ref()?;
    let candidates = tables.map_zones.get(map_id)?;

    let scoped: Vec<&MapZoneCandidate> = if let Some(region) = hint.play_region_id.as_ref() {
        let narrowed: Vec<&MapZoneCandidate> = candidates
            .iter()
            .filter(|c| c.play_region_id.as_deref() == Some(region.as_str()))
            .collect();
        if narrowed.is_empty() {
            candidates.iter().collect()
        } else {
            narrowed
        }
    } else {
        candidates.iter().collect()
    };

    let mut nodes: Vec<&NodeId> =
        scoped.iter().filter_map(|c| graph.node_containing_zone(&c.zone_id)).collect();
    nodes.sort();
    nodes.dedup();

    match nodes.as_slice() {
        [] => None,
        [single] => Some((*single).clone()),
        _ => {
            let visited_matches: Vec<&&NodeId> = nodes.iter().filter(|n| visited.contains(n)).collect();
            match visited_matches.as_slice() {
                [single] => Some((**single).clone()),
                _ => None,
            }
        }
    }
}
