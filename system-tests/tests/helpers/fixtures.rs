// system-tests/tests/helpers/fixtures.rs
// ============================================================================
// Module: System Test Fixtures
// Description: Builds the seed graph, race, and participants used by the
// end-to-end scenarios in spec.md section 8.
// Purpose: Keep every suite's setup identical to the S1 literal values so
// assertions can cite the scenario text directly.
// Dependencies: speedfog-core
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use speedfog_core::entities::Race;
use speedfog_core::entities::SeedStatus;
use speedfog_core::graph::Exit;
use speedfog_core::graph::GraphNode;
use speedfog_core::graph::SeedGraph;
use speedfog_core::identifiers::FlagId;
use speedfog_core::identifiers::NodeId;
use speedfog_core::identifiers::SeedId;
use speedfog_core::identifiers::UserId;
use speedfog_core::entities::Participant;
use speedfog_core::entities::Seed;
use speedfog_core::store::NewRace;
use speedfog_core::store::RaceStore;
use speedfog_core::store::SeedStore;
use speedfog_core::store::Store;

/// The three-node, three-layer seed used throughout S1-S5: start node
/// `n_s`, flag `1001 -> n_a` (layer 1), flag `1002 -> n_b` (layer 2),
/// finish flag `1010` (layer 3).
pub fn seed_graph() -> SeedGraph {
    let start = NodeId::from_raw("n_s");
    let node_a = NodeId::from_raw("n_a");
    let node_b = NodeId::from_raw("n_b");

    let mut nodes = BTreeMap::new();
    nodes.insert(
        start.clone(),
        GraphNode {
            id: start.clone(),
            layer: 0,
            node_type: "start".to_string(),
            tier: None,
            zones: vec!["zone_start".to_string()],
            display_name: "Start".to_string(),
            exits: vec![Exit { text: "onward".to_string(), to: node_a.clone(), to_name: "Zone A".to_string(), discovered: false }],
        },
    );
    nodes.insert(
        node_a.clone(),
        GraphNode {
            id: node_a.clone(),
            layer: 1,
            node_type: "normal".to_string(),
            tier: None,
            zones: vec!["zone_a".to_string()],
            display_name: "Zone A".to_string(),
            exits: vec![Exit { text: "deeper".to_string(), to: node_b.clone(), to_name: "Zone B".to_string(), discovered: false }],
        },
    );
    nodes.insert(
        node_b.clone(),
        GraphNode {
            id: node_b.clone(),
            layer: 2,
            node_type: "normal".to_string(),
            tier: None,
            zones: vec!["zone_b".to_string()],
            display_name: "Zone B".to_string(),
            exits: vec![],
        },
    );

    let mut event_map = BTreeMap::new();
    event_map.insert(FlagId::new(1001), node_a);
    event_map.insert(FlagId::new(1002), node_b);

    SeedGraph {
        start_node: start,
        nodes,
        event_map,
        finish_event: FlagId::new(1010),
        total_layers: 3,
        total_nodes: 3,
        total_paths: 1,
    }
}

/// Persists a CONSUMED seed built from [`seed_graph`] into `store` and
/// returns its id.
pub fn put_consumed_seed(store: &dyn Store) -> SeedId {
    let seed = Seed {
        id: SeedId::new(),
        pool: "default".to_string(),
        numeric_id: 1,
        graph: seed_graph(),
        status: SeedStatus::Consumed,
        file_path: "seeds/default/1.json".to_string(),
    };
    store.put_seed(seed.clone()).expect("put seed");
    seed.id
}

/// Creates a SETUP race over `seed_id`.
pub fn create_race(store: &dyn Store, seed_id: SeedId) -> Race {
    store
        .create_race(NewRace {
            name: "Happy Race".to_string(),
            organizer_user_id: UserId::new(),
            seed_id,
            is_public: true,
            scheduled_at: None,
            config: serde_json::json!({}),
        })
        .expect("create race")
}

/// Registers a participant and returns it (including its `mod_token`).
pub fn register_participant(store: &dyn Store, race_id: &speedfog_core::identifiers::RaceId) -> Participant {
    let user = UserId::new();
    store.register_participant(race_id, &user).expect("register participant")
}

/// Convenience: builds a full SETUP race with `count` participants over a
/// consumed seed, returning (race, participants).
pub fn race_with_participants(store: &Arc<dyn Store>, count: usize) -> (Race, Vec<Participant>) {
    let seed_id = put_consumed_seed(store.as_ref());
    let race = create_race(store.as_ref(), seed_id);
    let participants =
        (0..count).map(|_| register_participant(store.as_ref(), &race.id)).collect();
    (race, participants)
}
