// crates/speedfog-core/src/lib.rs
// ============================================================================
// Crate: speedfog-core
// Description: Entities, identifiers, the DAG graph model, and the
// backend-agnostic state store for SpeedFog's realtime coordination core.
// Purpose: Shared foundation every other speedfog-* crate builds on.
// ============================================================================

#![forbid(unsafe_code)]

pub mod clock;
pub mod entities;
pub mod error;
pub mod graph;
pub mod identifiers;
pub mod store;
pub mod store_memory;
pub mod store_sqlite;
pub mod wire;

pub use clock::Clock;
pub use clock::FixedClock;
pub use clock::SystemClock;
pub use entities::Invite;
pub use entities::Participant;
pub use entities::ParticipantStatus;
pub use entities::Race;
pub use entities::RaceStatus;
pub use entities::Seed;
pub use entities::SeedStatus;
pub use entities::User;
pub use entities::UserRole;
pub use entities::ZoneHistoryEntry;
pub use error::StoreError;
pub use graph::Exit;
pub use graph::GraphNode;
pub use graph::SeedGraph;
pub use identifiers::FlagId;
pub use identifiers::InviteId;
pub use identifiers::ModToken;
pub use identifiers::NodeId;
pub use identifiers::ParticipantId;
pub use identifiers::RaceId;
pub use identifiers::SeedId;
pub use identifiers::UserId;
pub use store::NewRace;
pub use store::RaceStore;
pub use store::RaceTransition;
pub use store::SeedStore;
pub use store::Store;
pub use store::TransitionOutcome;
pub use store_memory::InMemoryStore;
pub use store_sqlite::JournalMode;
pub use store_sqlite::SqliteStore;
pub use store_sqlite::SqliteStoreConfig;
pub use wire::ModInbound;
pub use wire::ModOutbound;
pub use wire::ModSeedView;
pub use wire::ParticipantView;
pub use wire::RaceSummary;
pub use wire::SpectatorInbound;
pub use wire::SpectatorOutbound;
pub use wire::SpectatorSeedView;
