// crates/speedfog-config/src/lib.rs
// ============================================================================
// Crate: speedfog-config
// Description: Typed, validated process configuration for speedfog-server.
// Purpose: Single source of truth for speedfog.toml semantics.
// Dependencies: speedfog-core, serde, toml, thiserror
// ============================================================================

#![forbid(unsafe_code)]

pub mod config;

pub use config::ConfigError;
pub use config::MonitorConfig;
pub use config::ServerConfig;
pub use config::SessionConfig;
pub use config::SpeedfogConfig;
pub use config::StorageConfig;
