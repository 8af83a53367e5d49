// crates/speedfog-core/src/error.rs
// ============================================================================
// Module: SpeedFog Store Errors
// Description: Error taxonomy for the state store (spec.md section 7).
// Purpose: Stable, programmatically matchable variants; no ad-hoc string
// errors escape the store boundary.
// Dependencies: thiserror
// ============================================================================

use thiserror::Error;

/// Errors returned by `RaceStore`/`SeedStore` implementations.
///
/// # Invariants
/// - Variants are stable for programmatic handling by callers (spec.md
///   section 7: `PersistenceError` rolls the transaction back and suppresses
///   any broadcast derived from it).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Underlying storage I/O failed.
    #[error("store io error: {0}")]
    Io(String),
    /// Stored data failed to (de)serialize.
    #[error("store serialization error: {0}")]
    Serialization(String),
    /// The store reported an otherwise uncategorized failure.
    #[error("store error: {0}")]
    Backend(String),
}
