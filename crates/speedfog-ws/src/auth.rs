// crates/speedfog-ws/src/auth.rs
// ============================================================================
// Module: SpeedFog Spectator Auth Resolver
// Description: Boundary trait for resolving a spectator's bearer token to a
// viewer identity (spec.md section 4.7). OAuth integration itself is a
// Non-goal; this crate only needs to know whether a token belongs to a
// participant or a privileged organizer/caster.
// Purpose: Let speedfog-ws build a per-viewer `ViewerContext` without owning
// user/session storage.
// Dependencies: speedfog-rooms
// ============================================================================

use async_trait::async_trait;

use speedfog_core::identifiers::RaceId;
use speedfog_rooms::ViewerContext;

/// Resolves a spectator's optional bearer token into a [`ViewerContext`].
#[async_trait]
pub trait SpectatorAuthResolver: Send + Sync {
    /// Returns the viewer context for `token` against `race_id`, or `None`
    /// if the token does not resolve to a known user.
    async fn resolve(&self, race_id: &RaceId, token: &str) -> Option<ViewerContext>;
}

/// Resolves every token to nothing, leaving every spectator anonymous.
/// The default until a real session-token backend is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnonymousAuthResolver;

#[async_trait]
impl SpectatorAuthResolver for AnonymousAuthResolver {
    async fn resolve(&self, _race_id: &RaceId, _token: &str) -> Option<ViewerContext> {
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "test-only assertions")]
mod tests {
    use super::*;

    #[tokio::test]
    async fn anonymous_resolver_never_resolves() {
        let resolver = AnonymousAuthResolver;
        assert!(resolver.resolve(&RaceId::new(), "whatever").await.is_none());
    }
}
