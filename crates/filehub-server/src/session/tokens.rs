//! Session tokens: opaque random strings mapped to a user id.

use std::time::Duration;

use tracing::debug;

use super::SessionError;
use super::cache::TtlCache;

const KEY_PREFIX: &str = "auth_";

fn session_key(token: &str) -> String {
    format!("{KEY_PREFIX}{token}")
}

/// Issues, resolves and revokes session tokens.
///
/// Each token lives under `auth_<token>` with the TTL fixed at issuance.
/// A user may hold any number of live tokens.
#[derive(Clone)]
pub struct SessionStore {
    cache: TtlCache,
}

impl SessionStore {
    pub const fn new(cache: TtlCache) -> Self {
        Self { cache }
    }

    /// Create a fresh token for `user_id` that expires after `ttl`.
    pub async fn issue(&self, user_id: &str, ttl: Duration) -> Result<String, SessionError> {
        let token = uuid::Uuid::new_v4().to_string();
        self.cache.set(&session_key(&token), user_id, ttl).await?;
        debug!(user_id, ttl_secs = ttl.as_secs(), "Session token issued");
        Ok(token)
    }

    /// Look up the user behind a token. Absent if unknown, expired or revoked.
    pub async fn resolve(&self, token: &str) -> Result<Option<String>, SessionError> {
        self.cache.get(&session_key(token)).await
    }

    /// Forget a token. Revoking an absent token is not an error.
    pub async fn revoke(&self, token: &str) -> Result<(), SessionError> {
        self.cache.del(&session_key(token)).await?;
        Ok(())
    }

    pub fn is_alive(&self) -> bool {
        self.cache.is_alive()
    }

    /// The backing cache, for maintenance tasks.
    pub const fn cache(&self) -> &TtlCache {
        &self.cache
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(TtlCache::new())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(86_400);

    #[tokio::test(start_paused = true)]
    async fn token_resolves_for_whole_ttl_then_expires() {
        let sessions = SessionStore::default();
        let token = sessions.issue("u1", DAY).await.unwrap();

        assert_eq!(sessions.resolve(&token).await.unwrap().as_deref(), Some("u1"));
        tokio::time::advance(DAY - Duration::from_secs(1)).await;
        assert_eq!(sessions.resolve(&token).await.unwrap().as_deref(), Some("u1"));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(sessions.resolve(&token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn revoke_then_resolve_is_absent() {
        let sessions = SessionStore::default();
        let token = sessions.issue("u1", DAY).await.unwrap();

        sessions.revoke(&token).await.unwrap();
        assert_eq!(sessions.resolve(&token).await.unwrap(), None);
        // Idempotent.
        sessions.revoke(&token).await.unwrap();
    }

    #[tokio::test]
    async fn tokens_for_same_user_are_independent() {
        let sessions = SessionStore::default();
        let a = sessions.issue("u1", DAY).await.unwrap();
        let b = sessions.issue("u1", DAY).await.unwrap();
        assert_ne!(a, b);

        sessions.revoke(&a).await.unwrap();
        assert_eq!(sessions.resolve(&a).await.unwrap(), None);
        assert_eq!(sessions.resolve(&b).await.unwrap().as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn token_is_stored_under_auth_prefix() {
        let sessions = SessionStore::default();
        let token = sessions.issue("u1", DAY).await.unwrap();

        let raw = sessions.cache().get(&format!("auth_{token}")).await.unwrap();
        assert_eq!(raw.as_deref(), Some("u1"));
        assert_eq!(sessions.cache().get(&token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn huge_ttl_issues_a_working_token() {
        let sessions = SessionStore::default();
        let token = sessions
            .issue("u1", Duration::from_secs(u64::MAX))
            .await
            .unwrap();
        assert_eq!(sessions.resolve(&token).await.unwrap().as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn unknown_token_is_absent() {
        let sessions = SessionStore::default();
        assert_eq!(sessions.resolve("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn dead_store_fails_at_call_time() {
        let sessions = SessionStore::default();
        sessions.cache().close().await;
        assert!(!sessions.is_alive());
        assert!(sessions.issue("u1", DAY).await.is_err());
        assert!(sessions.resolve("t").await.is_err());
    }
}
