//! Sign-in, token resolution and sign-out.

use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::session::SessionStore;
use crate::storage::Store;

use super::AuthError;
use super::basic::parse_basic;
use super::password::digest_password;

/// Token-based authentication over the users collection and the session store.
#[derive(Clone)]
pub struct AuthFlow {
    store: Store,
    sessions: SessionStore,
    token_ttl: Duration,
}

impl AuthFlow {
    pub const fn new(store: Store, sessions: SessionStore, token_ttl: Duration) -> Self {
        Self {
            store,
            sessions,
            token_ttl,
        }
    }

    /// Exchange a Basic authorization header for a session token.
    ///
    /// Unknown email and wrong password fail identically.
    #[instrument(skip_all)]
    pub async fn sign_in(&self, authorization: Option<&str>) -> Result<String, AuthError> {
        let creds = authorization
            .and_then(parse_basic)
            .ok_or(AuthError::Unauthorized)?;

        let digest = digest_password(&creds.password);
        let Some(user) = self
            .store
            .users()?
            .find_by_credentials(&creds.email, &digest)
            .await?
        else {
            warn!("Failed sign-in attempt");
            return Err(AuthError::Unauthorized);
        };

        let token = self.sessions.issue(&user.id, self.token_ttl).await?;
        info!(user_id = %user.id, "User signed in");
        Ok(token)
    }

    /// Resolve the user id behind a session token.
    pub async fn current_user(&self, token: Option<&str>) -> Result<String, AuthError> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Unauthorized)?;
        self.sessions
            .resolve(token)
            .await?
            .ok_or(AuthError::Unauthorized)
    }

    /// Revoke a live session token.
    #[instrument(skip_all)]
    pub async fn sign_out(&self, token: Option<&str>) -> Result<(), AuthError> {
        let user_id = self.current_user(token).await?;
        if let Some(token) = token {
            self.sessions.revoke(token).await?;
        }
        info!(user_id = %user_id, "User signed out");
        Ok(())
    }

    pub const fn store(&self) -> &Store {
        &self.store
    }

    pub const fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    use super::*;

    const DAY: Duration = Duration::from_secs(86_400);

    fn basic(email: &str, password: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{email}:{password}")))
    }

    async fn setup() -> (AuthFlow, String) {
        let store = Store::open_in_memory().await;
        let user = store
            .users()
            .unwrap()
            .insert("bob@dylan.com", &digest_password("toto1234!"))
            .await
            .unwrap();
        (AuthFlow::new(store, SessionStore::default(), DAY), user.id)
    }

    #[tokio::test]
    async fn sign_in_issues_resolvable_token() {
        let (auth, user_id) = setup().await;
        let token = auth
            .sign_in(Some(&basic("bob@dylan.com", "toto1234!")))
            .await
            .unwrap();

        assert_eq!(auth.current_user(Some(&token)).await.unwrap(), user_id);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_fail_identically() {
        let (auth, _) = setup().await;

        let wrong_pw = auth
            .sign_in(Some(&basic("bob@dylan.com", "nope")))
            .await
            .unwrap_err();
        let unknown = auth
            .sign_in(Some(&basic("alice@dylan.com", "toto1234!")))
            .await
            .unwrap_err();

        assert!(matches!(wrong_pw, AuthError::Unauthorized));
        assert!(matches!(unknown, AuthError::Unauthorized));
        assert_eq!(wrong_pw.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_unauthorized() {
        let (auth, _) = setup().await;
        assert!(matches!(auth.sign_in(None).await, Err(AuthError::Unauthorized)));
        assert!(matches!(
            auth.sign_in(Some("Bearer x")).await,
            Err(AuthError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn sign_out_revokes_token() {
        let (auth, _) = setup().await;
        let token = auth
            .sign_in(Some(&basic("bob@dylan.com", "toto1234!")))
            .await
            .unwrap();

        auth.sign_out(Some(&token)).await.unwrap();
        assert!(matches!(
            auth.current_user(Some(&token)).await,
            Err(AuthError::Unauthorized)
        ));
        // A second sign-out no longer has a valid token.
        assert!(matches!(
            auth.sign_out(Some(&token)).await,
            Err(AuthError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let (auth, user_id) = setup().await;
        let header = basic("bob@dylan.com", "toto1234!");
        let a = auth.sign_in(Some(&header)).await.unwrap();
        let b = auth.sign_in(Some(&header)).await.unwrap();

        auth.sign_out(Some(&a)).await.unwrap();
        assert_eq!(auth.current_user(Some(&b)).await.unwrap(), user_id);
    }

    #[tokio::test]
    async fn token_expires_after_ttl() {
        let (auth, _) = setup().await;
        let token = auth
            .sign_in(Some(&basic("bob@dylan.com", "toto1234!")))
            .await
            .unwrap();

        // Pause only after the store work is done; resolution touches the
        // session cache alone.
        tokio::time::pause();
        tokio::time::advance(DAY).await;
        assert!(matches!(
            auth.current_user(Some(&token)).await,
            Err(AuthError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn store_outage_is_not_unauthorized() {
        let (auth, _) = setup().await;
        auth.store().close().await;

        let err = auth
            .sign_in(Some(&basic("bob@dylan.com", "toto1234!")))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Store(_)));
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let (auth, _) = setup().await;
        assert!(matches!(auth.current_user(None).await, Err(AuthError::Unauthorized)));
        assert!(matches!(
            auth.current_user(Some("")).await,
            Err(AuthError::Unauthorized)
        ));
    }
}
