//! User queue consumer: welcomes newly registered users.

use std::future::Future;

use serde_json::Value;
use tracing::{info, instrument};

use crate::jobs::{JobError, JobProcessor, QueueName, UserJob};
use crate::storage::{Store, User};

/// Delivers the welcome message. Repeat deliveries are tolerated.
pub trait Notifier: Send + Sync + 'static {
    fn welcome(&self, user: &User) -> impl Future<Output = Result<(), JobError>> + Send;
}

/// Writes the welcome message to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn welcome(&self, user: &User) -> Result<(), JobError> {
        info!(user_id = %user.id, "Welcome {}!", user.email);
        Ok(())
    }
}

/// Drains `userQueue`.
pub struct WelcomeProcessor<N = LogNotifier> {
    store: Store,
    notifier: N,
}

impl<N: Notifier> WelcomeProcessor<N> {
    pub const fn new(store: Store, notifier: N) -> Self {
        Self { store, notifier }
    }

    pub const fn notifier(&self) -> &N {
        &self.notifier
    }
}

impl<N: Notifier> JobProcessor for WelcomeProcessor<N> {
    fn queue(&self) -> QueueName {
        QueueName::User
    }

    #[instrument(skip_all)]
    async fn process(&self, payload: &Value) -> Result<(), JobError> {
        let job = UserJob::from_payload(payload)?;
        let user = self
            .store
            .users()?
            .find_by_id(&job.user_id)
            .await?
            .ok_or_else(|| JobError::NotFound("User not found".into()))?;

        self.notifier.welcome(&user).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::storage::new_id;

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<String>>,
    }

    impl Notifier for Recording {
        async fn welcome(&self, user: &User) -> Result<(), JobError> {
            self.sent.lock().unwrap().push(user.email.clone());
            Ok(())
        }
    }

    async fn setup() -> (WelcomeProcessor<Recording>, String) {
        let store = Store::open_in_memory().await;
        let user = store
            .users()
            .unwrap()
            .insert("bob@dylan.com", "digest")
            .await
            .unwrap();
        (WelcomeProcessor::new(store, Recording::default()), user.id)
    }

    #[tokio::test]
    async fn welcomes_existing_user() {
        let (processor, user_id) = setup().await;
        processor.process(&json!({"userId": user_id})).await.unwrap();
        assert_eq!(*processor.notifier().sent.lock().unwrap(), vec!["bob@dylan.com"]);
    }

    #[tokio::test]
    async fn duplicate_delivery_welcomes_twice() {
        let (processor, user_id) = setup().await;
        let payload = json!({"userId": user_id});
        processor.process(&payload).await.unwrap();
        processor.process(&payload).await.unwrap();
        assert_eq!(processor.notifier().sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let (processor, _) = setup().await;
        let err = processor
            .process(&json!({"userId": new_id()}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "User not found");
        assert!(processor.notifier().sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_id_fails_without_store_fetch() {
        // Unconnected store: a fetch would surface as a store error instead.
        let processor = WelcomeProcessor::new(Store::new(), Recording::default());

        let err = processor
            .process(&json!({"userId": "not-an-id"}))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidPayload(_)));

        let err = processor.process(&json!({})).await.unwrap_err();
        assert!(matches!(err, JobError::InvalidPayload(_)));
    }

    #[tokio::test]
    async fn store_outage_fails_the_attempt() {
        let processor = WelcomeProcessor::new(Store::new(), LogNotifier);
        let err = processor
            .process(&json!({"userId": new_id()}))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Store(_)));
    }
}
