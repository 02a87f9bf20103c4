//! Routes the chat conversation to one agent session
//!
//! The router remembers only the id of the active session. Listings are
//! fetched fresh for every request and never cached.
//!
//! Every [`SessionRouter::clear_session`] starts a new epoch. A create or
//! select that began in an earlier epoch does not adopt its result, so a
//! session cannot leak across a workspace switch that raced it.

use crate::agent::{AgentApi, SessionDescriptor};
use crate::error::{Error, Result};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Active-session tracking on top of the agent's session API
pub struct SessionRouter {
    api: Arc<dyn AgentApi>,
    active: RwLock<ActiveSession>,
}

#[derive(Debug, Default)]
struct ActiveSession {
    id: Option<String>,
    /// Bumped by every clear
    epoch: u64,
}

impl SessionRouter {
    /// Create a new session router with no active session
    pub fn new(api: Arc<dyn AgentApi>) -> Self {
        Self {
            api,
            active: RwLock::new(ActiveSession::default()),
        }
    }

    /// Id of the active session, if one is selected
    pub async fn active_session(&self) -> Option<String> {
        self.active.read().await.id.clone()
    }

    /// All sessions the agent knows about
    pub async fn list_sessions(&self) -> Result<Vec<SessionDescriptor>> {
        self.api.list_sessions().await
    }

    /// Create a session and make it active. On failure the active session is
    /// left as it was.
    pub async fn create_session(&self) -> Result<SessionDescriptor> {
        let epoch = self.active.read().await.epoch;
        let session = self.api.create_session().await?;
        self.adopt(epoch, &session.id).await?;
        tracing::info!(session_id = %session.id, "Created agent session");
        Ok(session)
    }

    /// Adopt `id` as the active session if the agent lists it.
    pub async fn select_session(&self, id: &str) -> Result<SessionDescriptor> {
        let epoch = self.active.read().await.epoch;
        let sessions = self.api.list_sessions().await?;
        let session = sessions
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))?;

        self.adopt(epoch, &session.id).await?;
        tracing::info!(session_id = %session.id, "Switched agent session");
        Ok(session)
    }

    /// Forget the active session (workspace changed)
    pub async fn clear_session(&self) {
        let mut active = self.active.write().await;
        active.epoch += 1;
        if let Some(previous) = active.id.take() {
            tracing::info!(session_id = %previous, "Cleared agent session");
        }
    }

    /// Make `id` active unless a clear happened since `epoch` was read.
    async fn adopt(&self, epoch: u64, id: &str) -> Result<()> {
        let mut active = self.active.write().await;
        if active.epoch != epoch {
            tracing::warn!(session_id = %id, "Workspace changed mid-request, not adopting session");
            return Err(Error::Session(format!(
                "workspace changed while selecting {}, try again",
                id
            )));
        }
        active.id = Some(id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::mock::MockAgent;
    use crate::agent::ByteStream;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    fn router_with(agent: MockAgent) -> (SessionRouter, Arc<MockAgent>) {
        let agent = Arc::new(agent);
        (SessionRouter::new(agent.clone()), agent)
    }

    #[tokio::test]
    async fn test_select_unknown_session_is_not_found() {
        let (router, _) = router_with(MockAgent::new().with_sessions(&["A", "B"]));

        let err = router.select_session("X").await.unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(ref id) if id == "X"));
        assert_eq!(router.active_session().await, None);
    }

    #[tokio::test]
    async fn test_select_listed_session() {
        let (router, _) = router_with(MockAgent::new().with_sessions(&["A", "B"]));

        let session = router.select_session("A").await.unwrap();
        assert_eq!(session.id, "A");
        assert_eq!(router.active_session().await.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_select_requires_exact_match() {
        let (router, _) = router_with(MockAgent::new().with_sessions(&["ses_abc"]));

        assert!(router.select_session("ses_ab").await.is_err());
        assert!(router.select_session("SES_ABC").await.is_err());
        assert!(router.select_session("ses_abc").await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_select_keeps_previous_session() {
        let (router, _) = router_with(MockAgent::new().with_sessions(&["A"]));
        router.select_session("A").await.unwrap();

        assert!(router.select_session("Z").await.is_err());
        assert_eq!(router.active_session().await.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_create_session_becomes_active() {
        let (router, _) = router_with(MockAgent::new());

        let session = router.create_session().await.unwrap();
        assert_eq!(router.active_session().await, Some(session.id.clone()));

        let listed = router.list_sessions().await.unwrap();
        assert!(listed.iter().any(|s| s.id == session.id));
    }

    #[tokio::test]
    async fn test_failed_create_keeps_active_session() {
        let (router, agent) = router_with(MockAgent::new().with_sessions(&["A"]));
        router.select_session("A").await.unwrap();

        agent.fail_requests(true);
        assert!(router.create_session().await.is_err());
        assert_eq!(router.active_session().await.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_list_failure_propagates() {
        let (router, agent) = router_with(MockAgent::new());
        agent.fail_requests(true);

        assert!(matches!(
            router.list_sessions().await,
            Err(Error::Agent(_))
        ));
    }

    /// Listing that waits for the test to release it
    struct HeldListing {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl AgentApi for HeldListing {
        async fn probe(&self) -> bool {
            true
        }

        async fn list_sessions(&self) -> Result<Vec<SessionDescriptor>> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(vec![SessionDescriptor::new("A")])
        }

        async fn create_session(&self) -> Result<SessionDescriptor> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(SessionDescriptor::new("B"))
        }

        async fn send_message(&self, _session_id: &str, _text: &str) -> Result<ByteStream> {
            Err(Error::Agent("not used".to_string()))
        }
    }

    fn held_router() -> (Arc<SessionRouter>, Arc<HeldListing>) {
        let api = Arc::new(HeldListing {
            entered: Notify::new(),
            release: Notify::new(),
        });
        (Arc::new(SessionRouter::new(api.clone())), api)
    }

    #[tokio::test]
    async fn test_clear_during_select_wins() {
        let (router, api) = held_router();

        let pending = tokio::spawn({
            let router = router.clone();
            async move { router.select_session("A").await }
        });
        api.entered.notified().await;
        router.clear_session().await;
        api.release.notify_one();

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(Error::Session(_))));
        assert_eq!(router.active_session().await, None);
    }

    #[tokio::test]
    async fn test_clear_during_create_wins() {
        let (router, api) = held_router();

        let pending = tokio::spawn({
            let router = router.clone();
            async move { router.create_session().await }
        });
        api.entered.notified().await;
        router.clear_session().await;
        api.release.notify_one();

        assert!(pending.await.unwrap().is_err());
        assert_eq!(router.active_session().await, None);

        // The next request starts in the new epoch
        api.release.notify_one();
        assert_eq!(router.select_session("A").await.unwrap().id, "A");
        assert_eq!(router.active_session().await.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_clear_session() {
        let (router, _) = router_with(MockAgent::new().with_sessions(&["A"]));
        router.select_session("A").await.unwrap();

        router.clear_session().await;
        assert_eq!(router.active_session().await, None);

        // Clearing twice is harmless
        router.clear_session().await;
        assert_eq!(router.active_session().await, None);
    }
}
