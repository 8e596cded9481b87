//! Session Manager (C1): a process-wide singleton owning one
//! authenticated solver session, guarded by a single mutex.
//!
//! Grounded on the singleton-with-mutex pattern used by the teacher's
//! resolver registry/session plumbing (`downloader-core/src/resolver/registry.rs`)
//! generalized here to own a single shared [`SolverClient`] rather than
//! a list of handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Mutex;

use crate::solver::{SolverClient, SolverConfig, SolverError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("solver unreachable while acquiring session: {0}")]
    Unreachable(#[source] SolverError),
    #[error("failed to create solver session: {0}")]
    CreateFailed(#[source] SolverError),
}

struct Inner {
    client: Option<SolverClient>,
    created_at: Option<Instant>,
}

/// Owns the single active [`SolverClient`] for the process.
pub struct SessionManager {
    inner: Mutex<Inner>,
    ttl: Duration,
    config: SolverConfig,
}

impl SessionManager {
    pub fn new(config: SolverConfig, ttl_minutes: i64) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner { client: None, created_at: None }),
            ttl: Duration::from_secs((ttl_minutes.max(1) as u64) * 60),
            config,
        })
    }

    /// Returns a session-bound client, creating or refreshing one if
    /// absent or past its TTL. Serialized under the manager's mutex so
    /// concurrent callers never race each other into creating two
    /// sessions.
    pub async fn acquire(&self) -> Result<SolverClient, SessionError> {
        let mut guard = self.inner.lock().await;

        let expired = match guard.created_at {
            Some(created_at) => created_at.elapsed() >= self.ttl,
            None => true,
        };

        if guard.client.is_none() || expired {
            if let Some(old) = guard.client.take() {
                let _ = old.destroy_session().await;
            }
            let mut client = SolverClient::new(self.config.clone()).map_err(SessionError::Unreachable)?;
            client.create_session().await.map_err(SessionError::CreateFailed)?;
            guard.client = Some(client);
            guard.created_at = Some(Instant::now());
        }

        match &guard.client {
            Some(client) => Ok(client.clone()),
            None => unreachable!("client is always populated by the branch above"),
        }
    }

    /// Forces teardown and recreation of the underlying session.
    pub async fn renew(&self) -> Result<SolverClient, SessionError> {
        let mut guard = self.inner.lock().await;
        if let Some(old) = guard.client.take() {
            let _ = old.destroy_session().await;
        }
        guard.created_at = None;
        drop(guard);
        self.acquire().await
    }

    /// Destroys the solver session and releases resources. Idempotent.
    pub async fn shutdown(&self) {
        let mut guard = self.inner.lock().await;
        if let Some(client) = guard.client.take() {
            let _ = client.destroy_session().await;
        }
        guard.created_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(base_url: String) -> SolverConfig {
        SolverConfig { base_url, request_timeout: Duration::from_secs(5) }
    }

    #[tokio::test]
    async fn acquire_is_idempotent_within_ttl() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok",
                "session": "sess-1",
                "message": "",
            })))
            .mount(&server)
            .await;

        let manager = SessionManager::new(test_config(server.uri()), 30);
        let first = manager.acquire().await.expect("first acquire");
        let second = manager.acquire().await.expect("second acquire");
        assert_eq!(first.session_id().await, second.session_id().await);
    }
}
