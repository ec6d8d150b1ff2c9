//! Session ownership, connect-with-retry and disconnect.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

use crate::config::UpstreamConfig;
use crate::upstream::{DbClient, UpstreamError, UpstreamResult};

/// Opaque session token issued by the upstream server at login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session(String);

impl Session {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[cfg(test)]
    pub(crate) fn test_token(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl std::fmt::Display for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Connect retry policy: fixed attempt count, fixed inter-attempt delay.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

/// Lifecycle state of the one upstream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Owns the upstream client handle and the current session token.
///
/// The only component allowed to write the session. Everything else receives
/// the manager by `Arc` at construction time and reads the token through
/// [`SessionManager::session`].
pub struct SessionManager {
    client: Arc<dyn DbClient>,
    session: Session,
    state: Mutex<SessionState>,
    sequence: AsyncMutex<()>,
}

impl SessionManager {
    /// Single connect attempt: log in and capture the returned token.
    pub async fn connect(
        client: Arc<dyn DbClient>,
        config: &UpstreamConfig,
    ) -> UpstreamResult<Self> {
        let session = client
            .connect(&config.user, &config.password, &config.database)
            .await?;
        tracing::info!(session = %session, "connected to upstream server");
        Ok(Self {
            client,
            session: Session(session),
            state: Mutex::new(SessionState::Connected),
            sequence: AsyncMutex::new(()),
        })
    }

    /// Connect with up to `policy.attempts` tries, sleeping `policy.delay`
    /// between them. Returns the first success or the last failure.
    pub async fn connect_with_retry(
        client: Arc<dyn DbClient>,
        config: &UpstreamConfig,
        policy: RetryPolicy,
    ) -> UpstreamResult<Self> {
        let mut last_err = UpstreamError::Transport("no connect attempts configured".into());
        for attempt in 1..=policy.attempts.max(1) {
            tracing::info!(attempt, "connecting to upstream server...");
            match Self::connect(client.clone(), config).await {
                Ok(manager) => return Ok(manager),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "connect attempt failed");
                    last_err = e;
                    if attempt < policy.attempts {
                        tokio::time::sleep(policy.delay).await;
                    }
                }
            }
        }
        Err(last_err)
    }

    /// The live session token.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The shared upstream client handle.
    pub fn client(&self) -> &Arc<dyn DbClient> {
        &self.client
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Serialize a multi-call upstream sequence against other holders of the
    /// same client handle. Hold the guard for the whole sequence.
    pub async fn lock_sequence(&self) -> MutexGuard<'_, ()> {
        self.sequence.lock().await
    }

    /// Best-effort disconnect. Errors are logged, never escalated; the
    /// process is exiting regardless.
    pub async fn disconnect(&self) {
        let _guard = self.sequence.lock().await;
        match self.client.disconnect(self.session.as_str()).await {
            Ok(()) => tracing::info!("disconnected upstream session"),
            Err(e) => tracing::warn!(error = %e, "failed to disconnect upstream session"),
        }
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = SessionState::Disconnected;
    }
}
