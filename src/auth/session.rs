//! Fixed-lifetime server-side sessions.
//!
//! A session moves from absent to active on [`SessionManager::create`] and
//! ends either by [`SessionManager::destroy`] or by expiring. Expiry is
//! checked lazily on every lookup; the sweeper only reclaims space.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Duration;
use rand::Rng;
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::store::SessionStore;
use crate::types::{Session, SessionToken, User};

const TOKEN_BYTES: usize = 32;
const MAX_CREATE_ATTEMPTS: u32 = 3;

pub const DEFAULT_SESSION_LIFETIME: Duration = Duration::hours(24);

/// A freshly created session and the token that proves it.
#[derive(Debug)]
pub struct IssuedSession {
    pub token: SessionToken,
    pub session: Session,
}

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    lifetime: Duration,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>, lifetime: Duration) -> Self {
        Self {
            store,
            clock,
            lifetime,
        }
    }

    #[must_use]
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Starts a session for `user` that expires exactly one lifetime from now.
    pub fn create(&self, user: &User) -> Result<IssuedSession> {
        for _ in 0..MAX_CREATE_ATTEMPTS {
            let token = generate_token();
            let created_at = self.clock.now();
            let session = Session {
                token_digest: digest(&token),
                user_id: user.id,
                username: user.username.clone(),
                created_at,
                expires_at: created_at + self.lifetime,
            };

            match self.store.insert_session(&session) {
                Ok(()) => {
                    tracing::debug!(user = %user.username, expires_at = %session.expires_at, "Session created");
                    return Ok(IssuedSession { token, session });
                }
                Err(Error::Conflict(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(Error::Conflict(
            "failed to allocate a unique session token".to_string(),
        ))
    }

    /// Looks up a session. Never extends its expiry.
    pub fn validate(&self, token: &SessionToken) -> Result<Session> {
        let token_digest = digest(token);
        let session = self
            .store
            .find_session(&token_digest)?
            .ok_or(Error::SessionNotFound)?;

        if session.is_expired_at(self.clock.now()) {
            if let Err(e) = self.store.delete_session(&token_digest) {
                tracing::warn!("Failed to delete expired session: {e}");
            }
            tracing::debug!(user = %session.username, "Session expired");
            return Err(Error::SessionExpired);
        }

        Ok(session)
    }

    /// Ends a session. Unknown tokens are not an error.
    pub fn destroy(&self, token: &SessionToken) -> Result<()> {
        self.store.delete_session(&digest(token))?;
        Ok(())
    }

    /// Deletes every session that has expired by now.
    pub fn purge_expired(&self) -> Result<usize> {
        self.store.delete_expired_sessions(self.clock.now())
    }
}

/// Runs [`SessionManager::purge_expired`] every `every` until the task is aborted.
pub fn spawn_sweeper(manager: Arc<SessionManager>, every: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match manager.purge_expired() {
                Ok(0) => {}
                Ok(n) => tracing::info!("Purged {n} expired sessions"),
                Err(e) => tracing::warn!("Session sweep failed: {e}"),
            }
        }
    })
}

fn generate_token() -> SessionToken {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill(&mut bytes);
    SessionToken::new(URL_SAFE_NO_PAD.encode(bytes))
}

fn digest(token: &SessionToken) -> String {
    hex::encode(Sha256::digest(token.as_str().as_bytes()))
}
