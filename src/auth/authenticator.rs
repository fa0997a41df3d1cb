use std::fmt;
use std::sync::Arc;

use super::{CredentialVerifier, SessionManager};
use crate::error::{Error, Result};
use crate::store::CredentialStore;
use crate::types::{SessionToken, Subject};

pub const LOGIN_PATH: &str = "/login";

/// A username/password pair presented on a single request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"..")
            .finish()
    }
}

/// Whatever a request carried to prove who sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestProof {
    Anonymous,
    Session(SessionToken),
    Credentials(Credentials),
    /// Both were sent. The session is tried first.
    SessionWithCredentials(SessionToken, Credentials),
}

impl RequestProof {
    #[must_use]
    pub fn new(session: Option<SessionToken>, credentials: Option<Credentials>) -> Self {
        match (session, credentials) {
            (None, None) => Self::Anonymous,
            (Some(token), None) => Self::Session(token),
            (None, Some(creds)) => Self::Credentials(creds),
            (Some(token), Some(creds)) => Self::SessionWithCredentials(token, creds),
        }
    }

    fn session(&self) -> Option<&SessionToken> {
        match self {
            Self::Session(token) | Self::SessionWithCredentials(token, _) => Some(token),
            _ => None,
        }
    }

    fn credentials(&self) -> Option<&Credentials> {
        match self {
            Self::Credentials(creds) | Self::SessionWithCredentials(_, creds) => Some(creds),
            _ => None,
        }
    }
}

/// How the caller wants to learn that it is not authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientClass {
    /// A browser navigating pages. Gets sent to the login page.
    Interactive,
    /// An API client. Gets a bare 401.
    Programmatic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Challenge {
    RedirectToLogin { location: String },
    Unauthorized,
}

impl Challenge {
    /// `original` is the path and query of the rejected request, used as the
    /// post-login destination. Redirects are only offered for safe methods.
    #[must_use]
    pub fn for_client(client: ClientClass, is_safe_method: bool, original: &str) -> Self {
        match client {
            ClientClass::Interactive if is_safe_method => Self::RedirectToLogin {
                location: format!("{LOGIN_PATH}?next={}", urlencoding::encode(original)),
            },
            _ => Self::Unauthorized,
        }
    }
}

/// Resolves a [`RequestProof`] into a [`Subject`].
pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
    verifier: Arc<CredentialVerifier>,
    sessions: Arc<SessionManager>,
}

impl Authenticator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        verifier: Arc<CredentialVerifier>,
        sessions: Arc<SessionManager>,
    ) -> Self {
        Self {
            store,
            verifier,
            sessions,
        }
    }

    /// Tries the session first, then the credential pair. A stale session
    /// does not fail the request on its own. Credential auth never creates
    /// a session. Store failures propagate; everything else that fails ends
    /// as `Error::Unauthenticated`.
    pub fn authenticate(&self, proof: &RequestProof) -> Result<Subject> {
        if let Some(token) = proof.session() {
            if let Some(subject) = self.from_session(token)? {
                return Ok(subject);
            }
        }

        if let Some(creds) = proof.credentials() {
            match self.verifier.verify(&creds.username, &creds.password) {
                Ok(user) => return Ok(Subject::from(user)),
                Err(Error::InvalidCredentials) => {
                    tracing::info!(user = %creds.username, "Rejected credentials");
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::Unauthenticated)
    }

    fn from_session(&self, token: &SessionToken) -> Result<Option<Subject>> {
        let session = match self.sessions.validate(token) {
            Ok(session) => session,
            Err(Error::SessionNotFound | Error::SessionExpired) => return Ok(None),
            Err(e) => return Err(e),
        };

        // The admin flag may have changed since login.
        match self.store.find_user_by_id(session.user_id)? {
            Some(user) => Ok(Some(Subject::from(user))),
            None => {
                self.sessions.destroy(token)?;
                Ok(None)
            }
        }
    }
}
