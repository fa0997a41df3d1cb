mod authenticator;
mod csrf;
pub mod helpers;
mod middleware;
mod password;
mod session;
mod verifier;

pub use authenticator::{
    Authenticator, Challenge, ClientClass, Credentials, LOGIN_PATH, RequestProof,
};
pub use csrf::{CSRF_COOKIE, CsrfGuard, CsrfToken};
pub use middleware::{CurrentSubject, MissingSubject};
pub use password::{MAX_PASSWORD_LENGTH, PasswordHasher, check_length};
pub use session::{DEFAULT_SESSION_LIFETIME, IssuedSession, SessionManager, spawn_sweeper};
pub use verifier::CredentialVerifier;
