//! Double-submit tokens for the login form.
//!
//! The form carries a random nonce. The cookie carries the same nonce plus a
//! tag keyed with a per-process secret, so a cookie planted from another
//! origin does not verify. A form post is accepted only when both halves
//! are present and agree.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use sha2::{Digest, Sha256};

pub const CSRF_COOKIE: &str = "gatehouse_csrf";

const KEY_BYTES: usize = 32;
const NONCE_BYTES: usize = 32;

/// One issued token: `form_value` goes into the hidden form field and
/// `cookie_value` into the cookie.
#[derive(Debug, Clone)]
pub struct CsrfToken {
    pub form_value: String,
    pub cookie_value: String,
}

pub struct CsrfGuard {
    key: [u8; KEY_BYTES],
}

impl Default for CsrfGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl CsrfGuard {
    #[must_use]
    pub fn new() -> Self {
        let mut key = [0u8; KEY_BYTES];
        rand::thread_rng().fill(&mut key);
        Self { key }
    }

    #[must_use]
    pub fn issue(&self) -> CsrfToken {
        let mut bytes = [0u8; NONCE_BYTES];
        rand::thread_rng().fill(&mut bytes);
        let nonce = URL_SAFE_NO_PAD.encode(bytes);

        CsrfToken {
            cookie_value: format!("{nonce}.{}", self.tag(&nonce)),
            form_value: nonce,
        }
    }

    /// True when the cookie was issued by this guard and the submitted
    /// field carries the same nonce.
    #[must_use]
    pub fn verify(&self, cookie: Option<&str>, submitted: Option<&str>) -> bool {
        let (Some(cookie), Some(submitted)) = (cookie, submitted) else {
            return false;
        };
        let Some((nonce, tag)) = cookie.split_once('.') else {
            return false;
        };

        let well_formed = URL_SAFE_NO_PAD
            .decode(nonce)
            .is_ok_and(|raw| raw.len() == NONCE_BYTES);

        well_formed && nonce == submitted && self.tag(nonce) == tag
    }

    fn tag(&self, nonce: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.key);
        hasher.update(nonce.as_bytes());
        hex::encode(hasher.finalize())
    }
}
