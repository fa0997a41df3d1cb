use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::DefaultPermission;

/// Authentication and authorization settings, read from TOML.
///
/// ```toml
/// default_permission = "READ"
/// admin_username = "admin"
/// admin_password = "password1234"
///
/// [session]
/// lifetime_seconds = 86400
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    pub default_permission: DefaultPermission,
    pub admin_username: String,
    pub admin_password: String,
    pub session: SessionConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            default_permission: DefaultPermission::NONE,
            admin_username: "admin".to_string(),
            admin_password: "password1234".to_string(),
            session: SessionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub lifetime_seconds: u64,
    pub cookie_name: String,
    /// Adds `Secure` to the session cookie. Turn on behind TLS.
    pub secure_cookie: bool,
    /// Zero disables the background sweep. Expiry is still enforced on lookup.
    pub sweep_interval_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime_seconds: 86_400,
            cookie_name: "gatehouse_session".to_string(),
            secure_cookie: false,
            sweep_interval_seconds: 600,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn lifetime(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.lifetime_seconds).unwrap_or(i64::MAX))
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Option<std::time::Duration> {
        (self.sweep_interval_seconds > 0)
            .then(|| std::time::Duration::from_secs(self.sweep_interval_seconds))
    }
}

impl AuthConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.session.lifetime_seconds == 0 {
            return Err(Error::Config(
                "session.lifetime_seconds must be positive".to_string(),
            ));
        }
        if self.session.lifetime_seconds > 100 * 365 * 86_400 {
            return Err(Error::Config(
                "session.lifetime_seconds is unreasonably large".to_string(),
            ));
        }
        if self.session.cookie_name.is_empty()
            || !self
                .session
                .cookie_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(Error::Config(format!(
                "invalid session.cookie_name: {:?}",
                self.session.cookie_name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PermissionLevel;

    #[test]
    fn test_defaults() {
        let config = AuthConfig::from_toml("").unwrap();
        assert_eq!(config.default_permission, DefaultPermission::NONE);
        assert_eq!(config.admin_username, "admin");
        assert_eq!(config.session.lifetime(), chrono::Duration::hours(24));
        assert_eq!(config.session.cookie_name, "gatehouse_session");
        assert_eq!(
            config.session.sweep_interval(),
            Some(std::time::Duration::from_secs(600))
        );
    }

    #[test]
    fn test_overrides() {
        let config = AuthConfig::from_toml(
            r#"
            default_permission = "edit"
            admin_username = "root"

            [session]
            lifetime_seconds = 3600
            secure_cookie = true
            sweep_interval_seconds = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.default_permission.level(), Some(PermissionLevel::Edit));
        assert_eq!(config.admin_username, "root");
        assert_eq!(config.admin_password, "password1234");
        assert_eq!(config.session.lifetime(), chrono::Duration::hours(1));
        assert!(config.session.secure_cookie);
        assert_eq!(config.session.sweep_interval(), None);
    }

    #[test]
    fn test_no_permissions_floor() {
        let config = AuthConfig::from_toml(r#"default_permission = "NO_PERMISSIONS""#).unwrap();
        assert_eq!(config.default_permission.level(), None);
    }

    #[test]
    fn test_rejects_bad_values() {
        for raw in [
            r#"default_permission = "OWNER""#,
            "[session]\nlifetime_seconds = 0",
            "[session]\ncookie_name = \"bad name\"",
            "unknown_key = 1",
        ] {
            assert!(
                matches!(AuthConfig::from_toml(raw), Err(Error::Config(_))),
                "{raw}"
            );
        }
    }
}
