use crate::error::{Error, Result};

const MAX_USERNAME_LEN: usize = 64;
const MAX_RESOURCE_NAME_LEN: usize = 256;

fn is_valid_name_char(c: char, allow_period: bool) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || (allow_period && c == '.')
}

pub fn validate_username(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::BadRequest("username cannot be empty".to_string()));
    }
    if name.len() > MAX_USERNAME_LEN {
        return Err(Error::BadRequest(format!(
            "username cannot exceed {MAX_USERNAME_LEN} characters"
        )));
    }
    if !name.chars().all(|c| is_valid_name_char(c, true)) {
        return Err(Error::BadRequest(
            "username can only contain alphanumeric characters, hyphens, underscores, and periods"
                .to_string(),
        ));
    }
    if name.starts_with(['-', '.']) {
        return Err(Error::BadRequest(
            "username cannot start with a hyphen or period".to_string(),
        ));
    }
    Ok(())
}

/// Resource names are free text, within limits.
pub fn validate_resource_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::BadRequest("resource name cannot be empty".to_string()));
    }
    if trimmed.len() != name.len() {
        return Err(Error::BadRequest(
            "resource name cannot have leading or trailing whitespace".to_string(),
        ));
    }
    if name.len() > MAX_RESOURCE_NAME_LEN {
        return Err(Error::BadRequest(format!(
            "resource name cannot exceed {MAX_RESOURCE_NAME_LEN} characters"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(Error::BadRequest(
            "resource name cannot contain control characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usernames() {
        for ok in ["alice", "bob.smith", "ci_bot-2", "A1"] {
            assert!(validate_username(ok).is_ok(), "{ok}");
        }
        for bad in ["", "-x", ".x", "has space", "semi;colon", &"a".repeat(65)] {
            assert!(validate_username(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_resource_names() {
        assert!(validate_resource_name("Churn model v2").is_ok());
        assert!(validate_resource_name("").is_err());
        assert!(validate_resource_name(" padded").is_err());
        assert!(validate_resource_name("tab\there").is_err());
        assert!(validate_resource_name(&"r".repeat(257)).is_err());
    }
}
