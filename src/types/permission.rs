use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// PermissionLevel is the access a grant confers on a single resource.
/// Levels are ordered: READ < EDIT < MANAGE. A higher level implies every
/// lower one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionLevel {
    Read,
    Edit,
    Manage,
}

impl PermissionLevel {
    pub const ALL: [PermissionLevel; 3] = [Self::Read, Self::Edit, Self::Manage];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::Edit => "EDIT",
            Self::Manage => "MANAGE",
        }
    }

    /// Parses a level name, ignoring case.
    pub fn parse(s: &str) -> Option<PermissionLevel> {
        match s.trim().to_ascii_uppercase().as_str() {
            "READ" => Some(Self::Read),
            "EDIT" => Some(Self::Edit),
            "MANAGE" => Some(Self::Manage),
            _ => None,
        }
    }

    /// Returns true if this level satisfies the required one.
    #[must_use]
    pub fn allows(self, required: PermissionLevel) -> bool {
        self >= required
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| Error::BadRequest(format!("invalid permission level: {s}")))
    }
}

/// Process-wide floor applied to authenticated subjects that hold no explicit
/// grant on a resource. `NO_PERMISSIONS` disables the floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DefaultPermission(Option<PermissionLevel>);

impl DefaultPermission {
    pub const NONE: DefaultPermission = DefaultPermission(None);

    #[must_use]
    pub const fn new(level: Option<PermissionLevel>) -> Self {
        Self(level)
    }

    #[must_use]
    pub const fn level(self) -> Option<PermissionLevel> {
        self.0
    }
}

impl TryFrom<String> for DefaultPermission {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().eq_ignore_ascii_case("NO_PERMISSIONS") {
            return Ok(Self(None));
        }
        PermissionLevel::parse(&value)
            .map(|level| Self(Some(level)))
            .ok_or_else(|| Error::Config(format!("invalid default_permission: {value}")))
    }
}

impl From<DefaultPermission> for String {
    fn from(value: DefaultPermission) -> Self {
        value
            .0
            .map_or("NO_PERMISSIONS", PermissionLevel::as_str)
            .to_string()
    }
}
