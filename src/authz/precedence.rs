//! Rules for administrative actions on user accounts.
//!
//! These are independent of resource grants. They read only the explicit
//! `is_admin` and `is_root` flags, never the username.

use std::fmt;

use crate::error::Error;
use crate::types::{Subject, User};

/// Why a user deletion was refused. Checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionRefusal {
    NotAdmin,
    SelfDeletion,
    RootAdminProtected,
    AdminRequiresRoot,
}

impl fmt::Display for DeletionRefusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::NotAdmin => "only administrators can delete users",
            Self::SelfDeletion => "users cannot delete themselves",
            Self::RootAdminProtected => "the root administrator cannot be deleted",
            Self::AdminRequiresRoot => "only the root administrator can delete other administrators",
        };
        f.write_str(message)
    }
}

impl From<DeletionRefusal> for Error {
    fn from(refusal: DeletionRefusal) -> Self {
        Error::Forbidden(refusal.to_string())
    }
}

/// Root may delete anyone but itself; other admins may delete only
/// non-admins; nobody deletes themselves.
pub fn check_user_deletion(actor: &Subject, target: &User) -> Result<(), DeletionRefusal> {
    if !actor.is_admin {
        return Err(DeletionRefusal::NotAdmin);
    }
    if actor.user_id == target.id {
        return Err(DeletionRefusal::SelfDeletion);
    }
    if target.is_root {
        return Err(DeletionRefusal::RootAdminProtected);
    }
    if target.is_admin && !actor.is_root {
        return Err(DeletionRefusal::AdminRequiresRoot);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminChangeRefusal {
    NotAdmin,
    RootAdminDemotion,
    DemotionRequiresRoot,
}

impl fmt::Display for AdminChangeRefusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::NotAdmin => "only administrators can change the admin flag",
            Self::RootAdminDemotion => "the root administrator cannot be demoted",
            Self::DemotionRequiresRoot => {
                "only the root administrator can demote other administrators"
            }
        };
        f.write_str(message)
    }
}

impl From<AdminChangeRefusal> for Error {
    fn from(refusal: AdminChangeRefusal) -> Self {
        Error::Forbidden(refusal.to_string())
    }
}

/// The root admin's flag never drops, and only the root may clear another
/// admin's flag.
pub fn check_admin_change(
    actor: &Subject,
    target: &User,
    is_admin: bool,
) -> Result<(), AdminChangeRefusal> {
    if !actor.is_admin {
        return Err(AdminChangeRefusal::NotAdmin);
    }
    if target.is_root && !is_admin {
        return Err(AdminChangeRefusal::RootAdminDemotion);
    }
    if target.is_admin && !is_admin && !actor.is_root {
        return Err(AdminChangeRefusal::DemotionRequiresRoot);
    }
    Ok(())
}
