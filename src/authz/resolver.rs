use std::sync::Arc;

use crate::error::{Error, Result};
use crate::store::CredentialStore;
use crate::types::{
    DefaultPermission, PermissionLevel, PermissionListing, Resource, ResourcePermission, Subject,
};

/// Decides whether a subject may act on a resource at a given level.
///
/// Grants are the only input besides the admin flag and the process-wide
/// default floor. The resolver is also the only writer of grant rows.
pub struct PermissionResolver {
    store: Arc<dyn CredentialStore>,
    default_floor: DefaultPermission,
}

impl PermissionResolver {
    pub fn new(store: Arc<dyn CredentialStore>, default_floor: DefaultPermission) -> Self {
        Self {
            store,
            default_floor,
        }
    }

    /// Admins pass without a lookup. For everyone else an explicit grant
    /// decides, and the floor applies only when no grant row exists.
    pub fn authorize(
        &self,
        subject: &Subject,
        resource_id: &str,
        required: PermissionLevel,
    ) -> Result<bool> {
        if subject.is_admin {
            return Ok(true);
        }

        let allowed = self
            .effective_level(subject, resource_id)?
            .is_some_and(|level| level.allows(required));

        if !allowed {
            tracing::info!(
                user = %subject.username,
                resource = resource_id,
                required = %required,
                "Permission denied"
            );
        }
        Ok(allowed)
    }

    /// The level a non-admin subject holds on a resource, if any. Admins
    /// report MANAGE.
    pub fn effective_level(
        &self,
        subject: &Subject,
        resource_id: &str,
    ) -> Result<Option<PermissionLevel>> {
        if subject.is_admin {
            return Ok(Some(PermissionLevel::Manage));
        }

        match self.store.find_permission(resource_id, subject.user_id)? {
            Some(grant) => Ok(Some(grant.level)),
            None => Ok(self.default_floor.level()),
        }
    }

    /// Creating a new resource takes the admin flag. No grant on an
    /// existing resource implies it.
    #[must_use]
    pub fn can_create_resource(&self, subject: &Subject) -> bool {
        subject.is_admin
    }

    /// Keeps only the resources the subject can read.
    pub fn filter_readable(
        &self,
        subject: &Subject,
        resources: Vec<Resource>,
    ) -> Result<Vec<Resource>> {
        if subject.is_admin {
            return Ok(resources);
        }

        let granted = self.store.list_permissions_for_user(subject.user_id)?;
        let floor_reads = self.default_floor.level().is_some();

        Ok(resources
            .into_iter()
            .filter(|resource| {
                match granted.iter().find(|g| g.resource_id == resource.id) {
                    Some(grant) => grant.level.allows(PermissionLevel::Read),
                    None => floor_reads,
                }
            })
            .collect())
    }

    // Administrative entry points. Every grant write goes through here.

    pub fn grant(
        &self,
        resource_id: &str,
        user_id: i64,
        level: PermissionLevel,
    ) -> Result<ResourcePermission> {
        let grant = self.store.upsert_permission(resource_id, user_id, level)?;
        tracing::info!(resource = resource_id, user_id, level = %level, "Granted permission");
        Ok(grant)
    }

    /// Post-creation grant: the creator manages what they created.
    pub fn grant_creator(&self, resource_id: &str, creator: &Subject) -> Result<ResourcePermission> {
        self.grant(resource_id, creator.user_id, PermissionLevel::Manage)
    }

    pub fn get_grant(&self, resource_id: &str, user_id: i64) -> Result<ResourcePermission> {
        self.store
            .find_permission(resource_id, user_id)?
            .ok_or(Error::NotFound)
    }

    pub fn revoke(&self, resource_id: &str, user_id: i64) -> Result<()> {
        if !self.store.delete_permission(resource_id, user_id)? {
            return Err(Error::NotFound);
        }
        tracing::info!(resource = resource_id, user_id, "Revoked permission");
        Ok(())
    }

    pub fn list_permissions(&self, resource_id: &str) -> Result<Vec<PermissionListing>> {
        self.store.list_permissions_for_resource(resource_id)
    }

    pub fn list_user_permissions(&self, user_id: i64) -> Result<Vec<ResourcePermission>> {
        self.store.list_permissions_for_user(user_id)
    }
}
