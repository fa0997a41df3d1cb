//! Per-request authorization.
//!
//! A request is classified against the [`OperationTable`], authenticated,
//! authorized, and only then forwarded. Creation operations that succeed
//! get a MANAGE grant for their creator afterwards.

mod table;

pub use table::{Check, IdSource, OperationRule, OperationTable, Requirement, default_table};

use std::future::Future;
use std::sync::Arc;

use axum::http::Method;

use crate::auth::{Authenticator, Challenge, ClientClass, RequestProof};
use crate::authz::PermissionResolver;
use crate::error::Error;
use crate::types::{PermissionLevel, Subject};

pub const FORBIDDEN_MESSAGE: &str = "Permission denied. Contact an administrator to request access.";

/// The parts of an inbound request the pipeline looks at.
#[derive(Debug, Clone, Copy)]
pub struct Operation<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub query: Option<&'a str>,
}

impl Operation<'_> {
    fn original_target(&self) -> String {
        match self.query {
            Some(q) if !q.is_empty() => format!("{}?{q}", self.path),
            _ => self.path.to_string(),
        }
    }

    fn is_safe_method(&self) -> bool {
        *self.method == Method::GET || *self.method == Method::HEAD
    }
}

/// Why a request never reached its handler.
#[derive(Debug)]
pub enum Rejection {
    Unauthenticated(Challenge),
    Forbidden(String),
    BadRequest(String),
    /// The store failed while deciding. Never retried here.
    Internal(Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Public,
    Admitted { subject: Subject, check: Check },
}

impl Admission {
    #[must_use]
    pub fn subject(&self) -> Option<&Subject> {
        match self {
            Admission::Public => None,
            Admission::Admitted { subject, .. } => Some(subject),
        }
    }
}

/// What a forwarded operation reports back.
#[derive(Debug)]
pub struct Forwarded<T> {
    pub value: T,
    /// Set by creation operations to the id of the resource they created.
    pub created_resource: Option<String>,
}

impl<T> Forwarded<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            created_resource: None,
        }
    }

    #[must_use]
    pub fn with_created(mut self, resource_id: impl Into<String>) -> Self {
        self.created_resource = Some(resource_id.into());
        self
    }
}

/// Terminal state of one request.
#[derive(Debug)]
pub enum Outcome<T, E> {
    Completed(T),
    /// The forwarded operation failed. Passed through untouched.
    Failed(E),
    Rejected(Rejection),
}

pub struct Pipeline {
    authenticator: Arc<Authenticator>,
    resolver: Arc<PermissionResolver>,
    table: OperationTable,
}

impl Pipeline {
    pub fn new(
        authenticator: Arc<Authenticator>,
        resolver: Arc<PermissionResolver>,
        table: OperationTable,
    ) -> Self {
        Self {
            authenticator,
            resolver,
            table,
        }
    }

    /// Decides whether `op` may proceed. Public operations skip
    /// authentication entirely.
    pub fn admit(
        &self,
        op: &Operation<'_>,
        proof: &RequestProof,
        client: ClientClass,
    ) -> Result<Admission, Rejection> {
        let check = self
            .table
            .classify(op.method, op.path, op.query)
            .map_err(|e| match e {
                Error::BadRequest(msg) => Rejection::BadRequest(msg),
                other => Rejection::Internal(other),
            })?;

        if check.is_public() {
            return Ok(Admission::Public);
        }

        let subject = match self.authenticator.authenticate(proof) {
            Ok(subject) => subject,
            Err(Error::Unauthenticated) => {
                let challenge =
                    Challenge::for_client(client, op.is_safe_method(), &op.original_target());
                return Err(Rejection::Unauthenticated(challenge));
            }
            Err(e) => return Err(Rejection::Internal(e)),
        };

        let allowed = match &check {
            Check::Public | Check::Authenticated => true,
            Check::Admin => subject.is_admin,
            Check::CreateResource => self.resolver.can_create_resource(&subject),
            Check::SelfOrAdmin { username } => subject.is_admin || subject.username == *username,
            Check::Resource { resource_id, level } => self
                .resolver
                .authorize(&subject, resource_id, *level)
                .map_err(Rejection::Internal)?,
        };

        if !allowed {
            tracing::info!(
                user = %subject.username,
                method = %op.method,
                path = op.path,
                "Forbidden"
            );
            return Err(Rejection::Forbidden(FORBIDDEN_MESSAGE.to_string()));
        }

        Ok(Admission::Admitted { subject, check })
    }

    /// Admits `op`, forwards it, and applies the post-creation grant.
    ///
    /// `forward` receives the admitted subject (None for public operations).
    /// No grant is written unless the forwarded operation succeeds.
    pub async fn run<T, E, F, Fut>(
        &self,
        op: &Operation<'_>,
        proof: &RequestProof,
        client: ClientClass,
        forward: F,
    ) -> Outcome<T, E>
    where
        F: FnOnce(Option<Subject>) -> Fut,
        Fut: Future<Output = Result<Forwarded<T>, E>>,
    {
        let admission = match self.admit(op, proof, client) {
            Ok(admission) => admission,
            Err(rejection) => return Outcome::Rejected(rejection),
        };

        let creator = match &admission {
            Admission::Admitted {
                subject,
                check: Check::CreateResource,
            } => Some(subject.clone()),
            _ => None,
        };

        let forwarded = match forward(admission.subject().cloned()).await {
            Ok(forwarded) => forwarded,
            Err(e) => return Outcome::Failed(e),
        };

        if let (Some(creator), Some(resource_id)) = (creator, &forwarded.created_resource) {
            // The resource already exists at this point, so a failed grant
            // is logged rather than turned into a failed request.
            if let Err(e) = self.resolver.grant_creator(resource_id, &creator) {
                tracing::error!(
                    user = %creator.username,
                    resource = %resource_id,
                    "Failed to grant {} to creator: {e}",
                    PermissionLevel::Manage
                );
            }
        }

        Outcome::Completed(forwarded.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CredentialVerifier, Credentials, DEFAULT_SESSION_LIFETIME, PasswordHasher, SessionManager};
    use crate::clock::SystemClock;
    use crate::store::{CredentialStore, ResourceCatalog, SqliteStore, Store};
    use crate::types::{DefaultPermission, NewUser, Resource};
    use chrono::Utc;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        store: Arc<SqliteStore>,
        resolver: Arc<PermissionResolver>,
        pipeline: Pipeline,
    }

    fn setup() -> Fixture {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::new(temp.path().join("test.db")).unwrap());
        store.initialize().unwrap();

        let hasher = PasswordHasher::new();
        for (name, is_admin) in [("root", true), ("bob", false)] {
            store
                .insert_user(&NewUser {
                    username: name.to_string(),
                    password_hash: hasher.hash(&format!("{name}-pw")).unwrap(),
                    is_admin,
                    is_root: false,
                })
                .unwrap();
        }

        let sessions = Arc::new(SessionManager::new(
            store.clone(),
            Arc::new(SystemClock),
            DEFAULT_SESSION_LIFETIME,
        ));
        let verifier = Arc::new(CredentialVerifier::new(store.clone()));
        let authenticator = Arc::new(Authenticator::new(store.clone(), verifier, sessions));
        let resolver = Arc::new(PermissionResolver::new(store.clone(), DefaultPermission::NONE));
        let pipeline = Pipeline::new(authenticator, resolver.clone(), default_table());

        Fixture {
            _temp: temp,
            store,
            resolver,
            pipeline,
        }
    }

    fn as_user(name: &str) -> RequestProof {
        RequestProof::Credentials(Credentials::new(name, format!("{name}-pw")))
    }

    fn op<'a>(method: &'a Method, path: &'a str) -> Operation<'a> {
        Operation {
            method,
            path,
            query: None,
        }
    }

    /// Forwards a resource creation into the catalog, like the real handler.
    async fn create_in_catalog(
        store: Arc<SqliteStore>,
        name: &str,
    ) -> Result<Forwarded<String>, Error> {
        let resource = Resource {
            id: format!("res-{name}"),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        store.create_resource(&resource)?;
        Ok(Forwarded::new(resource.id.clone()).with_created(resource.id))
    }

    #[tokio::test]
    async fn test_public_operation_skips_authentication() {
        let f = setup();
        let outcome = f
            .pipeline
            .run(
                &op(&Method::GET, "/health"),
                &RequestProof::Anonymous,
                ClientClass::Programmatic,
                |subject| async move { Ok::<_, Error>(Forwarded::new(subject.is_none())) },
            )
            .await;
        assert!(matches!(outcome, Outcome::Completed(true)));
    }

    #[tokio::test]
    async fn test_unauthenticated_challenge_by_client() {
        let f = setup();
        let method = Method::GET;
        let operation = Operation {
            method: &method,
            path: "/api/v1/resources/7",
            query: Some("view=full"),
        };

        let browser = f
            .pipeline
            .admit(&operation, &RequestProof::Anonymous, ClientClass::Interactive);
        match browser {
            Err(Rejection::Unauthenticated(Challenge::RedirectToLogin { location })) => {
                assert_eq!(location, "/login?next=%2Fapi%2Fv1%2Fresources%2F7%3Fview%3Dfull");
            }
            other => panic!("expected redirect, got {other:?}"),
        }

        let api = f
            .pipeline
            .admit(&operation, &as_user("nobody"), ClientClass::Programmatic);
        assert!(matches!(
            api,
            Err(Rejection::Unauthenticated(Challenge::Unauthorized))
        ));
    }

    #[tokio::test]
    async fn test_forbidden_never_redirects() {
        let f = setup();
        let result = f.pipeline.admit(
            &op(&Method::GET, "/api/v1/resources/7"),
            &as_user("bob"),
            ClientClass::Interactive,
        );
        match result {
            Err(Rejection::Forbidden(message)) => assert_eq!(message, FORBIDDEN_MESSAGE),
            other => panic!("expected forbidden, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_admin_create_is_rejected_before_forwarding() {
        let f = setup();
        let mut forwarded = false;
        let outcome = f
            .pipeline
            .run(
                &op(&Method::POST, "/api/v1/resources"),
                &as_user("bob"),
                ClientClass::Programmatic,
                |_| {
                    forwarded = true;
                    create_in_catalog(f.store.clone(), "sneaky")
                },
            )
            .await;

        assert!(matches!(outcome, Outcome::Rejected(Rejection::Forbidden(_))));
        assert!(!forwarded);
        assert!(f.store.get_resource("res-sneaky").unwrap().is_none());
        let bob = f.store.find_user_by_username("bob").unwrap().unwrap();
        assert!(f.resolver.list_user_permissions(bob.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_admin_create_grants_exactly_one_manage_row() {
        let f = setup();
        let outcome = f
            .pipeline
            .run(
                &op(&Method::POST, "/api/v1/resources"),
                &as_user("root"),
                ClientClass::Programmatic,
                |_| create_in_catalog(f.store.clone(), "churn"),
            )
            .await;

        let Outcome::Completed(id) = outcome else {
            panic!("expected completion");
        };
        let listing = f.resolver.list_permissions(&id).unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].username, "root");
        assert_eq!(listing[0].level, PermissionLevel::Manage);
    }

    #[tokio::test]
    async fn test_failed_create_leaves_no_grant() {
        let f = setup();
        let outcome = f
            .pipeline
            .run(
                &op(&Method::POST, "/api/v1/resources"),
                &as_user("root"),
                ClientClass::Programmatic,
                |_| async { Err::<Forwarded<String>, _>(Error::Conflict("taken".to_string())) },
            )
            .await;

        assert!(matches!(outcome, Outcome::Failed(Error::Conflict(_))));
        let root = f.store.find_user_by_username("root").unwrap().unwrap();
        assert!(f.resolver.list_user_permissions(root.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resource_grant_levels_through_pipeline() {
        let f = setup();
        let bob = f.store.find_user_by_username("bob").unwrap().unwrap();
        f.resolver.grant("7", bob.id, PermissionLevel::Edit).unwrap();

        let admit = |method: &Method| {
            f.pipeline
                .admit(
                    &op(method, "/api/v1/resources/7"),
                    &as_user("bob"),
                    ClientClass::Programmatic,
                )
                .is_ok()
        };
        assert!(admit(&Method::GET));
        assert!(admit(&Method::PATCH));
        assert!(!admit(&Method::DELETE));
    }

    #[tokio::test]
    async fn test_self_or_admin() {
        let f = setup();
        let get = Method::GET;
        let own = f
            .pipeline
            .admit(&op(&get, "/api/v1/users/bob"), &as_user("bob"), ClientClass::Programmatic);
        assert!(own.is_ok());

        let other = f
            .pipeline
            .admit(&op(&get, "/api/v1/users/root"), &as_user("bob"), ClientClass::Programmatic);
        assert!(matches!(other, Err(Rejection::Forbidden(_))));

        let admin = f
            .pipeline
            .admit(&op(&get, "/api/v1/users/bob"), &as_user("root"), ClientClass::Programmatic);
        assert!(admin.is_ok());
    }

    #[tokio::test]
    async fn test_unmatched_operation_requires_admin() {
        let f = setup();
        let get = Method::GET;
        let path = "/api/v2/unknown";
        assert!(matches!(
            f.pipeline
                .admit(&op(&get, path), &as_user("bob"), ClientClass::Programmatic),
            Err(Rejection::Forbidden(_))
        ));
        assert!(f
            .pipeline
            .admit(&op(&get, path), &as_user("root"), ClientClass::Programmatic)
            .is_ok());
    }

    #[tokio::test]
    async fn test_domain_failure_passes_through() {
        let f = setup();
        let outcome = f
            .pipeline
            .run(
                &op(&Method::GET, "/api/v1/me"),
                &as_user("bob"),
                ClientClass::Programmatic,
                |_| async { Err::<Forwarded<()>, _>("downstream broke") },
            )
            .await;
        assert!(matches!(outcome, Outcome::Failed("downstream broke")));
    }
}
