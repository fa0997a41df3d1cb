use axum::http::Method;

use crate::error::{Error, Result};
use crate::types::PermissionLevel;

/// Where a rule finds the resource id it checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSource {
    Path(&'static str),
    Query(&'static str),
}

/// What a matched operation demands from the caller, before extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Public,
    Authenticated,
    Admin,
    /// The named path parameter must equal the caller's username, unless
    /// the caller is an admin.
    SelfOrAdmin(&'static str),
    Resource(IdSource, PermissionLevel),
    CreateResource,
}

/// A requirement with its parameters pulled out of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    Public,
    Authenticated,
    Admin,
    SelfOrAdmin { username: String },
    Resource { resource_id: String, level: PermissionLevel },
    CreateResource,
}

impl Check {
    #[must_use]
    pub fn is_public(&self) -> bool {
        matches!(self, Check::Public)
    }
}

#[derive(Debug, Clone)]
pub struct OperationRule {
    methods: Vec<Method>,
    segments: Vec<&'static str>,
    requirement: Requirement,
}

impl OperationRule {
    /// `pattern` uses `{name}` for a single segment and a trailing `*` for
    /// any remainder. An empty method list matches every method.
    pub fn new(methods: &[Method], pattern: &'static str, requirement: Requirement) -> Self {
        Self {
            methods: methods.to_vec(),
            segments: split_path(pattern).collect(),
            requirement,
        }
    }

    fn match_path<'p>(&self, method: &Method, path: &'p str) -> Option<Vec<(&'static str, &'p str)>> {
        if !self.methods.is_empty() && !self.methods.contains(method) {
            return None;
        }

        let mut params = Vec::new();
        let mut parts = split_path(path);
        for segment in &self.segments {
            if *segment == "*" {
                return Some(params);
            }
            let part = parts.next()?;
            match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => params.push((name, part)),
                None if *segment == part => {}
                None => return None,
            }
        }
        parts.next().is_none().then_some(params)
    }
}

/// A static mapping from operations to requirements.
///
/// Rules are tried in order. A request that matches nothing requires the
/// admin flag.
#[derive(Debug, Clone, Default)]
pub struct OperationTable {
    rules: Vec<OperationRule>,
}

impl OperationTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn rule(mut self, methods: &[Method], pattern: &'static str, requirement: Requirement) -> Self {
        self.rules.push(OperationRule::new(methods, pattern, requirement));
        self
    }

    pub fn classify(&self, method: &Method, path: &str, query: Option<&str>) -> Result<Check> {
        for rule in &self.rules {
            if let Some(params) = rule.match_path(method, path) {
                return resolve(rule.requirement, &params, query);
            }
        }
        Ok(Check::Admin)
    }
}

fn resolve(requirement: Requirement, params: &[(&'static str, &str)], query: Option<&str>) -> Result<Check> {
    Ok(match requirement {
        Requirement::Public => Check::Public,
        Requirement::Authenticated => Check::Authenticated,
        Requirement::Admin => Check::Admin,
        Requirement::CreateResource => Check::CreateResource,
        Requirement::SelfOrAdmin(name) => Check::SelfOrAdmin {
            username: path_param(params, name)?,
        },
        Requirement::Resource(source, level) => {
            let resource_id = match source {
                IdSource::Path(name) => path_param(params, name)?,
                IdSource::Query(name) => query_param(query, name)?,
            };
            Check::Resource { resource_id, level }
        }
    })
}

fn path_param(params: &[(&'static str, &str)], name: &str) -> Result<String> {
    let raw = params
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, value)| *value)
        .ok_or_else(|| Error::BadRequest(format!("missing path parameter '{name}'")))?;
    decode(raw)
}

fn query_param(query: Option<&str>, name: &str) -> Result<String> {
    query
        .into_iter()
        .flat_map(|q| q.split('&'))
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| decode(&value.replace('+', " ")))
        .transpose()?
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::BadRequest(format!("missing query parameter '{name}'")))
}

fn decode(raw: &str) -> Result<String> {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .map_err(|_| Error::BadRequest(format!("invalid percent-encoding in '{raw}'")))
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// The operation table for the routes this crate serves.
#[must_use]
pub fn default_table() -> OperationTable {
    use PermissionLevel::{Edit, Manage, Read};
    use Requirement::*;

    let get = [Method::GET];
    let any: [Method; 0] = [];

    OperationTable::new()
        .rule(&get, "/health", Public)
        .rule(&any, "/login", Public)
        .rule(&any, "/logout", Public)
        .rule(&get, "/static/*", Public)
        .rule(&get, "/favicon.ico", Public)
        .rule(&get, "/api/v1/me", Authenticated)
        .rule(&get, "/api/v1/users/{username}", SelfOrAdmin("username"))
        .rule(&[Method::PATCH], "/api/v1/users/{username}/password", SelfOrAdmin("username"))
        .rule(&any, "/api/v1/admin/*", Admin)
        .rule(&[Method::POST], "/api/v1/resources", CreateResource)
        .rule(&get, "/api/v1/resources", Authenticated)
        .rule(&get, "/api/v1/resources/{id}", Resource(IdSource::Path("id"), Read))
        .rule(&[Method::PATCH], "/api/v1/resources/{id}", Resource(IdSource::Path("id"), Edit))
        .rule(&[Method::DELETE], "/api/v1/resources/{id}", Resource(IdSource::Path("id"), Manage))
        .rule(&get, "/api/v1/resources/{id}/permissions", Resource(IdSource::Path("id"), Manage))
        .rule(
            &[Method::GET, Method::PUT, Method::DELETE],
            "/api/v1/resources/{id}/permissions/{user_id}",
            Resource(IdSource::Path("id"), Manage),
        )
}
