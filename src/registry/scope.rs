//! Access scopes and the public-prefix filter
//!
//! A [`ScopeRequest`] is the `type:name:actions` unit a token service grants
//! access for. The [`ScopeFilter`] decides which catalog entries may be listed
//! publicly; with no prefixes configured nothing is public.

use std::fmt;

pub const REPOSITORY_RESOURCE: &str = "repository";
pub const PULL_ACTION: &str = "pull";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRequest {
    pub resource_type: String,
    pub name: String,
    pub actions: Vec<String>,
}

impl ScopeRequest {
    /// Pull access on a single repository
    pub fn pull(repository: &str) -> Self {
        Self {
            resource_type: REPOSITORY_RESOURCE.to_string(),
            name: repository.to_string(),
            actions: vec![PULL_ACTION.to_string()],
        }
    }
}

/// Renders the token service form, e.g. `repository:library/alpine:pull`
impl fmt::Display for ScopeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.resource_type,
            self.name,
            self.actions.join(",")
        )
    }
}

/// True iff `request` targets a repository whose name starts with one of
/// `prefixes`. Empty prefixes never match.
pub fn is_scope_public(prefixes: &[String], request: &ScopeRequest) -> bool {
    if request.resource_type != REPOSITORY_RESOURCE {
        return false;
    }

    prefixes
        .iter()
        .filter(|prefix| !prefix.is_empty())
        .any(|prefix| request.name.starts_with(prefix.as_str()))
}

#[derive(Debug, Clone, Default)]
pub struct ScopeFilter {
    prefixes: Vec<String>,
}

impl ScopeFilter {
    pub fn new(prefixes: Vec<String>) -> Self {
        Self { prefixes }
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn is_public(&self, request: &ScopeRequest) -> bool {
        is_scope_public(&self.prefixes, request)
    }

    /// Shorthand for a pull request on `repository`
    pub fn is_repository_public(&self, repository: &str) -> bool {
        self.is_public(&ScopeRequest::pull(repository))
    }
}
