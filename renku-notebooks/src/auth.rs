//! Resolving the caller of a request.
//!
//! The identity headers are trusted as-is. This must only run behind a gateway that
//! verifies the id-token's signature and strips identity headers from untrusted clients.
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{async_trait, Json};
use serde_json::json;
use thiserror::Error;

use crate::cache::Scope;
use crate::config::{Config, Resource};
use crate::host::{gitlab, Connect};
use crate::identity::{self, Anonymous, Identity, Registered};

/// Errors resolving a caller.
#[derive(Error, Debug)]
pub enum Error {
    /// No identity could be established from the request headers.
    #[error(
        "The required authentication headers {registered:?} are missing. If anonymous user \
         sessions are supported then the header '{anonymous}' can also be used.",
        registered = Registered::HEADERS,
        anonymous = Anonymous::HEADER
    )]
    Unauthenticated,
    #[error(transparent)]
    Identity(#[from] identity::Error),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Identity(identity::Error::AnonymousDisabled) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Unauthenticated | Self::Identity(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Whether the operator, rather than the caller, has to fix something.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Identity(identity::Error::AnonymousDisabled))
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.is_configuration() {
            tracing::error!("Error: {}", self);
        } else {
            tracing::debug!("Authentication failed: {}", self);
        }
        let body = Json(json!({
            "error": self.to_string(),
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

/// Resolves request headers into a [`Caller`].
#[derive(Clone, Debug)]
pub struct Resolver<C> {
    config: Config,
    connector: C,
}

impl<C: Connect> Resolver<C> {
    pub fn new(config: Config, connector: C) -> Self {
        Self { config, connector }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve the caller of a request.
    ///
    /// A registered identity is tried first. If it is incomplete and anonymous sessions
    /// are enabled, an anonymous identity is tried next.
    pub fn resolve(&self, headers: &HeaderMap) -> Result<Caller<C::Client>, Error> {
        let identity = self.identity(headers)?;
        let (git, workloads) = match &identity {
            Identity::Registered(user) => (
                self.connector
                    .connect(&user.git_url, Some(user.git_token.as_str())),
                Some(WorkloadScope::new(&self.config, &user.safe_username)),
            ),
            Identity::Anonymous(_) => (self.connector.connect(&self.config.git.url, None), None),
        };
        Ok(Caller {
            identity,
            git,
            workloads,
        })
    }

    /// Resolve the identity of a request's caller, without setting up any client.
    pub fn identity(&self, headers: &HeaderMap) -> Result<Identity, Error> {
        if let Some(user) = Registered::from_headers(headers)? {
            return Ok(user.into());
        }
        if self.config.anonymous_sessions_enabled {
            if let Some(user) = Anonymous::from_headers(headers, &self.config)? {
                return Ok(user.into());
            }
        }
        Err(Error::Unauthenticated)
    }
}

/// An authenticated caller, with a git host client scoped to it.
#[derive(Debug, Clone)]
pub struct Caller<G> {
    identity: Identity,
    git: G,
    workloads: Option<WorkloadScope>,
}

impl<G> Caller<G> {
    pub fn new(identity: Identity, git: G) -> Self {
        Self {
            identity,
            git,
            workloads: None,
        }
    }

    pub fn with_workloads(mut self, workloads: WorkloadScope) -> Self {
        self.workloads = Some(workloads);
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The git host client, scoped to this caller.
    pub fn git(&self) -> &G {
        &self.git
    }

    /// Where this caller's session workloads are listed; registered callers only.
    pub fn workloads(&self) -> Option<&WorkloadScope> {
        self.workloads.as_ref()
    }

    /// The partition of shared caches this caller may see.
    pub fn scope(&self) -> Scope
    where
        G: Scoped,
    {
        (self.git.host(), self.identity.username().to_owned())
    }
}

/// A client that knows which git host it talks to.
pub trait Scoped {
    fn host(&self) -> String;
}

impl Scoped for gitlab::Client {
    fn host(&self) -> String {
        self.url().to_string()
    }
}

impl<T: Scoped + ?Sized> Scoped for &T {
    fn host(&self) -> String {
        (**self).host()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller<gitlab::Client>
where
    S: Send + Sync,
    Resolver<gitlab::Connector>: FromRef<S>,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Resolver::<gitlab::Connector>::from_ref(state).resolve(&parts.headers)
    }
}

/// Lists custom objects in a cluster.
pub trait Workloads {
    type Error;

    fn list(
        &self,
        resource: &Resource,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<serde_json::Value>, Self::Error>;
}

/// The session workloads belonging to one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadScope {
    pub resource: Resource,
    pub namespace: String,
    pub label_selector: String,
}

impl WorkloadScope {
    pub fn new(config: &Config, safe_username: &str) -> Self {
        Self {
            resource: config.sessions.resource.clone(),
            namespace: config.sessions.namespace.clone(),
            label_selector: format!(
                "{}safe-username={safe_username}",
                config.sessions.label_prefix
            ),
        }
    }

    /// List the user's session workloads.
    pub fn list<W: Workloads>(&self, api: &W) -> Result<Vec<serde_json::Value>, W::Error> {
        api.list(&self.resource, &self.namespace, &self.label_selector)
    }
}
