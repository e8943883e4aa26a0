//! The git host collaborator.
//!
//! Retry, backoff and timeouts are the host client's business; nothing in this crate
//! retries a failed call.
pub mod gitlab;

use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;
use url::Url;

#[derive(Error, Debug)]
pub enum Error {
    /// The host answered with an unexpected status.
    #[error("git host returned status {status} for {url}")]
    Status { status: u16, url: String },
    /// The host could not be reached.
    #[error("git host transport error: {0}")]
    Transport(String),
    /// The host answered with a body we don't understand.
    #[error("invalid git host response: {0}")]
    Response(#[from] std::io::Error),
}

impl Error {
    /// Whether the host reported the entity as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// A project on the git host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Project {
    pub id: u64,
    /// The `namespace/project` path.
    pub path_with_namespace: String,
}

/// A commit, as reported by the git host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Commit {
    /// Full commit id.
    pub id: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub committed_date: Option<OffsetDateTime>,
}

/// A branch and the commit it points to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Branch {
    pub name: String,
    pub commit: Commit,
}

/// The projects visible to a caller. See [`GitHost::projects`].
pub type Projects<'a> = Box<dyn Iterator<Item = Result<Project, Error>> + 'a>;

/// Outcome of a branch deletion that didn't fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    /// The branch existed and was deleted.
    Deleted,
    /// There was no such branch.
    NotFound,
}

/// Read and delete access to a git host, scoped to a single caller.
pub trait GitHost {
    /// Get a project by its `namespace/project` path.
    fn project(&self, namespace_project: &str) -> Result<Option<Project>, Error>;

    /// All projects visible to the caller, fetched lazily.
    ///
    /// A failure is yielded in place of the projects it prevented from being fetched,
    /// and ends the iteration.
    fn projects(&self) -> Projects<'_>;

    /// The branches of `project` whose names start with `prefix`.
    fn branches(&self, project: &Project, prefix: &str) -> Result<Vec<Branch>, Error>;

    /// Get a commit by a full or abbreviated id.
    fn commit(&self, project: &Project, sha: &str) -> Result<Option<Commit>, Error>;

    /// Delete a branch.
    fn delete_branch(&self, project: &Project, name: &str) -> Result<Deletion, Error>;

    /// The best common ancestor of two commits.
    fn merge_base(&self, project: &Project, a: &str, b: &str) -> Result<Commit, Error>;
}

impl<T: GitHost + ?Sized> GitHost for &T {
    fn project(&self, namespace_project: &str) -> Result<Option<Project>, Error> {
        (**self).project(namespace_project)
    }

    fn projects(&self) -> Projects<'_> {
        (**self).projects()
    }

    fn branches(&self, project: &Project, prefix: &str) -> Result<Vec<Branch>, Error> {
        (**self).branches(project, prefix)
    }

    fn commit(&self, project: &Project, sha: &str) -> Result<Option<Commit>, Error> {
        (**self).commit(project, sha)
    }

    fn delete_branch(&self, project: &Project, name: &str) -> Result<Deletion, Error> {
        (**self).delete_branch(project, name)
    }

    fn merge_base(&self, project: &Project, a: &str, b: &str) -> Result<Commit, Error> {
        (**self).merge_base(project, a, b)
    }
}

/// Constructs [`GitHost`] clients scoped to a host and, optionally, a token.
///
/// Constructing a client does not contact the host.
pub trait Connect {
    type Client: GitHost;

    fn connect(&self, url: &Url, token: Option<&str>) -> Self::Client;
}
