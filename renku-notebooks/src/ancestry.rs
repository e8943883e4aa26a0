//! Deciding whether an autosave has been superseded.
//!
//! An autosave is superseded once its root commit is a strict ancestor of a later
//! commit. Only a definite answer from the git host counts: deleting an autosave that
//! wasn't superseded loses work, while keeping one that was only delays cleanup.
use crate::host::{GitHost, Project};

/// How a root commit relates to a candidate commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// The root is an ancestor of, and distinct from, the candidate.
    Superseded,
    /// The root is not an ancestor of the candidate, or they are the same commit.
    NotSuperseded,
    /// The git host could not tell.
    Unknown,
}

/// Checks ancestry between commits of one project.
pub struct Ancestry<'a, G> {
    host: &'a G,
    project: &'a Project,
}

impl<'a, G: GitHost> Ancestry<'a, G> {
    pub fn new(host: &'a G, project: &'a Project) -> Self {
        Self { host, project }
    }

    /// Whether `root` is a strict ancestor of `candidate`. Anything short of a definite
    /// yes, including a failed query, is a no.
    pub fn is_superseded(&self, root: &str, candidate: &str) -> bool {
        self.relation(root, candidate) == Relation::Superseded
    }

    /// Relate `root` to `candidate` through a single merge-base query.
    pub fn relation(&self, root: &str, candidate: &str) -> Relation {
        if same_commit(root, candidate) {
            return Relation::NotSuperseded;
        }
        match self.host.merge_base(self.project, root, candidate) {
            Ok(base) if base.id == root => Relation::Superseded,
            Ok(_) => Relation::NotSuperseded,
            Err(err) => {
                tracing::warn!(
                    "Cannot compute merge base of {root} and {candidate} in {}: {err}",
                    self.project.path_with_namespace
                );
                Relation::Unknown
            }
        }
    }
}

/// Whether two, possibly abbreviated, commit ids may name the same commit.
fn same_commit(a: &str, b: &str) -> bool {
    let len = a.len().min(b.len());
    match (a.get(..len), b.get(..len)) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}
