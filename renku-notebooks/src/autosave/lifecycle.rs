//! Discovering, evaluating and removing autosave branches.
//!
//! Nothing is kept between calls. Each operation asks the git host for the current
//! state, and deleting a branch that is already gone is not an error, so concurrent
//! cleanups of the same branch are harmless.
use std::iter;

use crate::ancestry::Ancestry;
use crate::auth::{Caller, Scoped};
use crate::cache::ProjectCache;
use crate::host::{Branch, Deletion, GitHost, Project};
use crate::identity::Identity;

use super::{AutosaveBranch, AutosaveName, PREFIX};

/// The autosave branches of one caller.
pub struct Autosaves<'a, G> {
    caller: &'a Caller<G>,
    projects: &'a ProjectCache,
}

impl<G> Clone for Autosaves<'_, G> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<G> Copy for Autosaves<'_, G> {}

impl<'a, G: GitHost + Scoped> Autosaves<'a, G> {
    pub fn new(caller: &'a Caller<G>, projects: &'a ProjectCache) -> Self {
        Self { caller, projects }
    }

    /// List the caller's autosaves in `namespace_project`, or in every project visible to
    /// the caller if `None`.
    ///
    /// Projects are queried lazily, one at a time. A project that can't be queried is
    /// skipped, as are branches that aren't autosaves or belong to someone else. If the
    /// project listing itself fails part way, the projects seen so far are still listed.
    /// Anonymous callers have no autosaves.
    pub fn list(
        &self,
        namespace_project: Option<&str>,
    ) -> impl Iterator<Item = AutosaveBranch> + 'a {
        let caller = self.caller;
        let projects: Box<dyn Iterator<Item = Project> + 'a> =
            match (caller.identity(), namespace_project) {
                (Identity::Anonymous(_), _) => Box::new(iter::empty()),
                (Identity::Registered(_), Some(path)) => Box::new(self.project(path).into_iter()),
                (Identity::Registered(_), None) => Box::new(
                    caller
                        .git()
                        .projects()
                        .map_while(move |project| match project {
                            Ok(project) => Some(project),
                            Err(err) => {
                                tracing::warn!(
                                    "Cannot list projects for {}: {err}",
                                    caller.identity()
                                );
                                None
                            }
                        }),
                ),
            };
        let this = *self;

        projects.flat_map(move |project| this.project_autosaves(&project))
    }

    /// Find one of the caller's autosaves by branch name.
    pub fn find(&self, namespace_project: &str, name: &str) -> Option<AutosaveBranch> {
        self.list(Some(namespace_project)).find(|a| a.name() == name)
    }

    /// Delete `autosave` if its root commit is a strict ancestor of `session_commit`,
    /// returning the deleted branch's name.
    ///
    /// The branch is kept whenever the git host can't confirm the ancestry. `None` is
    /// returned if the branch was kept, or was already gone.
    pub fn cleanup(&self, autosave: &AutosaveBranch, session_commit: &str) -> Option<String> {
        let project = self.owned_project(autosave)?;
        let root = self.root_commit(&project, autosave)?;

        if !Ancestry::new(self.caller.git(), &project).is_superseded(&root, session_commit) {
            tracing::debug!("Keeping {autosave}: not superseded by {session_commit}");
            return None;
        }
        self.remove(&project, autosave)
    }

    /// Delete `autosave`, returning the deleted branch's name.
    ///
    /// `None` is returned if the branch was already gone or could not be deleted.
    pub fn delete(&self, autosave: &AutosaveBranch) -> Option<String> {
        let project = self.owned_project(autosave)?;

        self.remove(&project, autosave)
    }

    fn project_autosaves(&self, project: &Project) -> Vec<AutosaveBranch> {
        let branches = match self.caller.git().branches(project, PREFIX) {
            Ok(branches) => branches,
            Err(err) => {
                tracing::warn!(
                    "Cannot list branches of {} for {}: {err}",
                    project.path_with_namespace,
                    self.caller.identity()
                );
                return Vec::new();
            }
        };
        branches
            .into_iter()
            .filter_map(|branch| self.autosave(project, branch))
            .collect()
    }

    fn autosave(&self, project: &Project, branch: Branch) -> Option<AutosaveBranch> {
        let Some(name) = AutosaveName::decode(&branch.name) else {
            tracing::debug!(
                "Invalid branch name {} for autosave branch in {}",
                branch.name,
                project.path_with_namespace
            );
            return None;
        };
        let username = self.caller.identity().username();
        if name.username != username {
            tracing::warn!(
                "Skipping autosave branch {} in {}: expected username {username} but got {}",
                branch.name,
                project.path_with_namespace,
                name.username
            );
            return None;
        }
        Some(AutosaveBranch::new(
            name,
            project.path_with_namespace.clone(),
            branch.commit.committed_date,
        ))
    }

    /// The project of an autosave, if the caller may modify it.
    fn owned_project(&self, autosave: &AutosaveBranch) -> Option<Project> {
        let identity = self.caller.identity();

        if identity.is_anonymous() {
            return None;
        }
        if autosave.owner_username() != identity.username() {
            tracing::warn!("Refusing to modify {autosave} on behalf of {identity}");
            return None;
        }
        self.project(autosave.namespace_project())
    }

    fn project(&self, namespace_project: &str) -> Option<Project> {
        let scope = self.caller.scope();
        let lookup = || self.caller.git().project(namespace_project);

        match self.projects.get_or_insert(&scope, namespace_project, lookup) {
            Ok(Some(project)) => Some(project),
            Ok(None) => {
                tracing::warn!(
                    "Cannot get project {namespace_project} for {}: not found",
                    self.caller.identity()
                );
                None
            }
            Err(err) => {
                tracing::warn!(
                    "Cannot get project {namespace_project} for {}: {err}",
                    self.caller.identity()
                );
                None
            }
        }
    }

    /// The full id of the autosave's root commit.
    fn root_commit(&self, project: &Project, autosave: &AutosaveBranch) -> Option<String> {
        let abbrev = autosave.root_commit_sha();

        match self.caller.git().commit(project, abbrev) {
            Ok(Some(commit)) if abbrev.abbreviates(&commit.id) => Some(commit.id),
            Ok(Some(commit)) => {
                tracing::warn!("Root commit {abbrev} of {autosave} resolved to {}", commit.id);
                None
            }
            Ok(None) => {
                tracing::warn!("Root commit {abbrev} of {autosave} not found");
                None
            }
            Err(err) => {
                tracing::warn!("Cannot get root commit {abbrev} of {autosave}: {err}");
                None
            }
        }
    }

    fn remove(&self, project: &Project, autosave: &AutosaveBranch) -> Option<String> {
        let name = autosave.name();

        match self.caller.git().delete_branch(project, &name) {
            Ok(Deletion::Deleted) => {
                tracing::info!("Deleted autosave branch {name} in {}", project.path_with_namespace);
                Some(name)
            }
            Ok(Deletion::NotFound) => {
                tracing::debug!(
                    "Autosave branch {name} in {} is already gone",
                    project.path_with_namespace
                );
                None
            }
            Err(err) => {
                tracing::warn!(
                    "Cannot delete autosave branch {name} in {}: {err}",
                    project.path_with_namespace
                );
                None
            }
        }
    }
}
