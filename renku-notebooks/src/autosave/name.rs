//! The autosave branch naming protocol.
//!
//! `renku/autosave/<username>/<root branch>/<root commit>/<final commit>`
//!
//! The username may not contain `/`, the root branch may, and both commits are
//! abbreviated to exactly [`AbbrevOid::LEN`] alphanumeric characters. Branches created
//! by other tooling follow the same format, so it must be reproduced exactly.
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use super::{AbbrevError, AbbrevOid};

/// Prefix shared by every autosave branch.
pub const PREFIX: &str = "renku/autosave/";

/// The given branch name does not follow the autosave naming protocol.
///
/// Arbitrary branches are expected when listing a project, so this is not
/// exceptional; callers typically skip such branches.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{0}' is not an autosave branch")]
pub struct NotAutosave(pub String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("username '{0}' must be non-empty and contain no '/'")]
    Username(String),
    #[error("root branch name must be non-empty and on a single line")]
    RootBranch,
    #[error(transparent)]
    Commit(#[from] AbbrevError),
    #[error("root and final commits are both '{0}'")]
    SameCommit(AbbrevOid),
}

/// The fields encoded in an autosave branch name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutosaveName {
    #[serde(rename = "ownerUsername")]
    pub username: String,
    #[serde(rename = "rootBranchName")]
    pub root_branch: String,
    #[serde(rename = "rootCommitSha")]
    pub root_commit: AbbrevOid,
    #[serde(rename = "finalCommitSha")]
    pub final_commit: AbbrevOid,
}

impl AutosaveName {
    /// Name the autosave of `username`'s work on `root_branch`, started at `root_commit`
    /// and saved at `final_commit`. Commit ids are abbreviated.
    pub fn new(
        username: impl Into<String>,
        root_branch: impl Into<String>,
        root_commit: &str,
        final_commit: &str,
    ) -> Result<Self, NameError> {
        let username = username.into();
        let root_branch = root_branch.into();

        if username.is_empty() || username.contains('/') || username.contains('\n') {
            return Err(NameError::Username(username));
        }
        if root_branch.is_empty() || root_branch.contains('\n') {
            return Err(NameError::RootBranch);
        }
        let root_commit = AbbrevOid::abbreviate(root_commit)?;
        let final_commit = AbbrevOid::abbreviate(final_commit)?;

        if root_commit == final_commit {
            return Err(NameError::SameCommit(root_commit));
        }
        Ok(Self {
            username,
            root_branch,
            root_commit,
            final_commit,
        })
    }

    /// Decode a branch name, returning `None` if it isn't an autosave branch.
    ///
    /// This does not check who owns the branch.
    pub fn decode(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(PREFIX)?;
        let (username, rest) = rest.split_once('/')?;
        // The two trailing components have a fixed shape, so the root branch is
        // whatever precedes them.
        let mut components = rest.rsplitn(3, '/');
        let final_commit = components.next()?.parse::<AbbrevOid>().ok()?;
        let root_commit = components.next()?.parse::<AbbrevOid>().ok()?;
        let root_branch = components.next()?;

        if username.is_empty() || username.contains('\n') {
            return None;
        }
        if root_branch.is_empty() || root_branch.contains('\n') {
            return None;
        }
        Some(Self {
            username: username.to_owned(),
            root_branch: root_branch.to_owned(),
            root_commit,
            final_commit,
        })
    }
}

impl fmt::Display for AutosaveName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{PREFIX}{}/{}/{}/{}",
            self.username, self.root_branch, self.root_commit, self.final_commit
        )
    }
}

impl FromStr for AutosaveName {
    type Err = NotAutosave;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s).ok_or_else(|| NotAutosave(s.to_owned()))
    }
}
