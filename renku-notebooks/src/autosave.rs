pub mod lifecycle;
pub mod name;

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

pub use name::{AutosaveName, NotAutosave, PREFIX};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid abbreviated commit id '{0}': expected {len} alphanumeric characters", len = AbbrevOid::LEN)]
pub struct AbbrevError(String);

/// A commit id abbreviated to [`AbbrevOid::LEN`] alphanumeric characters, as embedded in
/// autosave branch names.
///
/// An abbreviation is not enough to identify a commit on its own; fetch the commit from
/// the git host when the full id is needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AbbrevOid(String);

impl AbbrevOid {
    /// Length of an abbreviated commit id.
    pub const LEN: usize = 7;

    /// Abbreviate a (usually full) commit id to its first [`AbbrevOid::LEN`] characters.
    pub fn abbreviate(oid: &str) -> Result<Self, AbbrevError> {
        match oid.get(..Self::LEN) {
            Some(prefix) => prefix.parse(),
            None => Err(AbbrevError(oid.to_owned())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `oid` starts with this abbreviation. Hex case is ignored.
    pub fn abbreviates(&self, oid: &str) -> bool {
        oid.get(..Self::LEN)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(&self.0))
    }
}

impl FromStr for AbbrevOid {
    type Err = AbbrevError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == Self::LEN && s.bytes().all(|b| b.is_ascii_alphanumeric()) {
            Ok(Self(s.to_owned()))
        } else {
            Err(AbbrevError(s.to_owned()))
        }
    }
}

impl fmt::Display for AbbrevOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deref for AbbrevOid {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// An autosave branch found in a git project.
///
/// Ownership is encoded in the branch name itself; see [`AutosaveName`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutosaveBranch {
    #[serde(flatten)]
    name: AutosaveName,
    namespace_project: String,
    #[serde(with = "time::serde::rfc3339::option")]
    creation_date: Option<OffsetDateTime>,
}

impl AutosaveBranch {
    pub fn new(
        name: AutosaveName,
        namespace_project: impl Into<String>,
        creation_date: Option<OffsetDateTime>,
    ) -> Self {
        Self {
            name,
            namespace_project: namespace_project.into(),
            creation_date,
        }
    }

    /// The branch name, as found on the git host.
    pub fn name(&self) -> String {
        self.name.to_string()
    }

    pub fn autosave_name(&self) -> &AutosaveName {
        &self.name
    }

    pub fn owner_username(&self) -> &str {
        &self.name.username
    }

    /// The `namespace/project` path of the project holding the branch.
    pub fn namespace_project(&self) -> &str {
        &self.namespace_project
    }

    /// Everything before the last `/` of the project path.
    pub fn namespace(&self) -> &str {
        self.namespace_project
            .rsplit_once('/')
            .map_or("", |(namespace, _)| namespace)
    }

    /// The last component of the project path.
    pub fn project(&self) -> &str {
        self.namespace_project
            .rsplit_once('/')
            .map_or(self.namespace_project.as_str(), |(_, project)| project)
    }

    pub fn root_branch_name(&self) -> &str {
        &self.name.root_branch
    }

    pub fn root_commit_sha(&self) -> &AbbrevOid {
        &self.name.root_commit
    }

    pub fn final_commit_sha(&self) -> &AbbrevOid {
        &self.name.final_commit
    }

    /// When the branch head was committed, if the git host told us.
    pub fn creation_date(&self) -> Option<OffsetDateTime> {
        self.creation_date
    }
}

impl fmt::Display for AutosaveBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<autosave user:{} namespace:{} project:{} root_branch:{} root_commit:{} final_commit:{}>",
            self.owner_username(),
            self.namespace(),
            self.project(),
            self.root_branch_name(),
            self.root_commit_sha(),
            self.final_commit_sha(),
        )
    }
}
