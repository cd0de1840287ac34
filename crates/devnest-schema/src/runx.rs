use crate::syntax::RUNX_PREFIX;
use crate::versioned::split_versioned_name;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunxRefError {
    #[error("'{0}' is not a runx reference, expected 'runx:owner/repo[@version]'")]
    MissingScheme(String),
    #[error("malformed runx reference '{0}', expected 'runx:owner/repo[@version]'")]
    Malformed(String),
}

/// A tool published to the runx registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunxRef {
    pub owner: String,
    pub repo: String,
    pub version: String,
}

impl fmt::Display for RunxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{RUNX_PREFIX}{}/{}@{}", self.owner, self.repo, self.version)
    }
}

impl FromStr for RunxRef {
    type Err = RunxRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(RUNX_PREFIX)
            .ok_or_else(|| RunxRefError::MissingScheme(s.to_owned()))?;
        let (owner, rest) = rest
            .split_once('/')
            .ok_or_else(|| RunxRefError::Malformed(s.to_owned()))?;
        let (repo, version) = split_versioned_name(rest);
        if owner.is_empty() || repo.is_empty() {
            return Err(RunxRefError::Malformed(s.to_owned()));
        }

        Ok(RunxRef {
            owner: owner.to_owned(),
            repo: repo.to_owned(),
            version: if version.is_empty() { "latest" } else { version }.to_owned(),
        })
    }
}
