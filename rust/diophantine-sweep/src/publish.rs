//! Push a finished result document to a remote version-controlled store.
//!
//! The store is a trait so the create/update branching can be tested with a
//! fake; [`crate::github::GitHubStore`] is the real implementation.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("invalid repository target {0:?}: expected owner/repo/path/to/file")]
    InvalidTarget(String),

    #[error("remote store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not reach remote store: {0}")]
    Transport(String),

    #[error("unexpected response from remote store: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// `owner/repo/path/to/file` inside a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoTarget {
    pub owner: String,
    pub repo: String,
    pub path: String,
}

impl RepoTarget {
    /// Same target with `_<lo>-<hi>` inserted before the file extension.
    pub fn with_interval_suffix(&self, lo: i64, hi: i64) -> RepoTarget {
        let (dir, file) = match self.path.rsplit_once('/') {
            Some((dir, file)) => (Some(dir), file),
            None => (None, self.path.as_str()),
        };
        let file = match file.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => format!("{}_{}-{}.{}", stem, lo, hi, ext),
            _ => format!("{}_{}-{}", file, lo, hi),
        };
        let path = match dir {
            Some(dir) => format!("{}/{}", dir, file),
            None => file,
        };
        RepoTarget {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            path,
        }
    }
}

impl FromStr for RepoTarget {
    type Err = PublishError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_matches('/');
        let mut parts = trimmed.splitn(3, '/');
        let owner = parts.next().unwrap_or_default();
        let repo = parts.next().unwrap_or_default();
        let path = parts.next().unwrap_or_default();
        let path_ok = !path.is_empty() && path.split('/').all(|seg| !seg.is_empty());
        if owner.is_empty() || repo.is_empty() || !path_ok {
            return Err(PublishError::InvalidTarget(s.trim().to_string()));
        }
        Ok(RepoTarget {
            owner: owner.to_string(),
            repo: repo.to_string(),
            path: path.to_string(),
        })
    }
}

impl fmt::Display for RepoTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.owner, self.repo, self.path)
    }
}

/// Existing remote file, identified by its revision token (content hash).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub revision: String,
}

/// Minimal file API of a hosted repository.
pub trait RemoteStore {
    fn get_file(&self, target: &RepoTarget) -> Result<Option<RemoteFile>, PublishError>;

    fn create_file(
        &self,
        target: &RepoTarget,
        content: &[u8],
        message: &str,
    ) -> Result<(), PublishError>;

    fn update_file(
        &self,
        target: &RepoTarget,
        content: &[u8],
        message: &str,
        revision: &str,
    ) -> Result<(), PublishError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Created,
    Updated { previous_revision: String },
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishOutcome::Created => f.write_str("created"),
            PublishOutcome::Updated { previous_revision } => {
                write!(f, "updated (previous revision {})", previous_revision)
            }
        }
    }
}

/// Update `target` if it exists (passing its revision), create it otherwise.
///
/// No retries: any store error is returned to the caller.
pub fn publish(
    store: &dyn RemoteStore,
    target: &RepoTarget,
    content: &[u8],
    message: &str,
) -> Result<PublishOutcome, PublishError> {
    match store.get_file(target)? {
        Some(existing) => {
            log::info!("Updating {} (revision {})", target, existing.revision);
            store.update_file(target, content, message, &existing.revision)?;
            Ok(PublishOutcome::Updated {
                previous_revision: existing.revision,
            })
        }
        None => {
            log::info!("Creating {}", target);
            store.create_file(target, content, message)?;
            Ok(PublishOutcome::Created)
        }
    }
}
