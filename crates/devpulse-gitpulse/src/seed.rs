//! Commit records from JSON seed files and built-in demo data.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use devpulse_core::services::CommitSource;
use devpulse_core::{CommitRecord, DevpulseError};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum SeedDocument {
    Records(Vec<CommitRecord>),
    Wrapped { github_data: Vec<CommitRecord> },
}

/// Parse a seed document.
///
/// Accepts either a bare array of commit records or an object with a
/// `github_data` array. Every timestamp is checked.
///
/// # Errors
///
/// Returns [`DevpulseError::Validation`] for any other shape or an invalid
/// record.
///
/// # Examples
///
/// ```
/// use devpulse_gitpulse::seed::parse_seed;
///
/// let wrapped = r#"{"github_data": [
///     {"author": "alice", "additions": 120, "deletions": 30, "files_changed": 3,
///      "timestamp": "2025-06-30T12:00:00Z"}
/// ]}"#;
/// assert_eq!(parse_seed(wrapped).unwrap().len(), 1);
/// assert!(parse_seed(r#"{"commits": []}"#).is_err());
/// ```
pub fn parse_seed(content: &str) -> Result<Vec<CommitRecord>, DevpulseError> {
    let document: SeedDocument = serde_json::from_str(content).map_err(|e| {
        DevpulseError::Validation(format!(
            "seed must be a commit array or an object with 'github_data': {e}"
        ))
    })?;
    let commits = match document {
        SeedDocument::Records(commits) => commits,
        SeedDocument::Wrapped { github_data } => github_data,
    };
    for commit in &commits {
        commit.validate()?;
    }
    Ok(commits)
}

/// Read and parse a seed file.
///
/// # Errors
///
/// Returns [`DevpulseError::FileNotFound`] if `path` does not exist, otherwise
/// whatever [`parse_seed`] returns.
pub fn load_seed_commits(path: &Path) -> Result<Vec<CommitRecord>, DevpulseError> {
    if !path.exists() {
        return Err(DevpulseError::FileNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    let commits = parse_seed(&content)?;
    tracing::info!(path = %path.display(), commits = commits.len(), "loaded seed commits");
    Ok(commits)
}

/// Three commits by two authors, one of them risky.
pub fn demo_commits() -> Vec<CommitRecord> {
    let commit = |author: &str, additions, deletions, files_changed, hour: u32| CommitRecord {
        author: author.into(),
        additions,
        deletions,
        files_changed,
        timestamp: format!("2025-06-30T{hour}:00:00Z"),
    };
    vec![
        commit("alice", 120, 30, 3, 12),
        commit("bob", 200, 150, 10, 13),
        commit("alice", 80, 20, 2, 14),
    ]
}

/// Commit source that serves a fixed set of records.
///
/// Used for offline runs; the owner and repository are ignored.
pub struct SeedSource {
    origin: Option<PathBuf>,
    commits: Vec<CommitRecord>,
}

impl SeedSource {
    /// Serve the records in a seed file, read lazily on each fetch.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            origin: Some(path.into()),
            commits: Vec::new(),
        }
    }

    /// Serve the given records.
    pub fn from_commits(commits: Vec<CommitRecord>) -> Self {
        Self {
            origin: None,
            commits,
        }
    }

    /// Serve [`demo_commits`].
    pub fn demo() -> Self {
        Self::from_commits(demo_commits())
    }
}

#[async_trait]
impl CommitSource for SeedSource {
    async fn fetch_commits(
        &self,
        _owner: &str,
        _repo: &str,
    ) -> Result<Vec<CommitRecord>, DevpulseError> {
        match &self.origin {
            Some(path) => load_seed_commits(path),
            None => Ok(self.commits.clone()),
        }
    }
}
