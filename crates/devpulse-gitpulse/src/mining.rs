//! Commit history extraction from a local clone via git2.
//!
//! Walks commit history and turns each commit into a [`CommitRecord`] with
//! line counts from the diff against its first parent.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat};
use devpulse_core::services::CommitSource;
use devpulse_core::{CommitRecord, DevpulseError, UNATTRIBUTED_AUTHOR};
use git2::{Commit, DiffOptions, Repository, Sort};

/// Options for history mining.
///
/// # Examples
///
/// ```
/// use devpulse_gitpulse::mining::MiningOptions;
///
/// let opts = MiningOptions::default();
/// assert_eq!(opts.since_days, 90);
/// assert!(opts.max_commits.is_none());
/// ```
#[derive(Debug, Clone)]
pub struct MiningOptions {
    /// Only include commits from the last N days (default: 90).
    pub since_days: u64,
    /// Stop after this many commits.
    pub max_commits: Option<usize>,
    /// Branch to walk (default: HEAD).
    pub branch: Option<String>,
}

impl Default for MiningOptions {
    fn default() -> Self {
        Self {
            since_days: 90,
            max_commits: None,
            branch: None,
        }
    }
}

/// Mine commit records from a git repository.
///
/// Returns commits in reverse chronological order (newest first). Merge
/// commits are measured against their first parent.
///
/// # Errors
///
/// Returns [`DevpulseError::Git`] if the repository cannot be opened or walked.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use devpulse_gitpulse::mining::{mine_history, MiningOptions};
///
/// let commits = mine_history(Path::new("."), &MiningOptions::default()).unwrap();
/// for c in &commits {
///     println!("{} +{} -{} ({} files)", c.author, c.additions, c.deletions, c.files_changed);
/// }
/// ```
pub fn mine_history(
    repo_path: &Path,
    options: &MiningOptions,
) -> Result<Vec<CommitRecord>, DevpulseError> {
    let repo = Repository::open(repo_path)
        .map_err(|e| DevpulseError::Git(format!("failed to open repository: {e}")))?;

    let mut revwalk = repo
        .revwalk()
        .map_err(|e| DevpulseError::Git(format!("failed to create revwalk: {e}")))?;

    revwalk.set_sorting(Sort::TIME).ok();

    if let Some(ref branch) = options.branch {
        let reference = repo
            .resolve_reference_from_short_name(branch)
            .map_err(|e| DevpulseError::Git(format!("failed to resolve branch '{branch}': {e}")))?;
        let oid = reference
            .target()
            .ok_or_else(|| DevpulseError::Git("branch has no target".into()))?;
        revwalk
            .push(oid)
            .map_err(|e| DevpulseError::Git(format!("failed to push oid: {e}")))?;
    } else {
        revwalk
            .push_head()
            .map_err(|e| DevpulseError::Git(format!("failed to push HEAD: {e}")))?;
    }

    let cutoff = compute_cutoff(options.since_days);
    let mut commits = Vec::new();

    for oid_result in revwalk {
        if options.max_commits.is_some_and(|max| commits.len() >= max) {
            break;
        }

        let oid = oid_result.map_err(|e| DevpulseError::Git(format!("revwalk error: {e}")))?;
        let commit = repo
            .find_commit(oid)
            .map_err(|e| DevpulseError::Git(format!("failed to find commit: {e}")))?;

        let seconds = commit.time().seconds();
        if seconds < cutoff {
            break;
        }

        let (additions, deletions, files_changed) = diff_stats(&repo, &commit)?;
        let author = commit
            .author()
            .name()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(UNATTRIBUTED_AUTHOR)
            .to_string();

        commits.push(CommitRecord {
            author,
            additions,
            deletions,
            files_changed,
            timestamp: format_timestamp(seconds)?,
        });
    }

    tracing::info!(
        path = %repo_path.display(),
        commits = commits.len(),
        "mined local git history"
    );
    Ok(commits)
}

fn compute_cutoff(since_days: u64) -> i64 {
    chrono::Utc::now().timestamp() - (since_days as i64 * 86400)
}

fn format_timestamp(seconds: i64) -> Result<String, DevpulseError> {
    DateTime::from_timestamp(seconds, 0)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .ok_or_else(|| DevpulseError::Git(format!("commit time out of range: {seconds}")))
}

fn diff_stats(repo: &Repository, commit: &Commit) -> Result<(u64, u64, u64), DevpulseError> {
    let commit_tree = commit
        .tree()
        .map_err(|e| DevpulseError::Git(format!("failed to get commit tree: {e}")))?;

    let parent_tree = if commit.parent_count() > 0 {
        let parent = commit
            .parent(0)
            .map_err(|e| DevpulseError::Git(format!("failed to get parent: {e}")))?;
        Some(
            parent
                .tree()
                .map_err(|e| DevpulseError::Git(format!("failed to get parent tree: {e}")))?,
        )
    } else {
        None
    };

    let mut diff_opts = DiffOptions::new();
    let diff = repo
        .diff_tree_to_tree(
            parent_tree.as_ref(),
            Some(&commit_tree),
            Some(&mut diff_opts),
        )
        .map_err(|e| DevpulseError::Git(format!("failed to compute diff: {e}")))?;

    let stats = diff
        .stats()
        .map_err(|e| DevpulseError::Git(format!("failed to compute diff stats: {e}")))?;

    Ok((
        stats.insertions() as u64,
        stats.deletions() as u64,
        stats.files_changed() as u64,
    ))
}

/// Commit source backed by a local clone.
///
/// The owner and repository arguments are informational only; commits always
/// come from the configured path.
pub struct LocalGitSource {
    path: PathBuf,
    options: MiningOptions,
}

impl LocalGitSource {
    /// Create a source reading the repository at `path`.
    pub fn new(path: impl Into<PathBuf>, options: MiningOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }
}

#[async_trait]
impl CommitSource for LocalGitSource {
    async fn fetch_commits(
        &self,
        _owner: &str,
        _repo: &str,
    ) -> Result<Vec<CommitRecord>, DevpulseError> {
        let path = self.path.clone();
        let options = self.options.clone();
        tokio::task::spawn_blocking(move || mine_history(&path, &options))
            .await
            .map_err(|e| DevpulseError::Git(format!("history mining task failed: {e}")))?
    }
}
