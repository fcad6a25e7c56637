//! GitHub REST client for commit statistics and pull request reviews.

use std::collections::BTreeSet;

use async_trait::async_trait;
use devpulse_core::services::{CommitSource, ReviewSource};
use devpulse_core::{CommitRecord, DevpulseError, GitHubConfig, ReviewPair, UNATTRIBUTED_AUTHOR};
use serde::{Deserialize, Serialize};

/// A commit as returned by `GET /repos/{owner}/{repo}/commits/{sha}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiCommit {
    /// Commit hash.
    pub sha: String,
    /// Raw git metadata.
    pub commit: ApiGitCommit,
    /// Linked GitHub account, absent for unmatched emails.
    #[serde(default)]
    pub author: Option<ApiUser>,
    /// Line statistics; only present on the detail endpoint.
    #[serde(default)]
    pub stats: Option<ApiStats>,
    /// Changed files; only present on the detail endpoint.
    #[serde(default)]
    pub files: Option<Vec<serde_json::Value>>,
}

/// Git metadata nested in an [`ApiCommit`].
#[derive(Debug, Clone, Deserialize)]
pub struct ApiGitCommit {
    /// Author signature.
    pub author: Option<ApiSignature>,
}

/// Name and date of a git signature.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSignature {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

/// A GitHub account.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiUser {
    pub login: String,
}

/// Addition and deletion counts for a commit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiStats {
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiCommitRef {
    sha: String,
}

/// A pull request as listed by `GET /repos/{owner}/{repo}/pulls`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiPull {
    pub number: u64,
    #[serde(default)]
    pub user: Option<ApiUser>,
}

/// A submitted review.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiReview {
    #[serde(default)]
    pub user: Option<ApiUser>,
}

#[derive(Serialize)]
struct ListCommitsParams {
    per_page: u32,
}

#[derive(Serialize)]
struct ListPullsParams<'a> {
    state: &'a str,
    per_page: u32,
}

/// Convert a commit detail payload into a [`CommitRecord`].
///
/// The author is the GitHub login, then the git author name, then
/// `"unknown"`.
///
/// # Errors
///
/// Returns [`DevpulseError::GitHub`] if the payload has no author date.
///
/// # Examples
///
/// ```
/// use devpulse_gitpulse::github::{commit_record_from_api, ApiCommit};
///
/// let payload: ApiCommit = serde_json::from_str(r#"{
///     "sha": "abc123",
///     "commit": { "author": { "name": "Alice", "date": "2025-06-30T12:00:00Z" } },
///     "author": { "login": "alice" },
///     "stats": { "additions": 120, "deletions": 30 },
///     "files": [{}, {}, {}]
/// }"#).unwrap();
/// let record = commit_record_from_api(&payload).unwrap();
/// assert_eq!(record.author, "alice");
/// assert_eq!(record.total_churn(), 150);
/// assert_eq!(record.files_changed, 3);
/// ```
pub fn commit_record_from_api(commit: &ApiCommit) -> Result<CommitRecord, DevpulseError> {
    let signature = commit.commit.author.as_ref();
    let author = commit
        .author
        .as_ref()
        .map(|u| u.login.clone())
        .or_else(|| signature.and_then(|s| s.name.clone()))
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| UNATTRIBUTED_AUTHOR.to_string());

    let timestamp = signature
        .and_then(|s| s.date.clone())
        .ok_or_else(|| DevpulseError::GitHub(format!("commit {} has no author date", commit.sha)))?;

    let stats = commit.stats.clone().unwrap_or_default();
    Ok(CommitRecord {
        author,
        additions: stats.additions,
        deletions: stats.deletions,
        files_changed: commit.files.as_ref().map_or(0, |f| f.len() as u64),
        timestamp,
    })
}

/// Reviewer → author pairs for one pull request.
///
/// Each distinct reviewer appears once, in name order. Authors reviewing
/// their own pull request and reviews from deleted accounts are skipped.
///
/// # Examples
///
/// ```
/// use devpulse_gitpulse::github::{review_pairs_for_pull, ApiReview};
///
/// let reviews: Vec<ApiReview> = serde_json::from_str(r#"[
///     { "user": { "login": "bob" } },
///     { "user": { "login": "bob" } },
///     { "user": { "login": "alice" } },
///     { "user": null }
/// ]"#).unwrap();
/// let pairs = review_pairs_for_pull("alice", &reviews);
/// assert_eq!(pairs.len(), 1);
/// assert_eq!(pairs[0].reviewer, "bob");
/// ```
pub fn review_pairs_for_pull(author: &str, reviews: &[ApiReview]) -> Vec<ReviewPair> {
    let reviewers: BTreeSet<&str> = reviews
        .iter()
        .filter_map(|r| r.user.as_ref().map(|u| u.login.as_str()))
        .filter(|login| *login != author)
        .collect();

    reviewers
        .into_iter()
        .map(|reviewer| ReviewPair {
            reviewer: reviewer.to_string(),
            author: author.to_string(),
        })
        .collect()
}

/// GitHub client serving both commit statistics and review interactions.
#[derive(Clone)]
pub struct GitHubClient {
    octocrab: octocrab::Octocrab,
    max_commits: u32,
    max_pulls: u32,
}

impl GitHubClient {
    /// Build a client from configuration.
    ///
    /// A missing token is allowed; requests are then unauthenticated and
    /// subject to GitHub's lower rate limit.
    ///
    /// # Errors
    ///
    /// Returns [`DevpulseError::Config`] if `api_url` is invalid, or
    /// [`DevpulseError::GitHub`] if the client cannot be built.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use devpulse_core::GitHubConfig;
    /// use devpulse_gitpulse::github::GitHubClient;
    ///
    /// # #[tokio::main] async fn main() {
    /// let client = GitHubClient::new(&GitHubConfig::default()).unwrap();
    /// # }
    /// ```
    pub fn new(config: &GitHubConfig) -> Result<Self, DevpulseError> {
        let mut builder = octocrab::Octocrab::builder();
        if let Some(token) = &config.token {
            builder = builder.personal_token(token.clone());
        } else {
            tracing::warn!("no GitHub token configured; using unauthenticated requests");
        }
        if let Some(url) = &config.api_url {
            builder = builder
                .base_uri(url.as_str())
                .map_err(|e| DevpulseError::Config(format!("invalid GitHub api_url '{url}': {e}")))?;
        }
        let octocrab = builder
            .build()
            .map_err(|e| DevpulseError::GitHub(format!("failed to create GitHub client: {e}")))?;

        Ok(Self {
            octocrab,
            max_commits: config.max_commits,
            max_pulls: config.max_pulls,
        })
    }

    async fn commit_detail(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<CommitRecord, DevpulseError> {
        let route = format!("/repos/{owner}/{repo}/commits/{sha}");
        let detail: ApiCommit = self
            .octocrab
            .get(route, None::<&()>)
            .await
            .map_err(|e| DevpulseError::GitHub(format!("failed to fetch commit {sha}: {e}")))?;
        commit_record_from_api(&detail)
    }

    async fn pull_reviews(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<ApiReview>, DevpulseError> {
        let route = format!("/repos/{owner}/{repo}/pulls/{number}/reviews");
        self.octocrab
            .get(route, None::<&()>)
            .await
            .map_err(|e| DevpulseError::GitHub(format!("failed to fetch reviews for #{number}: {e}")))
    }
}

#[async_trait]
impl CommitSource for GitHubClient {
    async fn fetch_commits(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<CommitRecord>, DevpulseError> {
        let route = format!("/repos/{owner}/{repo}/commits");
        let params = ListCommitsParams {
            per_page: self.max_commits,
        };
        let listed: Vec<ApiCommitRef> = self
            .octocrab
            .get(route, Some(&params))
            .await
            .map_err(|e| DevpulseError::GitHub(format!("failed to list commits: {e}")))?;

        let mut records = Vec::with_capacity(listed.len());
        for entry in &listed {
            match self.commit_detail(owner, repo, &entry.sha).await {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(sha = %entry.sha, error = %e, "skipping commit"),
            }
        }

        tracing::info!(
            repo = %format!("{owner}/{repo}"),
            listed = listed.len(),
            fetched = records.len(),
            "fetched GitHub commits"
        );
        Ok(records)
    }
}

#[async_trait]
impl ReviewSource for GitHubClient {
    async fn fetch_review_pairs(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<ReviewPair>, DevpulseError> {
        let route = format!("/repos/{owner}/{repo}/pulls");
        let params = ListPullsParams {
            state: "all",
            per_page: self.max_pulls,
        };
        let pulls: Vec<ApiPull> = self
            .octocrab
            .get(route, Some(&params))
            .await
            .map_err(|e| DevpulseError::GitHub(format!("failed to list pull requests: {e}")))?;

        let mut pairs = Vec::new();
        for pull in &pulls {
            let Some(author) = pull.user.as_ref().map(|u| u.login.as_str()) else {
                continue;
            };
            match self.pull_reviews(owner, repo, pull.number).await {
                Ok(reviews) => pairs.extend(review_pairs_for_pull(author, &reviews)),
                Err(e) => tracing::warn!(pull = pull.number, error = %e, "skipping pull request"),
            }
        }

        tracing::info!(pulls = pulls.len(), pairs = pairs.len(), "fetched review pairs");
        Ok(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_commit(json: &str) -> ApiCommit {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn login_is_preferred_over_git_name() {
        let c = parse_commit(
            r#"{"sha":"1","commit":{"author":{"name":"Bob B","date":"2025-06-30T13:00:00Z"}},
                "author":{"login":"bob"},"stats":{"additions":200,"deletions":150},
                "files":[{},{},{},{},{},{},{},{},{},{}]}"#,
        );
        let record = commit_record_from_api(&c).unwrap();
        assert_eq!(record.author, "bob");
        assert_eq!(record.additions, 200);
        assert_eq!(record.deletions, 150);
        assert_eq!(record.files_changed, 10);
        assert_eq!(record.timestamp, "2025-06-30T13:00:00Z");
    }

    #[test]
    fn git_name_used_without_linked_account() {
        let c = parse_commit(
            r#"{"sha":"2","commit":{"author":{"name":"Carol","date":"2025-06-30T13:00:00Z"}},
                "author":null,"stats":{"additions":1,"deletions":0},"files":[{}]}"#,
        );
        assert_eq!(commit_record_from_api(&c).unwrap().author, "Carol");
    }

    #[test]
    fn missing_identity_is_unattributed() {
        let c = parse_commit(
            r#"{"sha":"3","commit":{"author":{"date":"2025-06-30T13:00:00Z"}}}"#,
        );
        let record = commit_record_from_api(&c).unwrap();
        assert_eq!(record.author, UNATTRIBUTED_AUTHOR);
        assert_eq!(record.total_churn(), 0);
        assert_eq!(record.files_changed, 0);
    }

    #[test]
    fn missing_date_is_error() {
        let c = parse_commit(r#"{"sha":"4","commit":{"author":null}}"#);
        let err = commit_record_from_api(&c).unwrap_err();
        assert!(matches!(err, DevpulseError::GitHub(_)));
    }

    #[test]
    fn self_reviews_are_excluded() {
        let reviews: Vec<ApiReview> = serde_json::from_str(
            r#"[{"user":{"login":"dave"}},{"user":{"login":"erin"}},{"user":{"login":"carol"}}]"#,
        )
        .unwrap();
        let pairs = review_pairs_for_pull("carol", &reviews);
        let reviewers: Vec<&str> = pairs.iter().map(|p| p.reviewer.as_str()).collect();
        assert_eq!(reviewers, vec!["dave", "erin"]);
        assert!(pairs.iter().all(|p| p.author == "carol"));
    }

    #[test]
    fn no_reviews_give_no_pairs() {
        assert!(review_pairs_for_pull("carol", &[]).is_empty());
    }

    #[test]
    fn pull_listing_parses_without_user() {
        let pulls: Vec<ApiPull> =
            serde_json::from_str(r#"[{"number":7,"user":null},{"number":8,"user":{"login":"x"}}]"#)
                .unwrap();
        assert!(pulls[0].user.is_none());
        assert_eq!(pulls[1].number, 8);
    }

    #[tokio::test]
    async fn client_builds_without_token() {
        let client = GitHubClient::new(&GitHubConfig::default()).unwrap();
        assert_eq!(client.max_commits, GitHubConfig::default().max_commits);
    }

    #[tokio::test]
    async fn invalid_api_url_is_config_error() {
        let config = GitHubConfig {
            api_url: Some("not a url".into()),
            ..GitHubConfig::default()
        };
        let err = GitHubClient::new(&config).err().unwrap();
        assert!(matches!(err, DevpulseError::Config(_)));
    }
}
