//! Per-author churn aggregation and risky commit detection.
//!
//! Both computations read each commit once; [`analyze`] fuses them into a
//! single pass for the pipeline, while [`aggregate`] and [`classify`] remain
//! available on their own.

use devpulse_core::{ChurnAnalysis, ChurnTotals, CommitRecord, DevpulseError, RiskFlag};

/// Commits with more churn than this are flagged.
pub const RISK_CHURN_THRESHOLD: u64 = 300;

/// Commits touching more files than this are flagged.
pub const RISK_FILES_THRESHOLD: u64 = 8;

/// Whether a commit deserves extra review attention.
///
/// A commit is risky when `additions + deletions > 300` or
/// `files_changed > 8`. Both bounds are exclusive.
///
/// # Examples
///
/// ```
/// use devpulse_core::CommitRecord;
/// use devpulse_analysis::churn::is_risky;
///
/// let mut commit = CommitRecord {
///     author: "alice".into(),
///     additions: 300,
///     deletions: 0,
///     files_changed: 8,
///     timestamp: "2025-06-30T12:00:00Z".into(),
/// };
/// assert!(!is_risky(&commit));
/// commit.files_changed = 9;
/// assert!(is_risky(&commit));
/// ```
pub fn is_risky(commit: &CommitRecord) -> bool {
    commit.total_churn() > RISK_CHURN_THRESHOLD || commit.files_changed > RISK_FILES_THRESHOLD
}

/// Sum `additions + deletions` per author.
///
/// # Examples
///
/// ```
/// use devpulse_analysis::churn::aggregate;
///
/// assert!(aggregate(&[]).is_empty());
/// ```
pub fn aggregate(commits: &[CommitRecord]) -> ChurnTotals {
    let mut totals = ChurnTotals::new();
    for commit in commits {
        totals.add(&commit.author, commit.total_churn());
    }
    totals
}

/// Total churn over `commits`, or an error if it does not fit in `u64`.
///
/// Once this succeeds every per-author and per-week sum over the same commits
/// is exact.
///
/// # Errors
///
/// Returns [`DevpulseError::Validation`] on overflow.
///
/// # Examples
///
/// ```
/// use devpulse_core::CommitRecord;
/// use devpulse_analysis::churn::checked_total;
///
/// let commit = |additions| CommitRecord {
///     author: "alice".into(),
///     additions,
///     deletions: 0,
///     files_changed: 1,
///     timestamp: "2025-06-30T12:00:00Z".into(),
/// };
/// assert_eq!(checked_total(&[commit(1), commit(2)]).unwrap(), 3);
/// assert!(checked_total(&[commit(u64::MAX), commit(1)]).is_err());
/// ```
pub fn checked_total(commits: &[CommitRecord]) -> Result<u64, DevpulseError> {
    commits.iter().try_fold(0u64, |acc, commit| {
        commit
            .additions
            .checked_add(commit.deletions)
            .and_then(|churn| acc.checked_add(churn))
            .ok_or_else(|| {
                DevpulseError::Validation(format!(
                    "total churn over {} commits overflows u64",
                    commits.len()
                ))
            })
    })
}

/// Flag every risky commit, preserving input order.
///
/// Each qualifying commit yields exactly one flag; commits by the same author
/// are never merged.
pub fn classify(commits: &[CommitRecord]) -> Vec<RiskFlag> {
    commits
        .iter()
        .filter(|c| is_risky(c))
        .map(risk_flag)
        .collect()
}

/// Aggregate and classify in one pass over `commits`.
///
/// # Examples
///
/// ```
/// use devpulse_core::CommitRecord;
/// use devpulse_analysis::churn::analyze;
///
/// let commits = vec![
///     CommitRecord { author: "alice".into(), additions: 120, deletions: 30, files_changed: 3, timestamp: "2025-06-30T12:00:00Z".into() },
///     CommitRecord { author: "bob".into(), additions: 200, deletions: 150, files_changed: 10, timestamp: "2025-06-30T13:00:00Z".into() },
/// ];
/// let analysis = analyze(&commits);
/// assert_eq!(analysis.author_churn.get("bob"), Some(350));
/// assert_eq!(analysis.risk_flags.len(), 1);
/// ```
pub fn analyze(commits: &[CommitRecord]) -> ChurnAnalysis {
    let mut analysis = ChurnAnalysis::default();
    for commit in commits {
        analysis
            .author_churn
            .add(&commit.author, commit.total_churn());
        if is_risky(commit) {
            analysis.risk_flags.push(risk_flag(commit));
        }
    }
    tracing::debug!(
        commits = commits.len(),
        authors = analysis.author_churn.len(),
        flagged = analysis.risk_flags.len(),
        "analyzed commit churn"
    );
    analysis
}

fn risk_flag(commit: &CommitRecord) -> RiskFlag {
    RiskFlag {
        author: commit.author.clone(),
        total_churn: commit.total_churn(),
        files_changed: commit.files_changed,
        timestamp: commit.timestamp.clone(),
    }
}
