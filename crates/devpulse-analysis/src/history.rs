//! Weekly churn history for the forecaster.

use std::collections::BTreeMap;

use chrono::{Datelike, Days, Duration, NaiveDate};
use devpulse_core::{ChurnPoint, CommitRecord, DevpulseError};

use crate::forecast::PERIOD_DAYS;

/// Monday of the ISO week containing `date`.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use devpulse_analysis::history::week_start;
///
/// let sunday = NaiveDate::from_ymd_opt(2025, 7, 6).unwrap();
/// assert_eq!(week_start(sunday), NaiveDate::from_ymd_opt(2025, 6, 30).unwrap());
/// ```
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Bucket commits into weekly churn totals.
///
/// Weeks start on Monday (UTC). Weeks between the first and last active week
/// with no commits appear with zero churn, so the series has no gaps.
///
/// # Errors
///
/// Returns [`DevpulseError::Validation`] if a commit timestamp is not RFC 3339.
///
/// # Examples
///
/// ```
/// use devpulse_core::CommitRecord;
/// use devpulse_analysis::history::weekly_history;
///
/// let commit = |ts: &str, add| CommitRecord {
///     author: "alice".into(),
///     additions: add,
///     deletions: 0,
///     files_changed: 1,
///     timestamp: ts.into(),
/// };
/// let history = weekly_history(&[
///     commit("2025-06-02T10:00:00Z", 10),
///     commit("2025-06-20T10:00:00Z", 30),
/// ]).unwrap();
/// let churn: Vec<u64> = history.iter().map(|p| p.total_churn).collect();
/// assert_eq!(churn, vec![10, 0, 30]);
/// ```
pub fn weekly_history(commits: &[CommitRecord]) -> Result<Vec<ChurnPoint>, DevpulseError> {
    let mut weeks: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for commit in commits {
        let day = commit.parsed_timestamp()?.date_naive();
        let week = weeks.entry(week_start(day)).or_insert(0);
        *week = week.saturating_add(commit.total_churn());
    }

    let (Some(&first), Some(&last)) = (weeks.keys().next(), weeks.keys().next_back()) else {
        return Ok(Vec::new());
    };

    let mut history = Vec::new();
    let mut period_start = first;
    while period_start <= last {
        history.push(ChurnPoint {
            period_start,
            total_churn: weeks.get(&period_start).copied().unwrap_or(0),
        });
        period_start += Duration::days(PERIOD_DAYS);
    }
    Ok(history)
}

/// Replay one total over `periods` equally spaced weeks ending at the week of
/// `today`.
///
/// Stand-in history for demos when no real time series exists. Every point
/// carries the same value, so any forecast over it is flat. Weeks before the
/// earliest representable date are left out.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use devpulse_analysis::history::synthetic_history;
///
/// let today = NaiveDate::from_ymd_opt(2025, 7, 3).unwrap();
/// let history = synthetic_history(600, 4, today);
/// assert_eq!(history.len(), 4);
/// assert_eq!(history[3].period_start, NaiveDate::from_ymd_opt(2025, 6, 30).unwrap());
/// assert!(history.iter().all(|p| p.total_churn == 600));
/// ```
pub fn synthetic_history(total_churn: u64, periods: usize, today: NaiveDate) -> Vec<ChurnPoint> {
    let anchor = week_start(today);
    (0..periods)
        .filter_map(|i| {
            let weeks_back = u64::try_from(periods - 1 - i).ok()?;
            let days = weeks_back.checked_mul(PERIOD_DAYS as u64)?;
            let period_start = anchor.checked_sub_days(Days::new(days))?;
            Some(ChurnPoint {
                period_start,
                total_churn,
            })
        })
        .collect()
}
