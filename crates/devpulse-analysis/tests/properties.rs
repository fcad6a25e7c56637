use chrono::{Duration, NaiveDate};
use devpulse_analysis::churn::{aggregate, analyze, classify, is_risky};
use devpulse_analysis::forecast::forecast;
use devpulse_core::{ChurnPoint, CommitRecord, ForecastOutcome};
use proptest::prelude::*;

fn commit_strategy() -> impl Strategy<Value = CommitRecord> {
    (
        prop::sample::select(vec!["alice", "bob", "carol", "unknown"]),
        0u64..600,
        0u64..600,
        0u64..20,
        0u32..24,
    )
        .prop_map(|(author, additions, deletions, files, hour)| CommitRecord {
            author: author.to_string(),
            additions,
            deletions,
            files_changed: files,
            timestamp: format!("2025-06-30T{hour:02}:00:00Z"),
        })
}

proptest! {
    #[test]
    fn aggregate_preserves_total_churn(commits in prop::collection::vec(commit_strategy(), 0..50)) {
        let expected: u64 = commits.iter().map(|c| c.additions + c.deletions).sum();
        prop_assert_eq!(aggregate(&commits).total(), expected);
    }

    #[test]
    fn aggregate_ignores_input_order(
        (commits, shuffled) in prop::collection::vec(commit_strategy(), 0..30)
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
    ) {
        prop_assert_eq!(aggregate(&commits), aggregate(&shuffled));
    }

    #[test]
    fn flag_emitted_iff_predicate_holds(commit in commit_strategy()) {
        let expected = commit.additions + commit.deletions > 300 || commit.files_changed > 8;
        prop_assert_eq!(is_risky(&commit), expected);
        prop_assert_eq!(classify(std::slice::from_ref(&commit)).len(), usize::from(expected));
    }

    #[test]
    fn flags_follow_input_order(commits in prop::collection::vec(commit_strategy(), 0..40)) {
        let flags = classify(&commits);
        let expected: Vec<(String, u64, u64)> = commits
            .iter()
            .filter(|c| is_risky(c))
            .map(|c| (c.author.clone(), c.total_churn(), c.files_changed))
            .collect();
        let actual: Vec<(String, u64, u64)> = flags
            .iter()
            .map(|f| (f.author.clone(), f.total_churn, f.files_changed))
            .collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn fused_pass_agrees_with_separate_passes(commits in prop::collection::vec(commit_strategy(), 0..40)) {
        let analysis = analyze(&commits);
        prop_assert_eq!(analysis.author_churn, aggregate(&commits));
        prop_assert_eq!(analysis.risk_flags, classify(&commits));
    }

    #[test]
    fn linear_history_is_extrapolated(
        base in 0u64..10_000,
        step in 0u64..1_000,
        weeks in 2usize..12,
    ) {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let history: Vec<ChurnPoint> = (0..weeks)
            .map(|i| ChurnPoint {
                period_start: start + Duration::days(7 * i as i64),
                total_churn: base + step * i as u64,
            })
            .collect();
        let ForecastOutcome::Forecast(f) = forecast(&history).unwrap() else {
            panic!("two or more points must forecast");
        };
        let expected = (base + step * weeks as u64) as f64;
        prop_assert!((f.forecast_churn - expected).abs() < 0.011, "{} vs {}", f.forecast_churn, expected);
        prop_assert_eq!(f.forecast_period_start, start + Duration::days(7 * weeks as i64));
    }

    #[test]
    fn same_date_history_never_faults(values in prop::collection::vec(0u64..5_000, 2..10)) {
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let history: Vec<ChurnPoint> = values
            .iter()
            .map(|&v| ChurnPoint { period_start: day, total_churn: v })
            .collect();
        let outcome = forecast(&history).unwrap();
        let f = outcome.forecast().expect("flat forecast");
        prop_assert!(f.forecast_churn.is_finite());
        prop_assert_eq!(f.slope, 0.0);
    }
}
