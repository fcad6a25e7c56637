use std::fmt::Write;

use devpulse_core::{ChurnTotals, RiskFlag};

const SYSTEM_PROMPT: &str = "\
You are a software engineering analyst bot. You write the weekly developer \
productivity report for an engineering team.

Rules:
- Be short and crisp; a few short paragraphs or bullets at most
- Call out risks, such as very large or wide-reaching commits
- Mention positive highlights as well as concerns
- Only use the numbers you are given; do not invent metrics
- Plain text or Slack-style markdown only";

/// Build the system prompt for the narration LLM.
///
/// # Examples
///
/// ```
/// use devpulse_report::prompt::build_system_prompt;
///
/// assert!(build_system_prompt().contains("analyst"));
/// ```
pub fn build_system_prompt() -> String {
    SYSTEM_PROMPT.to_string()
}

/// Build the user prompt carrying per-author churn and the risky commits.
///
/// # Examples
///
/// ```
/// use devpulse_core::ChurnTotals;
/// use devpulse_report::prompt::build_insight_prompt;
///
/// let mut churn = ChurnTotals::new();
/// churn.add("alice", 250);
/// let prompt = build_insight_prompt(&churn, &[]);
/// assert!(prompt.contains("alice: 250"));
/// assert!(prompt.contains("(none)"));
/// ```
pub fn build_insight_prompt(churn: &ChurnTotals, risk_flags: &[RiskFlag]) -> String {
    let mut prompt = String::from(
        "Given per-author code churn and a list of risky commits (high churn or many \
         files changed), generate a short insight summary for this week's report.\n\n",
    );

    prompt.push_str("Author churn (lines added + deleted):\n");
    if churn.is_empty() {
        prompt.push_str("(none)\n");
    }
    for (author, total) in churn.iter() {
        let _ = writeln!(prompt, "- {author}: {total}");
    }

    prompt.push_str("\nRisky commits:\n");
    if risk_flags.is_empty() {
        prompt.push_str("(none)\n");
    }
    for flag in risk_flags {
        let _ = writeln!(
            prompt,
            "- {} at {}: {} lines churned across {} files",
            flag.author, flag.timestamp, flag.total_churn, flag.files_changed
        );
    }

    prompt.push_str("\nOutput a helpful and concise report with insights, risks, and positive highlights.\n");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insight_prompt_lists_flags() {
        let mut churn = ChurnTotals::new();
        churn.add("bob", 350);
        let flags = vec![RiskFlag {
            author: "bob".into(),
            total_churn: 350,
            files_changed: 10,
            timestamp: "2025-06-30T13:00:00Z".into(),
        }];
        let prompt = build_insight_prompt(&churn, &flags);
        assert!(prompt.contains("- bob: 350"));
        assert!(prompt.contains("350 lines churned across 10 files"));
        assert!(prompt.contains("2025-06-30T13:00:00Z"));
    }

    #[test]
    fn empty_inputs_are_marked() {
        let prompt = build_insight_prompt(&ChurnTotals::new(), &[]);
        assert_eq!(prompt.matches("(none)").count(), 2);
    }

    #[test]
    fn system_prompt_forbids_invented_numbers() {
        assert!(build_system_prompt().contains("do not invent"));
    }
}
