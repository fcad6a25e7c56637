//! Narration services: LLM-backed and offline.

use std::fmt::Write;

use async_trait::async_trait;
use devpulse_core::services::NarrationService;
use devpulse_core::{ChurnTotals, DevpulseError, RiskFlag};

use crate::llm::{ChatMessage, LlmClient};
use crate::prompt::{build_insight_prompt, build_system_prompt};

/// Narrates through a chat completion model.
pub struct LlmNarrator {
    client: LlmClient,
}

impl LlmNarrator {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NarrationService for LlmNarrator {
    async fn narrate(
        &self,
        churn: &ChurnTotals,
        risk_flags: &[RiskFlag],
    ) -> Result<String, DevpulseError> {
        let messages = vec![
            ChatMessage::system(build_system_prompt()),
            ChatMessage::user(build_insight_prompt(churn, risk_flags)),
        ];
        let summary = self.client.chat(messages).await?;
        if summary.is_empty() {
            return Err(DevpulseError::Llm("model returned an empty summary".into()));
        }
        Ok(summary)
    }
}

/// Deterministic summary for runs without a model.
///
/// # Examples
///
/// ```
/// use devpulse_core::ChurnTotals;
/// use devpulse_report::narrator::plain_summary;
///
/// let mut churn = ChurnTotals::new();
/// churn.add("alice", 250);
/// churn.add("bob", 350);
/// let text = plain_summary(&churn, &[]);
/// assert!(text.starts_with("600 lines churned by 2 authors"));
/// assert!(text.contains("No risky commits"));
/// ```
pub fn plain_summary(churn: &ChurnTotals, risk_flags: &[RiskFlag]) -> String {
    if churn.is_empty() {
        return "No commits in this period.".to_string();
    }

    let mut ranked: Vec<(&str, u64)> = churn.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    let mut out = format!(
        "{} lines churned by {} author{}.",
        churn.total(),
        churn.len(),
        if churn.len() == 1 { "" } else { "s" }
    );
    if let Some((author, total)) = ranked.first() {
        let _ = write!(out, " Most active: {author} ({total}).");
    }

    if risk_flags.is_empty() {
        out.push_str("\nNo risky commits.");
    } else {
        let _ = write!(out, "\n{} risky commit(s):", risk_flags.len());
        for flag in risk_flags {
            let _ = write!(
                out,
                "\n• {}: {} lines across {} files ({})",
                flag.author, flag.total_churn, flag.files_changed, flag.timestamp
            );
        }
    }
    out
}

/// [`NarrationService`] that never leaves the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainNarrator;

#[async_trait]
impl NarrationService for PlainNarrator {
    async fn narrate(
        &self,
        churn: &ChurnTotals,
        risk_flags: &[RiskFlag],
    ) -> Result<String, DevpulseError> {
        Ok(plain_summary(churn, risk_flags))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag(author: &str, churn: u64, files: u64) -> RiskFlag {
        RiskFlag {
            author: author.into(),
            total_churn: churn,
            files_changed: files,
            timestamp: "2025-06-30T13:00:00Z".into(),
        }
    }

    #[test]
    fn empty_churn_has_fixed_summary() {
        assert_eq!(plain_summary(&ChurnTotals::new(), &[]), "No commits in this period.");
    }

    #[test]
    fn single_author_is_singular() {
        let mut churn = ChurnTotals::new();
        churn.add("alice", 10);
        assert!(plain_summary(&churn, &[]).starts_with("10 lines churned by 1 author."));
    }

    #[test]
    fn flags_are_listed_in_order() {
        let mut churn = ChurnTotals::new();
        churn.add("bob", 900);
        let text = plain_summary(&churn, &[flag("bob", 400, 1), flag("bob", 500, 12)]);
        assert!(text.contains("2 risky commit(s)"));
        let first = text.find("400 lines").unwrap();
        let second = text.find("500 lines").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn plain_narrator_is_deterministic() {
        let mut churn = ChurnTotals::new();
        churn.add("alice", 250);
        let a = PlainNarrator.narrate(&churn, &[]).await.unwrap();
        let b = PlainNarrator.narrate(&churn, &[]).await.unwrap();
        assert_eq!(a, b);
    }
}
