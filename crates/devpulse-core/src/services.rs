//! Interfaces to the collaborators a report run depends on.
//!
//! The pipeline receives these as explicitly constructed values; nothing in
//! the analysis path reaches for a process-wide client.

use async_trait::async_trait;

use crate::error::DevpulseError;
use crate::types::{ChurnTotals, CommitRecord, RenderedImage, ReviewPair, RiskFlag};

/// Supplies commit records for a repository.
#[async_trait]
pub trait CommitSource: Send + Sync {
    /// Fetch commit records for `owner/repo`.
    async fn fetch_commits(&self, owner: &str, repo: &str)
        -> Result<Vec<CommitRecord>, DevpulseError>;
}

/// Supplies code-review interactions for a repository.
#[async_trait]
pub trait ReviewSource: Send + Sync {
    /// Fetch `(reviewer, author)` pairs for `owner/repo`.
    async fn fetch_review_pairs(&self, owner: &str, repo: &str)
        -> Result<Vec<ReviewPair>, DevpulseError>;
}

/// Turns churn totals and risk flags into prose.
#[async_trait]
pub trait NarrationService: Send + Sync {
    /// Produce a text summary. Receives only the two derived structures.
    async fn narrate(
        &self,
        churn: &ChurnTotals,
        risk_flags: &[RiskFlag],
    ) -> Result<String, DevpulseError>;
}

/// Renders per-author churn as an image.
pub trait ChartRenderer: Send + Sync {
    /// Render a churn chart. Must be a pure function of `churn`.
    fn render_churn(&self, churn: &ChurnTotals) -> Result<RenderedImage, DevpulseError>;
}

/// Renders reviewer → author interactions as a graph image.
pub trait InfluenceMapper: Send + Sync {
    /// Render the influence graph; an empty `pairs` still yields an image.
    fn render_influence(&self, pairs: &[ReviewPair]) -> Result<RenderedImage, DevpulseError>;
}

/// Posts a finished report somewhere people will read it.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Post `text`, attaching `image` when given.
    async fn post(&self, text: &str, image: Option<&RenderedImage>) -> Result<(), DevpulseError>;
}
