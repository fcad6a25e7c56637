//! Report orchestration.
//!
//! A run moves through five stages in a fixed order:
//! fetch → aggregate_and_classify → narrate_and_chart → forecast →
//! map_influence. Each stage consumes the previous stage's state and embeds
//! it in its own, so a later stage can only read what earlier stages
//! produced. A failing stage aborts the run; no partial report is returned.

use std::fmt;

use chrono::{NaiveDate, Utc};
use devpulse_analysis::churn::{analyze, checked_total};
use devpulse_analysis::forecast::forecast as forecast_churn;
use devpulse_analysis::history::{synthetic_history, weekly_history};
use devpulse_core::services::{
    ChartRenderer, CommitSource, InfluenceMapper, NarrationService, ReviewSource,
};
use devpulse_core::{
    ChurnAnalysis, ChurnPoint, ChurnTotals, CommitRecord, DevpulseError, ForecastConfig,
    ForecastOutcome, HistoryMode, PipelineStage, RenderedImage, ReviewPair, RiskFlag,
};
use serde::Serialize;
use tracing::Instrument;

/// The repository a run was asked to report on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requested {
    pub owner: String,
    pub repo: String,
}

/// State after the fetch stage.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub request: Requested,
    pub commits: Vec<CommitRecord>,
}

/// State after aggregation and classification.
#[derive(Debug, Clone)]
pub struct Analyzed {
    pub fetched: Fetched,
    pub analysis: ChurnAnalysis,
}

/// State after narration and charting.
#[derive(Debug, Clone)]
pub struct Narrated {
    pub analyzed: Analyzed,
    pub summary: String,
    pub chart: RenderedImage,
}

/// State after the forecast stage; `forecast` is `None` when forecasting is
/// not wired in.
#[derive(Debug, Clone)]
pub struct Forecasted {
    pub narrated: Narrated,
    pub forecast: Option<ForecastOutcome>,
}

/// A finished report.
///
/// # Examples
///
/// ```
/// use devpulse_core::{ChurnTotals, ForecastOutcome, RenderedImage};
/// use devpulse_report::pipeline::Report;
///
/// let report = Report {
///     owner: "acme".into(),
///     repo: "widgets".into(),
///     commit_count: 0,
///     author_churn: ChurnTotals::new(),
///     risk_flags: vec![],
///     summary: "Quiet week.".into(),
///     chart: RenderedImage::svg("churn_chart.svg", "<svg/>".into()),
///     forecast: Some(ForecastOutcome::InsufficientData),
///     review_pairs: vec![],
///     influence_map: None,
/// };
/// assert!(report.slack_text().contains("Not enough data to forecast."));
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub owner: String,
    pub repo: String,
    /// Number of commits the report is based on.
    pub commit_count: usize,
    pub author_churn: ChurnTotals,
    pub risk_flags: Vec<RiskFlag>,
    /// Narrative summary from the narration service.
    pub summary: String,
    pub chart: RenderedImage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast: Option<ForecastOutcome>,
    /// Reviewer → author interactions behind the influence map.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub review_pairs: Vec<ReviewPair>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub influence_map: Option<RenderedImage>,
}

/// Report orchestrator.
///
/// Collaborators are passed in at construction; forecasting and influence
/// mapping are optional stages enabled with [`Pipeline::with_forecast`] and
/// [`Pipeline::with_influence`].
pub struct Pipeline {
    commits: Box<dyn CommitSource>,
    narrator: Box<dyn NarrationService>,
    chart: Box<dyn ChartRenderer>,
    forecast: Option<ForecastConfig>,
    influence: Option<(Box<dyn ReviewSource>, Box<dyn InfluenceMapper>)>,
    today: Option<NaiveDate>,
}

impl Pipeline {
    /// Create a pipeline with the three mandatory collaborators.
    pub fn new(
        commits: Box<dyn CommitSource>,
        narrator: Box<dyn NarrationService>,
        chart: Box<dyn ChartRenderer>,
    ) -> Self {
        Self {
            commits,
            narrator,
            chart,
            forecast: None,
            influence: None,
            today: None,
        }
    }

    /// Enable the forecast stage.
    pub fn with_forecast(mut self, config: ForecastConfig) -> Self {
        self.forecast = Some(config);
        self
    }

    /// Enable the influence stage.
    pub fn with_influence(
        mut self,
        reviews: Box<dyn ReviewSource>,
        mapper: Box<dyn InfluenceMapper>,
    ) -> Self {
        self.influence = Some((reviews, mapper));
        self
    }

    /// Pin the date synthetic history is anchored to.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Run every enabled stage for `owner/repo`.
    ///
    /// # Errors
    ///
    /// Returns [`DevpulseError::Stage`] naming the first stage that failed.
    pub async fn run(&self, owner: &str, repo: &str) -> Result<Report, DevpulseError> {
        let span = tracing::info_span!("report", repo = %format!("{owner}/{repo}"));
        async {
            let requested = Requested {
                owner: owner.to_string(),
                repo: repo.to_string(),
            };
            let fetched = self
                .fetch(requested)
                .await
                .map_err(|e| e.in_stage(PipelineStage::Fetch))?;
            let analyzed = self.aggregate_and_classify(fetched);
            let narrated = self
                .narrate_and_chart(analyzed)
                .await
                .map_err(|e| e.in_stage(PipelineStage::NarrateAndChart))?;
            let forecasted = self
                .forecast(narrated)
                .map_err(|e| e.in_stage(PipelineStage::Forecast))?;
            let report = self
                .map_influence(forecasted)
                .await
                .map_err(|e| e.in_stage(PipelineStage::MapInfluence))?;
            tracing::info!(
                commits = report.commit_count,
                authors = report.author_churn.len(),
                flagged = report.risk_flags.len(),
                "report complete"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Fetch and validate commit records.
    pub async fn fetch(&self, request: Requested) -> Result<Fetched, DevpulseError> {
        let commits = self
            .commits
            .fetch_commits(&request.owner, &request.repo)
            .await?;
        for commit in &commits {
            commit.validate()?;
        }
        let total = checked_total(&commits)?;
        tracing::info!(commits = commits.len(), total_churn = total, "fetched commits");
        Ok(Fetched { request, commits })
    }

    /// Aggregate churn per author and flag risky commits.
    pub fn aggregate_and_classify(&self, fetched: Fetched) -> Analyzed {
        let analysis = analyze(&fetched.commits);
        Analyzed { fetched, analysis }
    }

    /// Produce the narrative summary and the churn chart.
    pub async fn narrate_and_chart(&self, analyzed: Analyzed) -> Result<Narrated, DevpulseError> {
        let summary = self
            .narrator
            .narrate(&analyzed.analysis.author_churn, &analyzed.analysis.risk_flags)
            .await?;
        let chart = self.chart.render_churn(&analyzed.analysis.author_churn)?;
        tracing::info!(summary_len = summary.len(), "narrated and charted");
        Ok(Narrated {
            analyzed,
            summary,
            chart,
        })
    }

    /// Forecast next week's churn, if enabled.
    pub fn forecast(&self, narrated: Narrated) -> Result<Forecasted, DevpulseError> {
        let Some(config) = &self.forecast else {
            return Ok(Forecasted {
                narrated,
                forecast: None,
            });
        };

        let history = self.history(config, &narrated.analyzed)?;
        let outcome = forecast_churn(&history)?;
        tracing::info!(points = history.len(), outcome = %outcome, "forecast computed");
        Ok(Forecasted {
            narrated,
            forecast: Some(outcome),
        })
    }

    fn history(
        &self,
        config: &ForecastConfig,
        analyzed: &Analyzed,
    ) -> Result<Vec<ChurnPoint>, DevpulseError> {
        match config.history {
            HistoryMode::Commits => weekly_history(&analyzed.fetched.commits),
            HistoryMode::Synthetic => {
                config.validate()?;
                let today = self.today.unwrap_or_else(|| Utc::now().date_naive());
                Ok(synthetic_history(
                    analyzed.analysis.author_churn.total(),
                    config.synthetic_periods,
                    today,
                ))
            }
        }
    }

    /// Render the reviewer influence map, if enabled, and assemble the report.
    pub async fn map_influence(&self, forecasted: Forecasted) -> Result<Report, DevpulseError> {
        let (review_pairs, influence_map) = match &self.influence {
            Some((reviews, mapper)) => {
                let request = &forecasted.narrated.analyzed.fetched.request;
                let pairs = reviews
                    .fetch_review_pairs(&request.owner, &request.repo)
                    .await?;
                let image = mapper.render_influence(&pairs)?;
                tracing::info!(pairs = pairs.len(), "influence map rendered");
                (pairs, Some(image))
            }
            None => (Vec::new(), None),
        };
        Ok(Report::assemble(forecasted, review_pairs, influence_map))
    }
}

impl Report {
    fn assemble(
        forecasted: Forecasted,
        review_pairs: Vec<ReviewPair>,
        influence_map: Option<RenderedImage>,
    ) -> Self {
        let Forecasted { narrated, forecast } = forecasted;
        let Narrated {
            analyzed,
            summary,
            chart,
        } = narrated;
        let Analyzed { fetched, analysis } = analyzed;
        Self {
            owner: fetched.request.owner,
            repo: fetched.request.repo,
            commit_count: fetched.commits.len(),
            author_churn: analysis.author_churn,
            risk_flags: analysis.risk_flags,
            summary,
            chart,
            forecast,
            review_pairs,
            influence_map,
        }
    }

    /// Number of reviewer → author interactions behind the influence map.
    pub fn review_interactions(&self) -> usize {
        self.review_pairs.len()
    }

    /// One-line forecast text, or `None` when forecasting was disabled.
    pub fn forecast_line(&self) -> Option<String> {
        self.forecast.as_ref().map(ToString::to_string)
    }

    /// Message posted to Slack alongside the chart.
    pub fn slack_text(&self) -> String {
        let mut text = format!("*Dev Insight Report for `{}`*\n\n{}", self.repo, self.summary);
        if let Some(line) = self.forecast_line() {
            text.push_str(&format!("\n\n\u{1f4c8} {line}"));
        }
        text
    }

    /// Render the report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# Dev Insight Report: {}/{}\n\n", self.owner, self.repo);
        out.push_str(&format!("{}\n\n", self.summary));

        out.push_str("## Churn by author\n\n| Author | Churn |\n|---|---:|\n");
        for (author, total) in self.author_churn.iter() {
            out.push_str(&format!("| {author} | {total} |\n"));
        }
        out.push('\n');

        out.push_str("## Risky commits\n\n");
        if self.risk_flags.is_empty() {
            out.push_str("None.\n\n");
        } else {
            for flag in &self.risk_flags {
                out.push_str(&format!(
                    "- **{}** `{}`: {} lines, {} files\n",
                    flag.author, flag.timestamp, flag.total_churn, flag.files_changed
                ));
            }
            out.push('\n');
        }

        if let Some(line) = self.forecast_line() {
            out.push_str(&format!("## Forecast\n\n{line}\n"));
        }
        out
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dev Insight Report: {}/{}", self.owner, self.repo)?;
        writeln!(f, "==========================")?;
        writeln!(
            f,
            "Commits: {} | Authors: {} | Total churn: {} | Risky: {}\n",
            self.commit_count,
            self.author_churn.len(),
            self.author_churn.total(),
            self.risk_flags.len(),
        )?;
        writeln!(f, "{}\n", self.summary)?;

        writeln!(f, "Churn by author:")?;
        for (author, total) in self.author_churn.iter() {
            writeln!(f, "  {author:<20} {total:>8}")?;
        }

        if !self.risk_flags.is_empty() {
            writeln!(f, "\nRisky commits:")?;
            for flag in &self.risk_flags {
                writeln!(
                    f,
                    "  [RISK] {} {} (churn {}, files {})",
                    flag.timestamp, flag.author, flag.total_churn, flag.files_changed
                )?;
            }
        }

        if let Some(line) = self.forecast_line() {
            writeln!(f, "\n{line}")?;
        }
        if self.influence_map.is_some() {
            writeln!(f, "Review interactions mapped: {}", self.review_interactions())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(forecast: Option<ForecastOutcome>) -> Report {
        let mut churn = ChurnTotals::new();
        churn.add("alice", 250);
        churn.add("bob", 350);
        Report {
            owner: "acme".into(),
            repo: "widgets".into(),
            commit_count: 3,
            author_churn: churn,
            risk_flags: vec![RiskFlag {
                author: "bob".into(),
                total_churn: 350,
                files_changed: 10,
                timestamp: "2025-06-30T13:00:00Z".into(),
            }],
            summary: "Bob shipped a big refactor.".into(),
            chart: RenderedImage::svg("churn_chart.svg", "<svg/>".into()),
            forecast,
            review_pairs: vec![],
            influence_map: None,
        }
    }

    #[test]
    fn slack_text_has_title_summary_and_forecast() {
        let text = report(Some(ForecastOutcome::InsufficientData)).slack_text();
        assert!(text.starts_with("*Dev Insight Report for `widgets`*\n\nBob shipped"));
        assert!(text.ends_with("\u{1f4c8} Not enough data to forecast."));
    }

    #[test]
    fn slack_text_omits_disabled_forecast() {
        let text = report(None).slack_text();
        assert!(!text.contains('\u{1f4c8}'));
    }

    #[test]
    fn display_lists_authors_and_risks() {
        let text = report(None).to_string();
        assert!(text.contains("Total churn: 600"));
        assert!(text.contains("[RISK] 2025-06-30T13:00:00Z bob"));
    }

    #[test]
    fn markdown_has_churn_table() {
        let md = report(None).to_markdown();
        assert!(md.contains("# Dev Insight Report: acme/widgets"));
        assert!(md.contains("| alice | 250 |"));
        assert!(md.contains("- **bob**"));
        assert!(!md.contains("## Forecast"));
    }

    #[test]
    fn json_uses_camel_case_and_base64() {
        let json = serde_json::to_value(report(Some(ForecastOutcome::InsufficientData))).unwrap();
        assert_eq!(json["commitCount"], 3);
        assert_eq!(json["authorChurn"]["bob"], 350);
        assert_eq!(json["chart"]["base64"], "PHN2Zy8+");
        assert_eq!(json["forecast"]["status"], "insufficientData");
        assert!(json.get("influenceMap").is_none());
    }
}
