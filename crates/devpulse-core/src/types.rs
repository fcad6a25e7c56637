use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DevpulseError;

/// Author key used for commits that carry no author identity.
pub const UNATTRIBUTED_AUTHOR: &str = "unknown";

fn unattributed() -> String {
    UNATTRIBUTED_AUTHOR.to_string()
}

fn author_or_unattributed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let author: Option<String> = Option::deserialize(deserializer)?;
    Ok(match author {
        Some(name) if !name.trim().is_empty() => name,
        _ => unattributed(),
    })
}

/// Metadata for a single commit, as produced by a commit source.
///
/// Line and file counts are unsigned, so the non-negativity invariant holds by
/// construction. A missing or `null` author deserializes to
/// [`UNATTRIBUTED_AUTHOR`]; missing counts default to zero.
///
/// # Examples
///
/// ```
/// use devpulse_core::CommitRecord;
///
/// let commit: CommitRecord = serde_json::from_str(
///     r#"{"author": "alice", "additions": 120, "deletions": 30, "timestamp": "2025-06-30T12:00:00Z"}"#,
/// ).unwrap();
/// assert_eq!(commit.total_churn(), 150);
/// assert_eq!(commit.files_changed, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Author identifier (login or name).
    #[serde(default = "unattributed", deserialize_with = "author_or_unattributed")]
    pub author: String,
    /// Lines added.
    #[serde(default)]
    pub additions: u64,
    /// Lines deleted.
    #[serde(default)]
    pub deletions: u64,
    /// Number of files touched.
    #[serde(default)]
    pub files_changed: u64,
    /// ISO-8601 commit timestamp.
    pub timestamp: String,
}

impl CommitRecord {
    /// Lines added plus lines deleted, saturating at `u64::MAX`.
    ///
    /// [`CommitRecord::validate`] rejects records where the sum does not fit.
    pub fn total_churn(&self) -> u64 {
        self.additions.saturating_add(self.deletions)
    }

    /// Parse the commit timestamp as an RFC 3339 instant.
    ///
    /// # Errors
    ///
    /// Returns [`DevpulseError::Validation`] if the timestamp is not RFC 3339.
    ///
    /// # Examples
    ///
    /// ```
    /// use devpulse_core::CommitRecord;
    ///
    /// let commit = CommitRecord {
    ///     author: "bob".into(),
    ///     additions: 1,
    ///     deletions: 0,
    ///     files_changed: 1,
    ///     timestamp: "2025-06-30T13:00:00Z".into(),
    /// };
    /// assert_eq!(commit.parsed_timestamp().unwrap().to_rfc3339(), "2025-06-30T13:00:00+00:00");
    /// ```
    pub fn parsed_timestamp(&self) -> Result<DateTime<Utc>, DevpulseError> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| {
                DevpulseError::Validation(format!(
                    "commit by '{}' has invalid timestamp '{}': {e}",
                    self.author, self.timestamp
                ))
            })
    }

    /// Check the record against the commit contract.
    ///
    /// # Errors
    ///
    /// Returns [`DevpulseError::Validation`] for an unparseable timestamp or
    /// when `additions + deletions` overflows `u64`.
    pub fn validate(&self) -> Result<(), DevpulseError> {
        if self.additions.checked_add(self.deletions).is_none() {
            return Err(DevpulseError::Validation(format!(
                "commit by '{}' at {} has churn beyond u64 ({} additions, {} deletions)",
                self.author, self.timestamp, self.additions, self.deletions
            )));
        }
        self.parsed_timestamp().map(|_| ())
    }
}

/// Accumulated churn per author.
///
/// Backed by an ordered map so renderings are deterministic; the order has no
/// meaning beyond that.
///
/// # Examples
///
/// ```
/// use devpulse_core::ChurnTotals;
///
/// let mut totals = ChurnTotals::new();
/// totals.add("alice", 150);
/// totals.add("alice", 100);
/// totals.add("bob", 350);
/// assert_eq!(totals.get("alice"), Some(250));
/// assert_eq!(totals.total(), 600);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChurnTotals(BTreeMap<String, u64>);

impl ChurnTotals {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `churn` to `author`, starting unseen authors at zero.
    ///
    /// Saturates at `u64::MAX`.
    pub fn add(&mut self, author: &str, churn: u64) {
        let entry = self.0.entry(author.to_string()).or_insert(0);
        *entry = entry.saturating_add(churn);
    }

    /// Churn recorded for `author`.
    pub fn get(&self, author: &str) -> Option<u64> {
        self.0.get(author).copied()
    }

    /// Sum of churn over all authors, saturating at `u64::MAX`.
    pub fn total(&self) -> u64 {
        self.0.values().fold(0, |acc, churn| acc.saturating_add(*churn))
    }

    /// Number of distinct authors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no author has been recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(author, churn)` pairs in author order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(author, churn)| (author.as_str(), *churn))
    }
}

impl FromIterator<(String, u64)> for ChurnTotals {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        let mut totals = ChurnTotals::new();
        for (author, churn) in iter {
            totals.add(&author, churn);
        }
        totals
    }
}

/// A commit that exceeded the churn or file-count threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFlag {
    /// Author of the flagged commit.
    pub author: String,
    /// Lines added plus deleted in the commit.
    pub total_churn: u64,
    /// Files touched by the commit.
    pub files_changed: u64,
    /// Timestamp of the commit.
    pub timestamp: String,
}

/// Per-author totals and risk flags computed in one pass over the commits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChurnAnalysis {
    /// Churn per author.
    pub author_churn: ChurnTotals,
    /// Risky commits in input order.
    pub risk_flags: Vec<RiskFlag>,
}

/// Total churn for one weekly period.
///
/// Accepts `periodStart`, `period_start` or `week_start` for the date field.
///
/// # Examples
///
/// ```
/// use devpulse_core::ChurnPoint;
///
/// let points: Vec<ChurnPoint> = serde_json::from_str(
///     r#"[{"week_start": "2024-06-01", "total_churn": 100}]"#,
/// ).unwrap();
/// assert_eq!(points[0].total_churn, 100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChurnPoint {
    /// First day of the period.
    #[serde(alias = "period_start", alias = "week_start")]
    pub period_start: NaiveDate,
    /// Churn observed during the period.
    #[serde(alias = "total_churn")]
    pub total_churn: u64,
}

/// How a forecast value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastMethod {
    /// Least-squares trend line.
    Trend,
    /// Zero-slope fallback for a degenerate history (all points on one date).
    Flat,
}

/// A next-period churn point forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
    /// Start of the forecast period (last observed period + 7 days).
    pub forecast_period_start: NaiveDate,
    /// Projected churn, rounded to two decimals.
    pub forecast_churn: f64,
    /// Fitted slope in churn per day.
    pub slope: f64,
    /// Fitted intercept at the first observed period.
    pub intercept: f64,
    /// Whether the value came from the trend line or the flat fallback.
    pub method: ForecastMethod,
}

/// Result of a forecast request.
///
/// # Examples
///
/// ```
/// use devpulse_core::ForecastOutcome;
///
/// assert_eq!(ForecastOutcome::InsufficientData.to_string(), "Not enough data to forecast.");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ForecastOutcome {
    /// A projected value.
    Forecast(Forecast),
    /// Fewer than two historical points were supplied.
    InsufficientData,
}

impl ForecastOutcome {
    /// The forecast, if one could be computed.
    pub fn forecast(&self) -> Option<&Forecast> {
        match self {
            ForecastOutcome::Forecast(f) => Some(f),
            ForecastOutcome::InsufficientData => None,
        }
    }
}

impl fmt::Display for ForecastOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForecastOutcome::Forecast(fc) => write!(
                f,
                "Next week churn: {:.2} (Week of {})",
                fc.forecast_churn,
                fc.forecast_period_start.format("%Y-%m-%d")
            ),
            ForecastOutcome::InsufficientData => write!(f, "Not enough data to forecast."),
        }
    }
}

/// A code-review interaction: `reviewer` reviewed a pull request by `author`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewPair {
    /// Reviewer login.
    pub reviewer: String,
    /// Pull request author login.
    pub author: String,
}

fn serialize_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
}

/// Encoded image bytes produced by a renderer.
///
/// Serializes with the bytes base64-encoded.
///
/// # Examples
///
/// ```
/// use devpulse_core::RenderedImage;
///
/// let image = RenderedImage::svg("chart.svg", "<svg/>".into());
/// assert_eq!(image.mime_type, "image/svg+xml");
/// assert_eq!(image.to_base64(), "PHN2Zy8+");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedImage {
    /// Suggested file name, including extension.
    pub filename: String,
    /// MIME type of `bytes`.
    pub mime_type: String,
    /// Encoded image content.
    #[serde(rename = "base64", serialize_with = "serialize_base64")]
    pub bytes: Vec<u8>,
}

impl RenderedImage {
    /// Wrap an SVG document.
    pub fn svg(filename: impl Into<String>, document: String) -> Self {
        Self {
            filename: filename.into(),
            mime_type: "image/svg+xml".into(),
            bytes: document.into_bytes(),
        }
    }

    /// Base64 encoding of the image bytes.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }
}

/// The five stages of a report run, in execution order.
///
/// # Examples
///
/// ```
/// use devpulse_core::PipelineStage;
///
/// assert_eq!(PipelineStage::ALL[0], PipelineStage::Fetch);
/// assert_eq!(PipelineStage::MapInfluence.to_string(), "map_influence");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Retrieve commit records.
    Fetch,
    /// Aggregate churn and flag risky commits.
    AggregateAndClassify,
    /// Produce the narrative summary and churn chart.
    NarrateAndChart,
    /// Extrapolate next-period churn.
    Forecast,
    /// Render the reviewer influence map.
    MapInfluence,
}

impl PipelineStage {
    /// All stages in execution order.
    pub const ALL: [PipelineStage; 5] = [
        PipelineStage::Fetch,
        PipelineStage::AggregateAndClassify,
        PipelineStage::NarrateAndChart,
        PipelineStage::Forecast,
        PipelineStage::MapInfluence,
    ];
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Fetch => "fetch",
            PipelineStage::AggregateAndClassify => "aggregate_and_classify",
            PipelineStage::NarrateAndChart => "narrate_and_chart",
            PipelineStage::Forecast => "forecast",
            PipelineStage::MapInfluence => "map_influence",
        };
        f.write_str(name)
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use devpulse_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summary.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(author: &str, additions: u64, deletions: u64, files: u64) -> CommitRecord {
        CommitRecord {
            author: author.into(),
            additions,
            deletions,
            files_changed: files,
            timestamp: "2025-06-30T12:00:00Z".into(),
        }
    }

    #[test]
    fn missing_counts_default_to_zero() {
        let c: CommitRecord =
            serde_json::from_str(r#"{"author":"alice","timestamp":"2025-06-30T12:00:00Z"}"#)
                .unwrap();
        assert_eq!(c.additions, 0);
        assert_eq!(c.deletions, 0);
        assert_eq!(c.files_changed, 0);
    }

    #[test]
    fn null_or_missing_author_is_unattributed() {
        let null: CommitRecord =
            serde_json::from_str(r#"{"author":null,"timestamp":"2025-06-30T12:00:00Z"}"#).unwrap();
        let missing: CommitRecord =
            serde_json::from_str(r#"{"timestamp":"2025-06-30T12:00:00Z"}"#).unwrap();
        assert_eq!(null.author, UNATTRIBUTED_AUTHOR);
        assert_eq!(missing.author, UNATTRIBUTED_AUTHOR);
    }

    #[test]
    fn negative_counts_are_rejected() {
        let result: Result<CommitRecord, _> = serde_json::from_str(
            r#"{"author":"a","additions":-1,"timestamp":"2025-06-30T12:00:00Z"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_bad_timestamp() {
        let mut c = commit("alice", 1, 1, 1);
        assert!(c.validate().is_ok());
        c.timestamp = "last tuesday".into();
        let err = c.validate().unwrap_err();
        assert!(matches!(err, DevpulseError::Validation(_)));
    }

    #[test]
    fn validate_rejects_overflowing_churn() {
        let c: CommitRecord = serde_json::from_str(
            r#"{"author":"a","additions":18446744073709551615,"deletions":1,"files_changed":1,"timestamp":"2025-06-30T12:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(c.total_churn(), u64::MAX);
        let err = c.validate().unwrap_err();
        assert!(matches!(err, DevpulseError::Validation(_)));
        assert!(err.to_string().contains("beyond u64"));
    }

    #[test]
    fn churn_totals_saturate() {
        let mut totals = ChurnTotals::new();
        totals.add("a", u64::MAX);
        totals.add("a", 1);
        totals.add("b", 5);
        assert_eq!(totals.get("a"), Some(u64::MAX));
        assert_eq!(totals.total(), u64::MAX);
    }

    #[test]
    fn churn_totals_from_iter_accumulates() {
        let totals: ChurnTotals = vec![("a".to_string(), 1), ("b".to_string(), 2), ("a".to_string(), 3)]
            .into_iter()
            .collect();
        assert_eq!(totals.get("a"), Some(4));
        assert_eq!(totals.len(), 2);
        assert_eq!(totals.total(), 6);
    }

    #[test]
    fn churn_totals_serializes_as_plain_map() {
        let mut totals = ChurnTotals::new();
        totals.add("alice", 250);
        let json = serde_json::to_value(&totals).unwrap();
        assert_eq!(json, serde_json::json!({"alice": 250}));
    }

    #[test]
    fn risk_flag_serializes_camel_case() {
        let flag = RiskFlag {
            author: "bob".into(),
            total_churn: 350,
            files_changed: 10,
            timestamp: "2025-06-30T13:00:00Z".into(),
        };
        let json = serde_json::to_value(&flag).unwrap();
        assert!(json.get("totalChurn").is_some());
        assert!(json.get("total_churn").is_none());
    }

    #[test]
    fn forecast_outcome_display() {
        let outcome = ForecastOutcome::Forecast(Forecast {
            forecast_period_start: NaiveDate::from_ymd_opt(2024, 6, 29).unwrap(),
            forecast_churn: 400.0,
            slope: 100.0 / 7.0,
            intercept: 100.0,
            method: ForecastMethod::Trend,
        });
        assert_eq!(outcome.to_string(), "Next week churn: 400.00 (Week of 2024-06-29)");
        assert!(outcome.forecast().is_some());
        assert!(ForecastOutcome::InsufficientData.forecast().is_none());
    }

    #[test]
    fn forecast_outcome_is_tagged() {
        let json = serde_json::to_value(ForecastOutcome::InsufficientData).unwrap();
        assert_eq!(json["status"], "insufficientData");
    }

    #[test]
    fn rendered_image_serializes_base64() {
        let image = RenderedImage::svg("a.svg", "hi".into());
        let json = serde_json::to_value(&image).unwrap();
        assert_eq!(json["base64"], "aGk=");
        assert_eq!(json["mimeType"], "image/svg+xml");
    }

    #[test]
    fn pipeline_stages_are_ordered() {
        let mut sorted = PipelineStage::ALL;
        sorted.sort();
        assert_eq!(sorted, PipelineStage::ALL);
    }

    #[test]
    fn output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn total_churn_adds_both_sides() {
        assert_eq!(commit("a", 200, 150, 10).total_churn(), 350);
    }
}
