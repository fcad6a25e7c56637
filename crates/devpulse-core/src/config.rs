use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DevpulseError;

/// Top-level configuration loaded from `.devpulse.toml`.
///
/// Supports layered resolution: CLI flags > env vars > local config > defaults.
///
/// # Examples
///
/// ```
/// use devpulse_core::DevpulseConfig;
///
/// let config = DevpulseConfig::default();
/// assert_eq!(config.github.max_commits, 30);
/// assert_eq!(config.slack.channel, "#general");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevpulseConfig {
    /// LLM provider settings for narration.
    #[serde(default)]
    pub llm: LlmConfig,
    /// GitHub API settings.
    #[serde(default)]
    pub github: GitHubConfig,
    /// Slack delivery settings.
    #[serde(default)]
    pub slack: SlackConfig,
    /// Forecast history settings.
    #[serde(default)]
    pub forecast: ForecastConfig,
    /// Scheduled digest settings.
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl DevpulseConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DevpulseError::Io`] if the file cannot be read, or
    /// [`DevpulseError::Toml`] if the content is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, DevpulseError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`DevpulseError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use devpulse_core::DevpulseConfig;
    ///
    /// let toml = r#"
    /// [github]
    /// max_commits = 50
    /// "#;
    /// let config = DevpulseConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.github.max_commits, 50);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, DevpulseError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`DevpulseError::Config`] naming the first offending key.
    pub fn validate(&self) -> Result<(), DevpulseError> {
        self.forecast.validate()?;
        self.schedule.validate()
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Overlay values from an environment lookup.
    ///
    /// Environment values win over file values. Reads `LLM_DRIVER`, the
    /// provider API key (`GROQ_API_KEY` / `OPENAI_API_KEY`), `GITHUB_TOKEN`
    /// (or `GH_TOKEN`), `SLACK_BOT_TOKEN`, and `SLACK_CHANNEL_ID` (or
    /// `SLACK_CHANNEL`).
    ///
    /// # Examples
    ///
    /// ```
    /// use devpulse_core::DevpulseConfig;
    ///
    /// let mut config = DevpulseConfig::default();
    /// config.apply_env_with(|key| match key {
    ///     "LLM_DRIVER" => Some("openai".into()),
    ///     "OPENAI_API_KEY" => Some("sk-test".into()),
    ///     _ => None,
    /// });
    /// assert_eq!(config.llm.provider, "openai");
    /// assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
    /// ```
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(driver) = lookup("LLM_DRIVER") {
            self.llm.provider = driver.to_lowercase();
        }
        if let Some(var) = self.llm.api_key_env_var() {
            if let Some(key) = lookup(var) {
                self.llm.api_key = Some(key);
            }
        }
        if let Some(token) = lookup("GITHUB_TOKEN").or_else(|| lookup("GH_TOKEN")) {
            self.github.token = Some(token);
        }
        if let Some(token) = lookup("SLACK_BOT_TOKEN") {
            self.slack.bot_token = Some(token);
        }
        if let Some(channel) = lookup("SLACK_CHANNEL_ID").or_else(|| lookup("SLACK_CHANNEL")) {
            self.slack.channel = channel;
        }
    }
}

/// LLM provider configuration.
///
/// Every supported provider exposes an OpenAI-compatible chat completions
/// endpoint.
///
/// # Examples
///
/// ```
/// use devpulse_core::LlmConfig;
///
/// let config = LlmConfig::default();
/// assert_eq!(config.provider, "groq");
/// assert_eq!(config.resolved_model().unwrap(), "llama-3.1-8b-instant");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name (`"groq"`, `"openai"` or `"ollama"`).
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model identifier; the provider default is used when unset.
    pub model: Option<String>,
    /// API key for the provider.
    pub api_key: Option<String>,
    /// Custom base URL for API requests.
    pub base_url: Option<String>,
    /// Sampling temperature for narration.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_provider() -> String {
    "groq".into()
}

fn default_temperature() -> f64 {
    0.3
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
        }
    }
}

impl LlmConfig {
    /// Environment variable holding the API key for this provider.
    pub fn api_key_env_var(&self) -> Option<&'static str> {
        match self.provider.as_str() {
            "groq" => Some("GROQ_API_KEY"),
            "openai" => Some("OPENAI_API_KEY"),
            _ => None,
        }
    }

    /// Model to request, falling back to the provider default.
    ///
    /// # Errors
    ///
    /// Returns [`DevpulseError::Config`] for an unsupported provider.
    pub fn resolved_model(&self) -> Result<String, DevpulseError> {
        if let Some(model) = &self.model {
            return Ok(model.clone());
        }
        let model = match self.provider.as_str() {
            "groq" => "llama-3.1-8b-instant",
            "openai" => "gpt-4o",
            "ollama" => "llama3.1",
            other => return Err(unsupported_provider(other)),
        };
        Ok(model.into())
    }

    /// Base URL to send requests to, falling back to the provider default.
    ///
    /// # Errors
    ///
    /// Returns [`DevpulseError::Config`] for an unsupported provider.
    pub fn resolved_base_url(&self) -> Result<String, DevpulseError> {
        if let Some(url) = &self.base_url {
            return Ok(url.trim_end_matches('/').to_string());
        }
        let url = match self.provider.as_str() {
            "groq" => "https://api.groq.com/openai",
            "openai" => "https://api.openai.com",
            "ollama" => "http://localhost:11434",
            other => return Err(unsupported_provider(other)),
        };
        Ok(url.into())
    }
}

fn unsupported_provider(provider: &str) -> DevpulseError {
    DevpulseError::Config(format!(
        "unsupported LLM provider '{provider}' (expected groq, openai or ollama)"
    ))
}

/// GitHub API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Personal access token; anonymous requests are used when unset.
    pub token: Option<String>,
    /// API base URL for GitHub Enterprise installs.
    pub api_url: Option<String>,
    /// Number of recent commits to fetch (default: 30).
    #[serde(default = "default_max_commits")]
    pub max_commits: u32,
    /// Number of recent pull requests scanned for reviews (default: 20).
    #[serde(default = "default_max_pulls")]
    pub max_pulls: u32,
}

fn default_max_commits() -> u32 {
    30
}

fn default_max_pulls() -> u32 {
    20
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: None,
            max_commits: default_max_commits(),
            max_pulls: default_max_pulls(),
        }
    }
}

/// Slack delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot token (`xoxb-...`).
    pub bot_token: Option<String>,
    /// Channel name or ID. File uploads require a channel ID.
    #[serde(default = "default_channel")]
    pub channel: String,
}

fn default_channel() -> String {
    "#general".into()
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            channel: default_channel(),
        }
    }
}

/// Where the forecast stage gets its weekly history from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryMode {
    /// Bucket the fetched commits by week.
    #[default]
    Commits,
    /// Replay the run's total churn over equally spaced weeks (demo only).
    Synthetic,
}

/// Forecast configuration.
///
/// # Examples
///
/// ```
/// use devpulse_core::{ForecastConfig, HistoryMode};
///
/// let config = ForecastConfig::default();
/// assert_eq!(config.history, HistoryMode::Commits);
/// assert_eq!(config.synthetic_periods, 4);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// History source for the forecast stage.
    #[serde(default)]
    pub history: HistoryMode,
    /// Number of weeks replayed in synthetic mode (default: 4).
    #[serde(default = "default_synthetic_periods")]
    pub synthetic_periods: usize,
}

fn default_synthetic_periods() -> usize {
    4
}

/// Upper bound for `forecast.synthetic_periods` (ten years of weeks).
pub const MAX_SYNTHETIC_PERIODS: usize = 520;

impl ForecastConfig {
    /// Check that `synthetic_periods` is at most [`MAX_SYNTHETIC_PERIODS`].
    ///
    /// # Errors
    ///
    /// Returns [`DevpulseError::Config`] when it is larger.
    ///
    /// # Examples
    ///
    /// ```
    /// use devpulse_core::ForecastConfig;
    ///
    /// let config = ForecastConfig { synthetic_periods: 1_000_000, ..ForecastConfig::default() };
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), DevpulseError> {
        if self.synthetic_periods > MAX_SYNTHETIC_PERIODS {
            return Err(DevpulseError::Config(format!(
                "forecast.synthetic_periods is {}, the maximum is {MAX_SYNTHETIC_PERIODS}",
                self.synthetic_periods
            )));
        }
        Ok(())
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            history: HistoryMode::default(),
            synthetic_periods: default_synthetic_periods(),
        }
    }
}

/// Scheduled digest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Minutes between digest runs (default: one week).
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
}

fn default_interval_minutes() -> u64 {
    7 * 24 * 60
}

/// Upper bound for `schedule.interval_minutes` (one year).
pub const MAX_INTERVAL_MINUTES: u64 = 366 * 24 * 60;

impl ScheduleConfig {
    /// Check that `interval_minutes` is between 1 and [`MAX_INTERVAL_MINUTES`].
    ///
    /// # Errors
    ///
    /// Returns [`DevpulseError::Config`] when it is out of range.
    pub fn validate(&self) -> Result<(), DevpulseError> {
        if !(1..=MAX_INTERVAL_MINUTES).contains(&self.interval_minutes) {
            return Err(DevpulseError::Config(format!(
                "schedule.interval_minutes is {}, expected 1 to {MAX_INTERVAL_MINUTES}",
                self.interval_minutes
            )));
        }
        Ok(())
    }

    /// Time between runs.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
        }
    }
}
