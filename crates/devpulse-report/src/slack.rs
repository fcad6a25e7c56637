//! Slack Web API delivery.

use std::time::Duration;

use async_trait::async_trait;
use devpulse_core::services::DeliveryChannel;
use devpulse_core::{DevpulseError, RenderedImage, SlackConfig};
use serde::Deserialize;

const DEFAULT_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    upload_url: Option<String>,
    #[serde(default)]
    file_id: Option<String>,
}

/// Posts reports to a Slack channel with a bot token.
///
/// Text-only posts use `chat.postMessage`. Posts with an image go through
/// the external upload flow (`files.getUploadURLExternal`, raw upload,
/// `files.completeUploadExternal`) with the text as the initial comment. That
/// flow needs a channel ID; for a `#name` channel the image is dropped and
/// the text goes through `chat.postMessage`.
///
/// # Examples
///
/// ```
/// use devpulse_core::SlackConfig;
/// use devpulse_report::slack::SlackChannel;
///
/// let config = SlackConfig {
///     bot_token: Some("xoxb-test".into()),
///     channel: "C0123456".into(),
/// };
/// let channel = SlackChannel::new(&config).unwrap();
/// assert_eq!(channel.channel(), "C0123456");
/// ```
pub struct SlackChannel {
    client: reqwest::Client,
    api_base: String,
    token: String,
    channel: String,
}

impl SlackChannel {
    /// Create a channel from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DevpulseError::Config`] if no bot token is configured.
    pub fn new(config: &SlackConfig) -> Result<Self, DevpulseError> {
        let token = config.bot_token.clone().ok_or_else(|| {
            DevpulseError::Config(
                "SLACK_BOT_TOKEN not set. Export it or set slack.bot_token in .devpulse.toml"
                    .into(),
            )
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| DevpulseError::Delivery(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            token,
            channel: config.channel.clone(),
        })
    }

    /// Send requests to a different Web API root.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Whether the configured channel is a conversation ID such as `C0123456`.
    pub fn has_channel_id(&self) -> bool {
        is_channel_id(&self.channel)
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }

    async fn post_message(&self, text: &str) -> Result<(), DevpulseError> {
        let body = serde_json::json!({ "channel": self.channel, "text": text });
        let response = self
            .client
            .post(self.url("chat.postMessage"))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| DevpulseError::Delivery(format!("chat.postMessage failed: {e}")))?;
        read_response("chat.postMessage", response).await.map(|_| ())
    }

    async fn upload_file(&self, text: &str, image: &RenderedImage) -> Result<(), DevpulseError> {
        let length = image.bytes.len().to_string();
        let response = self
            .client
            .post(self.url("files.getUploadURLExternal"))
            .bearer_auth(&self.token)
            .form(&[("filename", image.filename.as_str()), ("length", length.as_str())])
            .send()
            .await
            .map_err(|e| {
                DevpulseError::Delivery(format!("files.getUploadURLExternal failed: {e}"))
            })?;
        let ticket = read_response("files.getUploadURLExternal", response).await?;
        let (Some(upload_url), Some(file_id)) = (ticket.upload_url, ticket.file_id) else {
            return Err(DevpulseError::Delivery(
                "files.getUploadURLExternal returned no upload_url or file_id".into(),
            ));
        };

        let upload = self
            .client
            .post(&upload_url)
            .header("Content-Type", image.mime_type.as_str())
            .body(image.bytes.clone())
            .send()
            .await
            .map_err(|e| DevpulseError::Delivery(format!("file upload failed: {e}")))?;
        if !upload.status().is_success() {
            return Err(DevpulseError::Delivery(format!(
                "file upload returned {}",
                upload.status()
            )));
        }

        let body = serde_json::json!({
            "files": [{ "id": file_id, "title": "Developer Productivity Report" }],
            "channel_id": self.channel,
            "initial_comment": text,
        });
        let response = self
            .client
            .post(self.url("files.completeUploadExternal"))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                DevpulseError::Delivery(format!("files.completeUploadExternal failed: {e}"))
            })?;
        read_response("files.completeUploadExternal", response).await?;
        tracing::info!(file_id = %file_id, channel = %self.channel, "uploaded report image");
        Ok(())
    }
}

fn is_channel_id(channel: &str) -> bool {
    channel.len() > 1
        && channel.starts_with(['C', 'G', 'D'])
        && channel
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

async fn read_response(
    method: &str,
    response: reqwest::Response,
) -> Result<SlackResponse, DevpulseError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DevpulseError::Delivery(format!(
            "{method} returned {status}: {body}"
        )));
    }
    let parsed: SlackResponse = response
        .json()
        .await
        .map_err(|e| DevpulseError::Delivery(format!("{method}: unreadable response: {e}")))?;
    check_ok(method, parsed)
}

fn check_ok(method: &str, response: SlackResponse) -> Result<SlackResponse, DevpulseError> {
    if response.ok {
        Ok(response)
    } else {
        Err(DevpulseError::Delivery(format!(
            "{method}: {}",
            response.error.as_deref().unwrap_or("unknown_error")
        )))
    }
}

#[async_trait]
impl DeliveryChannel for SlackChannel {
    async fn post(&self, text: &str, image: Option<&RenderedImage>) -> Result<(), DevpulseError> {
        match image {
            Some(image) if self.has_channel_id() => self.upload_file(text, image).await?,
            Some(image) => {
                tracing::warn!(
                    channel = %self.channel,
                    file = %image.filename,
                    "image uploads need a channel ID (SLACK_CHANNEL_ID); posting text only"
                );
                self.post_message(text).await?;
            }
            None => self.post_message(text).await?,
        }
        tracing::info!(channel = %self.channel, "delivered report to Slack");
        Ok(())
    }
}
