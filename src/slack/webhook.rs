//! Incoming webhook messages

use super::blocks::Block;
use crate::error::Result;
use crate::utils::check_status;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Payload accepted by a Slack incoming webhook
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookMessage {
    /// Fallback text shown in notifications and by clients without Block Kit
    pub text: String,
    /// Optional rich layout
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Block>,
}

/// Post `message` to an incoming webhook
///
/// # Errors
/// Returns a network error, or [`crate::Error::Http`] when Slack rejects the payload
pub async fn post_webhook(
    http: &reqwest::Client,
    url: &str,
    message: &WebhookMessage,
    timeout: Duration,
) -> Result<()> {
    let response = http.post(url).json(message).timeout(timeout).send().await?;
    check_status(response).await?;
    tracing::info!(blocks = message.blocks.len(), "webhook message posted");
    Ok(())
}
