//! Slack Web API client and message types
//!
//! Web API methods answer HTTP 200 with `{"ok": false, "error": "..."}` on failure; the
//! client turns those into [`Error::Slack`] so callers only deal with `Result`.

use crate::config::{SlackConfig, TimeoutConfig};
use crate::error::{Error, Result};
use crate::utils::{check_status, decode_json};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Block Kit layout types
pub mod blocks;
/// Channel planning, bulk creation and archival
pub mod channels;
/// Incoming webhooks
pub mod webhook;

pub use blocks::{Block, Text};
pub use channels::{ChannelKind, CreationSummary, PlannedChannel, plan_channels};
pub use webhook::{WebhookMessage, post_webhook};

/// Page size used when listing conversations
const LIST_PAGE_LIMIT: u32 = 1000;

/// A Slack conversation
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Channel {
    /// Conversation ID (e.g. `C0123456`)
    pub id: String,
    /// Channel name as Slack stored it (may differ from the requested one)
    pub name: String,
    /// Private channel flag
    #[serde(default)]
    pub is_private: bool,
    /// Archived flag
    #[serde(default)]
    pub is_archived: bool,
}

#[derive(Deserialize)]
struct ChannelResponse {
    channel: Channel,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    channels: Vec<Channel>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Result of `oauth.v2.access`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OAuthAccess {
    /// Bot access token
    #[serde(default)]
    pub access_token: Option<String>,
    /// Token type (usually "bot")
    #[serde(default)]
    pub token_type: Option<String>,
    /// Granted scopes
    #[serde(default)]
    pub scope: Option<String>,
    /// Bot user ID
    #[serde(default)]
    pub bot_user_id: Option<String>,
    /// Everything else Slack returned (team, authed_user, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Slack Web API client bound to one token
#[derive(Clone, Debug)]
pub struct SlackClient {
    http: reqwest::Client,
    api_base: String,
    token: Option<String>,
    timeout: Duration,
}

impl SlackClient {
    /// Create a client for `api_base` (normally `https://slack.com/api`)
    pub fn new(api_base: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Other(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
            timeout,
        })
    }

    /// Client using the configured API base and metadata timeout
    pub fn from_config(
        slack: &SlackConfig,
        token: Option<&str>,
        timeouts: &TimeoutConfig,
    ) -> Result<Self> {
        Self::new(
            &slack.api_base,
            token.map(str::to_string),
            timeouts.metadata,
        )
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.timeout(self.timeout);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a Web API request and decode the successful payload
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = check_status(request.send().await?).await?;
        let value: Value = decode_json(response, &format!("{method} response")).await?;

        if !value.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            let error = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error")
                .to_string();
            return Err(Error::Slack {
                method: method.to_string(),
                error,
            });
        }

        T::deserialize(value).map_err(|source| Error::Decode {
            context: format!("{method} response"),
            source,
        })
    }

    /// `conversations.create`
    pub async fn create_channel(&self, name: &str, is_private: bool) -> Result<Channel> {
        let method = "conversations.create";
        let request = self
            .authorized(self.http.post(self.method_url(method)))
            .json(&serde_json::json!({ "name": name, "is_private": is_private }));

        let response: ChannelResponse = self.call(method, request).await?;
        Ok(response.channel)
    }

    /// `conversations.invite`; inviting nobody is a no-op
    pub async fn invite(&self, channel_id: &str, user_ids: &[String]) -> Result<()> {
        if user_ids.is_empty() {
            return Ok(());
        }

        let method = "conversations.invite";
        let request = self
            .authorized(self.http.post(self.method_url(method)))
            .json(&serde_json::json!({ "channel": channel_id, "users": user_ids.join(",") }));

        let _: Value = self.call(method, request).await?;
        Ok(())
    }

    /// `conversations.archive`
    pub async fn archive(&self, channel_id: &str) -> Result<()> {
        let method = "conversations.archive";
        let request = self
            .authorized(self.http.post(self.method_url(method)))
            .json(&serde_json::json!({ "channel": channel_id }));

        let _: Value = self.call(method, request).await?;
        Ok(())
    }

    /// Walk `conversations.list` (non-archived, of the given `types`) looking for `name`
    pub async fn find_channel_by_name(&self, name: &str, types: &str) -> Result<Option<Channel>> {
        let method = "conversations.list";
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![
                ("exclude_archived", "true".to_string()),
                ("limit", LIST_PAGE_LIMIT.to_string()),
                ("types", types.to_string()),
            ];
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }

            let request = self
                .authorized(self.http.get(self.method_url(method)))
                .query(&query);
            let page: ListResponse = self.call(method, request).await?;

            if let Some(channel) = page.channels.into_iter().find(|c| c.name == name) {
                return Ok(Some(channel));
            }

            cursor = page
                .response_metadata
                .and_then(|m| m.next_cursor)
                .filter(|c| !c.is_empty());
            if cursor.is_none() {
                return Ok(None);
            }
        }
    }

    /// Exchange an OAuth authorization code (`oauth.v2.access`)
    pub async fn oauth_access(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<OAuthAccess> {
        let method = "oauth.v2.access";
        let request = self
            .http
            .post(self.method_url(method))
            .timeout(self.timeout)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ]);

        self.call(method, request).await
    }
}
