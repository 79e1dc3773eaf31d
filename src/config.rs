//! Configuration types for jira-slack-tools
//!
//! A [`Config`] is built once at startup from a TOML file plus environment overrides and is
//! then passed by reference into each procedure. Nothing reads the process environment after
//! that point.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Main configuration
///
/// Every section has defaults, so an empty file is a valid (if not very useful) config. Each
/// procedure checks the settings it needs with one of the `validate_*` methods.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Jira site and credentials
    #[serde(default)]
    pub jira: JiraConfig,

    /// Per-call HTTP timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Bulk export settings
    #[serde(default)]
    pub export: ExportConfig,

    /// Team report settings
    #[serde(default)]
    pub report: ReportConfig,

    /// Slack Web API settings
    #[serde(default)]
    pub slack: SlackConfig,
}

/// Jira Cloud site and credentials
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct JiraConfig {
    /// Site root, e.g. `https://example.atlassian.net` (env: `JIRA_BASE`)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Account e-mail for basic auth (env: `JIRA_EMAIL`)
    #[serde(default)]
    pub email: Option<String>,

    /// API token for basic auth (env: `JIRA_TOKEN`)
    #[serde(default)]
    pub api_token: Option<String>,

    /// Complete `Authorization` header value, used when no e-mail/token pair is set
    /// (env: `JIRA_AUTH_HEADER`)
    #[serde(default)]
    pub auth_header: Option<String>,
}

/// How requests to Jira are authenticated
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JiraAuth {
    /// HTTP basic auth with account e-mail and API token
    Basic {
        /// Account e-mail
        email: String,
        /// API token
        token: String,
    },
    /// Pre-built `Authorization` header value
    Header(String),
}

impl JiraConfig {
    /// Parsed site root
    pub fn base_url(&self) -> Result<Url> {
        let raw = self
            .base_url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::missing("jira.base_url"))?;

        Url::parse(raw.trim()).map_err(|e| Error::Config {
            message: format!("invalid Jira base URL '{raw}': {e}"),
            key: Some("jira.base_url".to_string()),
        })
    }

    /// Authentication mode, preferring basic auth when both are configured
    pub fn auth(&self) -> Result<JiraAuth> {
        match (non_empty(&self.email), non_empty(&self.api_token)) {
            (Some(email), Some(token)) => Ok(JiraAuth::Basic {
                email: email.to_string(),
                token: token.to_string(),
            }),
            (Some(_), None) => Err(Error::missing("jira.api_token")),
            (None, token) => match non_empty(&self.auth_header) {
                Some(header) => Ok(JiraAuth::Header(header.to_string())),
                None if token.is_some() => Err(Error::missing("jira.email")),
                None => Err(Error::missing("jira.api_token")),
            },
        }
    }
}

/// Per-call HTTP timeouts, in seconds
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Slack Web API and webhook calls (default: 30s)
    #[serde(default = "default_metadata_timeout", with = "duration_serde")]
    pub metadata: Duration,

    /// Jira search page requests (default: 180s)
    #[serde(default = "default_long_timeout", with = "duration_serde")]
    pub search: Duration,

    /// Attachment downloads (default: 180s)
    #[serde(default = "default_long_timeout", with = "duration_serde")]
    pub download: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            metadata: default_metadata_timeout(),
            search: default_long_timeout(),
            download: default_long_timeout(),
        }
    }
}

/// Retry behavior for transient failures
///
/// The wait after failed attempt `k` is `min(max_delay, initial_delay * backoff_multiplier^k)`
/// plus, with `jitter`, a random fraction of `initial_delay`. A server-provided `Retry-After`
/// replaces the computed wait.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, first call included (default: 8)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff unit; also the jitter range (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum computed delay between attempts (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl RetryConfig {
    /// Reject settings the backoff computation cannot use; `key` names this policy
    pub fn validate(&self, key: &str) -> Result<()> {
        let multiplier = self.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 0.0 {
            return Err(Error::Config {
                message: format!(
                    "backoff multiplier must be a non-negative number, got {multiplier}"
                ),
                key: Some(format!("{key}.backoff_multiplier")),
            });
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// A named saved query whose issues are exported together
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Display name; also the (sanitized) output folder name
    pub name: String,
    /// JQL expression selecting the board's issues
    pub jql: String,
}

/// Bulk export configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Root of the output tree (default: "./jira_backup")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Boards to export, in order
    #[serde(default)]
    pub boards: Vec<BoardConfig>,

    /// Fields requested from the search endpoint
    #[serde(default = "default_fields")]
    pub fields: Vec<String>,

    /// Issues per search page (default: 100)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Abort a board when the search still has a continuation token after this many pages
    /// (default: 5000)
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Attachment MIME types that are downloaded; everything else is ignored
    #[serde(default = "default_image_mime_types")]
    pub image_mime_types: Vec<String>,

    /// Lower bound of the random pause before each attachment (default: 0.2s)
    #[serde(default = "default_pace_min", with = "duration_serde")]
    pub pace_min: Duration,

    /// Upper bound of the random pause before each attachment (default: 0.5s)
    #[serde(default = "default_pace_max", with = "duration_serde")]
    pub pace_max: Duration,

    /// Retry policy for attachment downloads (default: 8 attempts)
    #[serde(default)]
    pub attachment_retry: RetryConfig,

    /// Retry policy for search page requests (default: a single attempt)
    #[serde(default = "default_page_retry")]
    pub page_retry: RetryConfig,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            boards: Vec::new(),
            fields: default_fields(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            image_mime_types: default_image_mime_types(),
            pace_min: default_pace_min(),
            pace_max: default_pace_max(),
            attachment_retry: RetryConfig::default(),
            page_retry: default_page_retry(),
        }
    }
}

/// The four JQL buckets of the team report
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReportQueries {
    /// Work in flight
    #[serde(default)]
    pub downstream: String,
    /// Work not yet committed
    #[serde(default)]
    pub upstream: String,
    /// Open risks, pending items and problems
    #[serde(default)]
    pub special: String,
    /// Production incidents in flight (a subset of downstream)
    #[serde(default)]
    pub incidents: String,
}

/// Team report configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Slack incoming webhook receiving the summary (env: `SLACK_WEBHOOK_URL`)
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Custom field holding the team (e.g. "customfield_11404")
    #[serde(default)]
    pub team_field: String,

    /// Human name of the team field, used in the fallback text (default: "Team")
    #[serde(default = "default_team_field_name")]
    pub team_field_name: String,

    /// Teams that are counted; values outside this list are ignored
    #[serde(default)]
    pub teams: Vec<String>,

    /// Queries for each bucket
    #[serde(default)]
    pub queries: ReportQueries,

    /// Header text of the Slack message
    #[serde(default = "default_report_title")]
    pub title: String,

    /// Optional link to the board, rendered under the header
    #[serde(default)]
    pub board_link: Option<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            team_field: String::new(),
            team_field_name: default_team_field_name(),
            teams: Vec::new(),
            queries: ReportQueries::default(),
            title: default_report_title(),
            board_link: None,
        }
    }
}

/// Naming and membership of the per-team channels
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelPlanConfig {
    /// Prefix of every channel name (default: "bkr_development_")
    #[serde(default = "default_channel_prefix")]
    pub prefix: String,

    /// Teams that get a pair of channels
    #[serde(default)]
    pub teams: Vec<String>,

    /// Suffix of the management channel (default: "-gestão")
    #[serde(default = "default_management_suffix")]
    pub management_suffix: String,

    /// Suffix of the operations channel (default: "-operação")
    #[serde(default = "default_operations_suffix")]
    pub operations_suffix: String,

    /// User IDs invited to every channel
    #[serde(default)]
    pub common_users: Vec<String>,

    /// User ID additionally invited to management channels
    #[serde(default)]
    pub management_extra_user: Option<String>,
}

impl Default for ChannelPlanConfig {
    fn default() -> Self {
        Self {
            prefix: default_channel_prefix(),
            teams: Vec::new(),
            management_suffix: default_management_suffix(),
            operations_suffix: default_operations_suffix(),
            common_users: Vec::new(),
            management_extra_user: None,
        }
    }
}

/// Slack Web API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Web API root (default: "https://slack.com/api")
    #[serde(default = "default_slack_api_base")]
    pub api_base: String,

    /// Bot token used to look up and archive channels (env: `SLACK_BOT_TOKEN`)
    #[serde(default)]
    pub bot_token: Option<String>,

    /// User token used to create channels and invite members (env: `SLACK_USER_TOKEN`)
    #[serde(default)]
    pub user_token: Option<String>,

    /// OAuth client ID (env: `SLACK_CLIENT_ID`)
    #[serde(default)]
    pub client_id: Option<String>,

    /// OAuth client secret (env: `SLACK_CLIENT_SECRET`)
    #[serde(default)]
    pub client_secret: Option<String>,

    /// OAuth authorization code (env: `SLACK_OAUTH_CODE`)
    #[serde(default)]
    pub oauth_code: Option<String>,

    /// OAuth redirect URI (env: `SLACK_REDIRECT_URI`)
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    /// Channel naming and membership
    #[serde(default)]
    pub channels: ChannelPlanConfig,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            api_base: default_slack_api_base(),
            bot_token: None,
            user_token: None,
            client_id: None,
            client_secret: None,
            oauth_code: None,
            redirect_uri: default_redirect_uri(),
            channels: ChannelPlanConfig::default(),
        }
    }
}

impl Config {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config {
            message: format!("invalid configuration: {e}"),
            key: None,
        })
    }

    /// Read and parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {e}", path.display()),
            key: None,
        })?;
        Self::from_toml_str(&content)
    }

    /// Override settings from environment-style variables
    ///
    /// `lookup` is normally `|k| std::env::var(k).ok()`; tests pass a map. Empty values are
    /// treated as unset.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("JIRA_BASE") {
            self.jira.base_url = Some(v);
        }
        if let Some(v) = get("JIRA_EMAIL") {
            self.jira.email = Some(v);
        }
        if let Some(v) = get("JIRA_TOKEN") {
            self.jira.api_token = Some(v);
        }
        if let Some(v) = get("JIRA_AUTH_HEADER") {
            self.jira.auth_header = Some(v);
        }
        if let Some(v) = get("SLACK_WEBHOOK_URL") {
            self.report.webhook_url = Some(v);
        }
        if let Some(v) = get("SLACK_BOT_TOKEN") {
            self.slack.bot_token = Some(v);
        }
        if let Some(v) = get("SLACK_USER_TOKEN") {
            self.slack.user_token = Some(v);
        }
        if let Some(v) = get("SLACK_CLIENT_ID") {
            self.slack.client_id = Some(v);
        }
        if let Some(v) = get("SLACK_CLIENT_SECRET") {
            self.slack.client_secret = Some(v);
        }
        if let Some(v) = get("SLACK_OAUTH_CODE") {
            self.slack.oauth_code = Some(v);
        }
        if let Some(v) = get("SLACK_REDIRECT_URI") {
            self.slack.redirect_uri = v;
        }
    }

    /// Check the settings the export needs
    pub fn validate_export(&self) -> Result<()> {
        self.jira.base_url()?;
        self.jira.auth()?;

        if self.export.boards.is_empty() {
            return Err(Error::Config {
                message: "at least one board must be configured".to_string(),
                key: Some("export.boards".to_string()),
            });
        }
        if let Some(board) = self.export.boards.iter().find(|b| b.jql.trim().is_empty()) {
            return Err(Error::Config {
                message: format!("board '{}' has an empty JQL", board.name),
                key: Some("export.boards.jql".to_string()),
            });
        }
        if self.export.page_size == 0 {
            return Err(Error::Config {
                message: "page size must be positive".to_string(),
                key: Some("export.page_size".to_string()),
            });
        }
        if self.export.max_pages == 0 {
            return Err(Error::Config {
                message: "max pages must be positive".to_string(),
                key: Some("export.max_pages".to_string()),
            });
        }
        if self.export.pace_min > self.export.pace_max {
            return Err(Error::Config {
                message: "pace_min must not exceed pace_max".to_string(),
                key: Some("export.pace_min".to_string()),
            });
        }
        self.export.attachment_retry.validate("export.attachment_retry")?;
        self.export.page_retry.validate("export.page_retry")?;
        Ok(())
    }

    /// Check the settings the team report needs
    ///
    /// The webhook is only required when the report is actually posted.
    pub fn validate_report(&self, require_webhook: bool) -> Result<()> {
        self.jira.base_url()?;
        self.jira.auth()?;

        if self.report.team_field.trim().is_empty() {
            return Err(Error::missing("report.team_field"));
        }
        if self.report.teams.is_empty() {
            return Err(Error::missing("report.teams"));
        }
        let queries = [
            ("report.queries.downstream", &self.report.queries.downstream),
            ("report.queries.upstream", &self.report.queries.upstream),
            ("report.queries.special", &self.report.queries.special),
            ("report.queries.incidents", &self.report.queries.incidents),
        ];
        if let Some((key, _)) = queries.iter().find(|(_, q)| q.trim().is_empty()) {
            return Err(Error::missing(key));
        }
        if require_webhook && non_empty(&self.report.webhook_url).is_none() {
            return Err(Error::missing("report.webhook_url"));
        }
        self.export.page_retry.validate("export.page_retry")?;
        Ok(())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Required non-empty string setting, or a configuration error naming `key`
pub fn require<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str> {
    non_empty(value).ok_or_else(|| Error::missing(key))
}

fn default_true() -> bool {
    true
}

fn default_metadata_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_long_timeout() -> Duration {
    Duration::from_secs(180)
}

fn default_max_attempts() -> u32 {
    8
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_page_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 1,
        ..RetryConfig::default()
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("jira_backup")
}

fn default_fields() -> Vec<String> {
    [
        "summary",
        "description",
        "issuetype",
        "status",
        "parent",
        "assignee",
        "reporter",
        "priority",
        "timeoriginalestimate",
        "timetracking",
        "created",
        "updated",
        "duedate",
        "comment",
        "attachment",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_page_size() -> u32 {
    100
}

fn default_max_pages() -> usize {
    5000
}

fn default_image_mime_types() -> Vec<String> {
    vec![
        "image/png".into(),
        "image/jpeg".into(),
        "image/jpg".into(),
        "image/gif".into(),
        "image/webp".into(),
    ]
}

fn default_pace_min() -> Duration {
    Duration::from_millis(200)
}

fn default_pace_max() -> Duration {
    Duration::from_millis(500)
}

fn default_team_field_name() -> String {
    "Team".into()
}

fn default_report_title() -> String {
    "Issue overview by team".into()
}

fn default_channel_prefix() -> String {
    "bkr_development_".into()
}

fn default_management_suffix() -> String {
    "-gestão".into()
}

fn default_operations_suffix() -> String {
    "-operação".into()
}

fn default_slack_api_base() -> String {
    "https://slack.com/api".into()
}

fn default_redirect_uri() -> String {
    "https://localhost:8123/callback".into()
}

// Durations are written as (possibly fractional) seconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
