//! Jira Cloud REST client
//!
//! Holds the HTTP client, the site root and the credentials. The search endpoint lives in
//! [`search`], the response schemas in [`types`].

use crate::config::{JiraAuth, JiraConfig, TimeoutConfig};
use crate::error::{Error, Result};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use std::time::Duration;
use url::Url;

/// Paginated issue search
pub mod search;
/// Issue and attachment schemas
pub mod types;

pub use search::SearchOptions;
pub use types::{Attachment, Issue, IssueFields};

/// Path of the token-paginated ("enhanced") search endpoint
pub const SEARCH_PATH: &str = "/rest/api/3/search/jql";

/// Authenticated client for one Jira site
#[derive(Clone, Debug)]
pub struct JiraClient {
    http: reqwest::Client,
    base_url: Url,
    auth: JiraAuth,
    search_timeout: Duration,
}

impl JiraClient {
    /// Create a client from configuration
    ///
    /// # Errors
    /// Returns a configuration error if the base URL or credentials are missing, or an error
    /// if the HTTP client cannot be built
    pub fn new(jira: &JiraConfig, timeouts: &TimeoutConfig) -> Result<Self> {
        let base_url = jira.base_url()?;
        let auth = jira.auth()?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("jira-slack-tools/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            auth,
            search_timeout: timeouts.search,
        })
    }

    /// Site root this client talks to
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL of an API path such as [`SEARCH_PATH`]
    ///
    /// The path is appended to the configured root, so a root with a path prefix (a proxy,
    /// a mock server) keeps it.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    /// GET request for binary content (attachment bodies) with credentials attached
    pub(crate) fn get_binary(&self, url: &str, timeout: Duration) -> reqwest::RequestBuilder {
        self.authorize(self.http.get(url))
            .header(ACCEPT, "*/*")
            .timeout(timeout)
    }

    /// POST request with a JSON body against the API
    pub(crate) fn post_json(&self, path: &str, timeout: Duration) -> reqwest::RequestBuilder {
        self.authorize(self.http.post(self.endpoint(path)))
            .header(ACCEPT, "application/json")
            .timeout(timeout)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            JiraAuth::Basic { email, token } => request.basic_auth(email, Some(token)),
            JiraAuth::Header(value) => request.header(AUTHORIZATION, value),
        }
    }
}
