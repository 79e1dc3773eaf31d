//! Token-paginated issue search
//!
//! `POST /rest/api/3/search/jql` returns one page of issues plus, while more remain, an
//! opaque `nextPageToken`. The token is the only termination signal: a page without issues
//! but with a token is followed like any other.

use super::{Issue, JiraClient, SEARCH_PATH};
use crate::config::{ExportConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::utils::{check_status, decode_json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Paging behavior of a search
#[derive(Clone, Debug)]
pub struct SearchOptions {
    /// Issues requested per page
    pub page_size: u32,
    /// Pages after which a still-continuing search is treated as broken
    pub max_pages: usize,
    /// Retry policy applied to each page request
    pub retry: RetryConfig,
}

impl SearchOptions {
    /// Options used by the export
    pub fn from_export(export: &ExportConfig) -> Self {
        Self {
            page_size: export.page_size,
            max_pages: export.max_pages,
            retry: export.page_retry.clone(),
        }
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::from_export(&ExportConfig::default())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    jql: &'a str,
    max_results: u32,
    fields: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    next_page_token: Option<&'a str>,
}

/// One page of search results
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    /// Raw issue documents
    #[serde(default)]
    pub issues: Option<Vec<Value>>,
    /// Continuation token; absent (or empty) on the last page
    #[serde(default)]
    pub next_page_token: Option<String>,
    /// Informational last-page flag; not used for termination
    #[serde(default)]
    pub is_last: Option<bool>,
}

impl JiraClient {
    /// Fetch every issue matching `jql`, in server order
    ///
    /// # Errors
    /// - Network, HTTP and decode errors from any page (after the page retry policy gives up)
    /// - [`Error::PaginationOverflow`] when a token is still returned after
    ///   `options.max_pages` pages
    pub async fn search_all(
        &self,
        jql: &str,
        fields: &[String],
        options: &SearchOptions,
    ) -> Result<Vec<Issue>> {
        let mut issues = Vec::new();
        let mut next_token: Option<String> = None;
        let mut page = 0usize;

        loop {
            page += 1;
            let token = next_token.as_deref();
            let body = with_retry(&options.retry, "search page", move || {
                self.fetch_page(jql, fields, options.page_size, token)
            })
            .await?;

            let received = body.issues.unwrap_or_default();
            let count = received.len();
            for raw in received {
                issues.push(Issue::from_value(raw)?);
            }

            let token = body.next_page_token.filter(|t| !t.is_empty());
            tracing::debug!(
                page,
                received = count,
                total = issues.len(),
                has_next = token.is_some(),
                "fetched search page"
            );

            match token {
                None => break,
                Some(_) if page >= options.max_pages => {
                    tracing::error!(pages = page, jql, "search never stopped paginating");
                    return Err(Error::PaginationOverflow { pages: page });
                }
                Some(t) => next_token = Some(t),
            }
        }

        Ok(issues)
    }

    async fn fetch_page(
        &self,
        jql: &str,
        fields: &[String],
        page_size: u32,
        next_page_token: Option<&str>,
    ) -> Result<SearchPage> {
        let request = SearchRequest {
            jql,
            max_results: page_size,
            fields,
            next_page_token,
        };

        let response = self
            .post_json(SEARCH_PATH, self.search_timeout)
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;
        decode_json(response, "search page").await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{JiraConfig, TimeoutConfig};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

    /// Matches search requests that carry no continuation token (the first page)
    struct FirstPage;

    impl Match for FirstPage {
        fn matches(&self, request: &Request) -> bool {
            serde_json::from_slice::<Value>(&request.body)
                .map(|body| body.get("nextPageToken").is_none())
                .unwrap_or(false)
        }
    }

    fn client(server: &MockServer) -> JiraClient {
        let jira = JiraConfig {
            base_url: Some(server.uri()),
            email: Some("bot@example.com".into()),
            api_token: Some("token".into()),
            auth_header: None,
        };
        JiraClient::new(&jira, &TimeoutConfig::default()).unwrap()
    }

    fn issues(keys: &[&str]) -> Vec<Value> {
        keys.iter()
            .map(|k| json!({"key": k, "fields": {"summary": format!("summary {k}")}}))
            .collect()
    }

    fn fields() -> Vec<String> {
        vec!["summary".to_string(), "attachment".to_string()]
    }

    #[tokio::test]
    async fn follows_tokens_until_absent() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(SEARCH_PATH))
            .and(FirstPage)
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issues": issues(&["A-1", "A-2"]),
                "nextPageToken": "A"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(SEARCH_PATH))
            .and(body_partial_json(json!({"nextPageToken": "A"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issues": issues(&["A-3"]),
                "nextPageToken": "B"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(SEARCH_PATH))
            .and(body_partial_json(json!({"nextPageToken": "B"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issues": issues(&["A-4", "A-5"]),
                "isLast": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let found = client(&server)
            .search_all("project = A", &fields(), &SearchOptions::default())
            .await
            .unwrap();

        let keys: Vec<_> = found.iter().map(|i| i.key().to_string()).collect();
        assert_eq!(keys, vec!["A-1", "A-2", "A-3", "A-4", "A-5"]);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn sends_query_fields_and_page_size() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SEARCH_PATH))
            .and(body_partial_json(json!({
                "jql": "project = A ORDER BY Rank ASC",
                "maxResults": 25,
                "fields": ["summary", "attachment"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"issues": []})))
            .expect(1)
            .mount(&server)
            .await;

        let options = SearchOptions {
            page_size: 25,
            ..SearchOptions::default()
        };
        let found = client(&server)
            .search_all("project = A ORDER BY Rank ASC", &fields(), &options)
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn empty_page_with_token_keeps_going() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SEARCH_PATH))
            .and(FirstPage)
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issues": [],
                "nextPageToken": "next"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(SEARCH_PATH))
            .and(body_partial_json(json!({"nextPageToken": "next"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issues": issues(&["B-1"]),
                "nextPageToken": ""
            })))
            .mount(&server)
            .await;

        let found = client(&server)
            .search_all("project = B", &fields(), &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key(), "B-1");
    }

    #[tokio::test]
    async fn never_ending_token_chain_aborts_after_bound() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SEARCH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issues": [],
                "nextPageToken": "again"
            })))
            .expect(5000)
            .mount(&server)
            .await;

        let err = client(&server)
            .search_all("project = LOOP", &fields(), &SearchOptions::default())
            .await
            .unwrap_err();

        match err {
            Error::PaginationOverflow { pages } => assert_eq!(pages, 5000),
            other => panic!("expected PaginationOverflow, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn page_errors_propagate_without_retry_by_default() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SEARCH_PATH))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server)
            .search_all("project = A", &fields(), &SearchOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test]
    async fn page_retry_policy_is_applied_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SEARCH_PATH))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(SEARCH_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"issues": issues(&["C-1"])})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let options = SearchOptions {
            retry: RetryConfig {
                max_attempts: 3,
                initial_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(50),
                backoff_multiplier: 2.0,
                jitter: false,
            },
            ..SearchOptions::default()
        };

        let found = client(&server)
            .search_all("project = C", &fields(), &options)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn undecodable_page_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SEARCH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"issues": "oops"})))
            .mount(&server)
            .await;

        let err = client(&server)
            .search_all("project = A", &fields(), &SearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }
}
