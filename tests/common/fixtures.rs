//! Jira search and attachment fixtures served by wiremock

use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Search endpoint path
pub const SEARCH_PATH: &str = "/rest/api/3/search/jql";

/// Minimal PNG signature, enough for byte comparisons
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfixture";

/// Attachment descriptor served from `<server>/attachments/<id>`
pub fn attachment(server: &MockServer, id: &str, filename: &str, mime: &str) -> Value {
    json!({
        "id": id,
        "filename": filename,
        "mimeType": mime,
        "size": PNG_BYTES.len(),
        "content": format!("{}/attachments/{id}", server.uri()),
    })
}

/// Issue document in the shape the search endpoint returns
pub fn issue(key: &str, summary: &str, attachments: Vec<Value>) -> Value {
    json!({
        "id": key.replace('-', ""),
        "key": key,
        "fields": {
            "summary": summary,
            "issuetype": {"name": "Story"},
            "status": {"name": "In Progress"},
            "attachment": attachments,
        }
    })
}

/// Serve `issues` for `jql` as a single page
pub async fn mount_board(server: &MockServer, jql: &str, issues: Vec<Value>) {
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .and(body_partial_json(json!({"jql": jql})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issues": issues,
            "isLast": true
        })))
        .mount(server)
        .await;
}

/// Serve an attachment body, expecting exactly `times` requests
pub async fn mount_attachment(server: &MockServer, id: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/attachments/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG_BYTES))
        .expect(times)
        .named(format!("attachment {id}"))
        .mount(server)
        .await;
}
