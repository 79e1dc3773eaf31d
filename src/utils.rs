//! Utility functions for path naming, HTTP status handling and JSON output

use crate::error::{Error, Result};
use crate::retry::parse_retry_after;
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::OnceLock;

/// Longest file or folder name produced by [`safe_name`], in characters
pub const MAX_NAME_CHARS: usize = 120;

/// Name used when sanitizing leaves nothing
pub const FALLBACK_NAME: &str = "unnamed";

/// Characters kept in body previews attached to errors
const BODY_PREVIEW_CHARS: usize = 300;

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Word characters (Unicode), dash, dot, parentheses, brackets and space survive
        #[allow(clippy::expect_used)]
        Regex::new(r"[^\w\-.()\[\] ]+").expect("static pattern is valid")
    })
}

/// Turn an arbitrary label into a file or folder name
///
/// Runs of disallowed characters become `_`, surrounding whitespace is trimmed and the
/// result is capped at [`MAX_NAME_CHARS`] characters. Returns [`FALLBACK_NAME`] when nothing
/// usable remains.
///
/// # Examples
///
/// ```
/// use jira_slack_tools::utils::safe_name;
///
/// assert_eq!(safe_name("Board 1 - EUR - Conta Digital"), "Board 1 - EUR - Conta Digital");
/// assert_eq!(safe_name("a/b:c"), "a_b_c");
/// assert_eq!(safe_name("   "), "unnamed");
/// ```
pub fn safe_name(label: &str) -> String {
    let replaced = unsafe_chars().replace_all(label, "_");
    let capped: String = replaced.trim().chars().take(MAX_NAME_CHARS).collect();
    if capped.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        capped
    }
}

/// First few hundred characters of a response body, for log lines and errors
pub fn body_preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

/// Pass successful responses through; turn anything else into [`Error::Http`]
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let retry_after = parse_retry_after(response.headers());
    let body = response.text().await.unwrap_or_default();

    Err(Error::Http {
        status: status.as_u16(),
        url,
        body: body_preview(&body),
        retry_after,
    })
}

/// Decode a JSON response body into `T`, reporting schema mismatches as [`Error::Decode`]
pub(crate) async fn decode_json<T>(response: reqwest::Response, context: &str) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|source| Error::Decode {
        context: context.to_string(),
        source,
    })
}

/// Write `value` as pretty-printed UTF-8 JSON, creating parent directories as needed
pub fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut content = serde_json::to_vec_pretty(value)?;
    content.push(b'\n');
    std::fs::write(path, content)?;
    Ok(())
}

/// Path of `path` relative to `root`, with forward slashes
///
/// Falls back to the full path when `path` is not under `root`.
pub fn relative_display(path: &Path, root: &Path) -> String {
    let Ok(relative) = path.strip_prefix(root) else {
        return path.display().to_string();
    };
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn safe_name_keeps_allowed_characters() {
        assert_eq!(safe_name("EUR-1234"), "EUR-1234");
        assert_eq!(
            safe_name("Board 4 - EUR - Cartão Benefício"),
            "Board 4 - EUR - Cartão Benefício"
        );
        assert_eq!(safe_name("shot (1) [final].png"), "shot (1) [final].png");
    }

    #[test]
    fn safe_name_collapses_runs_of_disallowed_characters() {
        assert_eq!(safe_name("a//b"), "a_b");
        assert_eq!(safe_name("what?*:<>|now"), "what_now");
        assert_eq!(safe_name("  padded  "), "padded");
    }

    #[test]
    fn safe_name_caps_length_in_characters() {
        let long = "é".repeat(300);
        let name = safe_name(&long);
        assert_eq!(name.chars().count(), MAX_NAME_CHARS);
    }

    #[test]
    fn safe_name_falls_back_when_empty() {
        assert_eq!(safe_name(""), FALLBACK_NAME);
        assert_eq!(safe_name("    "), FALLBACK_NAME);
    }

    #[test]
    fn body_preview_truncates_on_char_boundary() {
        let body = "ã".repeat(1000);
        assert_eq!(body_preview(&body).chars().count(), 300);
        assert_eq!(body_preview("short"), "short");
    }

    #[test]
    fn write_json_pretty_creates_parents_and_keeps_unicode() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a").join("b").join("doc.json");

        write_json_pretty(&path, &serde_json::json!({"name": "Empréstimos"})).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("Empréstimos"), "non-ASCII stays unescaped");
        assert!(written.contains("\n  \"name\""), "pretty printed");
    }

    #[test]
    fn relative_display_uses_forward_slashes() {
        let root = Path::new("/out");
        assert_eq!(
            relative_display(&root.join("Board").join("KEY-1"), root),
            "Board/KEY-1"
        );
        assert_eq!(relative_display(Path::new("/elsewhere/x"), root), "/elsewhere/x");
    }

    #[tokio::test]
    async fn check_status_maps_errors_with_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/limited"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", "9")
                    .set_body_string("slow down"),
            )
            .mount(&server)
            .await;

        let resp = reqwest::get(format!("{}/limited", server.uri()))
            .await
            .unwrap();
        let err = check_status(resp).await.unwrap_err();

        match err {
            Error::Http {
                status,
                body,
                retry_after,
                ..
            } => {
                assert_eq!(status, 429);
                assert_eq!(body, "slow down");
                assert_eq!(retry_after, Some(std::time::Duration::from_secs(9)));
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn decode_json_reports_context() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bad"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let resp = reqwest::get(format!("{}/bad", server.uri())).await.unwrap();
        let err = decode_json::<serde_json::Value>(resp, "test payload")
            .await
            .unwrap_err();

        match err {
            Error::Decode { context, .. } => assert_eq!(context, "test payload"),
            other => panic!("expected Decode error, got {other:?}"),
        }
    }
}
