//! Configurations pointing at a mock Jira site

use jira_slack_tools::config::{BoardConfig, JiraConfig, RetryConfig};
use jira_slack_tools::Config;
use std::path::Path;
use std::time::Duration;

/// Attachment retry policy with the production attempt count but millisecond delays
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        jitter: false,
        ..Default::default()
    }
}

/// Export configuration for `boards` against the Jira site at `base_url`
///
/// Pacing is disabled and retries are fast so the tests finish quickly.
pub fn export_config(base_url: &str, output_dir: &Path, boards: &[(&str, &str)]) -> Config {
    let mut config = Config {
        jira: JiraConfig {
            base_url: Some(base_url.to_string()),
            email: Some("backup@example.com".to_string()),
            api_token: Some("api-token".to_string()),
            auth_header: None,
        },
        ..Default::default()
    };

    config.export.output_dir = output_dir.to_path_buf();
    config.export.boards = boards
        .iter()
        .map(|(name, jql)| BoardConfig {
            name: name.to_string(),
            jql: jql.to_string(),
        })
        .collect();
    config.export.pace_min = Duration::ZERO;
    config.export.pace_max = Duration::ZERO;
    config.export.attachment_retry = fast_retry();
    config
}
