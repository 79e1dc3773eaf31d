//! # jira-slack-tools
//!
//! Jira Cloud backup export, per-team issue reporting and Slack channel automation.
//!
//! ## Overview
//!
//! - [`export`] walks every configured board through the token-paginated search endpoint,
//!   stores each issue's raw JSON, downloads its image attachments and writes per-board
//!   indexes plus a manifest.
//! - [`report`] counts issues per team over four queries and posts a Block Kit summary to a
//!   Slack incoming webhook.
//! - [`slack`] creates per-team private channels, invites members, archives channels and
//!   exchanges OAuth codes.
//!
//! ## Quick Start
//!
//! ```no_run
//! use jira_slack_tools::{Config, Exporter};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::from_file("jira-slack-tools.toml".as_ref())?;
//!     config.apply_env(|key| std::env::var(key).ok());
//!
//!     let manifest = Exporter::new(&config)?.run().await?;
//!     println!("exported {} issues", manifest.total_issues());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

use std::future::Future;

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Board export to local storage
pub mod export;
/// Jira Cloud REST client
pub mod jira;
/// Per-team issue report
pub mod report;
/// Retry logic with exponential backoff
pub mod retry;
/// Slack Web API and webhooks
pub mod slack;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{
    BoardConfig, ChannelPlanConfig, Config, ExportConfig, JiraConfig, ReportConfig, RetryConfig,
    SlackConfig, TimeoutConfig,
};
pub use error::{AttachmentError, Error, Result};
pub use export::{AttachmentOutcome, Exporter, Manifest};
pub use jira::{Issue, JiraClient, SearchOptions};
pub use report::TeamReport;
pub use slack::{SlackClient, WebhookMessage};

/// Drive `task` to completion unless a termination signal arrives first
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// Files already written stay on disk when the run is interrupted; an attachment cut off
/// mid-transfer only leaves its `.part` file behind.
///
/// # Example
///
/// ```no_run
/// use jira_slack_tools::{Config, Exporter, run_until_signal};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let exporter = Exporter::new(&config)?;
///     run_until_signal(exporter.run()).await?;
///     Ok(())
/// }
/// ```
pub async fn run_until_signal<F, T>(task: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        result = task => result,
        _ = wait_for_signal() => Err(Error::Other("interrupted by signal".to_string())),
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::warn!("received SIGTERM, stopping");
                }
                _ = sigint.recv() => {
                    tracing::warn!("received SIGINT, stopping");
                }
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "could not register signal handlers, using ctrl_c");
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("received Ctrl+C, stopping");
            } else {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::warn!("received Ctrl+C, stopping"),
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}
