//! Per-team issue counts posted to Slack
//!
//! Four JQL buckets are counted per team (downstream, upstream, special issues and
//! incidents). Only the configured teams are tallied; issues whose team is missing or
//! unknown are ignored.

use crate::config::{Config, ReportConfig};
use crate::error::{Error, Result};
use crate::jira::{JiraClient, SearchOptions};
use crate::slack::{WebhookMessage, post_webhook};
use std::collections::BTreeMap;

/// Block Kit rendering of a report
pub mod layout;

pub use layout::render;

/// Issue count per configured team for one query
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TeamCounts {
    counts: BTreeMap<String, usize>,
}

impl TeamCounts {
    /// Zero counts for every team in `teams`
    pub fn new(teams: &[String]) -> Self {
        Self {
            counts: teams.iter().map(|t| (t.clone(), 0)).collect(),
        }
    }

    /// Count one issue for `team`; unknown teams are ignored
    ///
    /// Returns whether the issue was counted.
    pub fn record(&mut self, team: &str) -> bool {
        match self.counts.get_mut(team) {
            Some(count) => {
                *count += 1;
                true
            }
            None => false,
        }
    }

    /// Count for `team` (0 when unknown)
    pub fn get(&self, team: &str) -> usize {
        self.counts.get(team).copied().unwrap_or(0)
    }

    /// Sum over all configured teams
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

/// One line of the report
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TeamRow {
    /// Team name
    pub team: String,
    /// Issues in flight
    pub downstream: usize,
    /// Issues not yet committed
    pub upstream: usize,
    /// Risks, pending items and problems
    pub special: usize,
    /// Incidents in flight
    pub incidents: usize,
}

impl TeamRow {
    /// Downstream work that is not an incident
    pub fn items(&self) -> usize {
        self.downstream.saturating_sub(self.incidents)
    }

    /// Whether the team gets its own entry in the message
    pub fn is_displayed(&self) -> bool {
        self.downstream > 0 || self.special > 0 || self.incidents > 0
    }
}

/// Counts for every bucket, ready to render
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TeamReport {
    /// Rows sorted by downstream count, highest first
    pub rows: Vec<TeamRow>,
    /// Downstream total over configured teams
    pub total_downstream: usize,
    /// Upstream total over configured teams
    pub total_upstream: usize,
    /// Special issues total over configured teams
    pub total_special: usize,
}

impl TeamReport {
    /// Combine the four tallies
    ///
    /// Rows keep the configured team order among equal downstream counts.
    pub fn from_counts(
        teams: &[String],
        downstream: &TeamCounts,
        upstream: &TeamCounts,
        special: &TeamCounts,
        incidents: &TeamCounts,
    ) -> Self {
        let mut rows: Vec<TeamRow> = teams
            .iter()
            .map(|team| TeamRow {
                team: team.clone(),
                downstream: downstream.get(team),
                upstream: upstream.get(team),
                special: special.get(team),
                incidents: incidents.get(team),
            })
            .collect();
        rows.sort_by(|a, b| b.downstream.cmp(&a.downstream));

        Self {
            rows,
            total_downstream: downstream.total(),
            total_upstream: upstream.total(),
            total_special: special.total(),
        }
    }

    /// Rows that get their own entry, in report order
    pub fn displayed(&self) -> impl Iterator<Item = &TeamRow> {
        self.rows.iter().filter(|r| r.is_displayed())
    }

    /// Teams without downstream issues, alphabetically
    pub fn without_downstream(&self) -> Vec<&str> {
        self.sorted_teams(|r| r.downstream == 0)
    }

    /// Teams without special issues, alphabetically
    pub fn without_special(&self) -> Vec<&str> {
        self.sorted_teams(|r| r.special == 0)
    }

    fn sorted_teams(&self, pred: impl Fn(&TeamRow) -> bool) -> Vec<&str> {
        let mut teams: Vec<&str> = self
            .rows
            .iter()
            .filter(|r| pred(r))
            .map(|r| r.team.as_str())
            .collect();
        teams.sort_unstable();
        teams
    }

    /// Plain-text summary for notifications
    pub fn fallback_text(&self, field_name: &str) -> String {
        format!(
            "Overview by {field_name} – Downstream: {}, Upstream: {}, Special: {}",
            self.total_downstream, self.total_upstream, self.total_special
        )
    }
}

/// Run `jql` and tally the issues by the team field
pub async fn count_by_team(
    client: &JiraClient,
    report: &ReportConfig,
    jql: &str,
    options: &SearchOptions,
) -> Result<TeamCounts> {
    let fields = [report.team_field.clone()];
    let issues = client.search_all(jql, &fields, options).await?;

    let mut counts = TeamCounts::new(&report.teams);
    let mut ignored = 0usize;
    for issue in &issues {
        let counted = issue
            .option_label(&report.team_field)
            .is_some_and(|team| counts.record(&team));
        if !counted {
            ignored += 1;
        }
    }

    tracing::debug!(
        issues = issues.len(),
        counted = counts.total(),
        ignored,
        "tallied query"
    );
    Ok(counts)
}

/// Fetch all four buckets and build the report
pub async fn collect(client: &JiraClient, config: &Config) -> Result<TeamReport> {
    let report = &config.report;
    let options = SearchOptions::from_export(&config.export);

    let downstream = count_by_team(client, report, &report.queries.downstream, &options).await?;
    let upstream = count_by_team(client, report, &report.queries.upstream, &options).await?;
    let special = count_by_team(client, report, &report.queries.special, &options).await?;
    let incidents = count_by_team(client, report, &report.queries.incidents, &options).await?;

    Ok(TeamReport::from_counts(
        &report.teams,
        &downstream,
        &upstream,
        &special,
        &incidents,
    ))
}

/// Build the report and post it to the configured webhook
///
/// With `dry_run` the message is returned without being posted.
///
/// # Errors
/// Configuration errors, any search failure, or [`Error::Http`] when the webhook rejects the
/// message
pub async fn run(config: &Config, dry_run: bool) -> Result<WebhookMessage> {
    config.validate_report(!dry_run)?;

    let client = JiraClient::new(&config.jira, &config.timeouts)?;
    let report = collect(&client, config).await?;
    tracing::info!(
        downstream = report.total_downstream,
        upstream = report.total_upstream,
        special = report.total_special,
        "team report collected"
    );

    let message = WebhookMessage {
        text: report.fallback_text(&config.report.team_field_name),
        blocks: render(&report, &config.report),
    };

    if dry_run {
        tracing::info!("dry run, not posting");
        return Ok(message);
    }

    let webhook = config
        .report
        .webhook_url
        .as_deref()
        .ok_or_else(|| Error::missing("report.webhook_url"))?;
    let http = reqwest::Client::builder()
        .build()
        .map_err(|e| Error::Other(format!("failed to create HTTP client: {e}")))?;
    post_webhook(&http, webhook, &message, config.timeouts.metadata).await?;

    Ok(message)
}
