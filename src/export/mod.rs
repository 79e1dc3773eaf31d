//! Bulk export of Jira boards to local storage
//!
//! For each configured board, in order:
//!
//! 1. fetch every issue of the board's JQL ([`JiraClient::search_all`]),
//! 2. per issue, write the raw document, then download its image attachments,
//! 3. write the board's `index.json`.
//!
//! After the last board, `backup_manifest.json` is written at the output root. Re-running an
//! export over an existing tree rewrites the documents and skips images already on disk.

use crate::config::{BoardConfig, Config};
use crate::error::Result;
use crate::jira::{Issue, JiraClient, SearchOptions};
use crate::utils::safe_name;
use std::collections::HashSet;
use std::path::Path;

/// Attachment transfers
pub mod attachments;
/// Output tree layout and writers
pub mod persist;

pub use attachments::{AttachmentDownloader, AttachmentOutcome};
pub use persist::{BoardIndex, IssueSummary, Manifest, ManifestEntry, OutputTree};

/// Runs an export described by a [`Config`]
pub struct Exporter<'a> {
    config: &'a Config,
    client: JiraClient,
    downloader: AttachmentDownloader,
    search: SearchOptions,
    tree: OutputTree,
}

impl<'a> Exporter<'a> {
    /// Validate the configuration and prepare the output root
    ///
    /// # Errors
    /// Returns a configuration error for missing settings, or an I/O error if the output
    /// directory cannot be created
    pub fn new(config: &'a Config) -> Result<Self> {
        config.validate_export()?;

        let client = JiraClient::new(&config.jira, &config.timeouts)?;
        let downloader =
            AttachmentDownloader::new(client.clone(), &config.export, &config.timeouts);
        let tree = OutputTree::create(&config.export.output_dir)?;

        Ok(Self {
            config,
            client,
            downloader,
            search: SearchOptions::from_export(&config.export),
            tree,
        })
    }

    /// Export every configured board and write the manifest
    ///
    /// # Errors
    /// Search failures, pagination overflow and write failures abort the run. Attachment
    /// failures never do.
    pub async fn run(&self) -> Result<Manifest> {
        let mut manifest = Manifest::new(self.client.base_url().as_str().trim_end_matches('/'));

        for board in &self.config.export.boards {
            let entry = self.export_board(board).await?;
            manifest.boards.push(entry);
        }

        let path = self.tree.write_manifest(&manifest)?;
        tracing::info!(
            boards = manifest.boards.len(),
            issues = manifest.total_issues(),
            manifest = %path.display(),
            "export finished"
        );
        Ok(manifest)
    }

    /// Export one board and write its index
    pub async fn export_board(&self, board: &BoardConfig) -> Result<ManifestEntry> {
        tracing::info!(board = %board.name, jql = %board.jql, "exporting board");

        let board_dir = self.tree.board_dir(&board.name)?;
        let issues = self
            .client
            .search_all(&board.jql, &self.config.export.fields, &self.search)
            .await?;
        tracing::info!(board = %board.name, total = issues.len(), "fetched board issues");

        let mut index = BoardIndex {
            board: board.name.clone(),
            jql: board.jql.clone(),
            total_issues: issues.len(),
            issues: Vec::with_capacity(issues.len()),
        };

        for issue in &issues {
            index.issues.push(self.export_issue(&board_dir, issue).await?);
        }

        let index_path = self.tree.write_index(&board_dir, &index)?;
        tracing::info!(board = %board.name, dir = %board_dir.display(), "board exported");

        Ok(ManifestEntry {
            name: board.name.clone(),
            folder: self.tree.relative(&board_dir),
            total_issues: index.total_issues,
            index_file: self.tree.relative(&index_path),
        })
    }

    async fn export_issue(&self, board_dir: &Path, issue: &Issue) -> Result<IssueSummary> {
        let issue_dir = self.tree.issue_dir(board_dir, issue.key())?;
        self.tree.write_raw_issue(&issue_dir, issue)?;

        let images_downloaded = self.save_images(issue, &issue_dir).await;

        Ok(IssueSummary {
            key: issue.key().to_string(),
            summary: issue.summary().to_string(),
            issuetype: issue.issue_type().to_string(),
            status: issue.status().to_string(),
            images_downloaded,
            folder: self.tree.relative(&issue_dir),
        })
    }

    /// Download the issue's image attachments; returns how many are on disk afterwards
    async fn save_images(&self, issue: &Issue, issue_dir: &Path) -> usize {
        let images_dir = issue_dir.join(persist::IMAGES_DIR);
        let mut saved = 0;
        let mut used_names = HashSet::new();

        let images = issue
            .attachments()
            .iter()
            .filter(|a| a.has_mime_in(&self.config.export.image_mime_types));

        for attachment in images {
            let Some(url) = attachment.content.as_deref().filter(|u| !u.is_empty()) else {
                continue;
            };
            let filename = match attachment.filename.as_deref() {
                Some(name) if !name.is_empty() => safe_name(name),
                _ => safe_name(&format!("{}_img", issue.key())),
            };
            let filename = unique_name(filename, attachment.id.as_deref(), &mut used_names);

            let outcome = self.downloader.download(url, &images_dir.join(filename)).await;
            if outcome.is_saved() {
                saved += 1;
            } else {
                tracing::warn!(issue = issue.key(), url, "attachment not saved");
            }
        }

        saved
    }
}

/// Claim a file name not yet taken by another attachment of the same issue
///
/// The first attachment keeps its name. Later ones with the same name are prefixed with
/// their attachment ID, or with a counter when there is no ID, so every image gets its own
/// file and reruns map each attachment to the same name.
fn unique_name(name: String, id: Option<&str>, used: &mut HashSet<String>) -> String {
    if used.insert(name.clone()) {
        return name;
    }
    if let Some(id) = id.filter(|id| !id.is_empty()) {
        let candidate = safe_name(&format!("{id}_{name}"));
        if used.insert(candidate.clone()) {
            return candidate;
        }
    }

    let mut n = 2u32;
    loop {
        let candidate = safe_name(&format!("{n}_{name}"));
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
