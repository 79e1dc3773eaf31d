//! On-disk layout of an export
//!
//! ```text
//! <output>/
//!   backup_manifest.json
//!   <board>/
//!     index.json
//!     <issue key>/
//!       issue_raw.json
//!       images/<attachment file name>
//! ```
//!
//! Every path segment derived from Jira data goes through [`safe_name`]. Writes here are not
//! retried: a failure propagates and stops the run.

use crate::error::Result;
use crate::jira::Issue;
use crate::utils::{relative_display, safe_name, write_json_pretty};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File holding the issue exactly as returned by the search
pub const RAW_ISSUE_FILE: &str = "issue_raw.json";
/// Per-board index file
pub const INDEX_FILE: &str = "index.json";
/// Run manifest at the output root
pub const MANIFEST_FILE: &str = "backup_manifest.json";
/// Folder holding an issue's downloaded images
pub const IMAGES_DIR: &str = "images";

/// One line of a board index
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSummary {
    /// Issue key
    pub key: String,
    /// Issue summary
    pub summary: String,
    /// Issue type name
    pub issuetype: String,
    /// Status name
    pub status: String,
    /// Image attachments present on disk after this run
    ///
    /// Includes images skipped because an earlier run already saved them, so a rerun
    /// reports the same number as the first run rather than only this run's transfers.
    pub images_downloaded: usize,
    /// Issue folder, relative to the output root
    pub folder: String,
}

/// Index of one exported board
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardIndex {
    /// Board display name
    pub board: String,
    /// Query that selected the issues
    pub jql: String,
    /// Number of issues fetched for the board
    pub total_issues: usize,
    /// One entry per issue, in search order
    pub issues: Vec<IssueSummary>,
}

/// Manifest entry pointing at one board's index
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Board display name
    pub name: String,
    /// Board folder, relative to the output root
    pub folder: String,
    /// Number of issues exported
    pub total_issues: usize,
    /// Index file, relative to the output root
    pub index_file: String,
}

/// Summary of a whole export run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Jira site the data came from
    pub jira_base: String,
    /// When the manifest was written
    pub generated_at: DateTime<Utc>,
    /// Boards in processing order
    pub boards: Vec<ManifestEntry>,
}

impl Manifest {
    /// Empty manifest for a site
    pub fn new(jira_base: impl Into<String>) -> Self {
        Self {
            jira_base: jira_base.into(),
            generated_at: Utc::now(),
            boards: Vec::new(),
        }
    }

    /// Issues across all boards
    pub fn total_issues(&self) -> usize {
        self.boards.iter().map(|b| b.total_issues).sum()
    }
}

/// Paths and writers for one output root
#[derive(Clone, Debug)]
pub struct OutputTree {
    root: PathBuf,
}

impl OutputTree {
    /// Use `root` as output directory, creating it if needed
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Output root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder of a board, created if missing
    pub fn board_dir(&self, board_name: &str) -> Result<PathBuf> {
        let dir = self.root.join(safe_name(board_name));
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Folder of an issue inside a board folder, created if missing
    pub fn issue_dir(&self, board_dir: &Path, key: &str) -> Result<PathBuf> {
        let dir = board_dir.join(safe_name(key));
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Persist the raw issue document into its folder
    pub fn write_raw_issue(&self, issue_dir: &Path, issue: &Issue) -> Result<PathBuf> {
        let path = issue_dir.join(RAW_ISSUE_FILE);
        write_json_pretty(&path, issue.raw())?;
        Ok(path)
    }

    /// Persist a board index into the board folder
    pub fn write_index(&self, board_dir: &Path, index: &BoardIndex) -> Result<PathBuf> {
        let path = board_dir.join(INDEX_FILE);
        write_json_pretty(&path, index)?;
        Ok(path)
    }

    /// Persist the run manifest at the root
    pub fn write_manifest(&self, manifest: &Manifest) -> Result<PathBuf> {
        let path = self.root.join(MANIFEST_FILE);
        write_json_pretty(&path, manifest)?;
        Ok(path)
    }

    /// `path` relative to the root, with forward slashes
    pub fn relative(&self, path: &Path) -> String {
        relative_display(path, &self.root)
    }
}
