//! Data structures for the download system
//!
//! This file contains the message types exchanged with the download service,
//! the per-transfer outcome and the batch tallies reported to the caller.

use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, time::Duration};
use ulid::Ulid;

/// Default wait between two consecutive dispatches
pub const DEFAULT_PACING: Duration = Duration::from_millis(500);

/// Final status of an accepted transfer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DownloadStatus {
    /// All bytes were written to disk
    Completed,
    /// The transfer broke off, the partial file was removed
    Failed(String),
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "Completed"),
            Self::Failed(err) => write!(f, "Failed: {}", err),
        }
    }
}

/// A request to the download service, `{action: "download", url, filename}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename = "download")]
pub struct DispatchRequest {
    pub url: String,
    /// Slash separated path relative to the output directory
    pub filename: String,
}

/// The download service's answer to a [`DispatchRequest`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_id: Option<Ulid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispatchResponse {
    pub fn accepted(id: Ulid) -> Self {
        Self {
            success: true,
            download_id: Some(id),
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            download_id: None,
            error: Some(error.into()),
        }
    }
}

/// What happened to one accepted transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub id: Ulid,
    pub path: PathBuf,
    pub status: DownloadStatus,
    pub bytes: u64,
}

/// Summary of everything the download service handled
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceReport {
    pub accepted: usize,
    pub rejected: usize,
    pub outcomes: Vec<TransferOutcome>,
}

impl ServiceReport {
    pub fn completed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == DownloadStatus::Completed)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.completed()
    }
}

/// How a batch of files is laid out and paced
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Recreate the course folder structure below the root label
    pub organize_by_folder: bool,
    /// Top level folder, usually the course title
    pub root_label: Option<String>,
    pub pacing: Duration,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            organize_by_folder: true,
            root_label: None,
            pacing: DEFAULT_PACING,
        }
    }
}

/// Tally of one orchestration pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadBatchResult {
    pub attempted: usize,
    pub succeeded: usize,
}

impl DownloadBatchResult {
    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }
}
