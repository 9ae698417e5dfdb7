//! Primary module for talking to Blackboard Learn.
//!
//! Everything needed to discover the files of a course lives here:
//!
//! - The content API client that lists the children of a course or folder
//! - The classifier that decides whether a content node is a file, a folder or neither
//! - The recursive tree scanner that turns the content tree into a flat file list
//! - A folder tree renderer for displaying scan results
//!

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

pub mod classify;
pub mod client;
pub mod models;
pub mod scanner;
pub mod tree;

pub use client::{ContentSource, LearnClient};
pub use models::FileDescriptor;
pub use scanner::Scanner;

#[derive(Error, Debug)]
pub enum LearnError {
    // Transport errors
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API request to {url} failed with status {status}")]
    Status { status: u16, url: String },

    // Serde errors
    #[error("Malformed response: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Origin {0} cannot be used as a base URL")]
    InvalidOrigin(String),

    #[error("Could not extract course ID from {0}")]
    CourseIdNotFound(String),

    // IO errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    // Other errors
    #[error("{0:?}")]
    Other(#[from] color_eyre::eyre::Report),
}

pub type Result<T> = std::result::Result<T, LearnError>;

static COURSE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/courses/(_\d+_\d+)").expect("course id pattern is valid"));

static BARE_COURSE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^_\d+_\d+$").expect("bare course id pattern is valid"));

/// Extract the internal course id (`_12345_1`) from a course page URL.
///
/// A bare course id is accepted as-is, so the CLI can take either form.
pub fn course_id_from_page(page: &str) -> Result<String> {
    let page = page.trim();
    if BARE_COURSE_ID_RE.is_match(page) {
        return Ok(page.to_string());
    }

    let path = url::Url::parse(page)
        .map(|url| url.path().to_string())
        .unwrap_or_else(|_| page.to_string());

    let course_id = COURSE_ID_RE
        .captures(&path)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    tracing::info!(pathname = %path, course_id = ?course_id, "Course ID extraction");

    course_id.ok_or_else(|| LearnError::CourseIdNotFound(page.to_string()))
}
