//! Module for downloading the files found by a scan
//!
//! This module provides the sequential batch loop, the bridge that hands single
//! downloads to the download service, and the HTTP transfer code behind it.

mod bridge;
mod http;
mod models;
mod orchestrator;
pub mod paths;

// Re-export the public API
pub use bridge::{DispatchBridge, DownloadDispatch, DownloadService};
pub use http::Downloader;
pub use models::{DownloadOptions, DownloadStatus};
pub use orchestrator::download_all;
