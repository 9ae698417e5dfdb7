//! Config module for coursedl

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::download::DownloadOptions;

#[derive(Args, Debug, Clone)]
pub struct LearnConfig {
    /// Origin of the Blackboard Learn instance
    #[clap(
        long,
        env = "CDL_ORIGIN",
        default_value = "https://ultra.edu.kuleuven.cloud",
        global = true
    )]
    pub origin: String,

    /// Session cookies copied from a logged in browser, `name=value; name2=value2`
    #[clap(long, env = "CDL_SESSION_COOKIE", hide_env_values = true, global = true)]
    pub session_cookie: Option<String>,

    /// Number of items requested per content listing
    #[clap(long, env = "CDL_PAGE_LIMIT", default_value_t = 100, global = true)]
    pub page_limit: u32,

    /// Ask the content API to expand group and gradebook information
    #[clap(long, env = "CDL_EXPAND", default_value = "false", global = true)]
    pub expand: bool,
}

#[derive(Args, Debug, Clone)]
pub struct LogConfig {
    /// Number of log lines kept in memory for export
    #[clap(
        long,
        env = "CDL_LOG_CAPACITY",
        default_value_t = crate::logging::DEFAULT_CAPACITY,
        global = true
    )]
    pub log_capacity: usize,

    /// Write the retained log lines to this file when the command finishes
    #[clap(long, env = "CDL_EXPORT_LOGS", global = true)]
    pub export_logs: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct DownloadConfig {
    /// Directory downloads are written to
    #[clap(long, env = "CDL_OUTPUT_DIR", default_value = "downloads")]
    pub output_dir: PathBuf,

    /// Milliseconds to wait between two downloads
    #[clap(long, env = "CDL_PACING_MS", default_value_t = 500)]
    pub pacing_ms: u64,

    /// Put every file directly below the course folder
    #[clap(long, default_value = "false")]
    pub flat: bool,

    /// Name of the top level folder, looked up from the course when omitted
    #[clap(long, env = "CDL_COURSE_TITLE")]
    pub course_title: Option<String>,
}

impl DownloadConfig {
    pub fn options(&self, root_label: Option<String>) -> DownloadOptions {
        DownloadOptions {
            organize_by_folder: !self.flat,
            root_label,
            pacing: Duration::from_millis(self.pacing_ms),
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List every file of a course
    Scan {
        /// Course page URL or course id (`_12345_1`)
        course: String,

        /// Save the scan result as JSON for a later `download --files`
        #[clap(long)]
        output: Option<PathBuf>,

        /// Override the stored auto-download preference
        #[clap(long)]
        auto_download: Option<bool>,

        #[clap(flatten)]
        download: DownloadConfig,
    },
    /// Download every file of a course
    Download {
        /// Course page URL or course id (`_12345_1`)
        course: String,

        /// Download the files of a saved scan instead of scanning again
        #[clap(long)]
        files: Option<PathBuf>,

        #[clap(flatten)]
        download: DownloadConfig,
    },
    /// Show or change stored preferences
    Prefs {
        /// Scan and download in one go when running `scan`
        #[clap(long)]
        auto_download: Option<bool>,
    },
}

#[derive(Parser, Debug, Clone)]
#[clap(name = "coursedl", version, about = "Download every file of a Blackboard Learn course")]
pub struct Config {
    #[clap(flatten)]
    pub learn: LearnConfig,

    #[clap(flatten)]
    pub log: LogConfig,

    /// Preferences file location
    #[clap(long, env = "CDL_PREFS_PATH", global = true)]
    pub prefs_path: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

impl Config {
    pub fn prefs_path(&self) -> PathBuf {
        self.prefs_path
            .clone()
            .unwrap_or_else(crate::prefs::default_path)
    }
}

pub fn config() -> Config {
    Config::parse()
}
