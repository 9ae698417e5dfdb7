//! Command handling for one course page.
//!
//! A [`Controller`] is bound to the page it was started for and answers
//! [`Command`]s with a [`Reply`]. Failures never escape as errors; they come
//! back as `{ "success": false, "error": ... }` so any front end can show them.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::download::{DownloadDispatch, DownloadOptions, download_all};
use crate::events::EventSink;
use crate::learn::{ContentSource, FileDescriptor, Scanner, course_id_from_page};
use crate::logging::LogBuffer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    ScanCourse,
    #[serde(rename_all = "camelCase")]
    DownloadFiles {
        files: Vec<FileDescriptor>,
        /// Falls back to the controller's configured layout when absent
        #[serde(default)]
        organize_by_folder: Option<bool>,
    },
    GetLogs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Scanned {
        success: bool,
        files: Vec<FileDescriptor>,
    },
    Downloaded {
        success: bool,
        count: usize,
    },
    Logs {
        success: bool,
        logs: Vec<String>,
    },
    Failed {
        success: bool,
        error: String,
    },
}

impl Reply {
    pub fn failed(error: impl Into<String>) -> Self {
        Reply::Failed {
            success: false,
            error: error.into(),
        }
    }
}

pub struct Controller<S, D> {
    page: String,
    scanner: Scanner<S>,
    dispatch: D,
    events: EventSink,
    logs: LogBuffer,
    options: DownloadOptions,
    files: Vec<FileDescriptor>,
}

impl<S: ContentSource, D: DownloadDispatch> Controller<S, D> {
    pub fn new(
        page: impl Into<String>,
        scanner: Scanner<S>,
        dispatch: D,
        events: EventSink,
        logs: LogBuffer,
        options: DownloadOptions,
    ) -> Self {
        Self {
            page: page.into(),
            scanner,
            dispatch,
            events,
            logs,
            options,
            files: Vec::new(),
        }
    }

    pub fn page(&self) -> &str {
        &self.page
    }

    /// Files found by the most recent successful scan
    pub fn files(&self) -> &[FileDescriptor] {
        &self.files
    }

    pub async fn handle(&mut self, command: Command) -> Reply {
        match command {
            Command::ScanCourse => self.scan_course().await,
            Command::DownloadFiles {
                files,
                organize_by_folder,
            } => self.download_files(files, organize_by_folder).await,
            Command::GetLogs => Reply::Logs {
                success: true,
                logs: self.logs.snapshot(),
            },
        }
    }

    async fn scan_course(&mut self) -> Reply {
        let course_id = match course_id_from_page(&self.page) {
            Ok(id) => id,
            Err(e) => {
                error!(page = %self.page, error = %e, "Scan aborted");
                return Reply::failed("Could not extract course ID");
            }
        };

        info!(course_id = %course_id, "Scanning course");
        let files = self.scanner.scan(&course_id).await;
        self.files = files.clone();

        Reply::Scanned {
            success: true,
            files,
        }
    }

    async fn download_files(
        &mut self,
        files: Vec<FileDescriptor>,
        organize_by_folder: Option<bool>,
    ) -> Reply {
        let mut options = self.options.clone();
        if let Some(organize) = organize_by_folder {
            options.organize_by_folder = organize;
        }

        let result = download_all(&files, &options, &self.dispatch, &self.events).await;
        Reply::Downloaded {
            success: true,
            count: result.succeeded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learn::models::ContentListing;
    use serde_json::json;
    use std::cell::RefCell;
    use std::time::Duration;
    use url::Url;

    struct OneFileCourse {
        origin: Url,
    }

    impl ContentSource for OneFileCourse {
        fn origin(&self) -> &Url {
            &self.origin
        }

        async fn list_children(
            &self,
            _course_id: &str,
            content_id: Option<&str>,
        ) -> crate::learn::Result<ContentListing> {
            let listing = match content_id {
                None => json!({ "results": [{
                    "id": "_1_1",
                    "title": "Syllabus",
                    "contentHandler": "resource/x-bb-file",
                    "contentDetail": { "resource/x-bb-file": { "file": {
                        "fileName": "syllabus.pdf",
                        "permanentUrl": "/bbcswebdav/syllabus.pdf"
                    }}}
                }]}),
                Some(_) => json!({ "results": [] }),
            };
            Ok(serde_json::from_value(listing)?)
        }
    }

    #[derive(Default)]
    struct RecordingDispatch {
        calls: RefCell<Vec<String>>,
    }

    impl DownloadDispatch for &RecordingDispatch {
        async fn dispatch(&self, _url: &str, filename: &str) -> bool {
            self.calls.borrow_mut().push(filename.to_string());
            true
        }
    }

    fn controller<'a>(
        page: &str,
        dispatch: &'a RecordingDispatch,
        logs: LogBuffer,
    ) -> Controller<OneFileCourse, &'a RecordingDispatch> {
        let source = OneFileCourse {
            origin: Url::parse("https://learn.example.edu").unwrap(),
        };
        Controller::new(
            page,
            Scanner::new(source),
            dispatch,
            EventSink::disconnected(),
            logs,
            DownloadOptions {
                organize_by_folder: true,
                root_label: Some("Course".into()),
                pacing: Duration::ZERO,
            },
        )
    }

    #[tokio::test]
    async fn scan_without_course_id_fails_softly() {
        let dispatch = RecordingDispatch::default();
        let mut controller = controller(
            "https://learn.example.edu/ultra/stream",
            &dispatch,
            LogBuffer::new(8),
        );

        let reply = controller.handle(Command::ScanCourse).await;

        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({ "success": false, "error": "Could not extract course ID" })
        );
        assert!(controller.files().is_empty());
    }

    #[tokio::test]
    async fn scan_retains_the_file_list() {
        let dispatch = RecordingDispatch::default();
        let mut controller = controller(
            "https://learn.example.edu/ultra/courses/_42_1/outline",
            &dispatch,
            LogBuffer::new(8),
        );

        let reply = controller.handle(Command::ScanCourse).await;

        let Reply::Scanned { success, files } = reply else {
            panic!("expected a scan reply");
        };
        assert!(success);
        assert_eq!(files.len(), 1);
        assert_eq!(
            files[0].download_url.as_deref(),
            Some("https://learn.example.edu/bbcswebdav/syllabus.pdf")
        );
        assert_eq!(controller.files(), files.as_slice());
    }

    #[tokio::test]
    async fn download_reports_the_success_count() {
        let dispatch = RecordingDispatch::default();
        let mut controller = controller("_42_1", &dispatch, LogBuffer::new(8));
        controller.handle(Command::ScanCourse).await;
        let files = controller.files().to_vec();

        let reply = controller
            .handle(Command::DownloadFiles {
                files,
                organize_by_folder: Some(false),
            })
            .await;

        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({ "success": true, "count": 1 })
        );
        assert_eq!(*dispatch.calls.borrow(), ["Course/syllabus.pdf"]);
    }

    #[tokio::test]
    async fn logs_are_a_snapshot() {
        let dispatch = RecordingDispatch::default();
        let logs = LogBuffer::new(8);
        logs.push("one");
        logs.push("two");
        let mut controller = controller("_42_1", &dispatch, logs);

        let reply = controller.handle(Command::GetLogs).await;

        assert_eq!(
            reply,
            Reply::Logs {
                success: true,
                logs: vec!["one".into(), "two".into()]
            }
        );
    }

    #[test]
    fn commands_use_the_message_shape() {
        let command: Command = serde_json::from_value(json!({
            "action": "downloadFiles",
            "files": [],
            "organizeByFolder": true
        }))
        .unwrap();
        assert_eq!(
            command,
            Command::DownloadFiles {
                files: vec![],
                organize_by_folder: Some(true)
            }
        );

        let command: Command = serde_json::from_value(json!({ "action": "scanCourse" })).unwrap();
        assert_eq!(command, Command::ScanCourse);
    }
}
