//! Sequential batch download loop
//!
//! Files are dispatched strictly one after another with a fixed pause in
//! between, so the Learn server never sees a burst of requests from us. A file
//! that cannot be dispatched is counted as failed and the batch moves on.

use tracing::{Instrument, error, info, info_span};

use super::bridge::DownloadDispatch;
use super::models::{DownloadBatchResult, DownloadOptions};
use super::paths::target_path;
use crate::events::{Event, EventSink};
use crate::learn::FileDescriptor;

/// Download every file in `files`, in order.
///
/// A progress event is emitted before each file. The pacing delay sits between
/// files only; nothing is waited for after the last one.
pub async fn download_all<D: DownloadDispatch>(
    files: &[FileDescriptor],
    options: &DownloadOptions,
    dispatch: &D,
    events: &EventSink,
) -> DownloadBatchResult {
    let total = files.len();
    let mut result = DownloadBatchResult::default();

    for (index, file) in files.iter().enumerate() {
        if index > 0 && !options.pacing.is_zero() {
            tokio::time::sleep(options.pacing).await;
        }

        events.emit(Event::DownloadProgress {
            current: index + 1,
            total,
            file_name: file.name.clone(),
        });

        result.attempted += 1;
        let span = info_span!("file", current = index + 1, total);
        if download_file(file, options, dispatch).instrument(span).await {
            result.succeeded += 1;
        }
    }

    info!(
        attempted = result.attempted,
        succeeded = result.succeeded,
        failed = result.failed(),
        "Batch finished"
    );
    result
}

async fn download_file<D: DownloadDispatch>(
    file: &FileDescriptor,
    options: &DownloadOptions,
    dispatch: &D,
) -> bool {
    let Some(url) = file.download_url.as_deref() else {
        error!(name = %file.name, path = %file.path, "No download URL for file");
        return false;
    };

    let filename = target_path(
        file,
        options.organize_by_folder,
        options.root_label.as_deref(),
    );
    info!(filename = %filename, url = %url, "Initiating download");

    dispatch.dispatch(url, &filename).await
}
