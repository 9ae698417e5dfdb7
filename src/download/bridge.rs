//! Download dispatch bridge
//!
//! The scanning side never touches the filesystem or the transfer machinery
//! itself. It hands `(url, filename)` pairs to the [`DownloadService`] over a
//! channel and gets back a single yes/no: whether the service accepted and
//! started tracking the download. Completion is reported by the service on its
//! own, in the logs and in the final [`ServiceReport`].

use std::io;
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{Instrument, Level, debug, error, info, span, warn};
use ulid::Ulid;

use super::http::Downloader;
use super::models::{
    DispatchRequest, DispatchResponse, DownloadStatus, ServiceReport, TransferOutcome,
};
use super::paths::{create_unique, relative_target};

/// Capacity of the request channel between bridge and service
const REQUEST_BUFFER: usize = 16;

/// Something that can hand a download over to the privileged side
pub trait DownloadDispatch {
    /// Returns true when the download was accepted
    async fn dispatch(&self, url: &str, filename: &str) -> bool;
}

#[derive(Debug)]
struct Envelope {
    request: DispatchRequest,
    reply: oneshot::Sender<DispatchResponse>,
}

/// Sending half of the bridge. Dropping every clone shuts the service down
/// once in-flight transfers are finished.
#[derive(Debug, Clone)]
pub struct DispatchBridge {
    tx: mpsc::Sender<Envelope>,
}

impl DispatchBridge {
    /// Send a request and wait for the service's full response
    pub async fn request(&self, request: DispatchRequest) -> DispatchResponse {
        let (reply, response) = oneshot::channel();
        if self.tx.send(Envelope { request, reply }).await.is_err() {
            return DispatchResponse::rejected("Download service is not running");
        }

        response
            .await
            .unwrap_or_else(|_| DispatchResponse::rejected("Download service dropped the request"))
    }
}

impl DownloadDispatch for DispatchBridge {
    async fn dispatch(&self, url: &str, filename: &str) -> bool {
        let response = self
            .request(DispatchRequest {
                url: url.to_string(),
                filename: filename.to_string(),
            })
            .await;

        if response.success {
            debug!(filename = %filename, download_id = ?response.download_id, "Download response");
        } else {
            warn!(
                filename = %filename,
                error = response.error.as_deref().unwrap_or("unknown"),
                "Download rejected"
            );
        }

        response.success
    }
}

/// Receiving half of the bridge; owns every transfer
pub struct DownloadService {
    downloader: Downloader,
    download_dir: PathBuf,
    transfers: JoinSet<TransferOutcome>,
    report: ServiceReport,
}

impl DownloadService {
    pub fn new(downloader: Downloader, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            downloader,
            download_dir: download_dir.into(),
            transfers: JoinSet::new(),
            report: ServiceReport::default(),
        }
    }

    /// Start the service task and return the bridge that feeds it.
    ///
    /// The join handle resolves once every bridge clone is dropped and all
    /// accepted transfers have finished.
    pub fn spawn(self) -> (DispatchBridge, JoinHandle<ServiceReport>) {
        let (tx, rx) = mpsc::channel(REQUEST_BUFFER);
        let handle = tokio::spawn(self.run(rx));
        (DispatchBridge { tx }, handle)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Envelope>) -> ServiceReport {
        info!(dir = ?self.download_dir, "Download service started");

        while let Some(Envelope { request, reply }) = rx.recv().await {
            while let Some(joined) = self.transfers.try_join_next() {
                self.record(joined);
            }

            let response = self.accept(&request).await;
            if reply.send(response).is_err() {
                debug!(filename = %request.filename, "Requester went away before the response");
            }
        }

        debug!(in_flight = self.transfers.len(), "Waiting for transfers to finish");
        while let Some(joined) = self.transfers.join_next().await {
            self.record(joined);
        }

        info!(
            accepted = self.report.accepted,
            rejected = self.report.rejected,
            completed = self.report.completed(),
            failed = self.report.failed(),
            "Download service stopped"
        );
        self.report
    }

    async fn accept(&mut self, request: &DispatchRequest) -> DispatchResponse {
        info!(url = %request.url, filename = %request.filename, "Download request");

        match self.start_transfer(request).await {
            Ok(id) => {
                self.report.accepted += 1;
                DispatchResponse::accepted(id)
            }
            Err(e) => {
                error!(filename = %request.filename, error = %e, "Download failed");
                self.report.rejected += 1;
                DispatchResponse::rejected(e.to_string())
            }
        }
    }

    async fn start_transfer(&mut self, request: &DispatchRequest) -> io::Result<Ulid> {
        let relative = relative_target(&request.filename)?;
        let response = self.downloader.open(&request.url).await?;

        let target = self.download_dir.join(relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let (path, file) = create_unique(&target).await?;

        let id = Ulid::new();
        info!(download_id = %id, path = ?path, "Download started");

        let downloader = self.downloader.clone();
        let span = span!(Level::DEBUG, "transfer", id = %id);
        self.transfers.spawn(
            async move {
                let (status, bytes) = match downloader.write_body(response, file, &path).await {
                    Ok(bytes) => (DownloadStatus::Completed, bytes),
                    Err(e) => (DownloadStatus::Failed(e.to_string()), 0),
                };
                TransferOutcome {
                    id,
                    path,
                    status,
                    bytes,
                }
            }
            .instrument(span),
        );

        Ok(id)
    }

    fn record(&mut self, joined: Result<TransferOutcome, JoinError>) {
        match joined {
            Ok(outcome) => {
                match &outcome.status {
                    DownloadStatus::Completed => {
                        info!(download_id = %outcome.id, path = ?outcome.path, bytes = outcome.bytes, "Download complete")
                    }
                    DownloadStatus::Failed(err) => {
                        error!(download_id = %outcome.id, path = ?outcome.path, error = %err, "Download error")
                    }
                }
                self.report.outcomes.push(outcome);
            }
            Err(e) => error!(error = %e, "Transfer task panicked"),
        }
    }
}
