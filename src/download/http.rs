//! HTTP download implementation
//!
//! This module opens credentialed download requests, following redirects by
//! hand so every hop is logged, and streams accepted responses to disk.

use futures_util::StreamExt;
use reqwest::{
    Client, Response, Url,
    cookie::Jar,
    header::{self, HeaderMap, HeaderValue},
};
use std::{io, path::Path, sync::Arc};
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, info, trace};

/// Hops followed before a download is given up on
const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
}

impl Downloader {
    /// Create a downloader that sends the session cookies in `jar`.
    ///
    /// Redirects are not followed automatically; the jar keeps the session
    /// cookies scoped to the Learn host when a redirect leaves it.
    pub fn new(jar: Arc<Jar>) -> io::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));

        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .default_headers(headers)
            .cookie_provider(jar)
            .build()
            .map_err(io::Error::other)?;

        Ok(Self { client })
    }

    /// Request `url`, following redirects hop by hop, until the server
    /// answers with a success.
    ///
    /// The body is left unread so the caller can decide where it goes.
    pub async fn open(&self, url: &str) -> io::Result<Response> {
        let mut current =
            Url::parse(url).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        for hop in 0..=MAX_REDIRECTS {
            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(io::Error::other)?;
            let status = response.status();
            trace!(url = %current, status = %status, hop, "Got response");

            if status.is_success() {
                return Ok(response);
            }
            if !status.is_redirection() {
                return Err(io::Error::other(format!(
                    "HTTP error: {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or_default()
                )));
            }

            let location = response
                .headers()
                .get(header::LOCATION)
                .ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidData, "Redirect without Location header")
                })?
                .to_str()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

            // Storage redirects are usually relative to the Learn host
            let next = current
                .join(location)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
            debug!(from = %current, to = %next, "Following redirect");
            current = next;
        }

        Err(io::Error::other(format!(
            "Too many redirects, gave up after {MAX_REDIRECTS}"
        )))
    }

    /// Stream the body of an opened response into `file`.
    ///
    /// The partial file is removed when the transfer breaks off.
    pub async fn write_body(&self, response: Response, file: File, path: &Path) -> io::Result<u64> {
        match stream_to_file(response, file, path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                let _ = tokio::fs::remove_file(path).await;
                Err(e)
            }
        }
    }
}

async fn stream_to_file(response: Response, mut file: File, path: &Path) -> io::Result<u64> {
    let total_size = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|cl| cl.to_str().ok())
        .and_then(|cl| cl.parse::<u64>().ok());

    if let Some(size) = total_size {
        info!(bytes = size, path = ?path, "Starting download");
    } else {
        info!(path = ?path, "Starting download of unknown size");
    }

    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;
    let mut next_milestone = 25.0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(io::Error::other)?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;

        trace!(bytes = downloaded, chunk_size = chunk.len(), "Received chunk");

        if let Some(total) = total_size.filter(|t| *t > 0) {
            let percentage = (downloaded as f32 / total as f32) * 100.0;
            if percentage >= next_milestone && next_milestone < 100.0 {
                debug!(
                    percentage = format_args!("{:.1}%", percentage),
                    bytes = downloaded,
                    total = total,
                    "Download milestone"
                );
                while next_milestone <= percentage {
                    next_milestone += 25.0;
                }
            }
        }
    }

    // Make sure the file is completely written
    file.flush().await?;
    file.shutdown().await?;

    if let Some(total) = total_size.filter(|t| *t != downloaded) {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("Expected {} bytes, received {}", total, downloaded),
        ));
    }

    info!(bytes = downloaded, "Download completed");
    Ok(downloaded)
}
