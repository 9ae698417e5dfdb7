//! Recursive course content scanner
//!
//! Walks the content tree depth first, one request at a time, so the resulting
//! file order follows the course's own ordering. A failing subtree is logged and
//! skipped; it never takes the rest of the scan down with it.

use tracing::{Instrument, error, info, info_span, warn};

use super::classify::{NodeKind, classify};
use super::client::ContentSource;
use super::models::FileDescriptor;

pub struct Scanner<S> {
    source: S,
}

impl<S: ContentSource> Scanner<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Scan a whole course and return every file found, in traversal order
    pub async fn scan(&self, course_id: &str) -> Vec<FileDescriptor> {
        let files = self
            .scan_node(course_id, None, "", &mut Vec::new())
            .instrument(info_span!("scan", course_id = %course_id))
            .await;
        info!(course_id = %course_id, file_count = files.len(), "Scan complete");
        files
    }

    /// Scan one container. `ancestors` holds the ids of every container on the
    /// path from the course root down to (and including) this one.
    async fn scan_node(
        &self,
        course_id: &str,
        content_id: Option<&str>,
        prefix: &str,
        ancestors: &mut Vec<String>,
    ) -> Vec<FileDescriptor> {
        info!(content_id = ?content_id, path = %prefix, "Scanning content");

        let listing = match self.source.list_children(course_id, content_id).await {
            Ok(listing) => listing,
            Err(e) => {
                error!(content_id = ?content_id, path = %prefix, error = %e, "Error scanning content");
                return Vec::new();
            }
        };

        let Some(nodes) = listing.results else {
            warn!(content_id = ?content_id, "No results in API response");
            return Vec::new();
        };

        if nodes.len() as u64 >= u64::from(self.source.page_limit()) {
            warn!(
                content_id = ?content_id,
                limit = self.source.page_limit(),
                "Listing filled a whole page, further items at this level are not fetched"
            );
        }

        info!(item_count = nodes.len(), "Processing items");

        let mut files = Vec::new();
        for node in &nodes {
            let path = if prefix.is_empty() {
                node.title().to_string()
            } else {
                format!("{prefix}/{}", node.title())
            };

            let kind = classify(node);
            tracing::debug!(
                id = %node.id,
                title = %node.title(),
                content_handler = %node.handler_tag(),
                has_children = ?node.has_children,
                has_attachments = ?node.has_attachments,
                kind = ?kind,
                "Item details"
            );

            match kind {
                NodeKind::File => {
                    let file = FileDescriptor::from_node(node, path, self.source.origin());
                    if file.is_downloadable() {
                        info!(title = %file.name, path = %file.path, size = ?file.file_size, "Found file");
                    } else {
                        warn!(title = %file.name, path = %file.path, "Found file without download URL");
                    }
                    files.push(file);
                }
                NodeKind::Container => {
                    if node.id.is_empty() {
                        warn!(title = %node.title(), "Container without id, not descending");
                        continue;
                    }
                    if content_id == Some(node.id.as_str()) || ancestors.contains(&node.id) {
                        warn!(id = %node.id, title = %node.title(), "Container refers back to itself, not descending");
                        continue;
                    }

                    info!(title = %node.title(), id = %node.id, "Scanning subfolder");
                    ancestors.push(node.id.clone());
                    let nested =
                        Box::pin(self.scan_node(course_id, Some(node.id.as_str()), &path, ancestors))
                            .await;
                    ancestors.pop();
                    files.extend(nested);
                }
                NodeKind::Skip => {}
            }
        }

        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learn::models::ContentListing;
    use crate::learn::{LearnError, Result};
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use url::Url;

    /// In-memory content tree keyed by container id ("" for the course root)
    struct FakeSource {
        origin: Url,
        listings: HashMap<String, serde_json::Value>,
        failing: Vec<String>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeSource {
        fn new() -> Self {
            Self {
                origin: Url::parse("https://learn.example.edu").unwrap(),
                listings: HashMap::new(),
                failing: Vec::new(),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn with(mut self, container: &str, listing: serde_json::Value) -> Self {
            self.listings.insert(container.to_string(), listing);
            self
        }

        fn failing(mut self, container: &str) -> Self {
            self.failing.push(container.to_string());
            self
        }
    }

    impl ContentSource for FakeSource {
        fn origin(&self) -> &Url {
            &self.origin
        }

        async fn list_children(
            &self,
            _course_id: &str,
            content_id: Option<&str>,
        ) -> Result<ContentListing> {
            let key = content_id.unwrap_or_default().to_string();
            self.calls.borrow_mut().push(key.clone());
            if self.failing.contains(&key) {
                return Err(LearnError::Status {
                    status: 500,
                    url: key,
                });
            }
            let listing = self.listings.get(&key).cloned().unwrap_or(json!({ "results": [] }));
            Ok(serde_json::from_value(listing)?)
        }
    }

    fn file(id: &str, title: &str, file_name: &str) -> serde_json::Value {
        json!({
            "id": id,
            "title": title,
            "contentHandler": { "id": "resource/x-bb-file" },
            "contentDetail": {
                "resource/x-bb-file": {
                    "file": { "fileName": file_name, "permanentUrl": format!("/bbcswebdav/{id}") }
                }
            }
        })
    }

    fn folder(id: &str, title: &str) -> serde_json::Value {
        json!({ "id": id, "title": title, "contentHandler": "resource/x-bb-folder" })
    }

    #[tokio::test]
    async fn three_level_tree_yields_full_path() {
        let source = FakeSource::new()
            .with("", json!({ "results": [folder("a", "A")] }))
            .with("a", json!({ "results": [folder("b", "B")] }))
            .with("b", json!({ "results": [file("f", "F", "f.pdf")] }));

        let files = Scanner::new(source).scan("_1_1").await;
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "A/B/F");
        assert_eq!(files[0].file_name, "f.pdf");
        assert_eq!(
            files[0].download_url.as_deref(),
            Some("https://learn.example.edu/bbcswebdav/f")
        );
    }

    #[tokio::test]
    async fn slash_in_title_stays_in_its_folder() {
        let source = FakeSource::new()
            .with("", json!({ "results": [file("1", "Lecture 1/2", "l1.pdf"), folder("w", "Week 2")] }))
            .with("w", json!({ "results": [file("2", "Lab 3/4", "lab.pdf")] }));

        let files = Scanner::new(source).scan("_1_1").await;
        let folders: Vec<(&str, &str)> = files.iter().map(|f| (f.path.as_str(), f.folder())).collect();
        assert_eq!(folders, [("Lecture 1/2", ""), ("Week 2/Lab 3/4", "Week 2")]);
    }

    #[tokio::test]
    async fn preorder_traversal_order() {
        let source = FakeSource::new()
            .with("", json!({ "results": [file("1", "Intro", "intro.pdf"), folder("w1", "Week 1"), file("2", "Outro", "outro.pdf")] }))
            .with("w1", json!({ "results": [file("3", "Slides", "slides.pdf")] }));

        let paths: Vec<String> = Scanner::new(source)
            .scan("_1_1")
            .await
            .into_iter()
            .map(|f| f.path)
            .collect();
        assert_eq!(paths, ["Intro", "Week 1/Slides", "Outro"]);
    }

    #[tokio::test]
    async fn self_reference_is_not_followed() {
        let source = FakeSource::new()
            .with("", json!({ "results": [folder("a", "A")] }))
            .with("a", json!({ "results": [folder("a", "A again"), file("f", "F", "f.txt")] }));

        let scanner = Scanner::new(source);
        let files = scanner.scan("_1_1").await;
        assert_eq!(files.len(), 1);
        assert_eq!(*scanner.source.calls.borrow(), ["", "a"]);
    }

    #[tokio::test]
    async fn ancestor_reference_is_not_followed() {
        let source = FakeSource::new()
            .with("", json!({ "results": [folder("a", "A")] }))
            .with("a", json!({ "results": [folder("b", "B")] }))
            .with("b", json!({ "results": [folder("a", "Back to A")] }));

        let scanner = Scanner::new(source);
        assert!(scanner.scan("_1_1").await.is_empty());
        assert_eq!(*scanner.source.calls.borrow(), ["", "a", "b"]);
    }

    #[tokio::test]
    async fn missing_results_yields_nothing() {
        let source = FakeSource::new()
            .with("", json!({ "results": [folder("a", "A"), file("f", "F", "f.txt")] }))
            .with("a", json!({ "paging": { "nextPage": "" } }));

        let files = Scanner::new(source).scan("_1_1").await;
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "F");
    }

    #[tokio::test]
    async fn failed_subtree_keeps_partial_results() {
        let source = FakeSource::new()
            .with("", json!({ "results": [file("1", "Before", "before.txt"), folder("bad", "Broken"), folder("ok", "Fine")] }))
            .with("ok", json!({ "results": [file("2", "After", "after.txt")] }))
            .failing("bad");

        let paths: Vec<String> = Scanner::new(source)
            .scan("_1_1")
            .await
            .into_iter()
            .map(|f| f.path)
            .collect();
        assert_eq!(paths, ["Before", "Fine/After"]);
    }

    #[tokio::test]
    async fn failing_root_is_an_empty_scan() {
        let source = FakeSource::new().failing("");
        assert!(Scanner::new(source).scan("_1_1").await.is_empty());
    }

    #[tokio::test]
    async fn file_without_detail_is_kept() {
        let source = FakeSource::new().with(
            "",
            json!({ "results": [
                { "id": "x", "title": "Orphan", "contentHandler": "resource/x-bb-file" },
                { "id": "g", "title": "Grades", "contentHandler": "resource/x-bb-gradebook-column" }
            ] }),
        );

        let files = Scanner::new(source).scan("_1_1").await;
        assert_eq!(files.len(), 1);
        assert!(files[0].download_url.is_none());
    }
}
