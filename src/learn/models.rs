//! Data structures for the Learn content API
//!
//! `ContentNode` and `ContentListing` mirror what the remote API returns and are
//! only ever read. `FileDescriptor` is what the scanner produces and what gets
//! written to disk as a scan result.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

/// Content handler id for uploaded files
pub const FILE_HANDLER: &str = "resource/x-bb-file";
/// Content handler id for plain folders
pub const FOLDER_HANDLER: &str = "resource/x-bb-folder";
/// Content handler id for documents, which may hold attachments as children
pub const DOCUMENT_HANDLER: &str = "resource/x-bb-document";

/// The `contentHandler` field, which the API sends either as a bare type tag
/// or as an object wrapping one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ContentHandler {
    Tag(String),
    Object {
        #[serde(default)]
        id: Option<String>,
    },
    Unknown(serde_json::Value),
}

impl ContentHandler {
    /// Normalized handler tag, empty when none can be found
    pub fn tag(&self) -> &str {
        match self {
            Self::Tag(tag) => tag,
            Self::Object { id: Some(id) } => id,
            Self::Object { id: None } | Self::Unknown(_) => "",
        }
    }
}

/// A single entry of a content listing
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContentNode {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub has_children: Option<bool>,
    #[serde(default)]
    pub content_handler: Option<ContentHandler>,
    /// Handler specific details, keyed by handler id
    #[serde(default)]
    pub content_detail: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    pub has_attachments: Option<bool>,
}

impl ContentNode {
    pub fn handler_tag(&self) -> &str {
        self.content_handler
            .as_ref()
            .map(ContentHandler::tag)
            .unwrap_or_default()
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }

    pub fn has_children(&self) -> bool {
        self.has_children.unwrap_or(false)
    }

    fn detail(&self, handler: &str) -> Option<&serde_json::Value> {
        self.content_detail.as_ref()?.get(handler)
    }

    /// File details stored under `contentDetail["resource/x-bb-file"].file`
    pub fn file_detail(&self) -> Option<FileDetail> {
        let file = self.detail(FILE_HANDLER)?.get("file")?;
        match serde_json::from_value(file.clone()) {
            Ok(detail) => Some(detail),
            Err(e) => {
                tracing::debug!(id = %self.id, error = %e, "Ignoring malformed file detail");
                None
            }
        }
    }

    /// Whether `contentDetail["resource/x-bb-folder"].isFolder` is set
    pub fn folder_flag(&self) -> bool {
        self.detail(FOLDER_HANDLER)
            .and_then(|folder| folder.get("isFolder"))
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FileDetail {
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Path relative to the instance origin
    #[serde(default)]
    pub permanent_url: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

/// Response body of a content listing request
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContentListing {
    #[serde(default)]
    pub results: Option<Vec<ContentNode>>,
}

/// A downloadable file discovered while scanning a course
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub id: String,
    /// Display title of the content item
    pub name: String,
    /// Slash delimited path of titles from the course root, ending with `name`
    pub path: String,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

impl FileDescriptor {
    /// Build a descriptor for a node already classified as a file.
    ///
    /// The download URL is only filled in when the node carries file details
    /// with a permanent URL.
    pub fn from_node(node: &ContentNode, path: String, origin: &Url) -> Self {
        let name = node.title().to_string();
        let detail = node.file_detail();

        let download_url = detail
            .as_ref()
            .and_then(|d| d.permanent_url.as_deref())
            .and_then(|permanent| match origin.join(permanent) {
                Ok(url) => Some(url.to_string()),
                Err(e) => {
                    tracing::warn!(id = %node.id, permanent_url = %permanent, error = %e, "Unusable permanent URL");
                    None
                }
            });

        let (file_name, mime_type, file_size) = match detail {
            Some(detail) => (
                detail.file_name.unwrap_or_else(|| name.clone()),
                detail.mime_type,
                detail.file_size,
            ),
            None => (name.clone(), None, None),
        };

        Self {
            id: node.id.clone(),
            name,
            path,
            file_name,
            mime_type,
            download_url,
            file_size,
        }
    }

    pub fn is_downloadable(&self) -> bool {
        self.download_url.is_some()
    }

    /// Folder part of `path`, without the item's own title.
    ///
    /// The title is stripped as a whole since it may itself contain `/`.
    pub fn folder(&self) -> &str {
        match self.path.strip_suffix(self.name.as_str()) {
            Some(folder) => folder.strip_suffix('/').unwrap_or(folder),
            None => self
                .path
                .rsplit_once('/')
                .map(|(folder, _)| folder)
                .unwrap_or_default(),
        }
    }
}
