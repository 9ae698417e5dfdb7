//! Content node classification.
//!
//! The content API does not tag folders consistently: plain folders, documents
//! with attachments and nodes that only advertise `hasChildren` all have to be
//! walked, or whole subtrees silently disappear from the scan.

use super::models::{ContentNode, DOCUMENT_HANDLER, FILE_HANDLER, FOLDER_HANDLER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A leaf file, see [`super::FileDescriptor::from_node`]
    File,
    /// Something whose children should be listed
    Container,
    /// Neither downloadable nor traversable (gradebook columns, announcements, ...)
    Skip,
}

/// Classify a content node. Rules are checked in priority order.
pub fn classify(node: &ContentNode) -> NodeKind {
    let tag = node.handler_tag();

    if tag == FILE_HANDLER {
        return NodeKind::File;
    }

    if node.has_children()
        || tag == FOLDER_HANDLER
        || tag == DOCUMENT_HANDLER
        || node.folder_flag()
    {
        return NodeKind::Container;
    }

    NodeKind::Skip
}
