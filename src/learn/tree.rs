//! Folder tree rendering for scan results

use bytesize::ByteSize;
use std::collections::BTreeMap;
use std::fmt::Write;

use super::models::FileDescriptor;

#[derive(Debug, Default)]
struct FolderNode<'a> {
    folders: BTreeMap<&'a str, FolderNode<'a>>,
    files: Vec<&'a FileDescriptor>,
}

impl<'a> FolderNode<'a> {
    fn insert(&mut self, file: &'a FileDescriptor) {
        let mut current = self;
        for folder in file.folder().split('/').filter(|part| !part.is_empty()) {
            current = current.folders.entry(folder).or_default();
        }
        current.files.push(file);
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);

        // Folders first, alphabetically
        for (name, folder) in &self.folders {
            let _ = writeln!(out, "{indent}{name}/");
            folder.render_into(out, depth + 1);
        }

        // Then files in scan order
        for file in &self.files {
            let _ = write!(out, "{indent}{}", file.file_name);
            if let Some(size) = file.file_size {
                let _ = write!(out, " ({})", ByteSize::b(size));
            }
            if !file.is_downloadable() {
                out.push_str(" [no download URL]");
            }
            out.push('\n');
        }
    }
}

/// Render scan results as an indented folder tree
pub fn render(files: &[FileDescriptor]) -> String {
    let mut root = FolderNode::default();
    for file in files {
        root.insert(file);
    }

    let mut out = String::new();
    root.render_into(&mut out, 0);
    out
}
