//! Target path formatting and collision handling

use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs::{File, OpenOptions};

use crate::learn::FileDescriptor;

/// Characters that are not allowed in file names on at least one common platform
const INVALID_CHARS: [char; 8] = ['<', '>', ':', '"', '|', '?', '*', '\\'];

/// Replacement for invalid characters
const PLACEHOLDER: char = '_';

/// Maximum number of ` (n)` suffixes tried before giving up
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Replace characters that are invalid in file paths, keeping `/`
pub fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if INVALID_CHARS.contains(&c) || c.is_control() {
                PLACEHOLDER
            } else {
                c
            }
        })
        .collect()
}

/// Sanitize a single path component. Slashes are replaced too, and names that
/// would be empty or move up the tree become a placeholder.
pub fn sanitize_component(value: &str) -> String {
    let cleaned = sanitize(value).replace('/', "_");
    let cleaned = cleaned.trim();
    match cleaned {
        "" | "." | ".." => PLACEHOLDER.to_string(),
        other => other.to_string(),
    }
}

/// Compute the slash separated target path of a file relative to the output
/// directory: `[root label/][folders/]file name`.
pub fn target_path(file: &FileDescriptor, organize_by_folder: bool, root_label: Option<&str>) -> String {
    let mut parts = Vec::new();

    if let Some(label) = root_label.filter(|l| !l.trim().is_empty()) {
        parts.push(sanitize_component(label));
    }

    if organize_by_folder {
        parts.extend(
            sanitize(file.folder())
                .split('/')
                .filter(|part| !part.trim().is_empty())
                .map(sanitize_component),
        );
    }

    let name = if file.file_name.trim().is_empty() {
        &file.name
    } else {
        &file.file_name
    };
    parts.push(sanitize_component(name));

    parts.join("/")
}

/// Turn a slash separated target into a relative path, refusing anything
/// absolute or escaping the output directory.
pub fn relative_target(filename: &str) -> io::Result<PathBuf> {
    let parts: Vec<&str> = filename.split('/').filter(|part| !part.is_empty()).collect();
    let path: PathBuf = parts.iter().collect();

    let is_plain = parts.iter().all(|part| *part != "." && *part != "..")
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));

    if parts.is_empty() || !is_plain {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Invalid download filename: {filename}"),
        ));
    }

    Ok(path)
}

/// `path` with ` (n)` inserted before the extension
fn numbered(path: &Path, n: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{} ({}).{}", stem, n, ext.to_string_lossy()),
        None => format!("{} ({})", stem, n),
    };
    path.with_file_name(name)
}

/// Create a new file at `path`, renaming on collision instead of overwriting.
///
/// Returns the path actually used together with the opened file.
pub async fn create_unique(path: &Path) -> io::Result<(PathBuf, File)> {
    let candidates = std::iter::once(path.to_path_buf())
        .chain((1..=MAX_RENAME_ATTEMPTS).map(|n| numbered(path, n)));

    for candidate in candidates {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!(
            "Could not find unique filename for {} after {} attempts",
            path.display(),
            MAX_RENAME_ATTEMPTS
        ),
    ))
}
