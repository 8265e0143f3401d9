//! Path helpers for route resources.
//!
//! Route files were written on Windows and reference resources with
//! backslash-separated relative paths. This module is the single place that
//! turns such references into real paths and probes the loader for them.

use std::path::{Path, PathBuf};

use crate::loader::ResourceLoader;

// ── Known extensions ─────────────────────────────────────────────

/// Tried in order when an object reference has no extension or is not found as written.
pub const OBJECT_EXTENSIONS: &[&str] = &["csv", "b3d", "x", "animated", "obj"];

pub const ANIMATED_EXTENSION: &str = "animated";
pub const XML_EXTENSION: &str = "xml";

/// Characters that cannot appear in a resource reference.
const INVALID_CHARS: &[char] = &['<', '>', '|', '"', '?', '*'];

// ── Combining ────────────────────────────────────────────────────

/// Validate a relative reference as written in a route file.
pub fn is_valid_reference(reference: &str) -> bool {
    let trimmed = reference.trim();
    !trimmed.is_empty()
        && !trimmed
            .chars()
            .any(|c| INVALID_CHARS.contains(&c) || c.is_control())
}

/// Join `reference` onto `base`, normalising Windows separators.
/// Returns `None` for references that cannot name a file.
pub fn combine(base: &Path, reference: &str) -> Option<PathBuf> {
    if !is_valid_reference(reference) {
        return None;
    }
    let normalized = reference.trim().replace('\\', "/");
    let mut path = base.to_path_buf();
    for part in normalized.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                path.pop();
            }
            other => path.push(other),
        }
    }
    Some(path)
}

/// Lower-cased extension of a reference, if any.
pub fn extension_of(reference: &str) -> Option<String> {
    let normalized = reference.trim().replace('\\', "/");
    Path::new(&normalized)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

pub fn has_extension(reference: &str, ext: &str) -> bool {
    extension_of(reference).is_some_and(|e| e == ext)
}

// ── Resolving ────────────────────────────────────────────────────

/// Locate an object file referenced from a route.
///
/// Search order: each folder in `folders` with the reference as written, then
/// each folder again with every entry of [`OBJECT_EXTENSIONS`] appended when
/// the reference carries no extension or the written one is missing.
pub fn resolve_object(
    loader: &dyn ResourceLoader,
    folders: &[&Path],
    reference: &str,
) -> Option<PathBuf> {
    resolve_with_extensions(loader, folders, reference, OBJECT_EXTENSIONS)
}

/// Locate a plain resource file (texture, sound, XML) with no extension probing.
pub fn resolve_file(
    loader: &dyn ResourceLoader,
    folders: &[&Path],
    reference: &str,
) -> Option<PathBuf> {
    resolve_with_extensions(loader, folders, reference, &[])
}

fn resolve_with_extensions(
    loader: &dyn ResourceLoader,
    folders: &[&Path],
    reference: &str,
    extensions: &[&str],
) -> Option<PathBuf> {
    let candidates: Vec<PathBuf> = folders
        .iter()
        .filter_map(|folder| combine(folder, reference))
        .collect();
    if let Some(found) = candidates.iter().find(|p| loader.file_exists(p)) {
        return Some(found.clone());
    }
    for candidate in &candidates {
        for ext in extensions {
            let mut with_ext = candidate.clone().into_os_string();
            with_ext.push(".");
            with_ext.push(ext);
            let with_ext = PathBuf::from(with_ext);
            if loader.file_exists(&with_ext) {
                return Some(with_ext);
            }
        }
    }
    None
}
