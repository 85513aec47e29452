use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocEntry {
    pub slug: String,
    pub title: String,
}

impl DocEntry {
    pub fn from_slug(slug: impl Into<String>) -> Self {
        let slug = slug.into();
        let title = slug.replace('-', " ");
        Self { slug, title }
    }
}

/// List the files directly under `dir` that carry `extension`, sorted by slug.
///
/// Subdirectories are not descended into.
pub fn list_docs(dir: &Path, extension: &str) -> io::Result<Vec<DocEntry>> {
    let extension = extension.trim_start_matches('.');
    let mut entries = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(extension) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
            entries.push(DocEntry::from_slug(stem));
        }
    }

    entries.sort_by(|a, b| a.slug.cmp(&b.slug));
    Ok(entries)
}
