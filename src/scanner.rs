use crate::document::Document;
use crate::error::ScanError;
use crate::frontmatter::parse_frontmatter;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Extension recognized when none is configured
pub const DEFAULT_EXTENSION: &str = "mdx";

/// Outcome of a scan: the documents produced plus the files that were left out.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub documents: Vec<Document>,
    pub skipped: Vec<ScanError>,
}

/// Counts reported to operators after a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub documents: usize,
    pub skipped: usize,
}

impl ScanReport {
    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            documents: self.documents.len(),
            skipped: self.skipped.len(),
        }
    }

    /// Fail on the first skipped file instead of leaving it out.
    pub fn into_strict(self) -> Result<Vec<Document>, ScanError> {
        match self.skipped.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self.documents),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CorpusScanner {
    extensions: Vec<String>,
}

impl Default for CorpusScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl CorpusScanner {
    pub fn new() -> Self {
        Self {
            extensions: vec![DEFAULT_EXTENSION.to_string()],
        }
    }

    /// Recognize the given extensions (with or without a leading dot)
    pub fn with_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_string())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn is_recognized(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| self.extensions.iter().any(|e| e == ext))
    }

    /// Walk `root` and build one document per recognized file.
    ///
    /// A missing or unreadable root fails the whole scan. Problems with a
    /// single file (unreadable, malformed front-matter, id already taken) are
    /// collected in [`ScanReport::skipped`] and the walk continues.
    pub fn scan(&self, root: &Path) -> Result<ScanReport, ScanError> {
        let metadata = std::fs::metadata(root).map_err(|source| ScanError::Filesystem {
            path: root.to_path_buf(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(ScanError::Filesystem {
                path: root.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "corpus root is not a directory",
                ),
            });
        }

        let mut report = ScanReport::default();
        let mut seen: HashMap<String, PathBuf> = HashMap::new();

        for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().unwrap_or(root).to_path_buf();
                    let fatal = err.depth() == 0;
                    let source = std::io::Error::from(err);
                    let err = ScanError::Filesystem { path, source };
                    if fatal {
                        return Err(err);
                    }
                    report.skipped.push(err);
                    continue;
                }
            };

            if !entry.file_type().is_file() || !self.is_recognized(entry.path()) {
                continue;
            }

            let path = entry.path();
            let document = match read_document(root, path) {
                Ok(document) => document,
                Err(err) => {
                    report.skipped.push(err);
                    continue;
                }
            };

            if let Some(first) = seen.get(&document.id) {
                tracing::error!(
                    "Document id {} from {} collides with {}",
                    document.id,
                    path.display(),
                    first.display()
                );
                report.skipped.push(ScanError::DuplicateId {
                    id: document.id,
                    path: path.to_path_buf(),
                    first: first.clone(),
                });
                continue;
            }

            tracing::debug!("Scanned {} as {}", path.display(), document.id);
            seen.insert(document.id.clone(), path.to_path_buf());
            report.documents.push(document);
        }

        Ok(report)
    }
}

fn read_document(root: &Path, path: &Path) -> Result<Document, ScanError> {
    let text = std::fs::read_to_string(path).map_err(|source| ScanError::Filesystem {
        path: path.to_path_buf(),
        source,
    })?;

    let (frontmatter, body) = parse_frontmatter(&text).map_err(|source| ScanError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let relative = path.strip_prefix(root).unwrap_or(path);
    let id = document_id(relative);
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let title = frontmatter
        .title
        .filter(|title| !title.is_empty())
        .unwrap_or(file_name);

    Ok(Document::new(id, title, body)
        .with_description(frontmatter.description.unwrap_or_default())
        .with_path(slash_path(relative)))
}

/// Derive a document id from a corpus-relative path: extension stripped,
/// `/`-separated, rooted at `/`.
pub fn document_id(relative: &Path) -> String {
    slash_path(&relative.with_extension(""))
}

fn slash_path(path: &Path) -> String {
    let mut out = String::new();
    for component in path.components() {
        if let Component::Normal(part) = component {
            out.push('/');
            out.push_str(&part.to_string_lossy().replace('\\', "/"));
        }
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, text: &str) -> std::io::Result<()> {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, text)
    }

    fn corpus() -> anyhow::Result<TempDir> {
        let dir = tempfile::tempdir()?;
        write(
            dir.path(),
            "index.mdx",
            "---\ntitle: Home\ndescription: Landing page\n---\nWelcome home.\n",
        )?;
        write(
            dir.path(),
            "docs/getting-started.mdx",
            "---\ntitle: Getting Started\n---\nInstall the CLI.\n",
        )?;
        write(dir.path(), "docs/apis/users.mdx", "No front-matter here.\n")?;
        write(dir.path(), "docs/notes.txt", "ignored\n")?;
        Ok(dir)
    }

    #[test]
    fn test_document_id() {
        assert_eq!(
            document_id(Path::new("docs/apis/users.mdx")),
            "/docs/apis/users"
        );
        assert_eq!(document_id(Path::new("index.mdx")), "/index");
        assert_eq!(document_id(Path::new("v1.2.mdx")), "/v1.2");
    }

    #[test]
    fn test_scan_builds_documents() -> anyhow::Result<()> {
        let dir = corpus()?;
        let report = CorpusScanner::new().scan(dir.path())?;

        assert!(report.skipped.is_empty());
        assert_eq!(report.documents.len(), 3);

        let ids: Vec<&str> = report.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["/docs/apis/users", "/docs/getting-started", "/index"]
        );

        let home = &report.documents[2];
        assert_eq!(home.title, "Home");
        assert_eq!(home.description, "Landing page");
        assert_eq!(home.content, "Welcome home.\n");
        assert_eq!(home.path, "/index.mdx");
        assert_eq!(home.slug, home.id);

        let users = &report.documents[0];
        assert_eq!(users.title, "users.mdx");
        assert_eq!(users.description, "");
        Ok(())
    }

    #[test]
    fn test_scan_missing_root() {
        let result = CorpusScanner::new().scan(Path::new("/definitely/not/here"));
        assert!(matches!(result, Err(ScanError::Filesystem { .. })));
    }

    #[test]
    fn test_scan_root_is_file() -> anyhow::Result<()> {
        let dir = corpus()?;
        let result = CorpusScanner::new().scan(&dir.path().join("index.mdx"));
        assert!(matches!(result, Err(ScanError::Filesystem { .. })));
        Ok(())
    }

    #[test]
    fn test_malformed_document_is_skipped() -> anyhow::Result<()> {
        let dir = corpus()?;
        write(dir.path(), "docs/broken.mdx", "---\ntitle: [oops\n---\nbody\n")?;

        let report = CorpusScanner::new().scan(dir.path())?;
        assert_eq!(report.documents.len(), 3);
        assert_eq!(report.skipped.len(), 1);
        assert!(matches!(report.skipped[0], ScanError::Parse { .. }));
        assert!(report.skipped[0].path().ends_with("docs/broken.mdx"));

        assert!(report.into_strict().is_err());
        Ok(())
    }

    #[test]
    fn test_unreadable_document_is_skipped() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write(dir.path(), "good.mdx", "---\ntitle: Good\n---\nbody\n")?;
        fs::write(dir.path().join("bad.mdx"), [0xff, 0xfe])?;

        let report = CorpusScanner::new().scan(dir.path())?;
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].id, "/good");
        assert_eq!(report.documents[0].title, "Good");
        assert!(matches!(
            &report.skipped[..],
            [ScanError::Filesystem { path, .. }] if path.ends_with("bad.mdx")
        ));
        Ok(())
    }

    #[test]
    fn test_duplicate_ids_are_rejected() -> anyhow::Result<()> {
        let dir = corpus()?;
        write(dir.path(), "docs/getting-started.md", "Markdown twin\n")?;

        let report = CorpusScanner::with_extensions([".md", "mdx"]).scan(dir.path())?;
        let ids: HashSet<&str> = report.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids.len(), report.documents.len());
        assert_eq!(report.documents.len(), 3);
        assert!(matches!(
            &report.skipped[..],
            [ScanError::DuplicateId { id, .. }] if id == "/docs/getting-started"
        ));
        Ok(())
    }

    #[test]
    fn test_empty_frontmatter_title_falls_back() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write(dir.path(), "blank.mdx", "---\ntitle: \"\"\n---\nbody\n")?;
        let report = CorpusScanner::new().scan(dir.path())?;
        assert_eq!(report.documents[0].title, "blank.mdx");
        Ok(())
    }
}
