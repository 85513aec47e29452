//! The search service: lazy, at-most-once index initialization and queries.
//!
//! The index moves through `Uninitialized -> Initializing -> Ready`. The first
//! caller drives initialization (create the index if absent, apply settings,
//! load the corpus); callers arriving meanwhile wait on the same attempt. A
//! failed attempt leaves the service `Uninitialized` so the next call retries.

use crate::backend::{Hit, IndexSettings, SearchBackend, SearchQuery};
use crate::error::{InitError, SearchError};
use crate::scanner::{CorpusScanner, ScanSummary};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;

pub const DEFAULT_INDEX: &str = "docs";
pub const PRIMARY_KEY: &str = "id";
pub const MAX_RESULTS: usize = 10;
pub const SNIPPET_CHARS: usize = 200;
pub const HIGHLIGHT_PRE_TAG: &str = "<mark>";
pub const HIGHLIGHT_POST_TAG: &str = "</mark>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Uninitialized,
    Initializing,
    Ready,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ServiceState::Uninitialized => "uninitialized",
            ServiceState::Initializing => "initializing",
            ServiceState::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// One ranked hit, shaped for the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub description: String,
    pub slug: String,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlights: Option<Map<String, Value>>,
}

impl SearchResult {
    /// The highlighted content when the engine sent one, otherwise the start
    /// of the raw content.
    pub fn from_hit(hit: Hit) -> Self {
        let snippet = match hit.formatted_str("content") {
            Some(formatted) if !formatted.is_empty() => formatted.to_string(),
            _ => plain_snippet(hit.field_str("content").unwrap_or_default()),
        };

        Self {
            title: hit.field_str("title").unwrap_or_default().to_string(),
            description: hit.field_str("description").unwrap_or_default().to_string(),
            slug: hit.field_str("slug").unwrap_or_default().to_string(),
            snippet,
            highlights: hit.formatted,
        }
    }
}

fn plain_snippet(content: &str) -> String {
    let mut snippet: String = content.chars().take(SNIPPET_CHARS).collect();
    snippet.push_str("...");
    snippet
}

/// Clears the `initializing` flag however the attempt ends
struct Initializing<'a>(&'a AtomicBool);

impl<'a> Initializing<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for Initializing<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct SearchService<B> {
    backend: B,
    index: String,
    content_dir: PathBuf,
    scanner: CorpusScanner,
    settings: IndexSettings,
    ready: OnceCell<()>,
    initializing: AtomicBool,
}

impl<B: SearchBackend> SearchService<B> {
    pub fn new(backend: B, content_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            index: DEFAULT_INDEX.to_string(),
            content_dir: content_dir.into(),
            scanner: CorpusScanner::new(),
            settings: IndexSettings::default(),
            ready: OnceCell::new(),
            initializing: AtomicBool::new(false),
        }
    }

    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = index.into();
        self
    }

    pub fn with_scanner(mut self, scanner: CorpusScanner) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn with_settings(mut self, settings: IndexSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn index_name(&self) -> &str {
        &self.index
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    pub fn state(&self) -> ServiceState {
        if self.ready.initialized() {
            ServiceState::Ready
        } else if self.initializing.load(Ordering::SeqCst) {
            ServiceState::Initializing
        } else {
            ServiceState::Uninitialized
        }
    }

    /// Make sure the index exists, is configured and holds the corpus.
    ///
    /// Returns immediately once ready. Concurrent first callers share a single
    /// initialization attempt.
    pub async fn ensure_ready(&self) -> Result<(), SearchError> {
        if self.ready.initialized() {
            return Ok(());
        }
        self.ready
            .get_or_try_init(|| async move { self.initialize().await.map(|_| ()) })
            .await?;
        Ok(())
    }

    async fn initialize(&self) -> Result<ScanSummary, InitError> {
        let _flag = Initializing::enter(&self.initializing);
        tracing::info!("Initializing search index {}", self.index);

        let result = self.prepare_index().await;
        match &result {
            Ok(summary) => tracing::info!(
                "Search index {} ready ({} documents, {} skipped)",
                self.index,
                summary.documents,
                summary.skipped
            ),
            Err(err) => tracing::error!(
                "Failed to initialize search index {}: {}",
                self.index,
                err
            ),
        }
        result
    }

    async fn prepare_index(&self) -> Result<ScanSummary, InitError> {
        let indexes = self.backend.list_indexes().await?;
        if !indexes.iter().any(|index| index.uid == self.index) {
            tracing::info!("Creating search index {}", self.index);
            self.backend.create_index(&self.index, PRIMARY_KEY).await?;
        }

        tracing::info!("Configuring search settings");
        self.backend
            .update_settings(&self.index, &self.settings)
            .await?;

        self.load_corpus().await
    }

    /// Scan the content tree and add every document to the index
    async fn load_corpus(&self) -> Result<ScanSummary, InitError> {
        let report = self.scanner.scan(&self.content_dir)?;
        for skipped in &report.skipped {
            tracing::warn!("Skipping {}: {}", skipped.path().display(), skipped);
        }

        let summary = report.summary();
        if report.documents.is_empty() {
            tracing::info!("No content files found in {}", self.content_dir.display());
        } else {
            tracing::info!("Indexing {} content files", report.documents.len());
            self.backend
                .add_documents(&self.index, &report.documents)
                .await?;
        }
        Ok(summary)
    }

    /// Re-scan the corpus into the index, replacing documents by id.
    ///
    /// When this call is the one that initializes the index, the initial load
    /// is the reindex.
    pub async fn reindex(&self) -> Result<ScanSummary, SearchError> {
        let mut initial = None;
        let slot = &mut initial;
        self.ready
            .get_or_try_init(|| async move {
                *slot = Some(self.initialize().await?);
                Ok::<(), InitError>(())
            })
            .await?;

        match initial {
            Some(summary) => Ok(summary),
            None => Ok(self.load_corpus().await?),
        }
    }

    fn search_query(&self, text: &str) -> SearchQuery {
        SearchQuery {
            q: text.to_string(),
            limit: MAX_RESULTS,
            attributes_to_retrieve: Some(
                ["title", "description", "content", "slug"]
                    .map(String::from)
                    .to_vec(),
            ),
            attributes_to_highlight: ["title", "description", "content"]
                .map(String::from)
                .to_vec(),
            highlight_pre_tag: HIGHLIGHT_PRE_TAG.to_string(),
            highlight_post_tag: HIGHLIGHT_POST_TAG.to_string(),
        }
    }

    /// Ranked, highlighted results for `text`, at most [`MAX_RESULTS`].
    ///
    /// Blank text yields no results without touching the engine.
    pub async fn query(&self, text: &str) -> Result<Vec<SearchResult>, SearchError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        self.ensure_ready().await?;

        tracing::debug!("Searching for: {}", text);
        let hits = self
            .backend
            .search(&self.index, &self.search_query(text))
            .await
            .map_err(|err| {
                tracing::error!("Search error: {}", err);
                SearchError::Query(err)
            })?;

        let results: Vec<SearchResult> = hits
            .hits
            .into_iter()
            .take(MAX_RESULTS)
            .map(SearchResult::from_hit)
            .collect();
        tracing::debug!("Found {} results", results.len());
        Ok(results)
    }

    /// [`Self::query`] bounded by a deadline
    pub async fn query_with_timeout(
        &self,
        text: &str,
        timeout: Duration,
    ) -> Result<Vec<SearchResult>, SearchError> {
        tokio::time::timeout(timeout, self.query(text))
            .await
            .map_err(|_| SearchError::Timeout(timeout))?
    }
}
