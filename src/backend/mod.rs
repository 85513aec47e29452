pub mod local;
pub mod meili;

pub use local::LocalBackend;
pub use meili::MeiliBackend;

use crate::document::Document;
use crate::error::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A ranked full-text engine: index management plus search with highlighting
#[async_trait]
pub trait SearchBackend: Send + Sync + 'static {
    async fn list_indexes(&self) -> Result<Vec<IndexInfo>, BackendError>;

    async fn create_index(&self, uid: &str, primary_key: &str) -> Result<(), BackendError>;

    async fn update_settings(&self, uid: &str, settings: &IndexSettings)
        -> Result<(), BackendError>;

    /// Insert documents, replacing any stored under the same primary key
    async fn add_documents(&self, uid: &str, documents: &[Document]) -> Result<(), BackendError>;

    async fn search(&self, uid: &str, query: &SearchQuery) -> Result<SearchHits, BackendError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexInfo {
    pub uid: String,
    #[serde(default)]
    pub primary_key: Option<String>,
}

/// Relevance tie-break criteria, applied in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingRule {
    Words,
    Typo,
    Proximity,
    Attribute,
    Sort,
    Exactness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinWordSizeForTypos {
    pub one_typo: u8,
    pub two_typos: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypoTolerance {
    pub enabled: bool,
    pub min_word_size_for_typos: MinWordSizeForTypos,
}

impl Default for TypoTolerance {
    fn default() -> Self {
        Self {
            enabled: true,
            min_word_size_for_typos: MinWordSizeForTypos {
                one_typo: 4,
                two_typos: 8,
            },
        }
    }
}

/// Declarative index configuration. Applying the same value twice has no
/// further effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSettings {
    pub searchable_attributes: Vec<String>,
    pub ranking_rules: Vec<RankingRule>,
    pub typo_tolerance: TypoTolerance,
}

impl Default for IndexSettings {
    /// Title outranks description, which outranks body text
    fn default() -> Self {
        Self {
            searchable_attributes: vec![
                "title".to_string(),
                "description".to_string(),
                "content".to_string(),
            ],
            ranking_rules: vec![
                RankingRule::Words,
                RankingRule::Typo,
                RankingRule::Proximity,
                RankingRule::Attribute,
                RankingRule::Sort,
                RankingRule::Exactness,
            ],
            typo_tolerance: TypoTolerance::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub q: String,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes_to_retrieve: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes_to_highlight: Vec<String>,
    pub highlight_pre_tag: String,
    pub highlight_post_tag: String,
}

impl SearchQuery {
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            limit: 20,
            attributes_to_retrieve: None,
            attributes_to_highlight: Vec::new(),
            highlight_pre_tag: "<em>".to_string(),
            highlight_post_tag: "</em>".to_string(),
        }
    }
}

/// One matching document: its retrieved fields plus the highlighted copy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(rename = "_formatted", default, skip_serializing_if = "Option::is_none")]
    pub formatted: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Hit {
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn formatted_str(&self, name: &str) -> Option<&str> {
        self.formatted
            .as_ref()
            .and_then(|formatted| formatted.get(name))
            .and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHits {
    pub hits: Vec<Hit>,
    #[serde(default)]
    pub estimated_total_hits: Option<usize>,
    #[serde(default)]
    pub processing_time_ms: u64,
}
