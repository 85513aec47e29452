use super::{Hit, IndexInfo, IndexSettings, SearchBackend, SearchHits, SearchQuery};
use crate::document::{DocStats, Document};
use crate::error::BackendError;
use crate::highlight::{highlight, Tags};
use crate::index::{IndexStats, InvertedIndex};
use crate::ranking::{measure, rank_documents, QueryWord, ScoredDocument, WordMatch, BM25};
use crate::storage::{Storage, StoredIndex};
use crate::tokenizer::{Token, Tokenizer};
use crate::typo::{bounded_distance, typo_budget};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::time::Instant;

const ALL_ATTRIBUTES: &str = "*";

struct IndexedDocument {
    document: Document,
    /// Tokens of each searchable attribute, in priority order
    searchable: Vec<Vec<Token>>,
    stats: DocStats,
}

struct LocalIndex {
    primary_key: String,
    settings: IndexSettings,
    documents: HashMap<String, IndexedDocument>,
    words: InvertedIndex,
    /// Stem of every word in `words`
    stems: HashMap<String, String>,
    terms: InvertedIndex,
    total_length: usize,
}

impl LocalIndex {
    fn new(primary_key: String, settings: IndexSettings) -> Self {
        Self {
            primary_key,
            settings,
            documents: HashMap::new(),
            words: InvertedIndex::new(),
            stems: HashMap::new(),
            terms: InvertedIndex::new(),
            total_length: 0,
        }
    }

    fn searchable_attributes(&self) -> Vec<&str> {
        resolve_attributes(&self.settings.searchable_attributes)
    }

    fn avg_doc_length(&self) -> f64 {
        if self.documents.is_empty() {
            0.0
        } else {
            self.total_length as f64 / self.documents.len() as f64
        }
    }

    /// Insert or replace a document under `key`
    fn upsert(&mut self, tokenizer: &Tokenizer, key: String, document: Document) {
        self.remove(&key);

        let searchable: Vec<Vec<Token>> = self
            .searchable_attributes()
            .into_iter()
            .map(|attr| tokenizer.tokenize(document.field(attr).unwrap_or_default()))
            .collect();

        let words: Vec<String> = searchable
            .iter()
            .flatten()
            .map(|t| t.text.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        self.words.add_document(&key, &words);
        for word in &words {
            if !self.stems.contains_key(word) {
                self.stems.insert(word.clone(), tokenizer.stem(word));
            }
        }

        let mut stats = DocStats::new(key.clone(), 0);
        for token in searchable.iter().flatten() {
            if tokenizer.is_stopword(&token.text) {
                continue;
            }
            stats.length += 1;
            *stats
                .term_frequencies
                .entry(tokenizer.stem(&token.text))
                .or_insert(0) += 1;
        }
        let terms: Vec<String> = stats.term_frequencies.keys().cloned().collect();
        self.terms.add_document(&key, &terms);
        self.total_length += stats.length;

        self.documents.insert(
            key,
            IndexedDocument {
                document,
                searchable,
                stats,
            },
        );
    }

    fn remove(&mut self, key: &str) {
        let Some(old) = self.documents.remove(key) else {
            return;
        };
        let words: Vec<String> = old.searchable.iter().flatten().map(|t| t.text.clone()).collect();
        self.words.remove_document(key, &words);
        for word in &words {
            if self.words.doc_frequency(word) == 0 {
                self.stems.remove(word);
            }
        }
        let terms: Vec<String> = old.stats.term_frequencies.keys().cloned().collect();
        self.terms.remove_document(key, &terms);
        self.total_length -= old.stats.length;
    }

    /// Re-analyze every document, e.g. after the searchable attributes changed
    fn rebuild(&mut self, tokenizer: &Tokenizer) {
        let documents: Vec<(String, Document)> = self
            .documents
            .drain()
            .map(|(key, indexed)| (key, indexed.document))
            .collect();
        self.words = InvertedIndex::new();
        self.stems.clear();
        self.terms = InvertedIndex::new();
        self.total_length = 0;
        for (key, document) in documents {
            self.upsert(tokenizer, key, document);
        }
    }

    /// Match each query word against the vocabulary
    fn query_words(&self, tokenizer: &Tokenizer, tokens: &[Token]) -> Vec<QueryWord> {
        let tolerance = &self.settings.typo_tolerance;
        let last = tokens.len().saturating_sub(1);

        tokens
            .iter()
            .enumerate()
            .map(|(i, token)| {
                let budget = typo_budget(token.char_len(), tolerance);
                let stem = tokenizer.stem(&token.text);
                let mut derivations = HashMap::new();

                for word in self.words.vocabulary() {
                    let found = if word == token.text {
                        Some(WordMatch::EXACT)
                    } else if (i == last && word.starts_with(&token.text))
                        || self.stems.get(word) == Some(&stem)
                    {
                        Some(WordMatch {
                            typos: 0,
                            exact: false,
                        })
                    } else if budget > 0 {
                        bounded_distance(&token.text, word, budget).map(|typos| WordMatch {
                            typos,
                            exact: false,
                        })
                    } else {
                        None
                    };
                    if let Some(found) = found {
                        derivations.insert(word.to_string(), found);
                    }
                }

                QueryWord {
                    text: token.text.clone(),
                    derivations,
                }
            })
            .collect()
    }

    fn search(&self, tokenizer: &Tokenizer, query: &SearchQuery) -> SearchHits {
        let started = Instant::now();
        let tokens = tokenizer.tokenize(&query.q);
        if tokens.is_empty() {
            return SearchHits::default();
        }

        let query_words = self.query_words(tokenizer, &tokens);

        // Stopwords only select documents when the query has nothing else
        let all_stopwords = query_words.iter().all(|w| tokenizer.is_stopword(&w.text));
        let candidates = self.words.search_or(
            query_words
                .iter()
                .filter(|w| all_stopwords || !tokenizer.is_stopword(&w.text))
                .flat_map(|w| w.derivations.keys().map(String::as_str)),
        );

        let query_terms = tokenizer.analyze(&query.q);
        let bm25 = BM25::default();
        let avg_length = self.avg_doc_length();

        let scored: Vec<ScoredDocument> = candidates
            .into_iter()
            .filter_map(|key| {
                let indexed = self.documents.get(&key)?;
                let mut relevance = measure(&query_words, &indexed.searchable);
                relevance.bm25 = bm25.score(&query_terms, &indexed.stats, &self.terms, avg_length);
                Some(ScoredDocument::new(key, relevance))
            })
            .collect();

        let total = scored.len();
        let ranked = rank_documents(scored, &self.settings.ranking_rules);

        let matched: HashSet<String> = query_words
            .iter()
            .flat_map(|w| w.derivations.keys().cloned())
            .collect();
        let tags = Tags {
            pre: &query.highlight_pre_tag,
            post: &query.highlight_post_tag,
        };

        let hits = ranked
            .into_iter()
            .take(query.limit)
            .filter_map(|scored| self.documents.get(&scored.doc_id))
            .map(|indexed| build_hit(tokenizer, &indexed.document, query, &matched, tags))
            .collect();

        SearchHits {
            hits,
            estimated_total_hits: Some(total),
            processing_time_ms: started.elapsed().as_millis() as u64,
        }
    }
}

fn resolve_attributes(names: &[String]) -> Vec<&str> {
    if names.iter().any(|name| name == ALL_ATTRIBUTES) {
        Document::field_names().to_vec()
    } else {
        names.iter().map(String::as_str).collect()
    }
}

fn build_hit(
    tokenizer: &Tokenizer,
    document: &Document,
    query: &SearchQuery,
    matched: &HashSet<String>,
    tags: Tags<'_>,
) -> Hit {
    let retrieve = match &query.attributes_to_retrieve {
        Some(names) => resolve_attributes(names),
        None => Document::field_names().to_vec(),
    };

    let mut fields = Map::new();
    for name in retrieve {
        if let Some(value) = document.field(name) {
            fields.insert(name.to_string(), Value::String(value.to_string()));
        }
    }

    let formatted = if query.attributes_to_highlight.is_empty() {
        None
    } else {
        let mut formatted = fields.clone();
        for name in resolve_attributes(&query.attributes_to_highlight) {
            if let Some(text) = document.field(name) {
                let tokens = tokenizer.tokenize(text);
                formatted.insert(
                    name.to_string(),
                    Value::String(highlight(text, &tokens, matched, tags)),
                );
            }
        }
        Some(formatted)
    };

    Hit { formatted, fields }
}

fn validate_attributes(names: &[String], code: &str) -> Result<(), BackendError> {
    for name in names {
        if name != ALL_ATTRIBUTES && !Document::field_names().contains(&name.as_str()) {
            return Err(BackendError::rejected(
                400,
                code,
                format!("Unknown attribute `{name}`"),
            ));
        }
    }
    Ok(())
}

/// Search engine running inside the process
pub struct LocalBackend {
    storage: Storage,
    tokenizer: Tokenizer,
    indexes: RwLock<BTreeMap<String, LocalIndex>>,
}

impl LocalBackend {
    /// Open an engine persisted under `path`, reloading existing indexes
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, BackendError> {
        Self::with_storage(Storage::open(path)?)
    }

    /// Create an engine whose data is discarded on drop
    pub fn in_memory() -> Result<Self, BackendError> {
        Self::with_storage(Storage::in_memory()?)
    }

    fn with_storage(storage: Storage) -> Result<Self, BackendError> {
        let tokenizer = Tokenizer::new();
        let mut indexes = BTreeMap::new();

        for stored in storage.load_indexes()? {
            let mut index = LocalIndex::new(stored.primary_key.clone(), stored.settings.clone());
            for document in storage.load_documents(&stored.uid)? {
                let key = document
                    .field(&stored.primary_key)
                    .unwrap_or_default()
                    .to_string();
                index.upsert(&tokenizer, key, document);
            }
            tracing::debug!(
                "Loaded index {} with {} documents",
                stored.uid,
                index.documents.len()
            );
            indexes.insert(stored.uid, index);
        }

        Ok(Self {
            storage,
            tokenizer,
            indexes: RwLock::new(indexes),
        })
    }

    /// Get a stored document by primary key
    pub fn get_document(&self, uid: &str, key: &str) -> Result<Option<Document>, BackendError> {
        if !self.indexes.read().contains_key(uid) {
            return Err(BackendError::IndexNotFound(uid.to_string()));
        }
        self.storage.get_document(uid, key)
    }

    /// Word index statistics of an index
    pub fn stats(&self, uid: &str) -> Result<IndexStats, BackendError> {
        self.indexes
            .read()
            .get(uid)
            .map(|index| index.words.stats())
            .ok_or_else(|| BackendError::IndexNotFound(uid.to_string()))
    }

    /// Get the settings an index currently runs with
    pub fn settings(&self, uid: &str) -> Result<IndexSettings, BackendError> {
        self.indexes
            .read()
            .get(uid)
            .map(|index| index.settings.clone())
            .ok_or_else(|| BackendError::IndexNotFound(uid.to_string()))
    }
}

#[async_trait]
impl SearchBackend for LocalBackend {
    async fn list_indexes(&self) -> Result<Vec<IndexInfo>, BackendError> {
        Ok(self
            .indexes
            .read()
            .iter()
            .map(|(uid, index)| IndexInfo {
                uid: uid.clone(),
                primary_key: Some(index.primary_key.clone()),
            })
            .collect())
    }

    async fn create_index(&self, uid: &str, primary_key: &str) -> Result<(), BackendError> {
        if !Document::field_names().contains(&primary_key) {
            return Err(BackendError::rejected(
                400,
                "invalid_index_primary_key",
                format!("Documents have no `{primary_key}` attribute"),
            ));
        }

        let mut indexes = self.indexes.write();
        if indexes.contains_key(uid) {
            return Err(BackendError::rejected(
                409,
                "index_already_exists",
                format!("Index `{uid}` already exists"),
            ));
        }

        // New indexes search every attribute until configured otherwise
        let settings = IndexSettings {
            searchable_attributes: vec![ALL_ATTRIBUTES.to_string()],
            ..IndexSettings::default()
        };
        self.storage.save_index(&StoredIndex {
            uid: uid.to_string(),
            primary_key: primary_key.to_string(),
            settings: settings.clone(),
        })?;
        indexes.insert(uid.to_string(), LocalIndex::new(primary_key.to_string(), settings));
        tracing::info!("Created index {} (primary key {})", uid, primary_key);
        Ok(())
    }

    async fn update_settings(
        &self,
        uid: &str,
        settings: &IndexSettings,
    ) -> Result<(), BackendError> {
        validate_attributes(
            &settings.searchable_attributes,
            "invalid_settings_searchable_attributes",
        )?;

        let mut indexes = self.indexes.write();
        let index = indexes
            .get_mut(uid)
            .ok_or_else(|| BackendError::IndexNotFound(uid.to_string()))?;

        if index.settings == *settings {
            return Ok(());
        }

        self.storage.save_index(&StoredIndex {
            uid: uid.to_string(),
            primary_key: index.primary_key.clone(),
            settings: settings.clone(),
        })?;
        let reanalyze = index.settings.searchable_attributes != settings.searchable_attributes;
        index.settings = settings.clone();
        if reanalyze {
            index.rebuild(&self.tokenizer);
        }
        tracing::info!("Updated settings of index {}", uid);
        Ok(())
    }

    async fn add_documents(&self, uid: &str, documents: &[Document]) -> Result<(), BackendError> {
        let mut indexes = self.indexes.write();
        let index = indexes
            .get_mut(uid)
            .ok_or_else(|| BackendError::IndexNotFound(uid.to_string()))?;

        let mut keyed = Vec::with_capacity(documents.len());
        for document in documents {
            match document.field(&index.primary_key) {
                Some(key) if !key.is_empty() => keyed.push((key, document)),
                _ => {
                    return Err(BackendError::rejected(
                        400,
                        "missing_document_id",
                        format!("Document has no `{}` value", index.primary_key),
                    ))
                }
            }
        }

        self.storage.save_documents(uid, keyed.iter().copied())?;
        for (key, document) in keyed {
            index.upsert(&self.tokenizer, key.to_string(), document.clone());
        }
        tracing::debug!("Added {} documents to index {}", documents.len(), uid);
        Ok(())
    }

    async fn search(&self, uid: &str, query: &SearchQuery) -> Result<SearchHits, BackendError> {
        let indexes = self.indexes.read();
        let index = indexes
            .get(uid)
            .ok_or_else(|| BackendError::IndexNotFound(uid.to_string()))?;
        Ok(index.search(&self.tokenizer, query))
    }
}
