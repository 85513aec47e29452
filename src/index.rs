use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Inverted index: token -> IDs of the documents containing it
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InvertedIndex {
    index: HashMap<String, BTreeSet<String>>,
    documents: HashSet<String>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document to the index
    pub fn add_document(&mut self, doc_id: &str, tokens: &[String]) {
        for token in tokens {
            self.index
                .entry(token.clone())
                .or_default()
                .insert(doc_id.to_string());
        }
        self.documents.insert(doc_id.to_string());
    }

    /// Remove a document, given the tokens it was indexed under
    pub fn remove_document(&mut self, doc_id: &str, tokens: &[String]) {
        for token in tokens {
            if let Some(docs) = self.index.get_mut(token) {
                docs.remove(doc_id);
                if docs.is_empty() {
                    self.index.remove(token);
                }
            }
        }
        self.documents.remove(doc_id);
    }

    /// Get document IDs containing a token
    pub fn get_documents(&self, token: &str) -> Option<&BTreeSet<String>> {
        self.index.get(token)
    }

    /// Get number of documents containing a term (for IDF calculation)
    pub fn doc_frequency(&self, token: &str) -> usize {
        self.index.get(token).map_or(0, BTreeSet::len)
    }

    /// Get total number of indexed documents
    pub fn total_documents(&self) -> usize {
        self.documents.len()
    }

    /// Every distinct token, for typo and prefix lookups
    pub fn vocabulary(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    /// Documents matching ANY of the given tokens
    pub fn search_or<'a, I>(&self, tokens: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut result = BTreeSet::new();
        for token in tokens {
            if let Some(docs) = self.get_documents(token) {
                result.extend(docs.iter().cloned());
            }
        }
        result
    }

    /// Get index statistics
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            total_documents: self.documents.len(),
            total_tokens: self.index.len(),
            avg_docs_per_token: if self.index.is_empty() {
                0.0
            } else {
                self.index.values().map(BTreeSet::len).sum::<usize>() as f64
                    / self.index.len() as f64
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_documents: usize,
    pub total_tokens: usize,
    pub avg_docs_per_token: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_add_and_lookup() {
        let mut index = InvertedIndex::new();
        index.add_document("/a", &tokens(&["rust", "search"]));
        index.add_document("/b", &tokens(&["search", "engine"]));

        assert_eq!(index.total_documents(), 2);
        assert_eq!(index.doc_frequency("search"), 2);
        assert_eq!(index.doc_frequency("missing"), 0);

        let hits = index.search_or(["rust", "engine"]);
        assert_eq!(hits.into_iter().collect::<Vec<_>>(), vec!["/a", "/b"]);
    }

    #[test]
    fn test_remove_cleans_empty_postings() {
        let mut index = InvertedIndex::new();
        let words = tokens(&["unique", "shared"]);
        index.add_document("/a", &words);
        index.add_document("/b", &tokens(&["shared"]));

        index.remove_document("/a", &words);
        assert!(index.get_documents("unique").is_none());
        assert_eq!(index.doc_frequency("shared"), 1);
        assert_eq!(index.total_documents(), 1);

        index.remove_document("/missing", &words);
        assert_eq!(index.total_documents(), 1);
    }

    #[test]
    fn test_stats() {
        let mut index = InvertedIndex::new();
        index.add_document("/a", &tokens(&["x", "y"]));
        index.add_document("/b", &tokens(&["x"]));
        let stats = index.stats();
        assert_eq!(stats.total_documents, 2);
        assert_eq!(stats.total_tokens, 2);
        assert!((stats.avg_docs_per_token - 1.5).abs() < f64::EPSILON);
    }
}
