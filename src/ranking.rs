use crate::backend::RankingRule;
use crate::document::DocStats;
use crate::index::InvertedIndex;
use crate::tokenizer::Token;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Proximity charged for a pair of words that never share an attribute
pub const MAX_PROXIMITY: usize = 8;

/// BM25 parameters
pub struct BM25 {
    k1: f64,
    b: f64,
}

impl Default for BM25 {
    fn default() -> Self {
        Self {
            k1: 1.5, // Term frequency saturation parameter
            b: 0.75, // Length normalization parameter
        }
    }
}

impl BM25 {
    /// Calculate BM25 score for a document
    pub fn score(
        &self,
        query_terms: &[String],
        doc_stats: &DocStats,
        index: &InvertedIndex,
        avg_doc_length: f64,
    ) -> f64 {
        let mut score = 0.0;
        let doc_length = doc_stats.length as f64;
        let total_docs = index.total_documents() as f64;
        let length_ratio = if avg_doc_length > 0.0 {
            doc_length / avg_doc_length
        } else {
            1.0
        };

        for term in query_terms {
            let tf = *doc_stats.term_frequencies.get(term).unwrap_or(&0) as f64;
            if tf == 0.0 {
                continue;
            }

            let doc_freq = index.doc_frequency(term) as f64;
            let idf = if doc_freq > 0.0 {
                ((total_docs - doc_freq + 0.5) / (doc_freq + 0.5) + 1.0).ln()
            } else {
                0.0
            };

            let normalized_tf =
                (tf * (self.k1 + 1.0)) / (tf + self.k1 * (1.0 - self.b + self.b * length_ratio));

            score += idf * normalized_tf;
        }

        score
    }
}

/// How a document word satisfies a query word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordMatch {
    pub typos: usize,
    pub exact: bool,
}

impl WordMatch {
    pub const EXACT: WordMatch = WordMatch {
        typos: 0,
        exact: true,
    };

    /// Prefer fewer typos, then exact over derived matches
    pub fn better_than(&self, other: &WordMatch) -> bool {
        (self.typos, !self.exact) < (other.typos, !other.exact)
    }
}

/// A query word with every indexed word that matches it
#[derive(Debug, Clone)]
pub struct QueryWord {
    pub text: String,
    pub derivations: HashMap<String, WordMatch>,
}

/// Per-document measures the ranking rules sort on
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Relevance {
    /// Query words found in the document
    pub words: usize,
    /// Typos summed over the found words
    pub typos: usize,
    /// Summed distance between consecutive found words
    pub proximity: usize,
    /// Index of the earliest searchable attribute holding a match
    pub attribute: usize,
    /// Found words matched exactly
    pub exactness: usize,
    pub bm25: f64,
}

/// Measure how well a document's searchable attributes answer the query.
///
/// `attributes` holds the tokens of each searchable attribute in priority
/// order.
pub fn measure(query: &[QueryWord], attributes: &[Vec<Token>]) -> Relevance {
    let mut relevance = Relevance {
        attribute: attributes.len(),
        ..Relevance::default()
    };
    // Positions of each query word, per attribute
    let mut occurrences: Vec<Vec<Vec<usize>>> = Vec::with_capacity(query.len());

    for word in query {
        let mut best: Option<WordMatch> = None;
        let mut positions = vec![Vec::new(); attributes.len()];

        for (attr, tokens) in attributes.iter().enumerate() {
            for token in tokens {
                let Some(found) = word.derivations.get(&token.text) else {
                    continue;
                };
                positions[attr].push(token.position);
                relevance.attribute = relevance.attribute.min(attr);
                if best.map_or(true, |b| found.better_than(&b)) {
                    best = Some(*found);
                }
            }
        }

        if let Some(found) = best {
            relevance.words += 1;
            relevance.typos += found.typos;
            if found.exact {
                relevance.exactness += 1;
            }
            occurrences.push(positions);
        }
    }

    relevance.proximity = occurrences
        .windows(2)
        .map(|pair| pair_proximity(&pair[0], &pair[1]))
        .sum();

    relevance
}

fn pair_proximity(left: &[Vec<usize>], right: &[Vec<usize>]) -> usize {
    left.iter()
        .zip(right)
        .filter_map(|(a, b)| min_gap(a, b))
        .min()
        .unwrap_or(MAX_PROXIMITY)
        .min(MAX_PROXIMITY)
}

/// Smallest distance between two ascending position lists
fn min_gap(a: &[usize], b: &[usize]) -> Option<usize> {
    let (mut i, mut j) = (0, 0);
    let mut best: Option<usize> = None;
    while i < a.len() && j < b.len() {
        let gap = a[i].abs_diff(b[j]);
        best = Some(best.map_or(gap, |current| current.min(gap)));
        if a[i] < b[j] {
            i += 1;
        } else {
            j += 1;
        }
    }
    best
}

/// Order two documents by the ranking rules, BM25 breaking remaining ties
pub fn compare(a: &Relevance, b: &Relevance, rules: &[RankingRule]) -> Ordering {
    for rule in rules {
        let ordering = match rule {
            RankingRule::Words => b.words.cmp(&a.words),
            RankingRule::Typo => a.typos.cmp(&b.typos),
            RankingRule::Proximity => a.proximity.cmp(&b.proximity),
            RankingRule::Attribute => a.attribute.cmp(&b.attribute),
            // No sort parameters are ever requested
            RankingRule::Sort => Ordering::Equal,
            RankingRule::Exactness => b.exactness.cmp(&a.exactness),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    b.bm25.partial_cmp(&a.bm25).unwrap_or(Ordering::Equal)
}

/// Ranked search result
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub doc_id: String,
    pub relevance: Relevance,
}

impl ScoredDocument {
    pub fn new(doc_id: String, relevance: Relevance) -> Self {
        Self { doc_id, relevance }
    }
}

/// Sort scored documents best first; ids keep equal documents in a stable order
pub fn rank_documents(
    mut scored: Vec<ScoredDocument>,
    rules: &[RankingRule],
) -> Vec<ScoredDocument> {
    scored.sort_by(|a, b| {
        compare(&a.relevance, &b.relevance, rules).then_with(|| a.doc_id.cmp(&b.doc_id))
    });
    scored
}
