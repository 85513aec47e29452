use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;

lazy_static::lazy_static! {
    static ref STOPWORDS: HashSet<&'static str> = {
        [
            "a", "about", "above", "after", "again", "against", "all", "am", "an", "and",
            "any", "are", "as", "at", "be", "because", "been", "before", "being",
            "below", "between", "both", "but", "by", "cannot", "could",
            "did", "do", "does", "doing", "down", "during",
            "each", "few", "for", "from", "further", "had", "has",
            "have", "having", "he", "her", "here",
            "hers", "herself", "him", "himself", "his", "how", "i",
            "if", "in", "into", "is", "it", "its", "itself", "me", "more", "most", "my", "myself",
            "no", "nor", "not", "of", "off", "on", "once", "only", "or", "other", "ought",
            "our", "ours", "ourselves", "out", "over", "own", "same", "she",
            "should", "so", "some", "such",
            "than", "that", "the", "their", "theirs", "them", "themselves",
            "then", "there", "these", "they", "this", "those", "through", "to", "too",
            "under", "until", "up", "very", "was", "we", "were", "what", "when", "where",
            "which", "while", "who", "whom", "why", "with", "would", "you", "your", "yours",
            "yourself", "yourselves",
        ]
        .iter()
        .copied()
        .collect()
    };
}

/// A normalized word together with where it sits in the source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Lowercased word
    pub text: String,
    /// Byte offset of the first character in the source text
    pub start: usize,
    /// Byte offset one past the last character in the source text
    pub end: usize,
    /// Word position within the source text
    pub position: usize,
}

impl Token {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

pub struct Tokenizer {
    stemmer: Stemmer,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            stemmer: Stemmer::create(Algorithm::English),
        }
    }

    /// Split text into lowercased words, keeping byte offsets into `text`
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        text.unicode_word_indices()
            .enumerate()
            .map(|(position, (start, word))| Token {
                text: word.to_lowercase(),
                start,
                end: start + word.len(),
                position,
            })
            .collect()
    }

    /// Lowercased words without offsets
    pub fn words(&self, text: &str) -> Vec<String> {
        self.tokenize(text).into_iter().map(|t| t.text).collect()
    }

    pub fn is_stopword(&self, word: &str) -> bool {
        STOPWORDS.contains(word)
    }

    /// English stem of an already-lowercased word
    pub fn stem(&self, word: &str) -> String {
        self.stemmer.stem(word).into_owned()
    }

    /// Analysis used for relevance statistics: stopwords removed, stemmed
    pub fn analyze(&self, text: &str) -> Vec<String> {
        self.words(text)
            .into_iter()
            .filter(|t| !self.is_stopword(t))
            .map(|t| self.stem(&t))
            .collect()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}
