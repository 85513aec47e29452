use crate::tokenizer::Token;
use std::collections::HashSet;

/// Opening and closing markers placed around matched words
#[derive(Debug, Clone, Copy)]
pub struct Tags<'a> {
    pub pre: &'a str,
    pub post: &'a str,
}

/// Copy `text`, wrapping every token whose normalized form is in `matched`.
///
/// `tokens` must come from tokenizing this same `text`; their byte offsets
/// decide where the tags go. Adjacent matched words are wrapped separately.
pub fn highlight(
    text: &str,
    tokens: &[Token],
    matched: &HashSet<String>,
    tags: Tags<'_>,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    for token in tokens.iter().filter(|t| matched.contains(&t.text)) {
        out.push_str(&text[cursor..token.start]);
        out.push_str(tags.pre);
        out.push_str(&text[token.start..token.end]);
        out.push_str(tags.post);
        cursor = token.end;
    }
    out.push_str(&text[cursor..]);
    out
}
