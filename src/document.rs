use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Document represents one indexable content file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub content: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub slug: String,
}

impl Document {
    /// Create a document whose slug mirrors its id
    pub fn new(id: String, title: String, content: String) -> Self {
        Self {
            slug: id.clone(),
            id,
            title,
            description: String::new(),
            content,
            path: String::new(),
        }
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = description;
        self
    }

    pub fn with_path(mut self, path: String) -> Self {
        self.path = path;
        self
    }

    /// Look up a field by its attribute name
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "id" => Some(&self.id),
            "title" => Some(&self.title),
            "description" => Some(&self.description),
            "content" => Some(&self.content),
            "path" => Some(&self.path),
            "slug" => Some(&self.slug),
            _ => None,
        }
    }

    /// Attribute names in declaration order
    pub fn field_names() -> &'static [&'static str] {
        &["id", "title", "description", "content", "path", "slug"]
    }
}

/// Document statistics for BM25 ranking
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocStats {
    pub id: String,
    pub length: usize,
    pub term_frequencies: HashMap<String, usize>,
}

impl DocStats {
    pub fn new(id: String, length: usize) -> Self {
        Self {
            id,
            length,
            term_frequencies: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_mirrors_slug() {
        let doc = Document::new(
            "/docs/intro".to_string(),
            "Intro".to_string(),
            "Body".to_string(),
        );
        assert_eq!(doc.slug, "/docs/intro");
        assert_eq!(doc.description, "");
        assert_eq!(doc.field("slug"), Some("/docs/intro"));
        assert_eq!(doc.field("unknown"), None);
    }

    #[test]
    fn test_missing_description_deserializes_empty() -> serde_json::Result<()> {
        let doc: Document =
            serde_json::from_str(r#"{"id":"/a","title":"A","content":"text","slug":"/a"}"#)?;
        assert_eq!(doc.description, "");
        Ok(())
    }
}
