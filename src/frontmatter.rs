use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrontmatterError {
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Front-matter must be a key/value mapping")]
    NotAMapping,

    #[error("Front-matter block is not terminated by `---`")]
    Unterminated,
}

/// Metadata fields the search index cares about. Other keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Frontmatter {
    #[serde(default, deserialize_with = "scalar_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub description: Option<String>,
}

static FRONTMATTER_REGEX: OnceLock<Regex> = OnceLock::new();

fn frontmatter_regex() -> &'static Regex {
    FRONTMATTER_REGEX.get_or_init(|| {
        Regex::new(r"(?s)\A---[ \t]*\r?\n(?:(.*?)\r?\n)?---[ \t]*(?:\r?\n|\z)(.*)\z")
            .expect("front-matter pattern is valid")
    })
}

/// Accept strings, numbers and booleans as text; `null` means absent.
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::Null => Ok(None),
        serde_yaml::Value::String(s) => Ok(Some(s)),
        serde_yaml::Value::Number(n) => Ok(Some(n.to_string())),
        serde_yaml::Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(D::Error::custom(format!(
            "expected a scalar, found {}",
            yaml_kind(&other)
        ))),
    }
}

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Sequence(_) => "a sequence",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
        _ => "a scalar",
    }
}

/// Split front-matter from a content file.
///
/// Returns `(frontmatter, body)`. A file that does not open with a `---` line
/// has no front-matter and its whole text is the body. An opening fence
/// without a closing one, YAML that fails to parse, or YAML that is not a
/// mapping is an error.
///
/// ```
/// use docsearch::frontmatter::parse_frontmatter;
///
/// let (fm, body) = parse_frontmatter("---\ntitle: Intro\n---\n# Hello\n").unwrap();
/// assert_eq!(fm.title.as_deref(), Some("Intro"));
/// assert_eq!(body, "# Hello\n");
/// ```
pub fn parse_frontmatter(text: &str) -> Result<(Frontmatter, String), FrontmatterError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    if !opens_with_fence(text) {
        return Ok((Frontmatter::default(), text.to_string()));
    }

    let captures = frontmatter_regex()
        .captures(text)
        .ok_or(FrontmatterError::Unterminated)?;
    let yaml = captures.get(1).map_or("", |m| m.as_str());
    let body = captures.get(2).map_or("", |m| m.as_str());

    let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
    let frontmatter = match value {
        serde_yaml::Value::Null => Frontmatter::default(),
        serde_yaml::Value::Mapping(_) => serde_yaml::from_value(value)?,
        _ => return Err(FrontmatterError::NotAMapping),
    };

    Ok((frontmatter, body.to_string()))
}

fn opens_with_fence(text: &str) -> bool {
    let first_line = text.lines().next().unwrap_or("");
    first_line.trim_end() == "---"
}
