use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A single recipe record as stored in the JSON recipe store.
///
/// Only the fields involved in identity and validation are typed. Everything
/// else (servings, times, difficulty, images...) is carried in `extra` and
/// written back unchanged, in its original order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_or_seq",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub ingredients: Vec<String>,
    #[serde(
        default,
        deserialize_with = "string_or_seq",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub steps: Vec<String>,
    #[serde(
        default,
        deserialize_with = "string_or_seq",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Recipe {
    pub fn new(title: impl Into<String>) -> Self {
        Recipe {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Human-readable handle for log lines: the title, else the URL.
    pub fn label(&self) -> Option<&str> {
        let title = self.title.trim();
        if !title.is_empty() {
            return Some(title);
        }
        self.source_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Identity-only view of a stored record whose content fields have a
    /// shape this crate does not model (structured ingredients, numeric
    /// tags...). Only string `title`, `sourceUrl`, `slug` and `youtubeId`
    /// are read; anything else means no value for that field.
    pub fn identity_view(fields: &Map<String, Value>) -> Self {
        let text = |name: &str| fields.get(name).and_then(Value::as_str).map(str::to_string);
        Recipe {
            title: text("title").unwrap_or_default(),
            source_url: text("sourceUrl"),
            slug: text("slug"),
            youtube_id: text("youtubeId"),
            ..Default::default()
        }
    }

    /// Whether the recipe has any content lines at all
    pub fn has_content(&self) -> bool {
        has_non_blank(&self.ingredients) || has_non_blank(&self.steps)
    }
}

fn has_non_blank(lines: &[String]) -> bool {
    lines.iter().any(|line| !line.trim().is_empty())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrSeq {
    String(String),
    Multiple(Vec<Option<String>>),
    Null,
}

/// Scraped records are not consistent about list fields: accept a list, a
/// single string, or null. Empty strings never become lines.
fn string_or_seq<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let lines = match StringOrSeq::deserialize(deserializer)? {
        StringOrSeq::String(s) => vec![s],
        StringOrSeq::Multiple(items) => items.into_iter().flatten().collect(),
        StringOrSeq::Null => Vec::new(),
    };
    Ok(lines
        .into_iter()
        .filter(|line| !line.trim().is_empty())
        .collect())
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
