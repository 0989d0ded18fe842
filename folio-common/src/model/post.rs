use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A post as shown in the listing.
///
/// `published` is the display form of `first_publication_date`, derived once when the post is ingested.
/// An empty `published` means the timestamp was absent or could not be parsed.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct PostSummary {
    pub uid: String,
    pub first_publication_date: Option<DateTime<FixedOffset>>,
    pub published: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct PostDetail {
    pub uid: String,
    pub first_publication_date: Option<DateTime<FixedOffset>>,
    pub last_publication_date: Option<DateTime<FixedOffset>>,
    pub published: String,
    pub updated: String,
    pub title: String,
    pub subtitle: String,
    pub banner_url: Option<String>,
    pub author: String,
    pub content: Vec<ContentBlock>,
    /// Estimated reading time in minutes.
    pub read_time: u32,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct ContentBlock {
    pub heading: String,
    pub body: Vec<RichTextSegment>,
}

impl ContentBlock {
    /// Plain text of the body, segments joined by a single space.
    #[must_use]
    pub fn body_text(&self) -> String {
        self.body
            .iter()
            .map(RichTextSegment::text)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A single rich text segment as delivered by the content source.
///
/// The markup is kept verbatim so the renderer can interpret spans, links and embeds itself.
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct RichTextSegment(Map<String, Value>);

impl RichTextSegment {
    /// The segment's `text` field, or `""` for segments that carry none (images, embeds).
    #[must_use]
    pub fn text(&self) -> &str {
        self.0.get("text").and_then(Value::as_str).unwrap_or_default()
    }
}
