use chrono::{DateTime, FixedOffset};
use folio_common::{
    date::{self, DateFormat},
    model::{
        Page, PageCursor,
        post::{ContentBlock, PostDetail, PostSummary, RichTextSegment},
    },
    read_time,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A document as returned by the content API.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct RawPost {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub first_publication_date: Option<String>,
    #[serde(default)]
    pub last_publication_date: Option<String>,
    #[serde(default)]
    pub data: RawPostData,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct RawPostData {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub banner: Option<RawBanner>,
    #[serde(default)]
    pub content: Option<Vec<RawContentBlock>>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct RawBanner {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct RawContentBlock {
    #[serde(default)]
    pub heading: Option<String>,
    #[serde(default)]
    pub body: Option<Vec<RichTextSegment>>,
}

/// One page of a document query.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct RawPage {
    #[serde(default)]
    pub results: Vec<RawPost>,
    #[serde(default)]
    pub next_page: Option<PageCursor>,
}

/// Turns raw documents into display-ready posts.
///
/// Dates are formatted here, once. A timestamp that cannot be parsed is logged and shown as
/// an empty string instead of failing the whole page.
#[derive(Clone, PartialEq, Debug)]
pub struct Normalizer {
    summary_format: DateFormat,
    detail_format: DateFormat,
}

impl Normalizer {
    #[must_use]
    pub fn new(summary_format: DateFormat, detail_format: DateFormat) -> Self {
        Self {
            summary_format,
            detail_format,
        }
    }

    #[must_use]
    pub fn summary(&self, raw: RawPost) -> PostSummary {
        let uid = raw.uid.unwrap_or_default();
        if uid.is_empty() {
            warn!("Listed document has no uid");
        }

        let (first_publication_date, published) = ingest_date(
            raw.first_publication_date.as_deref(),
            &self.summary_format,
            &uid,
        );

        PostSummary {
            uid,
            first_publication_date,
            published,
            title: raw.data.title.unwrap_or_default(),
            subtitle: raw.data.subtitle.unwrap_or_default(),
            author: raw.data.author.unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn page(&self, raw: RawPage) -> Page<PostSummary> {
        Page {
            results: raw
                .results
                .into_iter()
                .map(|post| self.summary(post))
                .collect(),
            next_page: raw.next_page,
        }
    }

    #[must_use]
    pub fn detail(&self, raw: RawPost) -> PostDetail {
        let uid = raw.uid.unwrap_or_default();
        let (first_publication_date, published) = ingest_date(
            raw.first_publication_date.as_deref(),
            &self.detail_format,
            &uid,
        );
        let (last_publication_date, updated) = ingest_date(
            raw.last_publication_date.as_deref(),
            &self.detail_format,
            &uid,
        );

        let content: Vec<ContentBlock> = raw
            .data
            .content
            .unwrap_or_default()
            .into_iter()
            .map(|block| ContentBlock {
                heading: block.heading.unwrap_or_default(),
                body: block.body.unwrap_or_default(),
            })
            .collect();

        PostDetail {
            uid,
            first_publication_date,
            last_publication_date,
            published,
            updated,
            title: raw.data.title.unwrap_or_default(),
            subtitle: raw.data.subtitle.unwrap_or_default(),
            banner_url: raw.data.banner.and_then(|banner| banner.url),
            author: raw.data.author.unwrap_or_default(),
            read_time: read_time::estimate(&content),
            content,
        }
    }
}

fn ingest_date(
    raw: Option<&str>,
    format: &DateFormat,
    uid: &str,
) -> (Option<DateTime<FixedOffset>>, String) {
    match date::normalize(raw, format) {
        Ok(display) => (
            raw.and_then(|raw| date::parse_timestamp(raw).ok()),
            display,
        ),
        Err(error) => {
            warn!(uid, %error, "Publication date could not be formatted");
            (None, String::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalizer() -> Normalizer {
        Normalizer::new(
            DateFormat::new("dd MMM yyyy", "pt_BR").unwrap(),
            DateFormat::new("d 'de' MMMM 'de' yyyy", "pt_BR").unwrap(),
        )
    }

    fn raw_post(value: serde_json::Value) -> RawPost {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn summary_formats_date_once() {
        let summary = normalizer().summary(raw_post(json!({
            "uid": "como-utilizar-hooks",
            "first_publication_date": "2021-03-25T12:00:00+0000",
            "data": {
                "title": "Como utilizar Hooks",
                "subtitle": "Pensando em sincronização em vez de ciclos de vida",
                "author": "Joseph Oliveira",
            },
        })));

        assert_eq!(summary.uid, "como-utilizar-hooks");
        assert_eq!(summary.published, "25 mar 2021");
        assert_eq!(
            summary.first_publication_date.map(|date| date.to_rfc3339()),
            Some("2021-03-25T12:00:00+00:00".to_owned())
        );
        assert_eq!(summary.author, "Joseph Oliveira");
    }

    #[test]
    fn bad_or_missing_dates_degrade_to_empty() {
        let normalizer = normalizer();

        let missing = normalizer.summary(raw_post(json!({
            "uid": "a",
            "first_publication_date": null,
            "data": { "title": "A" },
        })));
        assert_eq!(missing.published, "");
        assert_eq!(missing.first_publication_date, None);

        let malformed = normalizer.summary(raw_post(json!({
            "uid": "b",
            "first_publication_date": "not a date",
            "data": { "title": "B" },
        })));
        assert_eq!(malformed.published, "");
        assert_eq!(malformed.first_publication_date, None);
        assert_eq!(malformed.title, "B");
    }

    #[test]
    fn detail_keeps_rich_text_and_estimates_read_time() {
        let body = json!([
            { "type": "paragraph", "text": "Lorem ipsum dolor", "spans": [{ "start": 0, "end": 5, "type": "em" }] },
            { "type": "image", "url": "https://images.example/figure.png" },
        ]);

        let detail = normalizer().detail(raw_post(json!({
            "uid": "criando-um-app-cra-do-zero",
            "first_publication_date": "2021-03-15T19:25:28+0000",
            "last_publication_date": "2021-03-25T19:25:28+0000",
            "data": {
                "title": "Criando um app CRA do zero",
                "banner": { "url": "https://images.example/banner.png" },
                "author": "Danilo Vieira",
                "content": [
                    { "heading": "Proin et varius", "body": body },
                    { "heading": "Empty", "body": [] },
                ],
            },
        })));

        assert_eq!(detail.published, "15 de março de 2021");
        assert_eq!(detail.updated, "25 de março de 2021");
        assert_eq!(
            detail.banner_url.as_deref(),
            Some("https://images.example/banner.png")
        );
        assert_eq!(detail.content.len(), 2);
        assert_eq!(
            serde_json::to_value(&detail.content[0].body).unwrap(),
            body
        );
        assert_eq!(detail.read_time, 1);
    }

    #[test]
    fn page_keeps_order_and_cursor() {
        let page: RawPage = serde_json::from_value(json!({
            "page": 1,
            "total_pages": 2,
            "next_page": "https://blog.cdn.prismic.io/api/v2/documents/search?page=2",
            "results": [{ "uid": "first" }, { "uid": "second" }],
        }))
        .unwrap();

        let page = normalizer().page(page);
        let uids: Vec<_> = page.results.iter().map(|post| post.uid.as_str()).collect();
        assert_eq!(uids, ["first", "second"]);
        assert_eq!(
            page.next_page.as_ref().map(PageCursor::as_str),
            Some("https://blog.cdn.prismic.io/api/v2/documents/search?page=2")
        );
    }
}
