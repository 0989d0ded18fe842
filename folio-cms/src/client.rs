use crate::record::{RawPage, RawPost};
use async_trait::async_trait;
use folio_common::model::PageCursor;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

/// How long a master ref is reused before the API root is asked again.
pub const MASTER_REF_TTL: Duration = Duration::from_secs(5);

pub type Result<T, E = CmsError> = std::result::Result<T, E>;

/// Anything that went wrong talking to the content API. Never retried.
#[derive(Debug, Error)]
pub enum CmsError {
    #[error("Invalid content API endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error("Request to the content API failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Content API replied {status} for {path}")]
    Status { status: StatusCode, path: String },
    #[error("Content API did not advertise a master ref")]
    MissingMasterRef,
}

/// The headless CMS, seen from the blog.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// First page of all documents of `document_type`.
    async fn list_by_type(&self, document_type: &str) -> Result<RawPage>;

    /// The document of `document_type` with the given uid, or `None` if there is none.
    async fn get_by_uid(&self, document_type: &str, uid: &str) -> Result<Option<RawPost>>;

    /// The page a previous response pointed to.
    async fn fetch_page(&self, cursor: &PageCursor) -> Result<RawPage>;
}

#[async_trait]
impl<T: ContentSource + ?Sized> ContentSource for Arc<T> {
    async fn list_by_type(&self, document_type: &str) -> Result<RawPage> {
        (**self).list_by_type(document_type).await
    }

    async fn get_by_uid(&self, document_type: &str, uid: &str) -> Result<Option<RawPost>> {
        (**self).get_by_uid(document_type, uid).await
    }

    async fn fetch_page(&self, cursor: &PageCursor) -> Result<RawPage> {
        (**self).fetch_page(cursor).await
    }
}

#[derive(Deserialize)]
struct ApiInfo {
    #[serde(default)]
    refs: Vec<ApiRef>,
}

#[derive(Deserialize)]
struct ApiRef {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(rename = "isMasterRef", default)]
    is_master_ref: bool,
}

#[derive(Debug)]
struct CachedRef {
    reference: String,
    fetched_at: Instant,
}

/// [`ContentSource`] backed by a Prismic repository's REST API (v2).
///
/// The master ref is cached for [`MASTER_REF_TTL`] and dropped as soon as a search is refused.
/// Clones share the cache.
#[derive(Clone, Debug)]
pub struct PrismicClient {
    http: Client,
    endpoint: Url,
    access_token: Option<String>,
    page_size: Option<u32>,
    master_ref: Arc<RwLock<Option<CachedRef>>>,
}

impl PrismicClient {
    /// `endpoint` is the repository API root, e.g. `https://my-blog.cdn.prismic.io/api/v2`.
    pub fn new(endpoint: &str, access_token: Option<String>) -> Result<Self> {
        Self::with_client(Client::new(), endpoint, access_token)
    }

    pub fn with_client(http: Client, endpoint: &str, access_token: Option<String>) -> Result<Self> {
        let endpoint = Url::parse(endpoint.trim_end_matches('/'))?;

        Ok(Self {
            http,
            endpoint,
            access_token: access_token.filter(|token| !token.is_empty()),
            page_size: None,
            master_ref: Arc::new(RwLock::new(None)),
        })
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: Option<u32>) -> Self {
        self.page_size = page_size;
        self
    }

    async fn master_ref(&self) -> Result<String> {
        if let Some(cached) = self.master_ref.read().await.as_ref()
            && cached.fetched_at.elapsed() < MASTER_REF_TTL
        {
            return Ok(cached.reference.clone());
        }

        let reference = self.fetch_master_ref().await?;
        *self.master_ref.write().await = Some(CachedRef {
            reference: reference.clone(),
            fetched_at: Instant::now(),
        });
        Ok(reference)
    }

    async fn fetch_master_ref(&self) -> Result<String> {
        debug!("Fetching master ref");
        let mut url = self.endpoint.clone();
        if let Some(token) = &self.access_token {
            url.query_pairs_mut().append_pair("access_token", token);
        }

        let info: ApiInfo = checked(self.http.get(url).send().await?)?.json().await?;
        info.refs
            .into_iter()
            .find(|api_ref| api_ref.is_master_ref)
            .map(|api_ref| api_ref.reference)
            .ok_or(CmsError::MissingMasterRef)
    }

    async fn search(&self, predicate: &str, page_size: Option<u32>) -> Result<RawPage> {
        let master_ref = self.master_ref().await?;

        let mut url = Url::parse(&format!(
            "{}/documents/search",
            self.endpoint.as_str().trim_end_matches('/')
        ))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("ref", &master_ref);
            query.append_pair("q", &format!("[{predicate}]"));
            if let Some(page_size) = page_size {
                query.append_pair("pageSize", &page_size.to_string());
            }
            if let Some(token) = &self.access_token {
                query.append_pair("access_token", token);
            }
        }

        debug!(predicate, "Querying content API");
        let response = match checked(self.http.get(url).send().await?) {
            Ok(response) => response,
            Err(error) => {
                self.master_ref.write().await.take();
                return Err(error);
            }
        };
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ContentSource for PrismicClient {
    async fn list_by_type(&self, document_type: &str) -> Result<RawPage> {
        let predicate = format!("[at(document.type,{})]", quoted(document_type));
        self.search(&predicate, self.page_size).await
    }

    async fn get_by_uid(&self, document_type: &str, uid: &str) -> Result<Option<RawPost>> {
        let predicate = format!("[at(my.{document_type}.uid,{})]", quoted(uid));
        let page = self.search(&predicate, Some(1)).await?;
        Ok(page.results.into_iter().next())
    }

    async fn fetch_page(&self, cursor: &PageCursor) -> Result<RawPage> {
        debug!("Following next page cursor");
        let page = checked(self.http.get(cursor.as_str()).send().await?)?
            .json()
            .await?;
        Ok(page)
    }
}

fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn checked(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(CmsError::Status {
            status,
            path: response.url().path().to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param},
    };

    async fn server_with_master_ref() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "refs": [
                    { "id": "preview", "ref": "preview-ref", "isMasterRef": false },
                    { "id": "master", "ref": "master-ref", "isMasterRef": true },
                ],
            })))
            .mount(&server)
            .await;
        server
    }

    fn client(server: &MockServer) -> PrismicClient {
        PrismicClient::new(&format!("{}/api/v2", server.uri()), None).unwrap()
    }

    #[tokio::test]
    async fn list_by_type_queries_master_ref() {
        let server = server_with_master_ref().await;
        let next_page = format!("{}/api/v2/documents/search?page=2", server.uri());
        Mock::given(method("GET"))
            .and(path("/api/v2/documents/search"))
            .and(query_param("ref", "master-ref"))
            .and(query_param("q", "[[at(document.type,\"posts\")]]"))
            .and(query_param("pageSize", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "page": 1,
                "next_page": next_page,
                "results": [{ "uid": "one" }, { "uid": "two" }],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = client(&server)
            .with_page_size(Some(2))
            .list_by_type("posts")
            .await
            .unwrap();

        assert_eq!(page.results.len(), 2);
        assert_eq!(page.results[0].uid.as_deref(), Some("one"));
        assert_eq!(page.next_page, Some(PageCursor::new(next_page)));
    }

    #[tokio::test]
    async fn get_by_uid_returns_none_when_nothing_matches() {
        let server = server_with_master_ref().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/documents/search"))
            .and(query_param("q", "[[at(my.posts.uid,\"missing\")]]"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "next_page": null,
                "results": [],
            })))
            .mount(&server)
            .await;

        let post = client(&server).get_by_uid("posts", "missing").await.unwrap();
        assert_eq!(post, None);
    }

    #[tokio::test]
    async fn fetch_page_follows_cursor_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/opaque/next"))
            .and(query_param("token", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "next_page": null,
                "results": [{ "uid": "three" }],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cursor = PageCursor::new(format!("{}/opaque/next?token=abc", server.uri()));
        let page = client(&server).fetch_page(&cursor).await.unwrap();

        assert_eq!(page.results[0].uid.as_deref(), Some("three"));
        assert_eq!(page.next_page, None);
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client(&server).list_by_type("posts").await.unwrap_err();
        assert!(matches!(
            err,
            CmsError::Status { status, ref path }
                if status == StatusCode::UNAUTHORIZED && path == "/api/v2"
        ));
    }

    #[tokio::test]
    async fn missing_master_ref() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "refs": [] })))
            .mount(&server)
            .await;

        let err = client(&server).list_by_type("posts").await.unwrap_err();
        assert!(matches!(err, CmsError::MissingMasterRef));
    }

    #[tokio::test]
    async fn master_ref_is_reused_between_queries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "refs": [{ "id": "master", "ref": "master-ref", "isMasterRef": true }],
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/documents/search"))
            .and(query_param("ref", "master-ref"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "next_page": null,
                "results": [{ "uid": "one" }],
            })))
            .expect(3)
            .mount(&server)
            .await;

        let client = client(&server);
        client.list_by_type("posts").await.unwrap();
        client.clone().list_by_type("posts").await.unwrap();
        assert!(client.get_by_uid("posts", "one").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn refused_search_drops_cached_master_ref() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "refs": [{ "id": "master", "ref": "master-ref", "isMasterRef": true }],
            })))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/documents/search"))
            .respond_with(ResponseTemplate::new(404))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/documents/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "next_page": null,
                "results": [],
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        assert!(matches!(
            client.list_by_type("posts").await,
            Err(CmsError::Status { status, .. }) if status == StatusCode::NOT_FOUND
        ));
        assert!(client.list_by_type("posts").await.unwrap().results.is_empty());
    }

    #[test]
    fn predicate_values_are_escaped() {
        assert_eq!(quoted(r#"a"b\c"#), r#""a\"b\\c""#);
    }
}
