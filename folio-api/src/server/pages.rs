use crate::server::{Result, ServerError};
use folio_cms::{client::ContentSource, record::Normalizer};
use folio_common::model::{Page, PageCursor, post::PostSummary};
use lru::LruCache;
use std::num::NonZeroUsize;
use tokio::sync::Mutex;
use tracing::debug;

/// How many handed-out cursors are remembered. The least recently used one is forgotten first.
pub const MAX_ISSUED_CURSORS: NonZeroUsize = NonZeroUsize::new(1024).unwrap();

/// Stateless listing pages for clients that keep their own accumulated list.
///
/// Clients hand back the `next_page` cursor of a page they received. Only cursors this server
/// has handed out recently are followed, so the endpoint cannot be pointed at arbitrary URLs.
/// Cursors are compared as opaque strings.
#[derive(Debug)]
pub struct PostPages {
    normalizer: Normalizer,
    document_type: String,
    issued: Mutex<LruCache<PageCursor, ()>>,
}

impl PostPages {
    #[must_use]
    pub fn new(normalizer: Normalizer, document_type: &str) -> Self {
        Self::with_capacity(normalizer, document_type, MAX_ISSUED_CURSORS)
    }

    #[must_use]
    pub fn with_capacity(normalizer: Normalizer, document_type: &str, cursors: NonZeroUsize) -> Self {
        Self {
            normalizer,
            document_type: document_type.to_owned(),
            issued: Mutex::new(LruCache::new(cursors)),
        }
    }

    #[must_use]
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    #[must_use]
    pub fn document_type(&self) -> &str {
        &self.document_type
    }

    pub async fn first(&self, source: &dyn ContentSource) -> Result<Page<PostSummary>> {
        let raw_page = source.list_by_type(&self.document_type).await?;
        let page = self.normalizer.page(raw_page);
        self.issue(&page).await;
        Ok(page)
    }

    pub async fn at(
        &self,
        source: &dyn ContentSource,
        cursor: &PageCursor,
    ) -> Result<Page<PostSummary>> {
        if self.issued.lock().await.get(cursor).is_none() {
            return Err(ServerError::UnknownCursor);
        }

        let raw_page = source.fetch_page(cursor).await?;
        let page = self.normalizer.page(raw_page);
        self.issue(&page).await;
        Ok(page)
    }

    /// Records the cursor of a page that is about to be handed to a client.
    pub async fn issue(&self, page: &Page<PostSummary>) {
        let Some(cursor) = &page.next_page else {
            return;
        };

        let mut issued = self.issued.lock().await;
        if issued.put(cursor.clone(), ()).is_none() {
            debug!(issued = issued.len(), "Issued new page cursor");
        }
    }
}
