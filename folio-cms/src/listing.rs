//! Accumulated post listing with "load more" paging.

use crate::{
    client::{CmsError, ContentSource},
    record::{Normalizer, RawPage},
};
use folio_common::model::{Page, PageCursor, post::PostSummary};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("There are no more pages to load")]
    NoMorePages,
    #[error(transparent)]
    Cms(#[from] CmsError),
}

#[derive(Debug, Default)]
struct ListingState {
    posts: Vec<PostSummary>,
    cursor: Option<PageCursor>,
    /// Completed loads, used to detect that a load finished while a caller was waiting.
    loads: u64,
    last_appended: usize,
}

/// The posts shown so far plus the cursor to the next page.
///
/// Pages are appended in the order they were fetched and never deduplicated. Only one
/// `load_more` request is in flight at a time; callers that arrive while one is running
/// wait for it and share its outcome instead of fetching the page after it.
#[derive(Debug)]
pub struct Listing<S> {
    source: S,
    normalizer: Normalizer,
    state: RwLock<ListingState>,
    in_flight: Mutex<()>,
}

impl<S: ContentSource> Listing<S> {
    #[must_use]
    pub fn initialize(source: S, normalizer: Normalizer, first_page: RawPage) -> Self {
        let Page {
            results,
            next_page,
        } = normalizer.page(first_page);

        Self {
            source,
            normalizer,
            state: RwLock::new(ListingState {
                last_appended: results.len(),
                posts: results,
                cursor: next_page,
                loads: 0,
            }),
            in_flight: Mutex::new(()),
        }
    }

    /// Fetches the first page of `document_type` and starts a listing from it.
    pub async fn load_first(
        source: S,
        normalizer: Normalizer,
        document_type: &str,
    ) -> Result<Self, ListingError> {
        let first_page = source.list_by_type(document_type).await?;
        Ok(Self::initialize(source, normalizer, first_page))
    }

    /// Appends the next page and returns how many posts it added.
    ///
    /// Fails with [`ListingError::NoMorePages`] without touching the network once the cursor
    /// is exhausted. A failed fetch leaves the listing as it was.
    pub async fn load_more(&self) -> Result<usize, ListingError> {
        let seen = self.state.read().await.loads;
        let _in_flight = self.in_flight.lock().await;

        let cursor = {
            let state = self.state.read().await;
            if state.loads != seen {
                debug!("Joined a page load that finished while waiting");
                return Ok(state.last_appended);
            }
            state.cursor.clone().ok_or(ListingError::NoMorePages)?
        };

        debug!("Loading next page of posts");
        let raw_page = self.source.fetch_page(&cursor).await?;
        let Page {
            results,
            next_page,
        } = self.normalizer.page(raw_page);
        let appended = results.len();

        let mut state = self.state.write().await;
        state.posts.extend(results);
        state.cursor = next_page;
        state.loads += 1;
        state.last_appended = appended;
        debug!(appended, total = state.posts.len(), "Loaded next page of posts");

        Ok(appended)
    }

    pub async fn posts(&self) -> Vec<PostSummary> {
        self.state.read().await.posts.clone()
    }

    pub async fn cursor(&self) -> Option<PageCursor> {
        self.state.read().await.cursor.clone()
    }

    pub async fn has_more(&self) -> bool {
        self.state.read().await.cursor.is_some()
    }

    /// Everything loaded so far, as a single page.
    pub async fn snapshot(&self) -> Page<PostSummary> {
        let state = self.state.read().await;
        Page {
            results: state.posts.clone(),
            next_page: state.cursor.clone(),
        }
    }
}
