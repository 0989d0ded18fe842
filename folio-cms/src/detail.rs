//! Post pages, generated once and served from memory.
//!
//! A post whose page was never generated is built in the background on first request. Until
//! it is ready the fetcher answers [`DetailError::Pending`], which callers show as a loading
//! state rather than an error. A post the source does not know is reported as
//! [`DetailError::NotFound`] for a short while, after which the source is asked again.

use crate::{
    client::{CmsError, ContentSource},
    record::Normalizer,
};
use folio_common::model::post::PostDetail;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// How long a post the source reported missing keeps answering [`DetailError::NotFound`].
pub const MISSING_TTL: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum DetailError {
    #[error("Post with uid {0} was not found")]
    NotFound(String),
    #[error("Post with uid {0} is still being generated")]
    Pending(String),
    #[error(transparent)]
    Cms(#[from] CmsError),
}

#[derive(Clone, Debug)]
enum Artifact {
    Generating,
    Ready(Arc<PostDetail>),
    Missing(Instant),
}

#[derive(Debug)]
pub struct DetailFetcher<S> {
    source: S,
    normalizer: Normalizer,
    document_type: String,
    missing_ttl: Duration,
    artifacts: Mutex<HashMap<String, Artifact>>,
}

impl<S: ContentSource + 'static> DetailFetcher<S> {
    #[must_use]
    pub fn new(source: S, normalizer: Normalizer, document_type: impl Into<String>) -> Self {
        Self {
            source,
            normalizer,
            document_type: document_type.into(),
            missing_ttl: MISSING_TTL,
            artifacts: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_missing_ttl(mut self, missing_ttl: Duration) -> Self {
        self.missing_ttl = missing_ttl;
        self
    }

    /// Generates every post named on the first listing page. Returns how many were generated.
    ///
    /// A post that fails to generate is logged and skipped; it will be built on first request.
    pub async fn prerender(&self) -> Result<usize, DetailError> {
        let page = self.source.list_by_type(&self.document_type).await?;

        let mut generated = 0;
        for uid in page.results.into_iter().filter_map(|post| post.uid) {
            match self.generate(&uid).await {
                Ok(_) => generated += 1,
                Err(error) => warn!(uid = uid.as_str(), %error, "Pre-rendering post failed"),
            }
        }

        debug!(generated, "Pre-rendered posts");
        Ok(generated)
    }

    /// Fetches and stores the post now, replacing any earlier result.
    pub async fn generate(&self, uid: &str) -> Result<Arc<PostDetail>, DetailError> {
        let record = match self.source.get_by_uid(&self.document_type, uid).await {
            Ok(record) => record,
            Err(error) => {
                let mut artifacts = self.artifacts.lock().await;
                if matches!(artifacts.get(uid), Some(Artifact::Generating)) {
                    artifacts.remove(uid);
                }
                return Err(error.into());
            }
        };

        let mut artifacts = self.artifacts.lock().await;
        if let Some(record) = record {
            let detail = Arc::new(self.normalizer.detail(record));
            artifacts.insert(uid.to_owned(), Artifact::Ready(Arc::clone(&detail)));
            Ok(detail)
        } else {
            let missing_ttl = self.missing_ttl;
            artifacts.retain(|_, artifact| match artifact {
                Artifact::Missing(at) => at.elapsed() < missing_ttl,
                _ => true,
            });
            artifacts.insert(uid.to_owned(), Artifact::Missing(Instant::now()));
            Err(DetailError::NotFound(uid.to_owned()))
        }
    }

    /// Returns the generated post, or starts generating it and reports [`DetailError::Pending`].
    ///
    /// A post reported missing longer than the missing TTL ago is generated again.
    pub async fn fetch(self: &Arc<Self>, uid: &str) -> Result<Arc<PostDetail>, DetailError> {
        let mut artifacts = self.artifacts.lock().await;
        match artifacts.get(uid) {
            Some(Artifact::Ready(detail)) => Ok(Arc::clone(detail)),
            Some(Artifact::Missing(at)) if at.elapsed() < self.missing_ttl => {
                Err(DetailError::NotFound(uid.to_owned()))
            }
            Some(Artifact::Generating) => Err(DetailError::Pending(uid.to_owned())),
            Some(Artifact::Missing(_)) | None => {
                artifacts.insert(uid.to_owned(), Artifact::Generating);
                drop(artifacts);

                debug!(uid, "Generating post in the background");
                let fetcher = Arc::clone(self);
                let owned_uid = uid.to_owned();
                tokio::spawn(async move {
                    if let Err(error) = fetcher.generate(&owned_uid).await
                        && !matches!(error, DetailError::NotFound(_))
                    {
                        warn!(uid = owned_uid.as_str(), %error, "Generating post failed");
                    }
                });

                Err(DetailError::Pending(uid.to_owned()))
            }
        }
    }
}
