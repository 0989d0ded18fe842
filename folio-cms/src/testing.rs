use crate::{
    client::{CmsError, ContentSource, Result},
    record::{Normalizer, RawPage, RawPost, RawPostData},
};
use async_trait::async_trait;
use folio_common::{date::DateFormat, model::PageCursor};
use reqwest::StatusCode;
use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

/// In-memory content source that counts the requests it serves.
#[derive(Debug, Default)]
pub(crate) struct MemorySource {
    pub first_page: RawPage,
    pub pages: HashMap<String, RawPage>,
    pub posts: HashMap<String, RawPost>,
    pub published: Mutex<HashMap<String, RawPost>>,
    pub delay: Option<Duration>,
    pub failing: AtomicBool,
    pub list_calls: AtomicUsize,
    pub page_calls: AtomicUsize,
    pub uid_calls: AtomicUsize,
    pub requested_cursors: Mutex<Vec<String>>,
}

impl MemorySource {
    /// Makes `post` available from now on, as if it had just been published.
    pub fn publish(&self, post: RawPost) {
        if let Some(uid) = post.uid.clone() {
            self.published.lock().unwrap().insert(uid, post);
        }
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    async fn respond(&self) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            Err(CmsError::Status {
                status: StatusCode::SERVICE_UNAVAILABLE,
                path: "/memory".to_owned(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ContentSource for MemorySource {
    async fn list_by_type(&self, _document_type: &str) -> Result<RawPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.respond().await?;
        Ok(self.first_page.clone())
    }

    async fn get_by_uid(&self, _document_type: &str, uid: &str) -> Result<Option<RawPost>> {
        self.uid_calls.fetch_add(1, Ordering::SeqCst);
        self.respond().await?;
        let published = self.published.lock().unwrap().get(uid).cloned();
        Ok(self.posts.get(uid).cloned().or(published))
    }

    async fn fetch_page(&self, cursor: &PageCursor) -> Result<RawPage> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        self.requested_cursors
            .lock()
            .unwrap()
            .push(cursor.as_str().to_owned());
        self.respond().await?;
        Ok(self.pages.get(cursor.as_str()).cloned().unwrap_or_default())
    }
}

pub(crate) fn normalizer() -> Normalizer {
    Normalizer::new(
        DateFormat::new("dd MMM yyyy", "pt_BR").unwrap(),
        DateFormat::new("d 'de' MMMM 'de' yyyy", "pt_BR").unwrap(),
    )
}

pub(crate) fn post(uid: &str) -> RawPost {
    RawPost {
        uid: Some(uid.to_owned()),
        first_publication_date: Some("2021-03-25T12:00:00+0000".to_owned()),
        last_publication_date: Some("2021-03-25T12:00:00+0000".to_owned()),
        data: RawPostData {
            title: Some(format!("Post {uid}")),
            subtitle: Some(String::new()),
            author: Some("Autor".to_owned()),
            ..RawPostData::default()
        },
    }
}

pub(crate) fn page(uids: &[&str], next_page: Option<&str>) -> RawPage {
    RawPage {
        results: uids.iter().map(|uid| post(uid)).collect(),
        next_page: next_page.map(PageCursor::from),
    }
}
