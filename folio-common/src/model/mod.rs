pub mod post;

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Opaque "next page" token handed out by the content source.
///
/// The only thing a client may do with a cursor is pass it back to the source that issued it.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageCursor(String);

impl PageCursor {
    #[must_use]
    pub fn new(cursor: String) -> Self {
        Self(cursor)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PageCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<String> for PageCursor {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for PageCursor {
    fn from(value: &str) -> Self {
        Self::new(value.to_owned())
    }
}

/// One page of results. `next_page` is `None` on the last page.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize, Deserialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub next_page: Option<PageCursor>,
}

impl<T> Page<T> {
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.next_page.is_none()
    }
}
