use crate::server::{PostPages, Result, ServerError, ServerRouter, Source, json::Json, query::Query};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use folio_cms::{detail::DetailFetcher, listing::Listing};
use folio_common::model::{
    Page, PageCursor,
    post::{PostDetail, PostSummary},
};
use serde::Deserialize;
use std::sync::Arc;

/// Upper bound for `?pages=`, the number of pages a single listing request may accumulate.
pub const MAX_PAGES: usize = 20;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_posts)
        .typed_get(get_post)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct ListPostsPath();

#[derive(Deserialize)]
struct ListPostsQuery {
    #[serde(default)]
    pages: Option<usize>,
    #[serde(default)]
    cursor: Option<PageCursor>,
}

/// The first page, or with `?pages=n` the first `n` pages accumulated into one list.
///
/// With `?cursor=` it is the single page a previously served `next_page` points at, and
/// `pages` is ignored.
async fn list_posts(
    ListPostsPath(): ListPostsPath,
    State(source): State<Source>,
    State(pages): State<Arc<PostPages>>,
    Query(ListPostsQuery {
        pages: wanted,
        cursor,
    }): Query<ListPostsQuery>,
) -> Result<Json<Page<PostSummary>>> {
    if let Some(cursor) = cursor {
        return Ok(Json(pages.at(&*source, &cursor).await?));
    }

    let wanted = wanted.unwrap_or(1).clamp(1, MAX_PAGES);
    if wanted == 1 {
        return Ok(Json(pages.first(&*source).await?));
    }

    let listing = Listing::load_first(
        Arc::clone(&source),
        pages.normalizer().clone(),
        pages.document_type(),
    )
    .await?;

    let mut loaded = 1;
    while loaded < wanted && listing.has_more().await {
        listing.load_more().await?;
        loaded += 1;
    }

    let snapshot = listing.snapshot().await;
    pages.issue(&snapshot).await;
    Ok(Json(snapshot))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{uid}", rejection(ServerError))]
struct GetPostPath {
    uid: String,
}

async fn get_post(
    GetPostPath { uid }: GetPostPath,
    State(details): State<Arc<DetailFetcher<Source>>>,
) -> Result<Json<Arc<PostDetail>>> {
    let post = details.fetch(&uid).await?;

    Ok(Json(post))
}
