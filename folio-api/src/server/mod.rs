use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use folio_cms::{
    client::{CmsError, ContentSource},
    detail::{DetailError, DetailFetcher},
    listing::ListingError,
    record::Normalizer,
};
use json::Json;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

mod json;
mod pages;
mod query;
mod routes;

pub use pages::PostPages;

pub type Source = Arc<dyn ContentSource>;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub source: Source,
    pub pages: Arc<PostPages>,
    pub details: Arc<DetailFetcher<Source>>,
}

impl ServerState {
    #[must_use]
    pub fn new(
        source: Source,
        normalizer: Normalizer,
        document_type: &str,
        missing_ttl: Duration,
    ) -> Self {
        let details = DetailFetcher::new(Arc::clone(&source), normalizer.clone(), document_type)
            .with_missing_ttl(missing_ttl);

        Self {
            source,
            pages: Arc::new(PostPages::new(normalizer, document_type)),
            details: Arc::new(details),
        }
    }
}

pub fn app(state: ServerState) -> Router {
    routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Page cursor was not issued by this server")]
    UnknownCursor,
    #[error("Post with uid {0} was not found.")]
    PostNotFound(String),
    #[error("Post with uid {0} is still being generated.")]
    PostPending(String),
    #[error(transparent)]
    Listing(ListingError),
    #[error(transparent)]
    Cms(#[from] CmsError),
}

impl From<DetailError> for ServerError {
    fn from(value: DetailError) -> Self {
        match value {
            DetailError::NotFound(uid) => ServerError::PostNotFound(uid),
            DetailError::Pending(uid) => ServerError::PostPending(uid),
            DetailError::Cms(err) => ServerError::Cms(err),
        }
    }
}

impl From<ListingError> for ServerError {
    fn from(value: ListingError) -> Self {
        match value {
            ListingError::Cms(err) => ServerError::Cms(err),
            no_more_pages @ ListingError::NoMorePages => ServerError::Listing(no_more_pages),
        }
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostNotFound(_)
            | ServerError::Listing(_) => StatusCode::NOT_FOUND,
            ServerError::PostPending(_) => StatusCode::ACCEPTED,
            ServerError::QueryRejection(_) | ServerError::UnknownCursor => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Cms(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
struct ErrorResponse {
    status: u16,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pending: bool,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let pending = matches!(self, ServerError::PostPending(_));

        if pending {
            debug!(error = %self, "Replying with pending state");
        } else {
            error!(error = %self, %status, "Replying with error");
        }

        let error_response = ErrorResponse {
            status: status.as_u16(),
            pending,
        };
        (status, Json(error_response)).into_response()
    }
}
