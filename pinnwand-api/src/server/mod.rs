use crate::config::Settings;
use axum::{
    Router,
    extract::{
        DefaultBodyLimit, FromRef, Request,
        multipart::{MultipartError, MultipartRejection},
        rejection::{FormRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use cache::PageCache;
use json::Json;
use media::MediaStorage;
use pinnwand_common::model::{
    Id,
    auth::{AuthTokenDecodeError, AuthTokenHashError},
    post::PostMarker,
    user::UserHandle,
};
use pinnwand_db::client::{DbClient, DbError};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

pub mod auth;
pub mod cache;
pub mod forms;
mod json;
pub mod media;
mod routes;

/// Uploads are read into memory before validation, so this bounds per-request memory.
pub const MAX_REQUEST_BODY_BYTES: usize = 10 * 1024 * 1024;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub db_client: Arc<DbClient>,
    pub settings: Arc<Settings>,
    pub page_cache: PageCache,
    pub media: Arc<MediaStorage>,
}

impl ServerState {
    #[must_use]
    pub fn new(
        db_client: DbClient,
        settings: Settings,
        media: MediaStorage,
        index_cache_ttl: Duration,
    ) -> Self {
        Self {
            db_client: Arc::new(db_client),
            settings: Arc::new(settings),
            page_cache: PageCache::new(index_cache_ttl),
            media: Arc::new(media),
        }
    }
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

/// The complete application, ready to be served.
pub fn router(state: ServerState) -> Router {
    routes()
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
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
    #[error("Query string rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Form body rejected: {0}")]
    FormRejection(#[from] FormRejection),
    #[error("Multipart body rejected: {0}")]
    MultipartRejection(#[from] MultipartRejection),
    #[error("Multipart body could not be read: {0}")]
    Multipart(#[from] MultipartError),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided auth token could not be decoded: {0}")]
    InvalidAuthToken(#[from] AuthTokenDecodeError),
    #[error("The auth token could not be hashed: {0}")]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error("Provided token was invalid")]
    InvalidToken,
    #[error("Login required, redirecting to {0}")]
    LoginRequired(String),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("Storing media failed: {0}")]
    Media(#[from] std::io::Error),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("Group with slug {0:?} was not found.")]
    GroupBySlugNotFound(String),
    #[error("User with handle {0:?} was not found.")]
    UserByHandleNotFound(UserHandle),
    #[error("Not following user {0:?}.")]
    FollowNotFound(UserHandle),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::GroupBySlugNotFound(_)
            | ServerError::UserByHandleNotFound(_)
            | ServerError::FollowNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::LoginRequired(_) => StatusCode::SEE_OTHER,
            ServerError::InvalidToken => StatusCode::UNAUTHORIZED,
            ServerError::QueryRejection(rejection) => rejection.status(),
            ServerError::FormRejection(rejection) => rejection.status(),
            ServerError::MultipartRejection(rejection) => rejection.status(),
            ServerError::Multipart(error) => error.status(),
            ServerError::InvalidAuthorizationHeader(_) | ServerError::InvalidAuthToken(_) => {
                StatusCode::BAD_REQUEST
            }
            ServerError::JsonResponse(_)
            | ServerError::Database(_)
            | ServerError::Media(_)
            | ServerError::AuthTokenHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if let ServerError::LoginRequired(location) = &self {
            debug!(%location, "Redirecting anonymous visitor to login");
            return Redirect::to(location).into_response();
        }

        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
        } else {
            warn!(error = %self, %status, "Replying with error");
        }

        let path = match &self {
            ServerError::UnknownRoute(uri) => Some(uri.path().to_owned()),
            _ => None,
        };
        let error_response = ErrorResponse {
            status: status.as_u16(),
            path,
        };
        (status, Json(error_response)).into_response()
    }
}
