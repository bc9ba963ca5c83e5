use crate::server::{ServerError, ServerRouter};
use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};

mod groups;
mod posts;
mod profiles;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .merge(posts::routes())
        .merge(groups::routes())
        .merge(profiles::routes())
}

/// The `page` query parameter of listing pages, kept raw so that junk falls back to page 1.
/// When it is given more than once the last value counts.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    fn requested(&self) -> Option<&str> {
        self.page.as_deref()
    }
}

impl<S> FromRequestParts<S> for PageQuery
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::from_request_parts(parts, state).await?;
        let page = pairs
            .into_iter()
            .rev()
            .find_map(|(name, value)| (name == "page").then_some(value));

        Ok(Self { page })
    }
}
