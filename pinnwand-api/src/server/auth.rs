use crate::{config::Settings, server::ServerError};
use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{Uri, request::Parts},
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use pinnwand_common::model::{
    Id,
    auth::AuthToken,
    user::{User, UserMarker},
};
use pinnwand_db::client::DbClient;
use std::sync::Arc;
use time::OffsetDateTime;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// Characters of the `next` parameter left as they are. Slashes are encoded.
const NEXT_PARAM: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// The identity behind a valid bearer token.
///
/// As a plain extractor, a request without an `Authorization` header is rejected with a
/// redirect to the login page. As `Option<AuthenticatedUser>` a missing header yields
/// `None`; a present but invalid one is rejected either way.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AuthenticatedUser {
    user: User,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user_id(&self) -> Id<UserMarker> {
        self.user.id
    }

    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }
}

/// Location of the login page, remembering where the visitor wanted to go.
#[must_use]
pub fn login_redirect(login_url: &str, next: &Uri) -> String {
    let next = next
        .path_and_query()
        .map_or_else(|| next.path(), |path_and_query| path_and_query.as_str());
    let separator = if login_url.contains('?') { '&' } else { '?' };

    format!(
        "{login_url}{separator}next={}",
        utf8_percent_encode(next, NEXT_PARAM)
    )
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    Arc<Settings>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match <Self as OptionalFromRequestParts<S>>::from_request_parts(parts, state).await? {
            Some(user) => Ok(user),
            None => {
                let settings = Arc::<Settings>::from_ref(state);
                Err(ServerError::LoginRequired(login_redirect(
                    &settings.login_url,
                    &parts.uri,
                )))
            }
        }
    }
}

impl<S> OptionalFromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        let header =
            match <AuthorizationHeader as FromRequestParts<S>>::from_request_parts(parts, state)
                .await
            {
                Ok(header) => header,
                Err(rejection) if rejection.is_missing() => return Ok(None),
                Err(rejection) => return Err(ServerError::InvalidAuthorizationHeader(rejection)),
            };

        let request_token: AuthToken = header.token().parse()?;
        let token_hash = request_token.hash()?;

        let db = Arc::<DbClient>::from_ref(state);
        let authentication = db
            .fetch_auth(&token_hash)
            .await?
            .ok_or(ServerError::InvalidToken)?;

        if authentication.user != request_token.user_id
            || authentication.is_expired_at(OffsetDateTime::now_utc())
        {
            return Err(ServerError::InvalidToken);
        }

        let user = db
            .fetch_user(authentication.user)
            .await?
            .ok_or(ServerError::InvalidToken)?;

        Ok(Some(Self { user }))
    }
}
