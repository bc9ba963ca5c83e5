use crate::{
    config::Settings,
    server::{
        Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json, routes::PageQuery,
    },
};
use axum::{extract::State, response::Redirect};
use axum_extra::routing::{RouterExt, TypedPath};
use pinnwand_common::{
    model::{
        follow::Follow,
        post::Post,
        user::{User, UserHandle},
    },
    pagination::Page,
};
use pinnwand_db::client::{DbClient, PostFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(profile)
        .typed_get(follow_index)
        .typed_get(follow)
        .typed_post(follow)
        .typed_get(unfollow)
        .typed_post(unfollow)
}

#[derive(Serialize)]
struct ProfilePage {
    author: User,
    page: Page<Post>,
    /// Whether the visitor follows `author`. Always false for anonymous visitors.
    following: bool,
}

#[derive(Serialize)]
struct FollowPage {
    page: Page<Post>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/", rejection(ServerError))]
pub(super) struct ProfilePath {
    pub(super) username: UserHandle,
}

async fn profile(
    ProfilePath { username }: ProfilePath,
    State(db): State<Arc<DbClient>>,
    State(settings): State<Arc<Settings>>,
    visitor: Option<AuthenticatedUser>,
    query: PageQuery,
) -> Result<Json<ProfilePage>> {
    let author = fetch_author(&db, username).await?;

    let page = db
        .fetch_post_page(
            PostFilter::Author(author.id),
            query.requested(),
            settings.posts_per_page,
        )
        .await?;
    let following = match visitor {
        Some(visitor) => db.is_following(visitor.user_id(), author.id).await?,
        None => false,
    };

    Ok(Json(ProfilePage {
        author,
        page,
        following,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/follow/", rejection(ServerError))]
struct FollowIndexPath();

/// Posts of every author the visitor follows.
async fn follow_index(
    FollowIndexPath(): FollowIndexPath,
    State(db): State<Arc<DbClient>>,
    State(settings): State<Arc<Settings>>,
    user: AuthenticatedUser,
    query: PageQuery,
) -> Result<Json<FollowPage>> {
    let page = db
        .fetch_post_page(
            PostFilter::FollowedBy(user.user_id()),
            query.requested(),
            settings.posts_per_page,
        )
        .await?;

    Ok(Json(FollowPage { page }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/follow/", rejection(ServerError))]
struct FollowPath {
    username: UserHandle,
}

/// Following oneself or someone already followed changes nothing.
async fn follow(
    FollowPath { username }: FollowPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Redirect> {
    let author = fetch_author(&db, username).await?;

    match Follow::new(user.user_id(), author.id) {
        Ok(follow) => {
            if db.create_follow(follow).await? {
                info!(user = %user.user_id(), author = %author.id, "Started following");
            }
        }
        Err(error) => debug!(%error, "Ignoring follow request"),
    }

    Ok(redirect_to_profile(author))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/unfollow/", rejection(ServerError))]
struct UnfollowPath {
    username: UserHandle,
}

async fn unfollow(
    UnfollowPath { username }: UnfollowPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Redirect> {
    let author = fetch_author(&db, username).await?;

    if !db.delete_follow(user.user_id(), author.id).await? {
        return Err(ServerError::FollowNotFound(author.handle));
    }
    info!(user = %user.user_id(), author = %author.id, "Stopped following");

    Ok(redirect_to_profile(author))
}

async fn fetch_author(db: &DbClient, username: UserHandle) -> Result<User> {
    db.fetch_user_by_handle(&username)
        .await?
        .ok_or(ServerError::UserByHandleNotFound(username))
}

fn redirect_to_profile(author: User) -> Redirect {
    let profile = ProfilePath {
        username: author.handle,
    };
    Redirect::to(&profile.to_string())
}
