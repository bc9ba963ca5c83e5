use crate::{
    config::Settings,
    server::{Result, ServerError, ServerRouter, json::Json, routes::PageQuery},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use pinnwand_common::{
    model::{group::Group, post::Post},
    pagination::Page,
};
use pinnwand_db::client::{DbClient, PostFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(group_posts)
}

#[derive(Serialize)]
struct GroupPage {
    group: Group,
    page: Page<Post>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/group/{slug}/", rejection(ServerError))]
struct GroupPath {
    slug: String,
}

async fn group_posts(
    GroupPath { slug }: GroupPath,
    State(db): State<Arc<DbClient>>,
    State(settings): State<Arc<Settings>>,
    query: PageQuery,
) -> Result<Json<GroupPage>> {
    let group = db
        .fetch_group_by_slug(&slug)
        .await?
        .ok_or(ServerError::GroupBySlugNotFound(slug))?;

    let page = db
        .fetch_post_page(
            PostFilter::Group(group.id),
            query.requested(),
            settings.posts_per_page,
        )
        .await?;

    Ok(Json(GroupPage { group, page }))
}
