use crate::{
    config::Settings,
    server::{
        Result, ServerError, ServerRouter,
        auth::AuthenticatedUser,
        cache::{CachedPage, PageCache},
        forms::{CommentFields, CommentForm, PostForm, PostSubmission, Upload},
        json::Json,
        media::MediaStorage,
        routes::{PageQuery, profiles::ProfilePath},
    },
};
use axum::{
    Form,
    extract::{State, rejection::FormRejection},
    http::Uri,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::routing::{RouterExt, TypedPath};
use bytes::Bytes;
use pinnwand_common::{
    model::{
        Id,
        comment::{Comment, CreateComment},
        post::{CreatePost, EditPost, POST_IMAGE_DIR, Post, PostMarker},
    },
    pagination::Page,
};
use pinnwand_db::client::{DbClient, PostFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(index)
        .typed_get(post_detail)
        .typed_get(new_post_form)
        .typed_post(create_post)
        .typed_get(edit_post_form)
        .typed_post(edit_post)
        .typed_post(add_comment)
}

#[derive(Serialize)]
struct IndexPage {
    page: Page<Post>,
}

#[derive(Serialize)]
struct PostDetailPage {
    post: Post,
    comments: Vec<Comment>,
    form: CommentForm,
}

/// The create/edit form. `post` is set when an existing post is edited.
#[derive(Serialize)]
struct PostFormPage {
    form: PostForm,
    #[serde(skip_serializing_if = "Option::is_none")]
    post: Option<Post>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/", rejection(ServerError))]
struct IndexPath();

/// All posts, newest first. Responses are cached per URL and may be stale.
async fn index(
    IndexPath(): IndexPath,
    State(db): State<Arc<DbClient>>,
    State(settings): State<Arc<Settings>>,
    State(page_cache): State<PageCache>,
    uri: Uri,
    query: PageQuery,
) -> Result<CachedPage> {
    let key = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_owned(), ToString::to_string);

    if let Some(cached) = page_cache.get(&key).await {
        debug!(%key, "Serving index page from cache");
        return Ok(cached);
    }

    let page = db
        .fetch_post_page(PostFilter::All, query.requested(), settings.posts_per_page)
        .await?;
    let rendered = CachedPage(Bytes::from(serde_json::to_vec(&IndexPage { page })?));
    page_cache.insert(key, &rendered).await;

    Ok(rendered)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/", rejection(ServerError))]
struct PostDetailPath {
    id: Id<PostMarker>,
}

async fn post_detail(
    PostDetailPath { id }: PostDetailPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<PostDetailPage>> {
    let post = db
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;
    let comments = db.fetch_comments(id).await?;

    Ok(Json(PostDetailPage {
        post,
        comments,
        form: CommentForm::empty(),
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/create/", rejection(ServerError))]
struct CreatePostPath();

async fn new_post_form(
    CreatePostPath(): CreatePostPath,
    State(db): State<Arc<DbClient>>,
    _user: AuthenticatedUser,
) -> Result<Json<PostFormPage>> {
    let groups = db.fetch_groups().await?;

    Ok(Json(PostFormPage {
        form: PostForm::empty(groups),
        post: None,
    }))
}

async fn create_post(
    CreatePostPath(): CreatePostPath,
    State(db): State<Arc<DbClient>>,
    State(media): State<Arc<MediaStorage>>,
    user: AuthenticatedUser,
    submission: PostSubmission,
) -> Result<Response> {
    let groups = db.fetch_groups().await?;
    let mut form = PostForm::bind(submission, groups);

    let Some(clean) = form.validate() else {
        debug!(errors = ?form.errors, "Rejected post submission");
        return Ok(Json(PostFormPage { form, post: None }).into_response());
    };

    let image = match &clean.image {
        Some(upload) => Some(store_image(&media, upload).await?),
        None => None,
    };
    let post = CreatePost {
        author: user.user_id(),
        text: clean.text,
        group: clean.group,
        image,
    };
    let post_id = match db.create_post(&post).await {
        Ok(post_id) => post_id,
        Err(error) => {
            discard_image(&media, post.image.as_deref()).await;
            return Err(error.into());
        }
    };
    info!(%post_id, author = %user.user_id(), "Created post");

    let profile = ProfilePath {
        username: user.user().handle.clone(),
    };
    Ok(Redirect::to(&profile.to_string()).into_response())
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/edit/", rejection(ServerError))]
struct EditPostPath {
    id: Id<PostMarker>,
}

async fn edit_post_form(
    EditPostPath { id }: EditPostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Response> {
    let post = db
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    if !post.is_authored_by(user.user_id()) {
        return Ok(Redirect::to(&PostDetailPath { id }.to_string()).into_response());
    }

    let groups = db.fetch_groups().await?;
    let page = PostFormPage {
        form: PostForm::for_post(&post, groups),
        post: Some(post),
    };
    Ok(Json(page).into_response())
}

/// Only the author may edit. Anyone else is sent back to the post untouched.
async fn edit_post(
    EditPostPath { id }: EditPostPath,
    State(db): State<Arc<DbClient>>,
    State(media): State<Arc<MediaStorage>>,
    user: AuthenticatedUser,
    submission: PostSubmission,
) -> Result<Response> {
    let post = db
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;
    let detail = PostDetailPath { id };

    if !post.is_authored_by(user.user_id()) {
        info!(
            post_id = %id,
            user = %user.user_id(),
            "Refused edit by someone other than the author"
        );
        return Ok(Redirect::to(&detail.to_string()).into_response());
    }

    let groups = db.fetch_groups().await?;
    let mut form = PostForm::bind(submission, groups);

    let Some(clean) = form.validate() else {
        debug!(post_id = %id, errors = ?form.errors, "Rejected post edit");
        let page = PostFormPage {
            form,
            post: Some(post),
        };
        return Ok(Json(page).into_response());
    };

    let image = match &clean.image {
        Some(upload) => Some(store_image(&media, upload).await?),
        None => None,
    };
    let edit = EditPost {
        text: clean.text,
        group: clean.group,
        image,
    };
    let outcome = match db.edit_post(id, &edit).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(ServerError::PostByIdNotFound(id)),
        Err(error) => Err(error.into()),
    };
    if let Err(error) = outcome {
        discard_image(&media, edit.image.as_deref()).await;
        return Err(error);
    }
    info!(post_id = %id, "Edited post");

    Ok(Redirect::to(&detail.to_string()).into_response())
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comment/", rejection(ServerError))]
struct AddCommentPath {
    id: Id<PostMarker>,
}

/// Always ends on the post page; invalid comments are dropped.
async fn add_comment(
    AddCommentPath { id }: AddCommentPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    body: Result<Form<CommentFields>, FormRejection>,
) -> Result<Redirect> {
    if db.fetch_post(id).await?.is_none() {
        return Err(ServerError::PostByIdNotFound(id));
    }

    let mut form = CommentForm::bind_body(body);
    match form.validate() {
        Some(text) => {
            let comment = CreateComment {
                post: id,
                author: user.user_id(),
                text,
            };
            let comment_id = db.create_comment(&comment).await?;
            info!(%comment_id, post_id = %id, "Added comment");
        }
        None => debug!(post_id = %id, errors = ?form.errors, "Dropped invalid comment"),
    }

    Ok(Redirect::to(&PostDetailPath { id }.to_string()))
}

async fn store_image(media: &MediaStorage, upload: &Upload) -> Result<String> {
    let path = media
        .save(POST_IMAGE_DIR, &upload.file_name, &upload.contents)
        .await?;
    debug!(%path, "Stored uploaded image");

    Ok(path)
}

/// Removes an image stored for a write that did not go through.
async fn discard_image(media: &MediaStorage, path: Option<&str>) {
    let Some(path) = path else {
        return;
    };
    if let Err(error) = media.remove(path).await {
        warn!(%path, %error, "Could not remove orphaned image");
    }
}
