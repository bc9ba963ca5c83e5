#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{
        Request, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE, LOCATION},
    },
};
use bytes::Bytes;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use pinnwand_api::{
    config::Settings,
    server::{self, ServerState, media::MediaStorage},
};
use pinnwand_common::model::{
    auth::AuthToken,
    group::{CreateGroup, Group},
    post::CreatePost,
    user::{CreateUser, User, UserHandle},
};
use pinnwand_db::client::DbClient;
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tempfile::TempDir;
use tower::ServiceExt;

pub const SMALL_GIF: &[u8] = b"GIF89a\x02\x00\x01\x00\x80\x00\x00\x00\x00\x00\xff\xff\xff!\xf9\x04\x00\x00\x00\x00\x00,\x00\x00\x00\x00\x02\x00\x01\x00\x00\x02\x02\x0c\n\x00;";

const BOUNDARY: &str = "pinnwand-test-boundary";

pub struct TestApp {
    pub state: ServerState,
    router: Router,
    media_dir: TempDir,
}

/// A user together with the bearer token that authenticates them.
pub struct TestUser {
    pub user: User,
    pub token: String,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: Bytes,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_cache_ttl(Duration::from_secs(20)).await
    }

    pub async fn with_cache_ttl(index_cache_ttl: Duration) -> Self {
        let db = DbClient::in_memory().await.unwrap();
        let media_dir = tempfile::tempdir().unwrap();
        let media = MediaStorage::new(media_dir.path());
        let state = ServerState::new(db, Settings::default(), media, index_cache_ttl);
        let router = server::router(state.clone());

        Self {
            state,
            router,
            media_dir,
        }
    }

    pub fn db(&self) -> Arc<DbClient> {
        self.state.db_client.clone()
    }

    pub fn media_dir(&self) -> &std::path::Path {
        self.media_dir.path()
    }

    pub async fn create_user(&self, handle: &str) -> TestUser {
        let create = CreateUser {
            handle: UserHandle::new(handle.to_owned()).unwrap(),
        };
        let user = self.db().create_user(&create).await.unwrap();

        let token = AuthToken::generate_random(user.id);
        self.db()
            .create_auth(user.id, &token.hash().unwrap(), None)
            .await
            .unwrap();

        TestUser {
            user,
            token: token.as_token_str(),
        }
    }

    pub async fn create_group(&self, title: &str, slug: &str) -> Group {
        let create = CreateGroup {
            title: title.to_owned(),
            slug: slug.to_owned(),
            description: format!("All about {title}"),
        };
        self.db().create_group(&create).await.unwrap()
    }

    pub async fn create_post(&self, author: &TestUser, text: &str, group: Option<&Group>) -> i64 {
        let create = CreatePost {
            author: author.user.id,
            text: text.to_owned(),
            group: group.map(|group| group.id),
            image: None,
        };
        self.db().create_post(&create).await.unwrap().get()
    }

    pub async fn get(&self, uri: &str, user: Option<&TestUser>) -> TestResponse {
        self.send(request("GET", uri, user).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_form(
        &self,
        uri: &str,
        user: Option<&TestUser>,
        fields: &[(&str, &str)],
    ) -> TestResponse {
        let body = fields
            .iter()
            .map(|(name, value)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(name, NON_ALPHANUMERIC),
                    utf8_percent_encode(value, NON_ALPHANUMERIC)
                )
            })
            .collect::<Vec<_>>()
            .join("&");

        let request = request("POST", uri, user)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// A POST with no body and no content type.
    pub async fn post_empty(&self, uri: &str, user: Option<&TestUser>) -> TestResponse {
        self.send(request("POST", uri, user).body(Body::empty()).unwrap())
            .await
    }

    /// Sends text fields plus an optional `image` file part.
    pub async fn post_multipart(
        &self,
        uri: &str,
        user: Option<&TestUser>,
        fields: &[(&str, &str)],
        image: Option<(&str, &[u8])>,
    ) -> TestResponse {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, contents)) = image {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(contents);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let request = request("POST", uri, user)
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .map(|value| value.to_str().unwrap().to_owned());
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();

        TestResponse {
            status,
            location,
            body,
        }
    }
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    #[track_caller]
    pub fn assert_redirect(&self, location: &str) {
        assert_eq!(self.status, StatusCode::SEE_OTHER);
        assert_eq!(self.location.as_deref(), Some(location));
    }
}

fn request(method: &str, uri: &str, user: Option<&TestUser>) -> axum::http::request::Builder {
    let builder = Request::builder().method(method).uri(uri);
    match user {
        Some(user) => builder.header(AUTHORIZATION, format!("Bearer {}", user.token)),
        None => builder,
    }
}
