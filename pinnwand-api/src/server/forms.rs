//! Binding and validation of submitted form data.
//!
//! A form is bound to raw submitted values, validated into cleaned data, and on failure
//! rendered back with its values and per-field error messages. Assigning the author (and
//! the post, for comments) is left to the handler.

use crate::server::ServerError;
use axum::{
    Form,
    extract::{FromRequest, Multipart, Request, rejection::FormRejection},
    http::header::CONTENT_TYPE,
};
use bytes::Bytes;
use pinnwand_common::model::{
    Id,
    group::{Group, GroupMarker},
    post::Post,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// Error messages per field name.
pub type FieldErrors = BTreeMap<&'static str, Vec<&'static str>>;

/// A file sent along with a multipart form.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct Upload {
    pub file_name: String,
    pub contents: Bytes,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub struct PostFields {
    #[serde(default)]
    pub text: String,
    /// Id of the chosen group; empty for none.
    #[serde(default)]
    pub group: String,
}

/// The body of a post create or edit request, either url-encoded or multipart.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct PostSubmission {
    pub fields: PostFields,
    pub image: Option<Upload>,
}

/// Validated post contents.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CleanPost {
    pub text: String,
    pub group: Option<Id<GroupMarker>>,
    pub image: Option<Upload>,
}

/// The post form as rendered: current values, the group choices, and any errors.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
pub struct PostForm {
    pub text: String,
    pub group: String,
    pub groups: Vec<Group>,
    pub errors: FieldErrors,
    #[serde(skip)]
    image: Option<Upload>,
}

impl PostForm {
    #[must_use]
    pub fn empty(groups: Vec<Group>) -> Self {
        Self {
            groups,
            ..Self::default()
        }
    }

    /// The form pre-filled with an existing post.
    #[must_use]
    pub fn for_post(post: &Post, groups: Vec<Group>) -> Self {
        Self {
            text: post.text.clone(),
            group: post
                .group
                .as_ref()
                .map(|group| group.id.to_string())
                .unwrap_or_default(),
            groups,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn bind(submission: PostSubmission, groups: Vec<Group>) -> Self {
        Self {
            text: submission.fields.text,
            group: submission.fields.group,
            groups,
            errors: FieldErrors::new(),
            image: submission.image,
        }
    }

    /// Validates the bound values. On failure the errors are recorded on the form.
    pub fn validate(&mut self) -> Option<CleanPost> {
        self.errors.clear();

        let text = self.text.trim().to_owned();
        if text.is_empty() {
            self.add_error("text", REQUIRED);
        }

        let raw_group = self.group.trim().to_owned();
        let group = if raw_group.is_empty() {
            None
        } else {
            let chosen = raw_group
                .parse::<i64>()
                .ok()
                .map(Id::<GroupMarker>::new)
                .filter(|id| self.groups.iter().any(|group| group.id == *id));
            if chosen.is_none() {
                self.add_error("group", INVALID_CHOICE);
            }
            chosen
        };

        let image = self.image.take().filter(|upload| !upload.is_blank());
        if image.as_ref().is_some_and(|upload| !upload.is_decodable_image()) {
            self.add_error("image", INVALID_IMAGE);
        }

        if !self.errors.is_empty() {
            return None;
        }

        Some(CleanPost { text, group, image })
    }

    fn add_error(&mut self, field: &'static str, message: &'static str) {
        self.errors.entry(field).or_default().push(message);
    }
}

impl Upload {
    /// Browsers send an empty, nameless part when no file was picked.
    fn is_blank(&self) -> bool {
        self.file_name.is_empty() && self.contents.is_empty()
    }

    /// Decodes the whole file, so truncated or corrupted images are caught too.
    fn is_decodable_image(&self) -> bool {
        match image::load_from_memory(&self.contents) {
            Ok(_) => true,
            Err(error) => {
                debug!(file_name = %self.file_name, %error, "Upload is not a readable image");
                false
            }
        }
    }
}

impl<S> FromRequest<S> for PostSubmission
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if !is_multipart {
            let Form(fields) = Form::<PostFields>::from_request(request, state).await?;
            return Ok(Self {
                fields,
                image: None,
            });
        }

        let mut multipart = Multipart::from_request(request, state).await?;
        let mut submission = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(ToOwned::to_owned);
            match name.as_deref() {
                Some("text") => submission.fields.text = field.text().await?,
                Some("group") => submission.fields.group = field.text().await?,
                Some("image") => {
                    let file_name = field.file_name().unwrap_or_default().to_owned();
                    let contents = field.bytes().await?;
                    submission.image = Some(Upload {
                        file_name,
                        contents,
                    });
                }
                _ => {}
            }
        }

        Ok(submission)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub struct CommentFields {
    #[serde(default)]
    pub text: String,
}

/// The comment form shown below a post.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
pub struct CommentForm {
    pub text: String,
    pub errors: FieldErrors,
}

impl CommentForm {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn bind(fields: CommentFields) -> Self {
        Self {
            text: fields.text,
            errors: FieldErrors::new(),
        }
    }

    /// Binds whatever body was sent. One that cannot be read as a form binds as empty and
    /// fails validation like a missing text.
    #[must_use]
    pub fn bind_body(body: Result<Form<CommentFields>, FormRejection>) -> Self {
        match body {
            Ok(Form(fields)) => Self::bind(fields),
            Err(rejection) => {
                debug!(%rejection, "Comment body is not a readable form");
                Self::bind(CommentFields::default())
            }
        }
    }

    /// Returns the cleaned comment text.
    pub fn validate(&mut self) -> Option<String> {
        self.errors.clear();

        let text = self.text.trim();
        if text.is_empty() {
            self.errors.entry("text").or_default().push(REQUIRED);
            return None;
        }
        Some(text.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CommentFields, CommentForm, INVALID_CHOICE, INVALID_IMAGE, PostFields, PostForm,
        PostSubmission, REQUIRED, Upload,
    };
    use bytes::Bytes;
    use pinnwand_common::model::group::Group;

    const SMALL_GIF: &[u8] = b"GIF89a\x02\x00\x01\x00\x80\x00\x00\x00\x00\x00\xff\xff\xff!\xf9\x04\x00\x00\x00\x00\x00,\x00\x00\x00\x00\x02\x00\x01\x00\x00\x02\x02\x0c\n\x00;";

    fn groups() -> Vec<Group> {
        vec![Group {
            id: 3.into(),
            title: "Test group".to_owned(),
            slug: "test-slug".to_owned(),
            description: String::new(),
        }]
    }

    fn submission(text: &str, group: &str, image: Option<Upload>) -> PostSubmission {
        PostSubmission {
            fields: PostFields {
                text: text.to_owned(),
                group: group.to_owned(),
            },
            image,
        }
    }

    #[test]
    fn valid_post_is_cleaned() {
        let mut form = PostForm::bind(submission("  Hello  ", "3", None), groups());
        let clean = form.validate().unwrap();

        assert_eq!(clean.text, "Hello");
        assert_eq!(clean.group, Some(3.into()));
        assert!(form.errors.is_empty());
    }

    #[test]
    fn group_is_optional() {
        let mut form = PostForm::bind(submission("Hello", "", None), groups());
        assert_eq!(form.validate().unwrap().group, None);
    }

    #[test]
    fn blank_text_and_unknown_group_are_reported() {
        let mut form = PostForm::bind(submission(" \n ", "99", None), groups());

        assert!(form.validate().is_none());
        assert_eq!(form.errors["text"], [REQUIRED]);
        assert_eq!(form.errors["group"], [INVALID_CHOICE]);
        assert_eq!(form.text, " \n ");
    }

    #[test]
    fn images_are_checked() {
        let gif = Upload {
            file_name: "small.gif".to_owned(),
            contents: Bytes::from_static(SMALL_GIF),
        };
        let mut form = PostForm::bind(submission("Hello", "", Some(gif.clone())), groups());
        assert_eq!(form.validate().unwrap().image, Some(gif));

        let text_file = Upload {
            file_name: "notes.gif".to_owned(),
            contents: Bytes::from_static(b"just text"),
        };
        let mut form = PostForm::bind(submission("Hello", "", Some(text_file)), groups());
        assert!(form.validate().is_none());
        assert_eq!(form.errors["image"], [INVALID_IMAGE]);
    }

    #[test]
    fn corrupted_images_are_rejected() {
        let garbage_gif = Upload {
            file_name: "broken.gif".to_owned(),
            contents: Bytes::from_static(b"GIF89a this is not image data at all"),
        };
        let mut form = PostForm::bind(submission("Hello", "", Some(garbage_gif)), groups());
        assert!(form.validate().is_none());
        assert_eq!(form.errors["image"], [INVALID_IMAGE]);

        let truncated_gif = Upload {
            file_name: "truncated.gif".to_owned(),
            contents: Bytes::from_static(&SMALL_GIF[..SMALL_GIF.len() - 8]),
        };
        let mut form = PostForm::bind(submission("Hello", "", Some(truncated_gif)), groups());
        assert!(form.validate().is_none());
        assert_eq!(form.errors["image"], [INVALID_IMAGE]);
    }

    #[test]
    fn blank_upload_means_no_image() {
        let mut form = PostForm::bind(submission("Hello", "", Some(Upload::default())), groups());
        assert_eq!(form.validate().unwrap().image, None);
    }

    #[test]
    fn comment_text_is_required() {
        let mut form = CommentForm::bind(CommentFields {
            text: "   ".to_owned(),
        });
        assert!(form.validate().is_none());
        assert_eq!(form.errors["text"], [REQUIRED]);

        let mut form = CommentForm::bind(CommentFields {
            text: " Nice post ".to_owned(),
        });
        assert_eq!(form.validate().as_deref(), Some("Nice post"));
    }
}
