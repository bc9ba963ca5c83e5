use crate::model::{
    Id,
    group::{Group, GroupMarker},
    user::{User, UserMarker},
};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Write};
use time::OffsetDateTime;

/// How many characters of the text a post shows when displayed on its own.
pub const POST_DISPLAY_LEN: usize = 15;

/// Directory below the media root that post images are uploaded to.
pub const POST_IMAGE_DIR: &str = "posts";

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub pub_date: OffsetDateTime,
    pub author: User,
    pub group: Option<Group>,
    /// Path of the attached image, relative to the media root.
    pub image: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct CreatePost {
    pub author: Id<UserMarker>,
    pub text: String,
    pub group: Option<Id<GroupMarker>>,
    pub image: Option<String>,
}

/// New contents for an existing post. The author is never part of an edit.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct EditPost {
    pub text: String,
    pub group: Option<Id<GroupMarker>>,
    /// `None` keeps the current image.
    pub image: Option<String>,
}

impl Post {
    #[must_use]
    pub fn is_authored_by(&self, user: Id<UserMarker>) -> bool {
        self.author.id == user
    }
}

impl Display for Post {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.text
            .chars()
            .take(POST_DISPLAY_LEN)
            .try_for_each(|c| f.write_char(c))
    }
}
