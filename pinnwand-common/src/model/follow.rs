use crate::model::{Id, user::UserMarker};
use serde::Serialize;
use thiserror::Error;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("User {0} cannot follow themselves")]
pub struct SelfFollowError(Id<UserMarker>);

/// A directed subscription of `user` to the posts of `author`.
///
/// Construction guarantees the two differ.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
pub struct Follow {
    user: Id<UserMarker>,
    author: Id<UserMarker>,
}

impl Follow {
    pub fn new(user: Id<UserMarker>, author: Id<UserMarker>) -> Result<Self, SelfFollowError> {
        if user == author {
            Err(SelfFollowError(user))
        } else {
            Ok(Self { user, author })
        }
    }

    #[must_use]
    pub fn user(self) -> Id<UserMarker> {
        self.user
    }

    #[must_use]
    pub fn author(self) -> Id<UserMarker> {
        self.author
    }
}

#[cfg(test)]
mod tests {
    use super::Follow;

    #[test]
    fn self_follow_is_rejected() {
        assert!(Follow::new(3.into(), 3.into()).is_err());

        let follow = Follow::new(3.into(), 4.into()).unwrap();
        assert_eq!(follow.user(), 3.into());
        assert_eq!(follow.author(), 4.into());
    }
}
