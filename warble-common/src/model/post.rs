use crate::{
    model::{
        Id,
        user::{User, UserMarker},
    },
    util::{unix_millis, validated_string},
};
use serde::{Deserialize, Serialize};
use time::UtcDateTime;

pub const POST_CONTENT_MAX_LEN: usize = 140;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

validated_string!(
    /// Post body: not blank, at most [`POST_CONTENT_MAX_LEN`] characters.
    PostContent,
    InvalidPostContentError,
    "post content",
    |content| !content.trim().is_empty() && content.chars().count() <= POST_CONTENT_MAX_LEN
);

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub author: User,
    pub content: PostContent,
    #[serde(with = "unix_millis")]
    pub timestamp: UtcDateTime,
}

/// A post without its author loaded.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct PartialPost {
    pub id: Id<PostMarker>,
    pub author_id: Id<UserMarker>,
    pub content: PostContent,
    #[serde(with = "unix_millis")]
    pub timestamp: UtcDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreatePost {
    pub content: PostContent,
    pub timestamp: UtcDateTime,
}

impl CreatePost {
    #[must_use]
    pub fn now(content: PostContent) -> Self {
        Self {
            content,
            timestamp: UtcDateTime::now(),
        }
    }
}

impl From<Post> for PartialPost {
    fn from(value: Post) -> Self {
        Self {
            id: value.id,
            author_id: value.author.id,
            content: value.content,
            timestamp: value.timestamp,
        }
    }
}
