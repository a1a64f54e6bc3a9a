use sqlx::FromRow;
use time::Duration;
use warble_common::{
    model::{
        ModelValidationError,
        credentials::PasswordDigest,
        post::{PartialPost, Post, PostContent},
        session::Session,
        user::{AboutMe, Email, User, UserHandle},
    },
    util::from_unix_millis,
};

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_id: i64,
    pub handle: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub about_me: Option<String>,
    pub last_seen_ms: Option<i64>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PartialPostRecord {
    pub post_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at_ms: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct FullPostRecord {
    pub post_id: i64,
    pub content: String,
    pub created_at_ms: i64,
    #[sqlx(flatten)]
    pub author: UserRecord,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct SessionRecord {
    pub user_id: i64,
    pub token_hash: Vec<u8>,
    pub created_at_ms: i64,
    pub expires_after_seconds: Option<i64>,
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.user_id.into(),
            handle: UserHandle::new(value.handle)?,
            email: Email::new(value.email)?,
            about_me: value.about_me.map(AboutMe::new).transpose()?,
            last_seen: value.last_seen_ms.map(from_unix_millis).transpose()?,
            password: value
                .password_hash
                .map(PasswordDigest::try_from)
                .transpose()?,
        })
    }
}

impl TryFrom<PartialPostRecord> for PartialPost {
    type Error = ModelValidationError;

    fn try_from(value: PartialPostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.post_id.into(),
            author_id: value.user_id.into(),
            content: PostContent::new(value.content)?,
            timestamp: from_unix_millis(value.created_at_ms)?,
        })
    }
}

impl TryFrom<FullPostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: FullPostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.post_id.into(),
            author: value.author.try_into()?,
            content: PostContent::new(value.content)?,
            timestamp: from_unix_millis(value.created_at_ms)?,
        })
    }
}

impl TryFrom<SessionRecord> for Session {
    type Error = ModelValidationError;

    fn try_from(value: SessionRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: value.user_id.into(),
            token_hash: value.token_hash.try_into()?,
            created_at: from_unix_millis(value.created_at_ms)?,
            expires_after: value
                .expires_after_seconds
                .map(|seconds| Duration::seconds(seconds).try_into())
                .transpose()?,
        })
    }
}
