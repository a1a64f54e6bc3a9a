use crate::{
    avatar::avatar_url,
    model::{
        Id,
        credentials::{PasswordDigest, PasswordHashError},
    },
    util::{unix_millis, validated_string},
};
use serde::Serialize;
use time::UtcDateTime;

pub const USER_HANDLE_MAX_LEN: usize = 64;
pub const EMAIL_MAX_LEN: usize = 120;
pub const ABOUT_ME_MAX_LEN: usize = 140;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

validated_string!(
    /// Unique username, 1 to [`USER_HANDLE_MAX_LEN`] characters without whitespace.
    UserHandle,
    InvalidUserHandleError,
    "user handle",
    |handle| !handle.is_empty()
        && handle.chars().count() <= USER_HANDLE_MAX_LEN
        && !handle.chars().any(char::is_whitespace)
);

validated_string!(
    /// Unique email address. Only the shape `local@domain` is checked.
    Email,
    InvalidEmailError,
    "email address",
    |email| email.chars().count() <= EMAIL_MAX_LEN
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty())
);

validated_string!(
    AboutMe,
    InvalidAboutMeError,
    "about me text",
    |about_me| about_me.chars().count() <= ABOUT_ME_MAX_LEN
);

/// Serialized form is public: the email only ever leaves the server as the
/// avatar derived from it.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct User {
    pub id: Id<UserMarker>,
    pub handle: UserHandle,
    #[serde(skip)]
    pub email: Email,
    pub about_me: Option<AboutMe>,
    #[serde(with = "unix_millis::option")]
    pub last_seen: Option<UtcDateTime>,
    #[serde(skip)]
    pub password: Option<PasswordDigest>,
}

impl User {
    /// Replaces the stored password digest with a fresh hash of `raw`.
    pub fn set_password(&mut self, raw: &str) -> Result<(), PasswordHashError> {
        self.password = Some(PasswordDigest::new(raw)?);
        Ok(())
    }

    /// A user without a password never authenticates.
    #[must_use]
    pub fn check_password(&self, raw: &str) -> bool {
        self.password
            .as_ref()
            .is_some_and(|password| password.verify(raw))
    }

    #[must_use]
    pub fn avatar(&self, size: u32) -> String {
        avatar_url(self.email.get(), size)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateUser {
    pub handle: UserHandle,
    pub email: Email,
    pub password: Option<PasswordDigest>,
}
