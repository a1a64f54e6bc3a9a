//! Bearer tokens handed out on login.
//!
//! The wire form is `<user id>:<base64url secret>`, where the secret carries
//! both the key material and the salt it is hashed with. The database only
//! ever sees the Argon2 digest.

use crate::{
    model::{Id, user::UserMarker},
    util::PositiveDuration,
};
use argon2::{Argon2, Params};
use base64::{DecodeError, Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use std::{
    fmt::{self, Debug, Display, Formatter},
    num::ParseIntError,
    str::FromStr,
};
use thiserror::Error;
use time::UtcDateTime;

const KEY_LEN: usize = 24;
const SALT_LEN: usize = 18;

pub const SESSION_SECRET_LEN: usize = KEY_LEN + SALT_LEN;
pub const SESSION_TOKEN_HASH_LEN: usize = Params::DEFAULT_OUTPUT_LEN;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing session token failed: {0}")]
pub struct SessionTokenHashError(argon2::Error);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum SessionTokenDecodeError {
    #[error("Expected `<user id>:<secret>`")]
    MissingSeparator,
    #[error("Invalid user id: {0}")]
    InvalidUserId(ParseIntError),
    #[error("Secret is not base64url: {0}")]
    Base64(#[from] DecodeError),
    #[error("Secret decoded to {0} bytes")]
    SecretLength(usize),
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The session token hash had an invalid length")]
pub struct InvalidSessionTokenHashError;

/// What the client presents on every request.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct SessionToken {
    pub user_id: Id<UserMarker>,
    secret: [u8; SESSION_SECRET_LEN],
}

/// What the server keeps: the token digest, who it belongs to and how long
/// it lives.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Session {
    pub user: Id<UserMarker>,
    pub token_hash: SessionTokenHash,
    pub created_at: UtcDateTime,
    pub expires_after: Option<PositiveDuration>,
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct SessionTokenHash(Box<[u8; SESSION_TOKEN_HASH_LEN]>);

impl SessionToken {
    #[must_use]
    pub fn generate(user_id: Id<UserMarker>) -> Self {
        Self {
            user_id,
            secret: rand::random(),
        }
    }

    /// Opens a session for `user_id` starting at `now`. The token goes back to
    /// the client, the session into storage.
    pub fn issue(
        user_id: Id<UserMarker>,
        now: UtcDateTime,
        lifetime: Option<PositiveDuration>,
    ) -> Result<(Self, Session), SessionTokenHashError> {
        let token = Self::generate(user_id);
        let session = Session {
            user: user_id,
            token_hash: token.hash()?,
            created_at: now,
            expires_after: lifetime,
        };

        Ok((token, session))
    }

    pub fn hash(&self) -> Result<SessionTokenHash, SessionTokenHashError> {
        let (key, salt) = self.secret.split_at(KEY_LEN);

        let mut digest = Box::new([0; SESSION_TOKEN_HASH_LEN]);
        Argon2::default()
            .hash_password_into(key, salt, digest.as_mut_slice())
            .map_err(SessionTokenHashError)?;

        Ok(SessionTokenHash(digest))
    }
}

impl Display for SessionToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let secret = BASE64_URL_SAFE_NO_PAD.encode(self.secret);
        write!(f, "{}:{secret}", self.user_id)
    }
}

impl FromStr for SessionToken {
    type Err = SessionTokenDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (user_id, secret) = s
            .split_once(':')
            .ok_or(SessionTokenDecodeError::MissingSeparator)?;

        let user_id = user_id
            .parse::<i64>()
            .map_err(SessionTokenDecodeError::InvalidUserId)?;

        let secret = BASE64_URL_SAFE_NO_PAD.decode(secret)?;
        let secret = <[u8; SESSION_SECRET_LEN]>::try_from(secret.as_slice())
            .map_err(|_| SessionTokenDecodeError::SecretLength(secret.len()))?;

        Ok(Self {
            user_id: user_id.into(),
            secret,
        })
    }
}

impl Debug for SessionToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// `None` when the session never ends, which includes lifetimes reaching
    /// past the last representable instant.
    #[must_use]
    pub fn expires_at(&self) -> Option<UtcDateTime> {
        self.expires_after
            .and_then(|lifetime| self.created_at.checked_add(lifetime.get()))
    }

    #[must_use]
    pub fn is_expired_at(&self, now: UtcDateTime) -> bool {
        self.expires_at().is_some_and(|expires_at| expires_at < now)
    }

    /// Whether `token` may act as this session's user at `now`.
    #[must_use]
    pub fn admits(&self, token: &SessionToken, now: UtcDateTime) -> bool {
        self.user == token.user_id && !self.is_expired_at(now)
    }
}

impl SessionTokenHash {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl TryFrom<Vec<u8>> for SessionTokenHash {
    type Error = InvalidSessionTokenHashError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        value
            .into_boxed_slice()
            .try_into()
            .map(Self)
            .map_err(|_| InvalidSessionTokenHashError)
    }
}

impl Debug for SessionTokenHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("SessionTokenHash(..)")
    }
}
