//! Gravatar URL derivation.
//!
//! See <https://docs.gravatar.com/api/avatars/images/>

use md5::{Digest, Md5};

pub const GRAVATAR_BASE_URL: &str = "http://www.gravatar.com/avatar";

/// Builds the identicon-backed gravatar URL for `email` at `size` pixels.
///
/// The email is trimmed and lower-cased before hashing, so addresses that
/// only differ in case or surrounding whitespace share an avatar.
#[must_use]
pub fn avatar_url(email: &str, size: u32) -> String {
    let normalized = email.trim().to_lowercase();
    let digest = Md5::digest(normalized.as_bytes());

    format!("{GRAVATAR_BASE_URL}/{digest:x}?d=identicon&s={size}")
}
