use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{self, SaltString},
};
use std::fmt::{Debug, Formatter};
use thiserror::Error;

pub const PASSWORD_SALT_LEN: usize = 16;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing password failed: {0}")]
pub struct PasswordHashError(password_hash::Error);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The stored password digest is not a valid PHC string")]
pub struct InvalidPasswordDigestError;

/// Salted Argon2 hash of a password, kept as a PHC string.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct PasswordDigest(String);

impl PasswordDigest {
    pub fn new(raw: &str) -> Result<Self, PasswordHashError> {
        let salt_bytes: [u8; PASSWORD_SALT_LEN] = rand::random();
        let salt = SaltString::encode_b64(&salt_bytes).map_err(PasswordHashError)?;

        let hash = Argon2::default()
            .hash_password(raw.as_bytes(), &salt)
            .map_err(PasswordHashError)?;

        Ok(Self(hash.to_string()))
    }

    #[must_use]
    pub fn verify(&self, raw: &str) -> bool {
        PasswordHash::new(&self.0).is_ok_and(|hash| {
            Argon2::default()
                .verify_password(raw.as_bytes(), &hash)
                .is_ok()
        })
    }

    #[must_use]
    pub fn as_phc_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PasswordDigest {
    type Error = InvalidPasswordDigestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PasswordHash::new(&value).map_err(|_| InvalidPasswordDigestError)?;
        Ok(Self(value))
    }
}

impl Debug for PasswordDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PasswordDigest").field(&"[redacted]").finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::model::credentials::{InvalidPasswordDigestError, PasswordDigest};

    #[test]
    fn verifies_only_original_password() {
        let digest = PasswordDigest::new("cat").unwrap();

        assert!(digest.verify("cat"));
        assert!(!digest.verify("dog"));
        assert!(!digest.verify("Cat"));
        assert!(!digest.verify(""));
    }

    #[test]
    fn never_stores_plaintext() {
        let digest = PasswordDigest::new("hunter2").unwrap();

        assert!(!digest.as_phc_str().contains("hunter2"));
        assert!(digest.as_phc_str().starts_with("$argon2"));
        assert_eq!(format!("{digest:?}"), "PasswordDigest(\"[redacted]\")");
    }

    #[test]
    fn salts_differ() {
        let first = PasswordDigest::new("cat").unwrap();
        let second = PasswordDigest::new("cat").unwrap();

        assert_ne!(first, second);
        assert!(first.verify("cat"));
        assert!(second.verify("cat"));
    }

    #[test]
    fn parses_stored_digest() {
        let digest = PasswordDigest::new("cat").unwrap();

        let parsed = PasswordDigest::try_from(digest.as_phc_str().to_owned()).unwrap();
        assert!(parsed.verify("cat"));

        assert_eq!(
            PasswordDigest::try_from("plaintext".to_owned()),
            Err(InvalidPasswordDigestError)
        );
    }
}
