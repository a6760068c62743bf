//! Password strength checks and bcrypt hashing.
//!
//! Passwords set through the web forms go through [ValidatedPassword::new].
//! The command line tools may skip the check with
//! [ValidatedPassword::new_unchecked] when an operator insists.

use std::fmt::Display;

use bcrypt::{BcryptError, hash, verify};
use zxcvbn::{Score, zxcvbn};

use crate::Error;

/// Passwords shorter than this are rejected before they are scored.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// A password that passed the strength check, but is not hashed yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPassword(String);

impl ValidatedPassword {
    /// Check the strength of `raw_password`.
    ///
    /// `user_inputs` are words the password must not be built from, such as
    /// the username and name of the record the password belongs to.
    ///
    /// # Errors
    ///
    /// Returns [Error::TooWeak] with a suggestion for a stronger password.
    pub fn new(raw_password: &str, user_inputs: &[&str]) -> Result<Self, Error> {
        if raw_password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(Error::TooWeak(format!(
                "A senha deve ter pelo menos {MIN_PASSWORD_LENGTH} caracteres."
            )));
        }

        let analysis = zxcvbn(raw_password, user_inputs);

        match analysis.score() {
            Score::Three | Score::Four => Ok(Self(raw_password.to_owned())),
            _ => {
                let suggestion = analysis
                    .feedback()
                    .map(|feedback| feedback.to_string())
                    .unwrap_or_default();

                Err(Error::TooWeak(
                    format!("A senha é fácil de adivinhar. {suggestion}")
                        .trim_end()
                        .to_owned(),
                ))
            }
        }
    }

    /// Wrap `raw_password` without checking its strength.
    pub fn new_unchecked(raw_password: &str) -> Self {
        Self(raw_password.to_owned())
    }
}

impl Display for ValidatedPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("********")
    }
}

/// A salted bcrypt hash of a password.
#[derive(Debug, Clone, PartialEq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// The bcrypt cost used by the application.
    pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

    /// Hash `password` with `cost` rounds.
    ///
    /// # Errors
    ///
    /// Returns [Error::HashingError] if bcrypt fails, e.g. for an invalid cost.
    pub fn new(password: ValidatedPassword, cost: u32) -> Result<Self, Error> {
        hash(&password.0, cost)
            .map(Self)
            .map_err(|error| Error::HashingError(error.to_string()))
    }

    /// Wrap a hash read from the database.
    pub fn new_unchecked(raw_password_hash: &str) -> Self {
        Self(raw_password_hash.to_owned())
    }

    /// Check the strength of `raw_password` and hash it.
    pub fn from_raw_password(
        raw_password: &str,
        user_inputs: &[&str],
        cost: u32,
    ) -> Result<Self, Error> {
        let validated_password = ValidatedPassword::new(raw_password, user_inputs)?;

        PasswordHash::new(validated_password, cost)
    }

    /// Check that `raw_password` matches the stored hash.
    pub fn verify(&self, raw_password: &str) -> Result<bool, BcryptError> {
        verify(raw_password, &self.0)
    }
}

impl Display for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}


#[cfg(test)]
mod password_hash_tests {
    use super::{PasswordHash, ValidatedPassword};

    #[test]
    fn verify_accepts_matching_password() {
        let hash = PasswordHash::new(ValidatedPassword::new_unchecked("segredo"), 4).unwrap();

        assert_eq!(hash.verify("segredo").ok(), Some(true));
    }

    #[test]
    fn verify_rejects_other_password() {
        let hash = PasswordHash::new(ValidatedPassword::new_unchecked("segredo"), 4).unwrap();

        assert_eq!(hash.verify("Segredo").ok(), Some(false));
    }

    #[test]
    fn hashes_are_salted() {
        let first = PasswordHash::new(ValidatedPassword::new_unchecked("segredo"), 4).unwrap();
        let second = PasswordHash::new(ValidatedPassword::new_unchecked("segredo"), 4).unwrap();

        assert_ne!(first, second);
    }
}
