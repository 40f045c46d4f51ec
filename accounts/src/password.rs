//! Password hashing and the password policy.

use crate::error::AccountError;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};

const SPECIAL: &str = "@$!%*?&";
const MIN_LENGTH: usize = 8;

/// Checks the password policy: at least eight characters out of letters,
/// digits and `@$!%*?&`, with at least one lowercase letter, one uppercase
/// letter, one digit and one special character.
pub fn check_strength(password: &str) -> Result<(), AccountError> {
    if password.chars().count() < MIN_LENGTH {
        return Err(AccountError::WeakPassword("must be at least 8 characters"));
    }
    if !password
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || SPECIAL.contains(c))
    {
        return Err(AccountError::WeakPassword(
            "may only contain letters, digits and @$!%*?&",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(AccountError::WeakPassword("must contain a lowercase letter"));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(AccountError::WeakPassword("must contain an uppercase letter"));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AccountError::WeakPassword("must contain a digit"));
    }
    if !password.chars().any(|c| SPECIAL.contains(c)) {
        return Err(AccountError::WeakPassword(
            "must contain one of @$!%*?&",
        ));
    }
    Ok(())
}

/// Argon2id hasher. Hashing is CPU bound, callers on the runtime should go
/// through `spawn_blocking`.
#[derive(Clone, Default)]
pub struct Hasher {
    params: Params,
}

impl Hasher {
    /// Argon2id with `memory_kib` KiB of memory and `iterations` passes.
    pub fn with_cost(memory_kib: u32, iterations: u32) -> Result<Self, AccountError> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| AccountError::Hash(e.to_string()))?;
        Ok(Hasher { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash(&self, password: &str) -> Result<String, AccountError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AccountError::Hash(e.to_string()))
    }

    /// Hashes on the blocking pool.
    pub async fn spawn_hash(&self, password: &str) -> Result<String, AccountError> {
        let hasher = self.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password)).await?
    }

    /// Verifies on the blocking pool.
    pub async fn spawn_verify(&self, password: &str, hash: &str) -> Result<bool, AccountError> {
        let hasher = self.clone();
        let password = password.to_string();
        let hash = hash.to_string();
        Ok(tokio::task::spawn_blocking(move || hasher.verify(&password, &hash)).await?)
    }

    /// False for a wrong password and for a malformed hash.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .argon2()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(err) => {
                tracing::warn!(error = %err, "Stored password hash is malformed");
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn test_hasher() -> Hasher {
    // Smallest parameters argon2 accepts
    Hasher::with_cost(8, 1).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_strength() {
        assert!(check_strength("Sup3r$ecret").is_ok());
        for weak in [
            "Sh0rt!",
            "nouppercase1!",
            "NOLOWERCASE1!",
            "NoDigitsHere!",
            "NoSpecial123",
            "Has space 1!A",
            "Ünicode1!aB",
        ] {
            assert!(
                matches!(check_strength(weak), Err(AccountError::WeakPassword(_))),
                "{weak} passed"
            );
        }
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = test_hasher();
        let hash = hasher.hash("Sup3r$ecret").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("Sup3r$ecret", &hash));
        assert!(!hasher.verify("Sup3r$ecreT", &hash));
        assert!(!hasher.verify("Sup3r$ecret", "not a hash"));
    }
}
