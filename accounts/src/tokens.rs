//! Opaque bearer tokens. Only the SHA-256 digest of a token is stored.

use sha2::{Digest, Sha256};

/// 32 random bytes, hex encoded.
pub fn generate() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

pub fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate() {
        let token = generate();
        assert_eq!(token.len(), 64);
        assert_ne!(token, generate());
    }

    #[test]
    fn test_digest() {
        assert_eq!(
            digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
