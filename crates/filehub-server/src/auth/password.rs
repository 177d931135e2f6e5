//! One-way password digests.
//!
//! Digests are deterministic so sign-in can match `(email, digest)` directly
//! in the users collection.

use sha2::{Digest, Sha256};

/// SHA-256 of the password, lowercase hex.
pub fn digest_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        assert_eq!(digest_password("toto1234!"), digest_password("toto1234!"));
        assert_ne!(digest_password("toto1234!"), digest_password("toto1234?"));
    }

    #[test]
    fn digest_is_not_plaintext() {
        let digest = digest_password("secret");
        assert_eq!(digest.len(), 64);
        assert!(!digest.contains("secret"));
        assert_eq!(
            digest,
            "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b"
        );
    }
}
