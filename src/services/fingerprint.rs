//! Content fingerprinting for change detection.

use sha2::{Digest, Sha256};

/// Compute the content fingerprint: a SHA-256 hex digest of the raw bytes.
///
/// Pure function of the bytes, no markup normalization. Any byte
/// difference changes the hash, so a hash change does not by itself imply
/// the file set changed; the two signals are compared independently.
pub fn fingerprint(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_bytes_produce_identical_hashes() {
        assert_eq!(fingerprint(b"<html></html>"), fingerprint(b"<html></html>"));
    }

    #[test]
    fn any_byte_difference_changes_the_hash() {
        assert_ne!(fingerprint(b"<html></html>"), fingerprint(b"<html> </html>"));
    }

    #[test]
    fn known_digest() {
        // sha256("") is a fixed vector
        assert_eq!(
            fingerprint(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
