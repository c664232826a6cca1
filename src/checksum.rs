//! Content hashing (§4.1).
//!
//! `content_checksum` hashes file bytes; `symlink_checksum` hashes the link
//! destination string only. Both use BLAKE3 — collision-resistant, fast
//! enough to run on every reconciliation, and already content-addressed
//! rather than incremental, which matches how the store git adapter treats
//! blobs.

/// Hex-encoded content hash. Identical bytes always produce identical hex;
/// equal hashes are treated as equal content everywhere in the engine.
pub fn content_checksum(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Hash of a symlink's destination string, not the bytes it points to.
pub fn symlink_checksum(target: &str) -> String {
    blake3::hash(target.as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_bytes_produce_identical_hex() {
        let a = content_checksum(b"Hello World");
        let b = content_checksum(b"Hello World");
        assert_eq!(a, b);
    }

    #[test]
    fn different_bytes_produce_different_hex() {
        let a = content_checksum(b"Hello World");
        let b = content_checksum(b"Hello World\n");
        assert_ne!(a, b);
    }

    #[test]
    fn symlink_checksum_hashes_destination_only() {
        let a = symlink_checksum("../shared/AGENTS.md");
        let b = symlink_checksum("../shared/AGENTS.md");
        assert_eq!(a, b);
        let c = symlink_checksum("../shared/other.md");
        assert_ne!(a, c);
    }

    #[test]
    fn empty_input_is_stable() {
        assert_eq!(content_checksum(b""), content_checksum(b""));
    }
}
