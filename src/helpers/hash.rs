//! Streaming, byte-capped SHA-256 (spec §4.Z).

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

/// Hashes up to `max_bytes` of `path`'s contents, returning lowercase hex.
///
/// Reads in fixed-size chunks so the cap is enforced without ever
/// allocating more than one chunk at a time, regardless of the file's
/// actual size — callers pass untrusted file paths (process executables,
/// kernel modules) that may be unboundedly large or even special files.
pub fn sha256_capped(path: &Path, max_bytes: u64) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut remaining = max_bytes;
    let mut buf = [0u8; 64 * 1024];

    while remaining > 0 {
        let want = buf.len().min(remaining as usize);
        let n = file.read(&mut buf[..want])?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        remaining -= n as u64;
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hashes an in-memory byte slice, capped at `max_bytes`.
pub fn sha256_bytes_capped(data: &[u8], max_bytes: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(&data[..data.len().min(max_bytes)]);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capped_hash_matches_uncapped_for_small_input() {
        let data = b"hello world";
        let a = sha256_bytes_capped(data, data.len());
        let b = sha256_bytes_capped(data, data.len() * 2);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn cap_truncates_hash_input() {
        let data = b"abcdefgh";
        let full = sha256_bytes_capped(data, 8);
        let truncated = sha256_bytes_capped(data, 4);
        assert_ne!(full, truncated);
    }

    #[test]
    fn file_hash_respects_cap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.bin");
        std::fs::write(&path, vec![0xABu8; 1024]).unwrap();
        let capped = sha256_capped(&path, 10).unwrap();
        let expected = sha256_bytes_capped(&vec![0xABu8; 10], 10);
        assert_eq!(capped, expected);
    }
}
