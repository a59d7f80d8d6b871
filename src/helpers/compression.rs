//! Bounded streaming decompression for `.ko.gz` / `.ko.xz` kernel modules
//! (spec §4.Y).
//!
//! Every decoder here is total: a short read, a corrupt stream, or
//! exceeding the caller-specified byte cap returns `None` rather than
//! throwing. Callers decide whether an empty result warrants a
//! `DecompressFail` warning or should be treated as indeterminate.

use std::io::Read;

use flate2::read::GzDecoder;
use xz2::read::XzDecoder;

/// Decompresses a gzip stream, reading at most `cap` bytes of output.
///
/// Returns `None` if the stream is not valid gzip, or if more than `cap`
/// bytes of decompressed output would be produced (the module is then
/// treated as indeterminate rather than partially hashed/scanned).
pub fn gunzip_capped(data: &[u8], cap: usize) -> Option<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    read_capped(&mut decoder, cap)
}

/// Decompresses an xz/lzma stream, reading at most `cap` bytes of output.
pub fn unxz_capped(data: &[u8], cap: usize) -> Option<Vec<u8>> {
    let mut decoder = XzDecoder::new(data);
    read_capped(&mut decoder, cap)
}

/// Reads from `reader` into a buffer capped at `cap + 1` bytes so a stream
/// producing exactly `cap` bytes succeeds while one producing more is
/// detected and rejected, without ever allocating past `cap + 1`.
fn read_capped<R: Read>(reader: &mut R, cap: usize) -> Option<Vec<u8>> {
    let mut buf = vec![0u8; cap + 1];
    let mut filled = 0usize;

    loop {
        if filled == buf.len() {
            // Would need more than `cap` bytes — exceeded the cap.
            return None;
        }
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(_) => return None,
        }
    }

    if filled > cap {
        None
    } else {
        buf.truncate(filled);
        Some(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn gunzip_round_trips_under_cap() {
        let payload = b"Module signature appended\nrest of file".to_vec();
        let compressed = gzip(&payload);
        let out = gunzip_capped(&compressed, 1024).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn gunzip_rejects_output_over_cap() {
        let payload = vec![0x41u8; 1000];
        let compressed = gzip(&payload);
        assert!(gunzip_capped(&compressed, 10).is_none());
    }

    #[test]
    fn gunzip_rejects_garbage() {
        assert!(gunzip_capped(b"not gzip data at all", 1024).is_none());
    }

    #[test]
    fn gunzip_exact_cap_boundary_succeeds() {
        let payload = vec![0x42u8; 16];
        let compressed = gzip(&payload);
        let out = gunzip_capped(&compressed, 16).unwrap();
        assert_eq!(out.len(), 16);
    }
}
