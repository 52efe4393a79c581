//! Short-hash verification of installed files (truncated hex SHA-256).

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::download::copy_chunked;

/// Full SHA-256 hex digest length.
pub const FULL_HASH_LEN: usize = 64;

/// Outcome of comparing an on-disk file with a short hash.
#[derive(Debug)]
pub enum FileCheck {
    Match,
    Mismatch { actual: String },
    NotFound,
    Unreadable(io::Error),
}

impl FileCheck {
    pub fn is_match(&self) -> bool {
        matches!(self, FileCheck::Match)
    }
}

/// True if `hash` is lowercase hex of even length, at most 64 chars, and non-empty.
pub fn is_valid_short_hash(hash: &str) -> bool {
    !hash.is_empty()
        && hash.len() <= FULL_HASH_LEN
        && hash.len() % 2 == 0
        && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// SHA-256 of everything `reader` yields, as lowercase hex. Reads `chunk_size` bytes at a time.
pub fn sha256_hex<R: Read>(reader: &mut R, chunk_size: usize) -> io::Result<String> {
    let mut hasher = Sha256::new();
    copy_chunked(reader, chunk_size, |chunk| {
        hasher.update(chunk);
        Ok(())
    })?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Hex SHA-256 of the file at `path`, truncated to `len` chars.
pub fn file_short_hash(path: &Path, len: usize, chunk_size: usize) -> io::Result<String> {
    let mut f = File::open(path)?;
    let mut digest = sha256_hex(&mut f, chunk_size)?;
    digest.truncate(len.min(FULL_HASH_LEN));
    Ok(digest)
}

/// Compare the file at `path` with `short_hash`. Never fails; I/O problems become variants.
pub fn check_file(path: &Path, short_hash: &str, chunk_size: usize) -> FileCheck {
    let mut f = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return FileCheck::NotFound,
        Err(e) => return FileCheck::Unreadable(e),
    };
    let digest = match sha256_hex(&mut f, chunk_size) {
        Ok(d) => d,
        Err(e) => return FileCheck::Unreadable(e),
    };
    match digest.get(..short_hash.len()) {
        Some(prefix) if prefix == short_hash => FileCheck::Match,
        Some(prefix) => FileCheck::Mismatch {
            actual: prefix.to_string(),
        },
        None => FileCheck::Mismatch { actual: digest },
    }
}

/// True iff the file exists, is readable, and its digest starts with `short_hash` (case-sensitive).
pub fn verify(path: &Path, short_hash: &str, chunk_size: usize) -> bool {
    check_file(path, short_hash, chunk_size).is_match()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::DEFAULT_CHUNK_SIZE;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn test_verify_hello_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello").unwrap();

        assert!(verify(&path, "2cf24dba", DEFAULT_CHUNK_SIZE));
        assert!(verify(&path, HELLO_SHA256, DEFAULT_CHUNK_SIZE));
        assert!(!verify(&path, "2cf24dbb", DEFAULT_CHUNK_SIZE));
        assert!(!verify(&path, "2CF24DBA", DEFAULT_CHUNK_SIZE));
        assert!(!verify(&path, "00", DEFAULT_CHUNK_SIZE));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.py");
        assert!(matches!(check_file(&path, "2cf2", 128), FileCheck::NotFound));
        assert!(!verify(&path, "2cf2", 128));
    }

    #[test]
    fn test_directory_is_unreadable_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!verify(dir.path(), "2cf2", 128));
    }

    #[test]
    fn test_overlong_hash_is_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello").unwrap();
        let too_long = format!("{}00", HELLO_SHA256);
        assert!(matches!(
            check_file(&path, &too_long, 128),
            FileCheck::Mismatch { .. }
        ));
    }

    #[test]
    fn test_small_chunks_same_digest() {
        let data = vec![7u8; 1000];
        let a = sha256_hex(&mut data.as_slice(), 3).unwrap();
        let b = sha256_hex(&mut data.as_slice(), 4096).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_file_short_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello").unwrap();
        assert_eq!(file_short_hash(&path, 8, 128).unwrap(), "2cf24dba");
        assert_eq!(file_short_hash(&path, 100, 128).unwrap(), HELLO_SHA256);
    }

    #[test]
    fn test_is_valid_short_hash() {
        assert!(is_valid_short_hash("2cf24dba"));
        assert!(is_valid_short_hash(HELLO_SHA256));
        assert!(!is_valid_short_hash(""));
        assert!(!is_valid_short_hash("2cf"));
        assert!(!is_valid_short_hash("2CF2"));
        assert!(!is_valid_short_hash("zz"));
        assert!(!is_valid_short_hash(&format!("{}00", HELLO_SHA256)));
    }
}
