//! Content hashing for cache-busting file names.
//!
//! Uses blake3: identical bytes always produce the same digest, and the
//! digest is long enough that distinct content never collides in practice.

use std::fmt;
use std::path::{Path, PathBuf};

/// Number of hex characters embedded in hashed file names.
pub const FILENAME_HASH_LEN: usize = 20;

/// A 256-bit content hash (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash a byte slice.
    pub fn of(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    /// Full hex representation.
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    /// Shortened hex used inside file names.
    pub fn short(self) -> String {
        self.to_hex()[..FILENAME_HASH_LEN].to_string()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

/// Insert a content hash before the extension: `css/main.css` -> `css/main.HASH.css`.
pub fn hashed_path(path: &Path, hash: ContentHash) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match path.extension() {
        Some(ext) => format!("{}.{}.{}", stem, hash.short(), ext.to_string_lossy()),
        None => format!("{}.{}", stem, hash.short()),
    };
    path.with_file_name(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_content_identical_hash() {
        assert_eq!(ContentHash::of(b"body{}"), ContentHash::of(b"body{}"));
    }

    #[test]
    fn test_single_byte_change_changes_hash() {
        let a = ContentHash::of(b"body{color:red}");
        let b = ContentHash::of(b"body{color:rec}");
        assert_ne!(a, b);
        assert_ne!(a.short(), b.short());
    }

    #[test]
    fn test_short_hash_length() {
        let hash = ContentHash::of(b"x");
        assert_eq!(hash.short().len(), FILENAME_HASH_LEN);
        assert_eq!(hash.to_hex().len(), 64);
        assert!(hash.to_hex().starts_with(&hash.short()));
    }

    #[test]
    fn test_hashed_path() {
        let hash = ContentHash::of(b"x");
        let path = hashed_path(Path::new("css/main.css"), hash);
        assert_eq!(path, PathBuf::from(format!("css/main.{}.css", hash.short())));

        let path = hashed_path(Path::new("index.js"), hash);
        assert_eq!(path, PathBuf::from(format!("index.{}.js", hash.short())));
    }
}
