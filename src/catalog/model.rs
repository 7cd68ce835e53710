use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::digest::Digest;

/// Image container formats the catalog accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageFormat {
    /// MIME type for `fetch_image` responses.
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
        }
    }

    /// Detect a format from a lowercased file extension. `None` for anything unsupported.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Validate a format against the file's leading magic bytes.
    #[must_use]
    pub fn matches_magic(self, head: &[u8]) -> bool {
        match self {
            Self::Jpeg => head.starts_with(&[0xFF, 0xD8, 0xFF]),
            Self::Png => head.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
            Self::Gif => head.starts_with(b"GIF87a") || head.starts_with(b"GIF89a"),
            Self::Webp => head.len() >= 12 && &head[0..4] == b"RIFF" && &head[8..12] == b"WEBP",
        }
    }
}

/// A single file the catalog has indexed, keyed externally by its `Digest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub path: PathBuf,
    pub size: u64,
    pub mtime: SystemTime,
    pub format: ImageFormat,
}

/// Outcome of a single `Catalog::scan` call.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ScanStats {
    pub discovered: usize,
    pub hashed: usize,
    pub reused_from_cache: usize,
    pub rejected_unsupported: usize,
    pub rejected_oversized: usize,
    pub errors: usize,
    pub new_digests: usize,
}

/// A digest newly observed by a scan, reported so the Rating Store can create
/// a fresh posterior record for it.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub digest: Digest,
}
