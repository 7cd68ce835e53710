//! The Content Catalog: walks a root directory, hashes every supported image,
//! and keeps an in-memory digest → entry index. The digest is the only
//! identifier the rest of the crate ever sees for an image.

pub mod hashing;
pub mod model;
pub mod scanner;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::RwLock;

use crate::config::CoreConfig;
use crate::digest::Digest;
use crate::error::{CoreError, Result};

pub use hashing::CancelToken;
pub use model::{CatalogEntry, ImageFormat, NewImage, ScanStats};

/// A `(path, size, mtime)` fingerprint used to decide whether a previously
/// hashed file can reuse its cached digest instead of being re-read.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileFingerprint {
    size: u64,
    mtime: SystemTime,
    digest: Digest,
}

/// In-memory index over a single root directory. Holds no lock across I/O —
/// a scan builds a fresh index and swaps it in only once the whole walk
/// succeeds, so a cancelled or aborted scan never leaves a half-built index
/// visible to readers.
#[derive(Default)]
pub struct Catalog {
    by_digest: RwLock<HashMap<Digest, CatalogEntry>>,
    by_path: RwLock<HashMap<PathBuf, FileFingerprint>>,
}

impl Catalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk `root`, hash every new or changed supported image, and replace the
    /// in-memory index with the result. Returns the digests observed for the
    /// first time this call, so the Rating Store can seed their posteriors.
    ///
    /// Enforces `config.max_files` and `config.max_file_bytes` before any
    /// hashing work starts — a scan that would exceed either guard aborts
    /// with no change to the existing index.
    pub fn scan(
        &self,
        root: &Path,
        config: &CoreConfig,
        cancel: Option<&CancelToken>,
    ) -> Result<(ScanStats, Vec<NewImage>)> {
        if !root.is_dir() {
            return Err(CoreError::DirectoryNotFound);
        }

        let (discovered, walk_errors) = scanner::walk(root);
        let mut stats = ScanStats {
            discovered: discovered.len(),
            errors: walk_errors,
            ..ScanStats::default()
        };

        if discovered.len() > config.max_files {
            return Err(CoreError::TooManyFiles { max: config.max_files });
        }

        let old_fingerprints = self.by_path.read().clone();

        let mut to_hash = Vec::new();
        let mut reused: Vec<(PathBuf, CatalogEntry)> = Vec::new();

        for file in &discovered {
            let meta = match std::fs::metadata(&file.path) {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!("catalog scan: stat failed for {:?}: {}", file.path, e);
                    stats.errors += 1;
                    continue;
                }
            };
            let size = meta.len();
            if size > config.max_file_bytes {
                stats.rejected_oversized += 1;
                continue;
            }
            let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);

            match scanner::verify_magic(&file.path, file.candidate_format) {
                Ok(true) => {}
                Ok(false) => {
                    stats.rejected_unsupported += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!("catalog scan: magic check failed for {:?}: {}", file.path, e);
                    stats.errors += 1;
                    continue;
                }
            }

            if let Some(prior) = old_fingerprints.get(&file.path) {
                if prior.size == size && prior.mtime == mtime {
                    stats.reused_from_cache += 1;
                    reused.push((
                        file.path.clone(),
                        CatalogEntry {
                            path: file.path.clone(),
                            size,
                            mtime,
                            format: file.candidate_format,
                        },
                    ));
                    continue;
                }
            }
            to_hash.push((file.path.clone(), size, mtime, file.candidate_format));
        }

        let hash_paths: Vec<PathBuf> = to_hash.iter().map(|(p, ..)| p.clone()).collect();
        let hashed = hashing::hash_batch(&hash_paths, config.hash_workers.max(1), cancel);

        let mut new_by_digest = HashMap::with_capacity(reused.len() + hashed.len());
        let mut new_by_path = HashMap::with_capacity(reused.len() + hashed.len());
        let mut new_digests = Vec::new();

        for (path, prior) in &reused {
            // reused entries carry the digest already known for this fingerprint.
            let digest = old_fingerprints.get(path).map(|fp| fp.digest.clone());
            if let Some(digest) = digest {
                new_by_path.insert(
                    path.clone(),
                    FileFingerprint {
                        size: prior.size,
                        mtime: prior.mtime,
                        digest: digest.clone(),
                    },
                );
                new_by_digest.insert(digest, prior.clone());
            }
        }

        for ((path, size, mtime, format), (_, result)) in to_hash.into_iter().zip(hashed.into_iter()) {
            match result {
                Ok(Some(digest)) => {
                    let is_new = !old_fingerprints.contains_key(&path)
                        && !new_by_digest.contains_key(&digest);
                    if is_new {
                        new_digests.push(NewImage { digest: digest.clone() });
                    }
                    stats.hashed += 1;
                    new_by_path.insert(
                        path.clone(),
                        FileFingerprint { size, mtime, digest: digest.clone() },
                    );
                    new_by_digest.insert(digest, CatalogEntry { path, size, mtime, format });
                }
                Ok(None) => {
                    tracing::info!("catalog scan: cancelled while hashing {:?}", path);
                    stats.errors += 1;
                }
                Err(e) => {
                    tracing::warn!("catalog scan: hash failed for {:?}: {}", path, e);
                    stats.errors += 1;
                }
            }
        }

        stats.new_digests = new_digests.len();

        *self.by_digest.write() = new_by_digest;
        *self.by_path.write() = new_by_path;

        Ok((stats, new_digests))
    }

    /// Resolve a digest to its full catalog entry — path, size, mtime, and the
    /// format the scan recorded for it. The backing `fetch_image` operation
    /// needs the format to report a MIME type alongside the path.
    pub fn lookup_entry(&self, digest: &Digest) -> Result<CatalogEntry> {
        let entry = self
            .by_digest
            .read()
            .get(digest)
            .cloned()
            .ok_or(CoreError::UnknownDigest)?;
        if !entry.path.is_file() {
            return Err(CoreError::FileMissing);
        }
        Ok(entry)
    }

    /// Resolve a digest to its current on-disk path.
    pub fn lookup(&self, digest: &Digest) -> Result<PathBuf> {
        self.lookup_entry(digest).map(|entry| entry.path)
    }

    /// The full digest → entry snapshot. A new `HashMap` is returned to keep
    /// the read lock short-lived.
    #[must_use]
    pub fn entries(&self) -> HashMap<Digest, CatalogEntry> {
        self.by_digest.read().clone()
    }

    /// Every digest the catalog currently knows about.
    #[must_use]
    pub fn present_digests(&self) -> std::collections::HashSet<Digest> {
        self.by_digest.read().keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_digest.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_digest.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_jpeg(dir: &Path, name: &str) -> PathBuf {
        let p = dir.join(name);
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
        bytes.extend_from_slice(&[0u8; 16]);
        fs::write(&p, bytes).unwrap();
        p
    }

    #[test]
    fn scan_empty_directory_yields_empty_catalog() {
        let tmp = TempDir::new().unwrap();
        let catalog = Catalog::new();
        let config = CoreConfig::default();
        let (stats, new_images) = catalog.scan(tmp.path(), &config, None).unwrap();
        assert_eq!(stats.discovered, 0);
        assert!(new_images.is_empty());
        assert!(catalog.is_empty());
    }

    #[test]
    fn scan_discovers_and_hashes_new_images() {
        let tmp = TempDir::new().unwrap();
        write_jpeg(tmp.path(), "a.jpg");
        write_jpeg(tmp.path(), "b.jpg");

        let catalog = Catalog::new();
        let config = CoreConfig::default();
        let (stats, new_images) = catalog.scan(tmp.path(), &config, None).unwrap();
        assert_eq!(stats.discovered, 2);
        assert_eq!(stats.hashed, 2);
        assert_eq!(new_images.len(), 2);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn identical_content_in_two_files_collapses_to_one_digest() {
        let tmp = TempDir::new().unwrap();
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
        bytes.extend_from_slice(&[0u8; 16]);
        fs::write(tmp.path().join("a.jpg"), &bytes).unwrap();
        fs::write(tmp.path().join("b.jpg"), &bytes).unwrap();

        let catalog = Catalog::new();
        let config = CoreConfig::default();
        let (stats, _) = catalog.scan(tmp.path(), &config, None).unwrap();
        assert_eq!(stats.discovered, 2);
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn rescan_reuses_unchanged_files_from_cache() {
        let tmp = TempDir::new().unwrap();
        write_jpeg(tmp.path(), "a.jpg");

        let catalog = Catalog::new();
        let config = CoreConfig::default();
        let (first, first_new) = catalog.scan(tmp.path(), &config, None).unwrap();
        assert_eq!(first.hashed, 1);
        assert_eq!(first_new.len(), 1);

        let (second, second_new) = catalog.scan(tmp.path(), &config, None).unwrap();
        assert_eq!(second.hashed, 0);
        assert_eq!(second.reused_from_cache, 1);
        assert!(second_new.is_empty());
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn oversized_files_are_rejected_without_hashing() {
        let tmp = TempDir::new().unwrap();
        let p = write_jpeg(tmp.path(), "a.jpg");
        let mut bytes = fs::read(&p).unwrap();
        bytes.extend_from_slice(&[0u8; 32]);
        fs::write(&p, bytes).unwrap();

        let catalog = Catalog::new();
        let mut config = CoreConfig::default();
        config.max_file_bytes = 10;
        let (stats, new_images) = catalog.scan(tmp.path(), &config, None).unwrap();
        assert_eq!(stats.rejected_oversized, 1);
        assert_eq!(stats.hashed, 0);
        assert!(new_images.is_empty());
    }

    #[test]
    fn scan_aborts_with_too_many_files_and_leaves_index_unchanged() {
        let tmp = TempDir::new().unwrap();
        write_jpeg(tmp.path(), "a.jpg");
        write_jpeg(tmp.path(), "b.jpg");

        let catalog = Catalog::new();
        let mut config = CoreConfig::default();
        config.max_files = 1;
        let err = catalog.scan(tmp.path(), &config, None).unwrap_err();
        assert_eq!(err.tag(), "TooManyFiles");
        assert!(catalog.is_empty());
    }

    #[test]
    fn extension_mismatched_magic_bytes_are_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("fake.jpg"), b"not a jpeg at all").unwrap();

        let catalog = Catalog::new();
        let config = CoreConfig::default();
        let (stats, _) = catalog.scan(tmp.path(), &config, None).unwrap();
        assert_eq!(stats.rejected_unsupported, 1);
        assert_eq!(stats.hashed, 0);
    }

    #[test]
    fn lookup_entry_carries_the_format_for_mime_resolution() {
        let tmp = TempDir::new().unwrap();
        write_jpeg(tmp.path(), "a.jpg");

        let catalog = Catalog::new();
        let config = CoreConfig::default();
        let (_, new_images) = catalog.scan(tmp.path(), &config, None).unwrap();
        let entry = catalog.lookup_entry(&new_images[0].digest).unwrap();
        assert_eq!(entry.format.mime(), "image/jpeg");
    }

    #[test]
    fn lookup_unknown_digest_errors() {
        let catalog = Catalog::new();
        let digest = Digest::unchecked("a".repeat(64));
        let err = catalog.lookup(&digest).unwrap_err();
        assert_eq!(err.tag(), "UnknownDigest");
    }

    #[test]
    fn scan_nonexistent_root_errors() {
        let catalog = Catalog::new();
        let config = CoreConfig::default();
        let err = catalog
            .scan(Path::new("/no/such/directory/at/all"), &config, None)
            .unwrap_err();
        assert_eq!(err.tag(), "DirectoryNotFound");
    }

    #[test]
    fn cancelling_mid_scan_reports_errors_but_keeps_prior_index() {
        let tmp = TempDir::new().unwrap();
        write_jpeg(tmp.path(), "a.jpg");

        let catalog = Catalog::new();
        let config = CoreConfig::default();
        catalog.scan(tmp.path(), &config, None).unwrap();
        assert_eq!(catalog.len(), 1);

        write_jpeg(tmp.path(), "b.jpg");
        let cancel = CancelToken::new();
        cancel.cancel();
        let (stats, new_images) = catalog.scan(tmp.path(), &config, Some(&cancel)).unwrap();
        assert!(stats.errors > 0 || stats.hashed == 0);
        assert!(new_images.is_empty() || new_images.len() <= 1);
    }
}
