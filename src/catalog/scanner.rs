use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::catalog::model::ImageFormat;

/// A file discovered on disk that looks like a supported image by extension.
/// The magic-byte check happens separately (needs a file open) so the walk
/// itself stays cheap.
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub candidate_format: ImageFormat,
}

/// Recursively walk `root`, returning every file whose extension matches a
/// supported format. Symlinks are not followed. Per-entry walk errors are
/// counted rather than aborting the scan.
pub fn walk(root: &Path) -> (Vec<DiscoveredFile>, usize) {
    let mut files = Vec::new();
    let mut errors = 0usize;

    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !e.path_is_symlink())
    {
        match entry {
            Err(e) => {
                tracing::warn!("catalog scan error: {}", e);
                errors += 1;
            }
            Ok(entry) => {
                if !entry.file_type().is_file() || entry.path_is_symlink() {
                    continue;
                }
                if let Some(format) = detect_format_by_extension(entry.path()) {
                    files.push(DiscoveredFile {
                        path: entry.path().to_path_buf(),
                        candidate_format: format,
                    });
                }
            }
        }
    }

    tracing::debug!(
        "catalog scan {:?}: {} candidate files, {} walk errors",
        root,
        files.len(),
        errors
    );
    (files, errors)
}

/// Detect the candidate format from a lowercased extension. `None` for
/// anything unsupported — such files are skipped before a magic-byte read.
pub fn detect_format_by_extension(path: &Path) -> Option<ImageFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)?;
    ImageFormat::from_extension(&ext)
}

/// Read the leading bytes of a file and confirm they match the claimed
/// format's magic number. Returns `false` (not an error) for a mismatch —
/// the caller counts that as a rejected file, not a scan failure.
pub fn verify_magic(path: &Path, candidate: ImageFormat) -> std::io::Result<bool> {
    let mut file = File::open(path)?;
    let mut head = [0u8; 16];
    let n = file.read(&mut head)?;
    Ok(candidate.matches_magic(&head[..n]))
}
