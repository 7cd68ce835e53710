use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use sha2::{Digest as _, Sha256};

use crate::digest::Digest;

const CHUNK_BYTES: usize = 1024 * 1024;

/// Shared flag a caller can set to stop a scan between chunks. Checking it
/// inside the per-chunk read loop means a cancelled scan never commits a
/// partially-hashed file, and the catalog swap simply never happens.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Stream-hash a file in fixed-size chunks, never holding more than
/// `CHUNK_BYTES` of it in memory at once. Returns `Ok(None)` if `cancel`
/// fires between chunks.
pub fn hash_file_cancellable(
    path: &Path,
    cancel: Option<&CancelToken>,
) -> std::io::Result<Option<Digest>> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(CHUNK_BYTES, file);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_BYTES];
    loop {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Ok(None);
        }
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let bytes: [u8; 32] = hasher.finalize().into();
    Ok(Some(Digest::from_bytes(&bytes)))
}

/// Stream-hash a file in fixed-size chunks, never holding more than
/// `CHUNK_BYTES` of it in memory at once.
pub fn hash_file(path: &Path) -> std::io::Result<Digest> {
    Ok(hash_file_cancellable(path, None)?.expect("no cancel token was supplied"))
}

/// Hash a batch of paths in a bounded worker pool, returning one result per
/// input path in the same order as `paths`. Workers are capped at
/// `workers` threads; a failed hash for one file does not abort the batch.
/// `None` in the inner option means `cancel` fired while that file was being
/// read.
///
/// Results are independent of scheduling order — the pool only affects
/// throughput, never which digest a given path ends up with — so repeated
/// scans of identical input are deterministic.
pub fn hash_batch(
    paths: &[std::path::PathBuf],
    workers: usize,
    cancel: Option<&CancelToken>,
) -> Vec<(std::path::PathBuf, std::io::Result<Option<Digest>>)> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .unwrap_or_else(|_| rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap());

    pool.install(|| {
        paths
            .par_iter()
            .map(|path| (path.clone(), hash_file_cancellable(path, cancel)))
            .collect()
    })
}
