// src/steps/hash.rs

//! blake3 file hashing used by the verify and sync steps.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use blake3::Hasher;

use crate::dag::{CancelToken, WorkProgress};

/// Compute the hash of a single file.
pub fn compute_file_hash(path: &Path) -> Result<String> {
    hash_file(path, None, None)
}

/// Hash a file while reporting bytes read to `work`.
///
/// Stops early with an error if `cancel` fires between two reads.
pub fn hash_file_with_progress(
    path: &Path,
    work: &WorkProgress,
    cancel: &CancelToken,
) -> Result<String> {
    hash_file(path, Some(work), Some(cancel))
}

fn hash_file(
    path: &Path,
    work: Option<&WorkProgress>,
    cancel: Option<&CancelToken>,
) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = File::open(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            anyhow::bail!("hashing {:?} cancelled", path);
        }
        let n = file
            .read(&mut buf)
            .with_context(|| format!("reading {:?}", path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        if let Some(work) = work {
            work.advance(n as u64);
        }
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Whether two files have identical contents.
///
/// Sizes are compared first so differing files are usually rejected without
/// reading them.
pub fn same_contents(a: &Path, b: &Path) -> Result<bool> {
    let len_a = a.metadata().with_context(|| format!("stat {:?}", a))?.len();
    let len_b = b.metadata().with_context(|| format!("stat {:?}", b))?.len();
    if len_a != len_b {
        return Ok(false);
    }
    Ok(compute_file_hash(a)? == compute_file_hash(b)?)
}
