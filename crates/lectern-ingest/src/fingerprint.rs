//! Content fingerprints for source documents.

use lectern_core::Fingerprint;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

const BLOCK_SIZE: usize = 64 * 1024;

/// Fingerprint of an in-memory byte slice.
pub fn fingerprint(bytes: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Fingerprint::from_hex(hex::encode(hasher.finalize()))
}

/// Stream a file through the hasher, returning its fingerprint and size.
pub fn fingerprint_file(path: &Path) -> std::io::Result<(Fingerprint, u64)> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BLOCK_SIZE];
    let mut total = 0u64;

    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
        total += read as u64;
    }

    Ok((Fingerprint::from_hex(hex::encode(hasher.finalize())), total))
}
