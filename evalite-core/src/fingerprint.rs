//! Source code identity for evaluation definitions
//!
//! A run stores the hash of the code that defined it, so a viewer can tell
//! whether a stored run still reflects the file on disk.

use sha2::{Digest, Sha256};
use std::path::Path;

use crate::error::Result;

/// Hash source bytes into a lowercase hex SHA-256 digest
pub fn hash_source(source: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_ref());
    format!("{:x}", hasher.finalize())
}

/// Hash the contents of a source file
pub fn hash_source_file(path: impl AsRef<Path>) -> Result<String> {
    let content = std::fs::read(path)?;
    Ok(hash_source(content))
}
