use std::env;
use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

pub mod commands;

/// Canonicalize a user-supplied path if possible, falling back to the given
/// string relative to the current working directory.
pub fn canonicalize_or_current(path: &str) -> Result<PathBuf> {
    let candidate = Path::new(path);
    if candidate == Path::new(".") {
        return env::current_dir().context("Failed to get current directory");
    }
    match candidate.canonicalize() {
        Ok(p) => Ok(p),
        Err(_) if candidate.is_absolute() => Ok(candidate.to_path_buf()),
        Err(_) => {
            let cwd = env::current_dir().context("Failed to get current directory")?;
            Ok(cwd.join(candidate))
        }
    }
}

/// Compute the SHA-256 hash of a file and return it as a hex string.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open binary for hashing: {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("Failed to read binary for hashing: {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
