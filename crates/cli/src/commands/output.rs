use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::{Builder, NamedTempFile};
use tracing::info;

/// Where results are written for the duration of one run.
///
/// A file destination is backed by a temporary file in the same directory,
/// persisted over the destination only by [`OutputTarget::commit`]. Dropping
/// the target without committing removes the temporary file.
pub enum OutputTarget {
    Stdout(io::StdoutLock<'static>),
    File { writer: BufWriter<NamedTempFile>, dest: PathBuf },
}

impl OutputTarget {
    pub fn acquire(dest: Option<&Path>) -> Result<Self> {
        let Some(dest) = dest else {
            return Ok(OutputTarget::Stdout(io::stdout().lock()));
        };
        let dir = match dest.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let temp = output_file_builder()
            .tempfile_in(dir)
            .with_context(|| format!("Failed to create output file in {}", dir.display()))?;
        Ok(OutputTarget::File { writer: BufWriter::new(temp), dest: dest.to_path_buf() })
    }

    pub fn writer(&mut self) -> &mut dyn Write {
        match self {
            OutputTarget::Stdout(lock) => lock,
            OutputTarget::File { writer, .. } => writer,
        }
    }

    /// Flush and, for files, move the output into place.
    pub fn commit(self) -> Result<()> {
        match self {
            OutputTarget::Stdout(mut lock) => lock.flush().context("Failed to flush stdout"),
            OutputTarget::File { writer, dest } => {
                let temp = writer
                    .into_inner()
                    .map_err(|e| e.into_error())
                    .context("Failed to flush output file")?;
                temp.persist(&dest)
                    .map_err(|e| e.error)
                    .with_context(|| format!("Failed to write output file: {}", dest.display()))?;
                info!(path = %dest.display(), "results written");
                Ok(())
            }
        }
    }
}

/// Temp files default to 0600; the persisted output gets the usual
/// `0666 & !umask` mode instead.
#[cfg(unix)]
fn output_file_builder() -> Builder<'static, 'static> {
    use std::os::unix::fs::PermissionsExt;

    let mut builder = Builder::new();
    builder.permissions(std::fs::Permissions::from_mode(0o666));
    builder
}

#[cfg(not(unix))]
fn output_file_builder() -> Builder<'static, 'static> {
    Builder::new()
}
