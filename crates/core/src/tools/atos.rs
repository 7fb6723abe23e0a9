use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::debug;

use super::process::run_with_timeout;
use super::{SymbolizeRequest, Symbolizer, ToolError};

/// Environment variable overriding the symbolizer executable.
pub const ATOS_ENV: &str = "SYMBOLICATE_ATOS";

/// Symbolizer that shells out to `atos -arch <arch> -o <binary> -l <load> <addr>`.
#[derive(Debug, Clone)]
pub struct AtosSymbolizer {
    program: PathBuf,
    timeout: Duration,
}

impl AtosSymbolizer {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self { program: program.into(), timeout }
    }

    /// Build from the configured path, honoring [`ATOS_ENV`].
    pub fn from_config(configured: &Path, timeout: Duration) -> Self {
        Self::new(super::resolve_tool_path(ATOS_ENV, configured), timeout)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Symbolizer for AtosSymbolizer {
    fn symbolize(&self, request: &SymbolizeRequest<'_>) -> Result<String, ToolError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-arch")
            .arg(request.arch)
            .arg("-o")
            .arg(request.binary)
            .arg("-l")
            .arg(format!("{:#x}", request.load_addr))
            .arg(format!("{:#x}", request.address));
        debug!(command = ?cmd, "running symbolizer");

        let output = run_with_timeout(self.name(), &mut cmd, self.timeout)?;
        debug!(
            status = %output.status,
            stdout = output.stdout.trim(),
            stderr = output.stderr.trim(),
            "symbolizer finished"
        );
        if !output.status.success() {
            return Err(ToolError::Exit {
                tool: self.name().to_string(),
                status: output.status.to_string(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout.trim().to_string())
    }

    fn name(&self) -> &'static str {
        "atos"
    }
}
