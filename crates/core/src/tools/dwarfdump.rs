use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tracing::debug;

use super::process::run_with_timeout;
use super::{BinaryIdentity, IdentityExtractor, ToolError};

/// Environment variable overriding the UUID tool executable.
pub const DWARFDUMP_ENV: &str = "SYMBOLICATE_DWARFDUMP";

/// UUID extractor that shells out to `dwarfdump --uuid <binary>`.
#[derive(Debug, Clone)]
pub struct DwarfdumpExtractor {
    program: PathBuf,
    timeout: Duration,
}

impl DwarfdumpExtractor {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self { program: program.into(), timeout }
    }

    /// Build from the configured path, honoring [`DWARFDUMP_ENV`].
    pub fn from_config(configured: &Path, timeout: Duration) -> Self {
        Self::new(super::resolve_tool_path(DWARFDUMP_ENV, configured), timeout)
    }
}

impl IdentityExtractor for DwarfdumpExtractor {
    fn identify(&self, binary: &Path, arch: &str) -> Result<Option<BinaryIdentity>, ToolError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--uuid").arg(binary);
        let output = run_with_timeout("dwarfdump", &mut cmd, self.timeout)?;
        if !output.status.success() {
            return Err(ToolError::Exit {
                tool: "dwarfdump".to_string(),
                status: output.status.to_string(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        let identity = parse_uuid_output(&output.stdout, arch);
        debug!(binary = %binary.display(), ?identity, "extracted build identity");
        Ok(identity)
    }
}

fn uuid_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"UUID:\s*([A-Fa-f0-9-]+)(?:\s+\(([^)]+)\))?").expect("static UUID regex")
    })
}

/// Parse `dwarfdump --uuid` output.
///
/// Lines look like `UUID: XXXXXXXX-XXXX-... (arm64) /path/to/binary`. A fat
/// binary prints one line per slice; the slice for `arch` is preferred,
/// otherwise the first line wins.
pub fn parse_uuid_output(stdout: &str, arch: &str) -> Option<BinaryIdentity> {
    let identities: Vec<BinaryIdentity> = stdout
        .lines()
        .filter_map(|line| uuid_line_regex().captures(line))
        .map(|caps| BinaryIdentity {
            uuid: caps[1].to_uppercase(),
            arch: caps.get(2).map(|m| m.as_str().to_string()),
        })
        .collect();

    identities
        .iter()
        .find(|id| id.arch.as_deref() == Some(arch))
        .or_else(|| identities.first())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_requested_slice_of_fat_binary() {
        let out = "UUID: 11111111-AAAA-BBBB-CCCC-000000000001 (x86_64) /tmp/App\n\
                   UUID: 22222222-aaaa-bbbb-cccc-000000000002 (arm64) /tmp/App\n";
        let id = parse_uuid_output(out, "arm64").expect("identity");
        assert_eq!(id.uuid, "22222222-AAAA-BBBB-CCCC-000000000002");
        assert_eq!(id.arch.as_deref(), Some("arm64"));
    }

    #[test]
    fn falls_back_to_first_line_for_unknown_arch() {
        let out = "UUID: 11111111-AAAA-BBBB-CCCC-000000000001 (x86_64) /tmp/App\n";
        let id = parse_uuid_output(out, "arm64").expect("identity");
        assert_eq!(id.arch.as_deref(), Some("x86_64"));
    }

    #[test]
    fn no_uuid_lines_yield_none() {
        assert!(parse_uuid_output("error: no such file\n", "arm64").is_none());
    }
}
