//! Adapters for the external tools the engine orchestrates.
//!
//! The engine only talks to the traits defined here:
//! - [`Symbolizer`]: address → one line of text (`atos`)
//! - [`IdentityExtractor`]: binary → build UUID (`dwarfdump --uuid`)
//! - [`CandidateSource`]: build-output search for on-disk binaries
//!
//! Tests substitute in-memory implementations for all three.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use thiserror::Error;

pub mod atos;
pub mod dwarfdump;
pub mod process;
pub mod products;

pub use atos::AtosSymbolizer;
pub use dwarfdump::DwarfdumpExtractor;
pub use products::BuildProductsSearch;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} timed out after {after:?}")]
    Timeout { tool: String, after: Duration },
    #[error("{tool} exited with {status}: {stderr}")]
    Exit { tool: String, status: String, stderr: String },
    #[error("i/o error talking to {tool}: {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

/// One address to resolve against one binary.
#[derive(Debug, Clone, Copy)]
pub struct SymbolizeRequest<'a> {
    pub binary: &'a Path,
    pub load_addr: u64,
    pub address: u64,
    pub arch: &'a str,
}

/// Resolves a single address to the tool's raw text answer.
pub trait Symbolizer {
    fn symbolize(&self, request: &SymbolizeRequest<'_>) -> Result<String, ToolError>;
    fn name(&self) -> &'static str;
}

/// Build identity reported by the UUID extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryIdentity {
    /// Uppercased UUID.
    pub uuid: String,
    pub arch: Option<String>,
}

/// Computes the build UUID of an on-disk binary.
pub trait IdentityExtractor {
    /// `Ok(None)` means the tool ran but printed no UUID for the binary.
    fn identify(&self, binary: &Path, arch: &str) -> Result<Option<BinaryIdentity>, ToolError>;
}

/// An on-disk build product that may match the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Enumerates candidate binaries, most recently modified first.
pub trait CandidateSource {
    fn candidates(&self) -> Vec<Candidate>;
}

/// Pick the tool executable: the environment variable wins over the configured path.
pub fn resolve_tool_path(env_var: &str, configured: &Path) -> PathBuf {
    std::env::var_os(env_var).map(PathBuf::from).unwrap_or_else(|| configured.to_path_buf())
}
