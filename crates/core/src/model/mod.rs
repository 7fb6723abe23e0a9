//! Crash report data model.
//!
//! These types mirror the JSON dump written by the monitoring SDK:
//! - `system.cpu_arch`
//! - `binary_images[]` with load addresses and build UUIDs
//! - `crash.threads[].backtrace.contents[]`
//!
//! Everything here is read-only once loaded; derived results live in
//! [`crate::walker`].

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// `object_name` value used by the SDK when it could not attribute a frame.
pub const UNKNOWN_OBJECT: &str = "???";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Report file does not exist: {0}")]
    Missing(PathBuf),
    #[error("Failed to read report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse report JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Report JSON array is empty")]
    EmptyArray,
}

/// Top-level parsed report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    #[serde(default)]
    pub system: SystemInfo,
    #[serde(default)]
    pub binary_images: Vec<BinaryImage>,
    #[serde(default)]
    pub crash: CrashInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    #[serde(default)]
    pub cpu_arch: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashInfo {
    #[serde(default)]
    pub threads: Vec<Thread>,
}

/// A loaded binary image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryImage {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image_addr: u64,
    #[serde(default)]
    pub image_size: u64,
    #[serde(default)]
    pub uuid: String,
}

impl BinaryImage {
    /// Last path component of `name`.
    pub fn basename(&self) -> &str {
        basename(&self.name)
    }

    /// Whether `address` falls inside `[image_addr, image_addr + image_size)`.
    ///
    /// Zero-sized images never contain anything.
    pub fn contains(&self, address: u64) -> bool {
        if self.image_size == 0 || address < self.image_addr {
            return false;
        }
        match self.image_addr.checked_add(self.image_size) {
            Some(end) => address < end,
            None => true,
        }
    }
}

/// Thread index as written by the SDK: normally an integer, `"?"` when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThreadIndex {
    Number(i64),
    Text(String),
}

impl Default for ThreadIndex {
    fn default() -> Self {
        ThreadIndex::Text("?".to_string())
    }
}

impl ThreadIndex {
    pub fn as_number(&self) -> Option<i64> {
        match self {
            ThreadIndex::Number(n) => Some(*n),
            ThreadIndex::Text(_) => None,
        }
    }
}

impl fmt::Display for ThreadIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadIndex::Number(n) => write!(f, "{n}"),
            ThreadIndex::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    #[serde(default)]
    pub index: ThreadIndex,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub crashed: bool,
    #[serde(default)]
    pub backtrace: Backtrace,
}

impl Thread {
    pub fn frames(&self) -> &[Frame] {
        &self.backtrace.contents
    }

    /// Name for display; unnamed threads read as `unnamed`.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backtrace {
    #[serde(default)]
    pub contents: Vec<Frame>,
}

/// One stack frame as captured on device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default = "unknown_object")]
    pub object_name: String,
    #[serde(default)]
    pub symbol_name: Option<String>,
    #[serde(default)]
    pub instruction_addr: u64,
}

impl Default for Frame {
    fn default() -> Self {
        Self { object_name: unknown_object(), symbol_name: None, instruction_addr: 0 }
    }
}

impl Frame {
    /// The on-device symbol, unless it is missing, empty, or equal to `redacted`.
    pub fn usable_symbol(&self, redacted: &str) -> Option<&str> {
        self.symbol_name.as_deref().filter(|s| !s.is_empty() && *s != redacted)
    }

    pub fn has_unknown_object(&self) -> bool {
        self.object_name == UNKNOWN_OBJECT
    }
}

/// `"crashed": null` reads as not crashed.
fn null_as_false<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

fn unknown_object() -> String {
    UNKNOWN_OBJECT.to_string()
}

impl Report {
    /// Parse a report from JSON text.
    ///
    /// Some exporters wrap the report in a one-element array; the first object
    /// is taken in that case.
    pub fn from_json_str(body: &str) -> Result<Self, ReportError> {
        let value: serde_json::Value = serde_json::from_str(body)?;
        let value = match value {
            serde_json::Value::Array(mut items) => {
                if items.is_empty() {
                    return Err(ReportError::EmptyArray);
                }
                items.swap_remove(0)
            }
            other => other,
        };
        Ok(serde_json::from_value(value)?)
    }

    /// Load and parse the report at `path`.
    pub fn load(path: &Path) -> Result<Self, ReportError> {
        if !path.is_file() {
            return Err(ReportError::Missing(path.to_path_buf()));
        }
        let body = fs::read_to_string(path)
            .map_err(|source| ReportError::Io { path: path.to_path_buf(), source })?;
        Self::from_json_str(&body)
    }

    pub fn threads(&self) -> &[Thread] {
        &self.crash.threads
    }

    /// Architecture name passed to the symbolizer.
    pub fn symbolizer_arch(&self) -> &'static str {
        let arch = self.system.cpu_arch.to_lowercase();
        if arch.contains("arm") {
            "arm64"
        } else if arch.contains("x86_64") {
            "x86_64"
        } else {
            "arm64"
        }
    }
}

/// Last `/`-separated component of `path`, or the whole string.
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
