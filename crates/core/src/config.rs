use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application binary name used when none is configured.
pub const DEFAULT_APP_NAME: &str = "MatrixTestApp";

/// Source file prefixes that belong to the bundled monitoring toolkit.
pub const DEFAULT_FRAMEWORK_PREFIXES: &[&str] = &[
    "KSCrash",
    "KS",
    "WCCrash",
    "WCBlock",
    "WCMemory",
    "WCFPS",
    "WCDump",
    "MatrixAdapter",
    "MatrixPlugin",
    "MatrixIssue",
    "MatrixLog",
    "MatrixDevice",
    "MatrixPath",
    "MatrixBase",
    "MatrixAppReboot",
    "logger_",
    "memory_",
    "stack_",
    "object_",
];

/// Build product locations searched under each root. `{app}` is replaced by
/// the application name; `*` matches any single path component.
pub const DEFAULT_PRODUCT_PATTERNS: &[&str] = &[
    "*/Build/Products/Debug-iphonesimulator/{app}.app/{app}",
    "*/Build/Products/Debug-iphoneos/{app}.app/{app}",
    "*/Build/Products/Debug/{app}.app/{app}",
    "*/Build/Products/Debug-iphonesimulator/{app}.app.dSYM",
    "*/Build/Products/Debug-iphoneos/{app}.app.dSYM",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config JSON {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to parse config YAML {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Unsupported config extension '{0}' (expected yaml, yml, or json)")]
    UnsupportedFormat(String),
}

/// Settings for one symbolication run.
///
/// Every field has a default, so a config file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolicateConfig {
    /// Name of the application executable (without `.app`).
    pub app_name: String,
    /// Directories searched for build products.
    pub search_roots: Vec<PathBuf>,
    /// Patterns relative to each search root.
    pub product_patterns: Vec<String>,
    /// Symbolizer executable (atos-compatible).
    pub symbolizer: PathBuf,
    /// UUID extractor executable (dwarfdump-compatible).
    pub uuid_tool: PathBuf,
    /// Per-invocation timeout for external tools.
    pub tool_timeout_secs: u64,
    pub framework_prefixes: Vec<String>,
    /// `symbol_name` value meaning the symbol was stripped on device.
    pub redacted_sentinel: String,
}

impl Default for SymbolicateConfig {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            search_roots: default_search_roots(),
            product_patterns: DEFAULT_PRODUCT_PATTERNS.iter().map(|p| p.to_string()).collect(),
            symbolizer: PathBuf::from("atos"),
            uuid_tool: PathBuf::from("dwarfdump"),
            tool_timeout_secs: 5,
            framework_prefixes: DEFAULT_FRAMEWORK_PREFIXES.iter().map(|p| p.to_string()).collect(),
            redacted_sentinel: "<redacted>".to_string(),
        }
    }
}

impl SymbolicateConfig {
    /// Load a config file, picking the parser from the extension.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default().to_lowercase();
        let body = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        match ext.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&body)
                .map_err(|source| ConfigError::Yaml { path: path.to_path_buf(), source }),
            "json" => serde_json::from_str(&body)
                .map_err(|source| ConfigError::Json { path: path.to_path_buf(), source }),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    /// Forms the application image may take in `binary_images[].name`.
    pub fn app_binary_names(&self) -> [String; 3] {
        let app = &self.app_name;
        [app.clone(), format!("{app}.app"), format!("{app}.app/{app}")]
    }

    /// Product patterns with `{app}` substituted.
    pub fn expanded_patterns(&self) -> Vec<String> {
        self.product_patterns.iter().map(|p| p.replace("{app}", &self.app_name)).collect()
    }
}

/// `~/Library/Developer/Xcode/DerivedData`, when `HOME` is set.
fn default_search_roots() -> Vec<PathBuf> {
    std::env::var_os("HOME")
        .map(|home| vec![PathBuf::from(home).join("Library/Developer/Xcode/DerivedData")])
        .unwrap_or_default()
}
