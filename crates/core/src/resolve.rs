//! Symbol Resolver: one address in, one parsed symbolizer line out.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tools::{SymbolizeRequest, Symbolizer, ToolError};

/// Source extensions recognised in `(<file>.<ext>:<line>)` suffixes.
pub const SOURCE_EXTENSIONS: &[&str] = &["m", "mm", "c", "cc", "cxx", "cpp", "swift", "h", "hpp"];

/// File and line parsed from a symbolizer line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

/// Language family guessed from the symbol text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolLanguage {
    Swift,
    ObjectiveC,
    Cpp,
    COther,
}

impl SymbolLanguage {
    pub fn detect(symbol: &str) -> Self {
        const SWIFT_PREFIXES: &[&str] = &["$s", "_$s", "$S", "_$S", "_T"];
        if SWIFT_PREFIXES.iter().any(|p| symbol.starts_with(p)) {
            SymbolLanguage::Swift
        } else if symbol.starts_with("-[") || symbol.starts_with("+[") {
            SymbolLanguage::ObjectiveC
        } else if symbol.starts_with("_Z") {
            SymbolLanguage::Cpp
        } else {
            SymbolLanguage::COther
        }
    }
}

/// A successfully resolved symbolizer line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedText {
    /// Raw line exactly as the symbolizer printed it (trimmed).
    pub text: String,
    pub source: Option<SourceLocation>,
    /// Library named in an `(in <Library>)` suffix.
    pub library: Option<String>,
    pub language: SymbolLanguage,
}

impl ResolvedText {
    pub fn parse(text: impl Into<String>) -> Self {
        let text = text.into();
        let source = parse_source_location(&text);
        let library = parse_library_hint(&text);
        let language = SymbolLanguage::detect(&text);
        Self { text, source, library, language }
    }
}

/// Why an address could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Unresolved {
    /// Spawn failure, timeout, or non-zero exit. Carries the tool error text.
    Tool(String),
    EmptyOutput,
    /// The tool echoed an address back instead of a symbol.
    EchoedAddress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ResolvedText),
    Unresolved(Unresolved),
}

/// Resolve `address` in `binary` loaded at `load_addr`.
///
/// Never fails: every problem becomes [`Resolution::Unresolved`].
pub fn resolve(
    symbolizer: &dyn Symbolizer,
    binary: &Path,
    load_addr: u64,
    address: u64,
    arch: &str,
) -> Resolution {
    let request = SymbolizeRequest { binary, load_addr, address, arch };
    match symbolizer.symbolize(&request) {
        Ok(output) => interpret_output(&output, address),
        Err(err) => {
            debug!(address = %format!("{address:#x}"), error = %err, "symbolizer failed");
            Resolution::Unresolved(Unresolved::Tool(tool_error_text(&err)))
        }
    }
}

fn tool_error_text(err: &ToolError) -> String {
    match err {
        ToolError::Timeout { tool, .. } => format!("{tool} timed out"),
        other => other.to_string(),
    }
}

/// Classify raw symbolizer stdout for `address`.
pub fn interpret_output(output: &str, address: u64) -> Resolution {
    let line = output.trim();
    if line.is_empty() {
        return Resolution::Unresolved(Unresolved::EmptyOutput);
    }
    if line == format!("{address:#x}") || line.starts_with("0x") {
        return Resolution::Unresolved(Unresolved::EchoedAddress);
    }
    Resolution::Resolved(ResolvedText::parse(line))
}

fn source_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let exts = SOURCE_EXTENSIONS.join("|");
        Regex::new(&format!(r"\(([^)]+\.(?:{exts})):(\d+)\)")).expect("static source regex")
    })
}

fn library_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(in ([^)]+)\)").expect("static library regex"))
}

/// Extract `(<file>.<ext>:<line>)`. Line numbers must be positive.
pub fn parse_source_location(text: &str) -> Option<SourceLocation> {
    let caps = source_regex().captures(text)?;
    let line: u32 = caps[2].parse().ok().filter(|&n| n > 0)?;
    Some(SourceLocation { file: caps[1].to_string(), line })
}

/// Extract `(in <Library>)`.
pub fn parse_library_hint(text: &str) -> Option<String> {
    library_regex().captures(text).map(|caps| caps[1].trim().to_string())
}
