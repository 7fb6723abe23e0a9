//! Binary Locator: finds the on-disk binary that matches the report.
//!
//! Resolution order:
//! 1. Declared identity from the app image (or the lowest-addressed image).
//! 2. The declared path itself, when it exists on this machine.
//! 3. A build-output candidate whose UUID matches the declared UUID.
//! 4. The most recently modified candidate (degraded).

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::SymbolicateConfig;
use crate::model::{BinaryImage, Report};
use crate::tools::{CandidateSource, IdentityExtractor};

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("Report lists no binary images")]
    NoBinaryImages,
    #[error("No binary found for {declared}; searched {searched} location pattern(s)")]
    NoBinaryFound { declared: String, searched: usize },
}

/// Which heuristic produced the declared identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    /// An image whose name matches the application binary.
    NamedImage,
    /// No named match; the image with the smallest load address.
    LowestAddress,
}

/// What the report says about the application binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredIdentity {
    pub path: String,
    pub load_addr: u64,
    /// Uppercased; `None` when the report carries no UUID.
    pub uuid: Option<String>,
    pub source: IdentitySource,
}

/// Why the locator settled for the newest candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    NoDeclaredUuid,
    NoUuidMatch,
    ExtractionFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum MatchKind {
    ReportPath,
    UuidMatch,
    LatestFallback(FallbackReason),
}

impl MatchKind {
    pub fn is_degraded(&self) -> bool {
        matches!(self, MatchKind::LatestFallback(_))
    }
}

/// The binary the walk will symbolize against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatedBinary {
    pub path: PathBuf,
    pub load_addr: u64,
    pub declared: DeclaredIdentity,
    pub match_kind: MatchKind,
    /// Human-readable warnings raised while locating.
    pub advisories: Vec<String>,
}

/// Pick the declared application identity from the image list.
///
/// Returns `None` only when the report has no images.
pub fn declared_identity(
    images: &[BinaryImage],
    config: &SymbolicateConfig,
) -> Option<DeclaredIdentity> {
    let names = config.app_binary_names();
    let named = images.iter().find(|img| {
        let base = img.basename();
        names[..2].iter().any(|n| n.as_str() == base) || img.name.ends_with(&names[2])
    });

    let (image, source) = match named {
        Some(img) => (img, IdentitySource::NamedImage),
        None => (images.iter().min_by_key(|img| img.image_addr)?, IdentitySource::LowestAddress),
    };

    let uuid = image.uuid.trim();
    Some(DeclaredIdentity {
        path: image.name.clone(),
        load_addr: image.image_addr,
        uuid: (!uuid.is_empty()).then(|| uuid.to_uppercase()),
        source,
    })
}

/// Resolve a build product to the file the tools should read.
///
/// - `Foo.app` → `Foo.app/Foo`
/// - `Foo.app.dSYM` → first file in `Contents/Resources/DWARF/`
/// - anything else is returned unchanged.
pub fn resolve_bundle_binary(path: &Path) -> PathBuf {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if let Some(stem) = name.strip_suffix(".app") {
        return path.join(stem);
    }
    if name.ends_with(".dSYM") {
        let dwarf_dir = path.join("Contents/Resources/DWARF");
        if let Ok(entries) = fs::read_dir(&dwarf_dir) {
            let mut files: Vec<PathBuf> =
                entries.filter_map(|e| e.ok()).map(|e| e.path()).filter(|p| p.is_file()).collect();
            files.sort();
            if let Some(first) = files.into_iter().next() {
                return first;
            }
        }
    }
    path.to_path_buf()
}

/// Locate the binary for `report`.
pub fn locate(
    report: &Report,
    config: &SymbolicateConfig,
    source: &dyn CandidateSource,
    extractor: &dyn IdentityExtractor,
) -> Result<LocatedBinary, LocateError> {
    let declared =
        declared_identity(&report.binary_images, config).ok_or(LocateError::NoBinaryImages)?;
    let mut advisories = Vec::new();

    if declared.source == IdentitySource::LowestAddress {
        let msg = format!(
            "No image named '{}' in report; assuming lowest-addressed image {} is the app",
            config.app_name, declared.path
        );
        warn!("{msg}");
        advisories.push(msg);
    }
    info!(
        path = %declared.path,
        uuid = ?declared.uuid,
        load_addr = %format!("{:#x}", declared.load_addr),
        "declared app identity"
    );

    let declared_path = Path::new(&declared.path);
    if !declared.path.is_empty() && declared_path.exists() {
        info!("using binary path from report");
        return Ok(LocatedBinary {
            path: resolve_bundle_binary(declared_path),
            load_addr: declared.load_addr,
            declared,
            match_kind: MatchKind::ReportPath,
            advisories,
        });
    }

    let candidates = source.candidates();
    if candidates.is_empty() {
        return Err(LocateError::NoBinaryFound {
            declared: declared.path.clone(),
            searched: config.product_patterns.len() * config.search_roots.len(),
        });
    }
    info!(count = candidates.len(), "found candidate binaries");

    let arch = report.symbolizer_arch();
    let mut any_extracted = false;
    if let Some(want) = declared.uuid.as_deref() {
        for candidate in &candidates {
            let binary = resolve_bundle_binary(&candidate.path);
            let modified: DateTime<Utc> = candidate.modified.into();
            match extractor.identify(&binary, arch) {
                Ok(Some(identity)) => {
                    any_extracted = true;
                    let matched = identity.uuid.eq_ignore_ascii_case(want);
                    debug!(
                        candidate = %binary.display(),
                        modified = %modified.to_rfc3339(),
                        uuid = %identity.uuid,
                        matched,
                        "checked candidate"
                    );
                    if matched {
                        info!(path = %binary.display(), "UUID match");
                        return Ok(LocatedBinary {
                            path: binary,
                            load_addr: declared.load_addr,
                            declared,
                            match_kind: MatchKind::UuidMatch,
                            advisories,
                        });
                    }
                }
                Ok(None) => {
                    debug!(candidate = %binary.display(), "no UUID reported for candidate");
                }
                Err(err) => {
                    debug!(candidate = %binary.display(), error = %err, "UUID extraction failed");
                }
            }
        }
    }

    let reason = match (&declared.uuid, any_extracted) {
        (None, _) => FallbackReason::NoDeclaredUuid,
        (Some(_), true) => FallbackReason::NoUuidMatch,
        (Some(_), false) => FallbackReason::ExtractionFailed,
    };
    let latest = resolve_bundle_binary(&candidates[0].path);
    let msg = match reason {
        FallbackReason::NoDeclaredUuid => format!(
            "Report carries no UUID; using most recent build {} (may not match the report)",
            latest.display()
        ),
        FallbackReason::NoUuidMatch => format!(
            "No candidate matched UUID {}; using most recent build {} (may not match the report)",
            declared.uuid.as_deref().unwrap_or_default(),
            latest.display()
        ),
        FallbackReason::ExtractionFailed => format!(
            "Could not read UUIDs from any candidate; using most recent build {} (may not match the report)",
            latest.display()
        ),
    };
    warn!("{msg}");
    advisories.push(msg);

    Ok(LocatedBinary {
        path: latest,
        load_addr: declared.load_addr,
        declared,
        match_kind: MatchKind::LatestFallback(reason),
        advisories,
    })
}
