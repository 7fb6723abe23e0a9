//! Frame Classifier: who owns the code behind a frame.
//!
//! Framework detection is a plain prefix match on the source file name, so an
//! application file that happens to share a prefix (`MatrixBaseView.m`) is
//! reported as framework code.

use serde::{Deserialize, Serialize};

use crate::images::LibraryLabel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    AppCode,
    FrameworkCode,
    SystemLibrary,
    Unknown,
}

/// What happened when the frame went through the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionOutcome<'a> {
    /// The symbolizer answered; `source_file` is set when a line suffix was parsed.
    Resolved { source_file: Option<&'a str> },
    /// The symbolizer was asked but could not resolve the address.
    Failed { app_image: bool },
    /// The frame was never sent to the symbolizer.
    NotAttempted,
}

/// Prefix set identifying monitoring-framework source files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkPrefixes {
    prefixes: Vec<String>,
}

impl FrameworkPrefixes {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { prefixes: prefixes.into_iter().map(Into::into).collect() }
    }

    pub fn matches(&self, file_name: &str) -> bool {
        self.prefixes.iter().any(|p| file_name.starts_with(p.as_str()))
    }
}

impl Default for FrameworkPrefixes {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_FRAMEWORK_PREFIXES.iter().copied())
    }
}

/// Classify one frame. Rules are checked in order.
pub fn classify(
    outcome: ResolutionOutcome<'_>,
    owning_image: Option<&LibraryLabel>,
    prefixes: &FrameworkPrefixes,
) -> Classification {
    match outcome {
        // Reported with a "resolution failed" marker by the walker.
        ResolutionOutcome::Failed { app_image: true } => Classification::SystemLibrary,
        ResolutionOutcome::Resolved { source_file: Some(file) } => {
            if prefixes.matches(file) {
                Classification::FrameworkCode
            } else {
                Classification::AppCode
            }
        }
        ResolutionOutcome::Resolved { source_file: None } => Classification::AppCode,
        ResolutionOutcome::Failed { app_image: false } | ResolutionOutcome::NotAttempted => {
            match owning_image {
                Some(label) if label.kind.is_platform() => Classification::SystemLibrary,
                _ => Classification::Unknown,
            }
        }
    }
}
