//! Report Walker: drives locate → select threads → per-frame resolve/classify → aggregate.
//!
//! Report-level problems (no threads, no binary) abort the walk with a
//! [`WalkError`]. Frame-level problems are recorded on the frame and the walk
//! carries on.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::classify::{classify, Classification, FrameworkPrefixes, ResolutionOutcome};
use crate::config::SymbolicateConfig;
use crate::images::{ImageMap, LibraryLabel};
use crate::locate::{locate, LocateError, LocatedBinary};
use crate::model::{basename, Frame, Report, Thread, ThreadIndex};
use crate::resolve::{resolve, Resolution, SymbolLanguage, Unresolved};
use crate::tools::{CandidateSource, IdentityExtractor, Symbolizer};

#[derive(Debug, Error)]
pub enum WalkError {
    #[error("Report contains no thread information")]
    NoThreads,
    #[error("No relevant threads found (no main thread, crashed thread, or thread with app frames)")]
    NoRelevantThreads,
    #[error(transparent)]
    Locate(#[from] LocateError),
}

/// Stages of a walk, traced as the walk advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    Start,
    BinaryLocated,
    ThreadsSelected,
    PerThreadFrameScan,
    Aggregated,
    Done,
}

/// Why a thread was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadRole {
    Main,
    Crashed,
    AppCode,
}

/// A thread chosen for symbolication, with its position in the report.
#[derive(Debug, Clone, Copy)]
pub struct SelectedThread<'a> {
    pub role: ThreadRole,
    pub position: usize,
    pub thread: &'a Thread,
}

impl SelectedThread<'_> {
    pub fn label(&self) -> String {
        match self.role {
            ThreadRole::Main => "Main thread".to_string(),
            ThreadRole::Crashed => "Crashed thread".to_string(),
            ThreadRole::AppCode => format!("App thread {}", self.thread.index),
        }
    }
}

/// Derived, per-frame result of a successful symbolizer call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFrame {
    pub display_name: String,
    pub symbolicated_text: String,
    pub source_file: Option<String>,
    pub line_number: Option<u32>,
    pub classification: Classification,
    pub language: SymbolLanguage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum FrameStatus {
    NotAttempted,
    Resolved,
    Failed(Unresolved),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameReport {
    pub index: usize,
    pub address: u64,
    pub object_name: String,
    pub display_name: String,
    /// Symbol captured on device, shown as-is when the frame was not resolved.
    pub device_symbol: Option<String>,
    pub library: Option<LibraryLabel>,
    pub status: FrameStatus,
    pub resolved: Option<ResolvedFrame>,
    pub classification: Classification,
    /// Resolution failed for a frame inside the application binary.
    pub app_resolution_failed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadReport {
    pub label: String,
    pub role: ThreadRole,
    pub index: ThreadIndex,
    pub name: Option<String>,
    pub crashed: bool,
    pub app_frame_count: usize,
    /// No frame was attributed to the app, so every unknown frame was tried.
    pub opportunistic: bool,
    pub symbolicated_count: usize,
    pub frames: Vec<FrameReport>,
}

/// One entry of the final "application code locations" list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppCodeLocation {
    pub thread: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub symbol: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageCounts {
    pub swift: usize,
    pub objective_c: usize,
    pub cpp: usize,
    pub c_other: usize,
}

impl LanguageCounts {
    fn record(&mut self, language: SymbolLanguage) {
        match language {
            SymbolLanguage::Swift => self.swift += 1,
            SymbolLanguage::ObjectiveC => self.objective_c += 1,
            SymbolLanguage::Cpp => self.cpp += 1,
            SymbolLanguage::COther => self.c_other += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkStats {
    pub threads: usize,
    pub total_frames: usize,
    pub attempted: usize,
    pub resolved: usize,
    pub failed: usize,
    pub app_code_frames: usize,
    pub framework_frames: usize,
    pub languages: LanguageCounts,
}

impl WalkStats {
    /// Percentage of attempted frames that resolved; `0.0` when nothing was attempted.
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.resolved as f64 * 100.0 / self.attempted as f64
        }
    }
}

/// Aggregated result of one walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolicationReport {
    pub app_name: String,
    pub arch: String,
    pub binary: LocatedBinary,
    pub advisories: Vec<String>,
    pub threads: Vec<ThreadReport>,
    pub app_code_locations: Vec<AppCodeLocation>,
    pub stats: WalkStats,
}

/// Main-thread heuristic: index 0, or a name containing "main" (any case).
pub fn is_main_thread(thread: &Thread) -> bool {
    thread.index.as_number() == Some(0)
        || thread.name.as_deref().is_some_and(|n| n.to_lowercase().contains("main"))
}

/// Ownership heuristic: the frame's `object_name` mentions the app binary.
pub fn is_app_frame(frame: &Frame, app_name: &str) -> bool {
    frame.object_name.contains(app_name)
}

/// Pick the threads worth symbolizing, in display order.
///
/// 1. the first main thread
/// 2. the first crashed thread, unless it is the main thread
/// 3. every other thread with at least one app frame
pub fn select_threads<'a>(threads: &'a [Thread], app_name: &str) -> Vec<SelectedThread<'a>> {
    let mut selected: Vec<SelectedThread<'a>> = Vec::new();
    let main = threads.iter().position(is_main_thread);
    if let Some(position) = main {
        selected.push(SelectedThread {
            role: ThreadRole::Main,
            position,
            thread: &threads[position],
        });
    }
    if let Some(position) = threads.iter().position(|t| t.crashed) {
        if Some(position) != main {
            selected.push(SelectedThread {
                role: ThreadRole::Crashed,
                position,
                thread: &threads[position],
            });
        }
    }
    for (position, thread) in threads.iter().enumerate() {
        if selected.iter().any(|s| s.position == position) {
            continue;
        }
        if thread.frames().iter().any(|f| is_app_frame(f, app_name)) {
            selected.push(SelectedThread { role: ThreadRole::AppCode, position, thread });
        }
    }
    selected
}

/// Whether `frame` goes to the symbolizer, given whether its thread has app frames.
pub fn should_resolve(
    frame: &Frame,
    thread_has_app_frames: bool,
    app_name: &str,
    redacted: &str,
) -> bool {
    let unsymbolized = frame.usable_symbol(redacted).is_none();
    if thread_has_app_frames {
        is_app_frame(frame, app_name) && unsymbolized
    } else {
        frame.has_unknown_object() && unsymbolized
    }
}

/// Coordinator tying the tools and config together for one report.
pub struct ReportWalker<'a> {
    pub config: &'a SymbolicateConfig,
    pub symbolizer: &'a dyn Symbolizer,
    pub extractor: &'a dyn IdentityExtractor,
    pub candidates: &'a dyn CandidateSource,
}

struct ScanContext<'r> {
    binary: &'r LocatedBinary,
    arch: &'static str,
    images: ImageMap<'r>,
    prefixes: FrameworkPrefixes,
}

impl<'a> ReportWalker<'a> {
    pub fn run(&self, report: &Report) -> Result<SymbolicationReport, WalkError> {
        debug!(state = ?WalkState::Start, "walk");
        if report.threads().is_empty() {
            return Err(WalkError::NoThreads);
        }

        let binary = locate(report, self.config, self.candidates, self.extractor)?;
        let arch = report.symbolizer_arch();
        info!(
            binary = %binary.path.display(),
            load_addr = %format!("{:#x}", binary.load_addr),
            arch,
            "binary located"
        );
        debug!(state = ?WalkState::BinaryLocated, "walk");
        for image in report.binary_images.iter().take(10) {
            debug!(image = image.basename(), addr = %format!("{:#x}", image.image_addr), "module");
        }
        if report.binary_images.len() > 10 {
            debug!(remaining = report.binary_images.len() - 10, "more modules not listed");
        }

        let app_name = self.config.app_name.as_str();
        let selected = select_threads(report.threads(), app_name);
        if selected.is_empty() {
            return Err(WalkError::NoRelevantThreads);
        }
        for s in &selected {
            info!(
                role = ?s.role,
                index = %s.thread.index,
                name = s.thread.display_name(),
                "selected thread"
            );
        }
        debug!(state = ?WalkState::ThreadsSelected, "walk");

        debug!(state = ?WalkState::PerThreadFrameScan, "walk");
        let mut advisories = binary.advisories.clone();
        let threads: Vec<ThreadReport> = {
            let ctx = ScanContext {
                binary: &binary,
                arch,
                images: ImageMap::new(&report.binary_images),
                prefixes: FrameworkPrefixes::new(self.config.framework_prefixes.iter().cloned()),
            };
            selected
                .iter()
                .map(|s| {
                    let thread = self.scan_thread(&ctx, s);
                    if thread.opportunistic {
                        let msg = format!(
                            "{}: no frames attributed to {app_name}; tried every unknown address",
                            thread.label
                        );
                        warn!("{msg}");
                        advisories.push(msg);
                    }
                    thread
                })
                .collect()
        };

        let (app_code_locations, stats) = aggregate(&threads);
        debug!(state = ?WalkState::Aggregated, "walk");
        info!(
            resolved = stats.resolved,
            attempted = stats.attempted,
            app_code = stats.app_code_frames,
            "symbolication finished"
        );
        debug!(state = ?WalkState::Done, "walk");

        Ok(SymbolicationReport {
            app_name: app_name.to_string(),
            arch: arch.to_string(),
            binary,
            advisories,
            threads,
            app_code_locations,
            stats,
        })
    }

    fn scan_thread(&self, ctx: &ScanContext<'_>, selected: &SelectedThread<'_>) -> ThreadReport {
        let thread = selected.thread;
        let app_name = self.config.app_name.as_str();
        let redacted = self.config.redacted_sentinel.as_str();
        let app_frame_count = thread.frames().iter().filter(|f| is_app_frame(f, app_name)).count();
        let has_app_frames = app_frame_count > 0;

        if thread.frames().is_empty() {
            warn!(thread = %thread.index, "thread has no backtrace");
        }

        let frames: Vec<FrameReport> = thread
            .frames()
            .iter()
            .enumerate()
            .map(|(index, frame)| {
                if should_resolve(frame, has_app_frames, app_name, redacted) {
                    self.resolve_frame(ctx, index, frame)
                } else {
                    self.passthrough_frame(ctx, index, frame)
                }
            })
            .collect();

        let symbolicated_count =
            frames.iter().filter(|f| f.status == FrameStatus::Resolved).count();
        ThreadReport {
            label: selected.label(),
            role: selected.role,
            index: thread.index.clone(),
            name: thread.name.clone(),
            crashed: thread.crashed,
            app_frame_count,
            opportunistic: !has_app_frames && !thread.frames().is_empty(),
            symbolicated_count,
            frames,
        }
    }

    fn resolve_frame(&self, ctx: &ScanContext<'_>, index: usize, frame: &Frame) -> FrameReport {
        let app_name = self.config.app_name.as_str();
        let address = frame.instruction_addr;
        let library = ctx.images.label_for(address);

        match resolve(self.symbolizer, &ctx.binary.path, ctx.binary.load_addr, address, ctx.arch) {
            Resolution::Resolved(text) => {
                let source_file = text.source.as_ref().map(|s| s.file.as_str());
                let classification = classify(
                    ResolutionOutcome::Resolved { source_file },
                    library.as_ref(),
                    &ctx.prefixes,
                );

                let mut display_name = if frame.has_unknown_object() {
                    text.library
                        .clone()
                        .or_else(|| library.as_ref().map(|l| l.name.clone()))
                        .unwrap_or_else(|| frame.object_name.clone())
                } else {
                    frame.object_name.clone()
                };
                if classification == Classification::FrameworkCode && display_name == app_name {
                    display_name = format!("{app_name} [framework]");
                }
                debug!(frame = index, text = %text.text, ?classification, "resolved");

                let resolved = ResolvedFrame {
                    display_name: display_name.clone(),
                    symbolicated_text: text.text.clone(),
                    source_file: text.source.as_ref().map(|s| s.file.clone()),
                    line_number: text.source.as_ref().map(|s| s.line),
                    classification,
                    language: text.language,
                };
                FrameReport {
                    index,
                    address,
                    object_name: frame.object_name.clone(),
                    display_name,
                    device_symbol: frame.symbol_name.clone(),
                    library,
                    status: FrameStatus::Resolved,
                    resolved: Some(resolved),
                    classification,
                    app_resolution_failed: false,
                }
            }
            Resolution::Unresolved(reason) => {
                let app_image = is_app_frame(frame, app_name)
                    || library.as_ref().is_some_and(|l| l.name == app_name);
                let classification = classify(
                    ResolutionOutcome::Failed { app_image },
                    library.as_ref(),
                    &ctx.prefixes,
                );
                debug!(frame = index, ?reason, "not resolved");
                let display_name = match &library {
                    Some(label) => label.name.clone(),
                    None => frame.object_name.clone(),
                };
                FrameReport {
                    index,
                    address,
                    object_name: frame.object_name.clone(),
                    display_name,
                    device_symbol: frame.symbol_name.clone(),
                    library,
                    status: FrameStatus::Failed(reason),
                    resolved: None,
                    classification,
                    app_resolution_failed: app_image,
                }
            }
        }
    }

    fn passthrough_frame(&self, ctx: &ScanContext<'_>, index: usize, frame: &Frame) -> FrameReport {
        let app_name = self.config.app_name.as_str();
        let address = frame.instruction_addr;
        let image_label = ctx.images.label_for(address);
        let owning = image_label.clone().or_else(|| {
            (!frame.has_unknown_object())
                .then(|| LibraryLabel::from_basename(basename(&frame.object_name)))
        });
        let classification =
            classify(ResolutionOutcome::NotAttempted, owning.as_ref(), &ctx.prefixes);

        // Unknown objects without a symbol borrow the image label, unless it is the app itself.
        let has_symbol = frame.symbol_name.as_deref().is_some_and(|s| !s.is_empty());
        let display_name = match &image_label {
            Some(label) if !has_symbol && frame.has_unknown_object() && label.name != app_name => {
                label.name.clone()
            }
            _ => frame.object_name.clone(),
        };

        FrameReport {
            index,
            address,
            object_name: frame.object_name.clone(),
            display_name,
            device_symbol: frame.symbol_name.clone(),
            library: image_label,
            status: FrameStatus::NotAttempted,
            resolved: None,
            classification,
            app_resolution_failed: false,
        }
    }
}

/// Collect app-code locations (thread-then-frame order) and statistics.
fn aggregate(threads: &[ThreadReport]) -> (Vec<AppCodeLocation>, WalkStats) {
    let mut locations = Vec::new();
    let mut stats = WalkStats { threads: threads.len(), ..WalkStats::default() };
    for thread in threads {
        for frame in &thread.frames {
            stats.total_frames += 1;
            match &frame.status {
                FrameStatus::NotAttempted => {}
                FrameStatus::Resolved => {
                    stats.attempted += 1;
                    stats.resolved += 1;
                }
                FrameStatus::Failed(_) => {
                    stats.attempted += 1;
                    stats.failed += 1;
                }
            }
            let Some(resolved) = &frame.resolved else { continue };
            stats.languages.record(resolved.language);
            match resolved.classification {
                Classification::AppCode => {
                    stats.app_code_frames += 1;
                    locations.push(AppCodeLocation {
                        thread: thread.label.clone(),
                        file: resolved.source_file.clone(),
                        line: resolved.line_number,
                        symbol: resolved.symbolicated_text.clone(),
                    });
                }
                Classification::FrameworkCode => stats.framework_frames += 1,
                _ => {}
            }
        }
    }
    (locations, stats)
}
