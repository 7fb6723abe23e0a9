//! Plain-text rendering of a [`SymbolicationReport`].
//!
//! The trailing `APP CODE LOCATIONS` block is meant to be machine-readable:
//! one `[<thread>] <file>:<line>` (or `[<thread>]`) header per entry followed
//! by the raw symbol line indented by four spaces, entries separated by a
//! blank line.

use std::io::{self, Write};

use crate::locate::{FallbackReason, MatchKind};
use crate::walker::{FrameReport, FrameStatus, SymbolicationReport, ThreadReport};

const RULE: &str =
    "================================================================================";
const THIN_RULE: &str =
    "--------------------------------------------------------------------------------";

/// Header line of the application-code section.
pub const APP_CODE_HEADER: &str = "APP CODE LOCATIONS";

pub fn describe_match(kind: &MatchKind) -> &'static str {
    match kind {
        MatchKind::ReportPath => "path from report",
        MatchKind::UuidMatch => "UUID match",
        MatchKind::LatestFallback(FallbackReason::NoDeclaredUuid) => {
            "latest build (report has no UUID)"
        }
        MatchKind::LatestFallback(FallbackReason::NoUuidMatch) => {
            "latest build (no UUID match, may not match report)"
        }
        MatchKind::LatestFallback(FallbackReason::ExtractionFailed) => {
            "latest build (UUID extraction failed, may not match report)"
        }
    }
}

/// Write the full text report to `out`.
pub fn render_text(report: &SymbolicationReport, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{RULE}")?;
    writeln!(out, "Crash report symbolication")?;
    writeln!(out, "{RULE}")?;
    writeln!(out, "Binary:       {}", report.binary.path.display())?;
    writeln!(out, "Load address: {:#x}", report.binary.load_addr)?;
    writeln!(out, "Match:        {}", describe_match(&report.binary.match_kind))?;
    if let Some(uuid) = &report.binary.declared.uuid {
        writeln!(out, "Report UUID:  {uuid}")?;
    }
    writeln!(out, "Arch:         {}", report.arch)?;
    writeln!(out)?;

    if !report.advisories.is_empty() {
        writeln!(out, "Advisories:")?;
        for advisory in &report.advisories {
            writeln!(out, "  ! {advisory}")?;
        }
        writeln!(out)?;
    }

    for thread in &report.threads {
        render_thread(report, thread, out)?;
    }

    render_summary(report, out)?;
    render_app_code_locations(report, out)?;
    Ok(())
}

fn render_thread(
    report: &SymbolicationReport,
    thread: &ThreadReport,
    out: &mut dyn Write,
) -> io::Result<()> {
    writeln!(out, "{RULE}")?;
    writeln!(out, "{}: Thread {}", thread.label, thread.index)?;
    writeln!(out, "  Name: {}", thread.name.as_deref().unwrap_or("unnamed"))?;
    writeln!(out, "{RULE}")?;

    if thread.frames.is_empty() {
        writeln!(out, "(no backtrace for this thread)")?;
        writeln!(out)?;
        return Ok(());
    }

    writeln!(
        out,
        "{} frames, {} attributed to {}",
        thread.frames.len(),
        thread.app_frame_count,
        report.app_name
    )?;
    if thread.opportunistic {
        writeln!(out, "No app frames recognised; tried to resolve every unknown address")?;
    }
    writeln!(out, "{THIN_RULE}")?;
    for frame in &thread.frames {
        render_frame(frame, out)?;
    }
    writeln!(out, "{THIN_RULE}")?;
    if thread.symbolicated_count > 0 {
        writeln!(out, "Resolved {} address(es) in this thread", thread.symbolicated_count)?;
    } else {
        writeln!(out, "No addresses resolved in this thread")?;
    }
    writeln!(out)?;
    Ok(())
}

fn render_frame(frame: &FrameReport, out: &mut dyn Write) -> io::Result<()> {
    let addr = format!("{:#x}", frame.address);
    match (&frame.status, &frame.resolved) {
        (FrameStatus::Resolved, Some(resolved)) => {
            let marker = if resolved.classification == crate::classify::Classification::AppCode {
                "=> "
            } else {
                "   "
            };
            writeln!(out, "{marker}{:2}  {:25} {addr:18}", frame.index, frame.display_name)?;
            writeln!(out, "      {}", resolved.symbolicated_text)?;
        }
        (FrameStatus::Failed(_), _) => {
            let note = if frame.app_resolution_failed {
                " [resolution failed]"
            } else if frame.library.is_none() {
                " (unknown library, not resolved)"
            } else {
                " [not resolved]"
            };
            writeln!(out, "   {:2}  {:25} {addr:18}{note}", frame.index, frame.display_name)?;
        }
        _ => match frame.device_symbol.as_deref().filter(|s| !s.is_empty()) {
            Some(symbol) => {
                writeln!(out, "   {:2}  {:25} {addr:18} {symbol}", frame.index, frame.display_name)?
            }
            None => writeln!(out, "   {:2}  {:25} {addr}", frame.index, frame.display_name)?,
        },
    }
    Ok(())
}

fn render_summary(report: &SymbolicationReport, out: &mut dyn Write) -> io::Result<()> {
    let stats = &report.stats;
    writeln!(out, "{RULE}")?;
    writeln!(
        out,
        "Summary: resolved {} of {} attempted address(es) ({:.1}%) across {} thread(s)",
        stats.resolved,
        stats.attempted,
        stats.success_rate(),
        stats.threads
    )?;
    writeln!(
        out,
        "  app code frames: {}, framework frames: {}",
        stats.app_code_frames, stats.framework_frames
    )?;
    writeln!(
        out,
        "  languages: swift {}, objective-c {}, c++ {}, c/other {}",
        stats.languages.swift,
        stats.languages.objective_c,
        stats.languages.cpp,
        stats.languages.c_other
    )?;
    writeln!(out, "{RULE}")?;
    writeln!(out)?;

    if stats.resolved > 0 {
        writeln!(out, "Legend:")?;
        writeln!(out, "  =>  application code, start here")?;
        writeln!(out, "  {} [framework]  monitoring framework internals", report.app_name)?;
        writeln!(out, "  UIKit, Foundation, GCD, ...  system frameworks")?;
        writeln!(out, "  [resolution failed]  app binary frame without debug info")?;
        writeln!(out)?;
    } else {
        writeln!(out, "No application addresses were resolved. Common causes:")?;
        writeln!(out, "  1. the binary does not match the report (different UUID)")?;
        writeln!(out, "  2. the app was built in Release mode with symbols stripped")?;
        writeln!(out, "  3. the report is older than the latest build")?;
        writeln!(out)?;
    }
    Ok(())
}

fn render_app_code_locations(report: &SymbolicationReport, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{APP_CODE_HEADER}")?;
    if report.app_code_locations.is_empty() {
        writeln!(out, "(none)")?;
        return Ok(());
    }
    for loc in &report.app_code_locations {
        match (&loc.file, loc.line) {
            (Some(file), Some(line)) => writeln!(out, "[{}] {file}:{line}", loc.thread)?,
            _ => writeln!(out, "[{}]", loc.thread)?,
        }
        writeln!(out, "    {}", loc.symbol)?;
        writeln!(out)?;
    }
    Ok(())
}
