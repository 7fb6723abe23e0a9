use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use symbolicate_core::render::render_text;
use symbolicate_core::tools::{AtosSymbolizer, BuildProductsSearch, DwarfdumpExtractor};
use symbolicate_core::{Report, ReportWalker, SymbolicateConfig, SymbolicationReport};
use tracing::{debug, info, warn};

use crate::commands::OutputTarget;
use crate::{canonicalize_or_current, sha256_file};

/// Command-line inputs for one symbolication run.
#[derive(Debug, Clone, Default)]
pub struct SymbolicateArgs {
    pub report: String,
    pub output: Option<String>,
    pub json: bool,
    pub config: Option<String>,
    pub app_name: Option<String>,
    pub search_roots: Vec<String>,
    pub symbolizer: Option<String>,
    pub uuid_tool: Option<String>,
}

/// JSON document written with `--json`.
#[derive(Debug, Serialize)]
pub struct SymbolicationOutput<'a> {
    pub tool_version: &'static str,
    pub symbolicated_at: String,
    pub report_path: String,
    /// SHA-256 of the binary that was symbolized against, when readable.
    pub binary_sha256: Option<String>,
    #[serde(flatten)]
    pub report: &'a SymbolicationReport,
}

/// Load the config file (if any) and apply command-line overrides.
pub fn resolve_config(args: &SymbolicateArgs) -> Result<SymbolicateConfig> {
    let mut config = match &args.config {
        Some(path) => SymbolicateConfig::load(Path::new(path))
            .with_context(|| format!("Failed to load config: {path}"))?,
        None => SymbolicateConfig::default(),
    };
    if let Some(app_name) = &args.app_name {
        config.app_name = app_name.clone();
    }
    if !args.search_roots.is_empty() {
        config.search_roots = args.search_roots.iter().map(PathBuf::from).collect();
    }
    debug!(?config, "effective configuration");
    Ok(config)
}

/// Symbolicate one report and write the result to stdout or `--output`.
pub fn symbolicate_command(args: &SymbolicateArgs) -> Result<()> {
    let config = resolve_config(args)?;

    let report_path = canonicalize_or_current(&args.report)?;
    let report = Report::load(&report_path)
        .with_context(|| format!("Failed to load report: {}", report_path.display()))?;
    info!(
        report = %report_path.display(),
        images = report.binary_images.len(),
        threads = report.threads().len(),
        "report loaded"
    );

    let timeout = config.tool_timeout();
    let symbolizer = match &args.symbolizer {
        Some(path) => AtosSymbolizer::new(path, timeout),
        None => AtosSymbolizer::from_config(&config.symbolizer, timeout),
    };
    let extractor = match &args.uuid_tool {
        Some(path) => DwarfdumpExtractor::new(path, timeout),
        None => DwarfdumpExtractor::from_config(&config.uuid_tool, timeout),
    };
    let candidates = BuildProductsSearch::from_config(&config);
    debug!(symbolizer = %symbolizer.program().display(), "tools ready");

    // Acquired before the walk; an error below drops it and removes the temp file.
    let mut target = OutputTarget::acquire(args.output.as_deref().map(Path::new))?;

    let walker = ReportWalker {
        config: &config,
        symbolizer: &symbolizer,
        extractor: &extractor,
        candidates: &candidates,
    };
    let result = walker
        .run(&report)
        .with_context(|| format!("Failed to symbolicate {}", report_path.display()))?;

    if args.json {
        let binary_sha256 = match sha256_file(&result.binary.path) {
            Ok(hash) => Some(hash),
            Err(err) => {
                warn!(error = %err, "could not hash symbolized binary");
                None
            }
        };
        let output = SymbolicationOutput {
            tool_version: symbolicate_core::version(),
            symbolicated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            report_path: report_path.display().to_string(),
            binary_sha256,
            report: &result,
        };
        let writer = target.writer();
        serde_json::to_writer_pretty(&mut *writer, &output)
            .context("Failed to serialize symbolication report")?;
        writeln!(writer).context("Failed to write output")?;
    } else {
        render_text(&result, target.writer()).context("Failed to write output")?;
    }

    target.commit()
}
