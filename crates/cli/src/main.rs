use anyhow::Result;
use clap::Parser;
use symbolicate_report::commands::{init_logging, symbolicate_command, SymbolicateArgs};

/// Symbolicate crash and lag reports from the in-app monitoring SDK.
///
/// This CLI is a thin wrapper around `symbolicate-core`: it parses arguments,
/// sets up logging, and picks the output destination. The walk itself lives
/// in the library.
#[derive(Parser, Debug)]
#[command(
    name = "symbolicate-report",
    version,
    about = "Symbolicate crash/lag reports and point at the application code involved",
    long_about = None
)]
struct Cli {
    /// Path to the JSON report.
    report: String,

    /// Write results to this file instead of stdout.
    #[arg(long, short)]
    output: Option<String>,

    /// Step-by-step diagnostic tracing on stderr.
    #[arg(long, short, default_value_t = false)]
    verbose: bool,

    /// Emit the structured result as JSON instead of text.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// YAML or JSON configuration file.
    #[arg(long)]
    config: Option<String>,

    /// Application binary name (without `.app`).
    #[arg(long)]
    app_name: Option<String>,

    /// Directory to search for build products. Repeatable.
    #[arg(long = "search-root")]
    search_roots: Vec<String>,

    /// Symbolizer executable (atos-compatible).
    #[arg(long)]
    symbolizer: Option<String>,

    /// UUID tool executable (dwarfdump-compatible).
    #[arg(long)]
    uuid_tool: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let args = SymbolicateArgs {
        report: cli.report,
        output: cli.output,
        json: cli.json,
        config: cli.config,
        app_name: cli.app_name,
        search_roots: cli.search_roots,
        symbolizer: cli.symbolizer,
        uuid_tool: cli.uuid_tool,
    };
    symbolicate_command(&args)
}
