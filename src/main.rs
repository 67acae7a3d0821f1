use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod models;
mod patterns;
mod report;
mod scanner;

use scanner::Scanner;

#[derive(Parser)]
#[command(name = "skinlens")]
#[command(about = "Analyze expression caching in media-center skin XML files", long_about = None)]
#[command(version)]
struct Cli {
    /// Root directory of the skin tree to analyze
    root: PathBuf,

    /// File name filter for scanned files
    #[arg(short, long, default_value = "*.xml")]
    suffix: String,

    /// Output path for the rendered report
    #[arg(short, long, default_value = "cache_analysis_report.txt")]
    output: PathBuf,

    /// Report format
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Render full frequency tables instead of top-N excerpts
    #[arg(long)]
    detailed: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("🔍 Analyzing skin expressions in {}", cli.root.display());

    let scanner = Scanner::new(&cli.root, &cli.suffix)?
        .with_progress(std::io::stdout().is_terminal() && !cli.verbose);
    let report = scanner.scan()?;

    let rendered = match cli.format.as_str() {
        "json" => report.to_json()?,
        _ => report.render_text(cli.detailed),
    };
    fs::write(&cli.output, rendered)
        .with_context(|| format!("could not write report to {}", cli.output.display()))?;

    report.print_summary();
    println!("\n✅ Report saved to: {}", cli.output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["skinlens", "/skin", "--format", "json"]).is_ok());
        assert!(Cli::try_parse_from(["skinlens", "/skin", "--format", "yaml"]).is_err());
    }
}
