//! handbook-pdf - offline copies of online handbooks
//!
//! Fetches every page of a multi-page online handbook, extracts the main
//! content and typesets it into one PDF with a title page, a linked table of
//! contents, running headers, page numbers and bookmarks.

#![deny(unsafe_code)]
#![cfg_attr(all(not(debug_assertions), not(test)), deny(clippy::all))]
#![cfg_attr(all(not(debug_assertions), not(test)), deny(clippy::pedantic))]
#![cfg_attr(all(not(debug_assertions), not(test)), deny(missing_docs))]
// Allow some pedantic lints that are too strict for this project
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::enum_variant_names)]

mod assembler;
mod blocks;
mod cli;
mod document;
mod extractor;
mod fetcher;
mod handbook_config;
mod layout;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use cli::Cli;
use fetcher::HttpFetcher;
use handbook_config::HandbookConfig;
use std::time::Duration;

/// Main entry point for the handbook-pdf CLI application
fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => {
                let _ = e.print();
                std::process::exit(1);
            }
        },
    };
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        println!("\n✗ Error building PDF: {}", e);
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}

/// Warnings by default, info with --verbose; RUST_LOG overrides both
fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

/// Run the CLI application
fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => HandbookConfig::load(path)
            .with_context(|| format!("Failed to load handbook from {}", path.display()))?,
        None => HandbookConfig::builtin().context("Failed to load built-in handbook")?,
    };

    let timeout_secs = cli.timeout.unwrap_or(config.timeout_secs);
    if timeout_secs == 0 {
        anyhow::bail!("--timeout must be greater than zero");
    }

    println!("{}", "=".repeat(60));
    println!("{} PDF Generator", config.title);
    println!("{}", "=".repeat(60));

    if cli.verbose {
        print_build_info(&cli, &config, timeout_secs);
    }

    let fetcher = HttpFetcher::new(&config.user_agent, Duration::from_secs(timeout_secs))
        .context("Failed to initialise HTTP client")?;

    let captured = chrono::Local::now()
        .format("%B %d, %Y at %I:%M %p")
        .to_string();
    let handbook = assembler::assemble(&config, &fetcher, captured);

    let failed = handbook.failed_section_count();
    if failed > 0 {
        println!(
            "\nWarning: {} of {} sections use a placeholder notice",
            failed,
            handbook.sections.len()
        );
        for section in handbook
            .sections
            .iter()
            .filter(|s| !matches!(s.status, document::SectionStatus::Extracted(_)))
        {
            println!("  - {} ({})", section.title, section.url);
        }
    }
    if cli.verbose {
        println!("  - {} words", handbook.word_count());
    }

    println!("\nBuilding PDF: {}", cli.output.display());
    let options = layout::LayoutOptions {
        system_fonts: !cli.no_system_fonts,
    };
    let report = layout::to_pdf(&handbook, &cli.output, options)
        .with_context(|| format!("Failed to export PDF to {}", cli.output.display()))?;

    let size = std::fs::metadata(&cli.output)
        .with_context(|| format!("Failed to read {}", cli.output.display()))?
        .len();

    println!("\n✓ Success! PDF created: {}", cli.output.display());
    println!("  File size: {:.1} KB", size as f64 / 1024.0);
    if cli.verbose {
        println!(
            "  - {} pages, {} layout passes, {} bookmarks",
            report.pages,
            report.passes,
            report.entries.len()
        );
    }

    Ok(())
}

/// Print build information
fn print_build_info(cli: &Cli, config: &HandbookConfig, timeout_secs: u64) {
    match &cli.config {
        Some(path) => println!("Handbook: {}", path.display()),
        None => println!("Handbook: built-in"),
    }
    println!("Output: {}", cli.output.display());
    println!("Sections: {}", config.sections.len());
    println!("Timeout: {}s", timeout_secs);
    println!("User-Agent: {}", config.user_agent);
}
