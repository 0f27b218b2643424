//! Command-line interface definitions for handbook-pdf

use clap::Parser;
use std::path::PathBuf;

/// Default output file name
pub const DEFAULT_OUTPUT: &str = "guide_to_safe_scouting.pdf";

/// CLI structure for the handbook-pdf application
#[derive(Parser, Debug)]
#[command(name = "handbook-pdf")]
#[command(version)]
#[command(
    about = "Archive a multi-page online handbook as a single PDF",
    long_about = None
)]
pub struct Cli {
    /// Output PDF path
    #[arg(value_name = "OUTPUT", default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Handbook definition (TOML) to use instead of the built-in handbook
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Per-request timeout in seconds (overrides the handbook setting)
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Only use the fonts bundled with the binary
    #[arg(long)]
    pub no_system_fonts: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_output() {
        let cli = Cli::parse_from(["handbook-pdf"]);
        assert_eq!(cli.output, PathBuf::from(DEFAULT_OUTPUT));
        assert!(cli.config.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_positional_output_and_flags() {
        let cli = Cli::parse_from([
            "handbook-pdf",
            "out/gss.pdf",
            "--config",
            "fm.toml",
            "--timeout",
            "5",
            "-v",
        ]);
        assert_eq!(cli.output, PathBuf::from("out/gss.pdf"));
        assert_eq!(cli.config, Some(PathBuf::from("fm.toml")));
        assert_eq!(cli.timeout, Some(5));
        assert!(cli.verbose);
    }
}
