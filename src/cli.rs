// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_manifest_path;

/// Command-line arguments for `lazyload`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "lazyload",
    version,
    about = "Load scripts and stylesheets in order and render the resulting document head.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the manifest (TOML).
    ///
    /// Default: `Lazyload.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value_os_t = default_manifest_path())]
    pub manifest: PathBuf,

    /// Page origin, e.g. `https://example.com`. Overrides `[page].origin`.
    #[arg(long, value_name = "URL")]
    pub origin: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `LAZYLOAD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the load plan, but don't fetch anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Write the rendered document here instead of stdout.
    #[arg(long, value_name = "PATH")]
    pub output: Option<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_defaults_to_working_directory_file() {
        let args = CliArgs::parse_from(["lazyload"]);
        assert_eq!(args.manifest, default_manifest_path());
        assert!(!args.dry_run);
    }

    #[test]
    fn manifest_path_can_be_overridden() {
        let args = CliArgs::parse_from(["lazyload", "--manifest", "site/head.toml"]);
        assert_eq!(args.manifest, PathBuf::from("site/head.toml"));
    }
}
