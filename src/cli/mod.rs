//! CLI module for cutlist
//!
//! Argument parsing, configuration overrides and command dispatch.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::CutlistConfig;

pub mod args;
pub mod commands;

/// Non-destructive video editing from the command line
///
/// Projects are edit decision lists over source media. Nothing touches the
/// sources until `export` renders the timeline.
#[derive(Parser, Debug)]
#[command(name = "cutlist")]
#[command(about = "cutlist - edit decision lists with smart-cut export")]
#[command(version)]
pub struct Cli {
    /// Config file (default: $CUTLIST_CONFIG or ./cutlist.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a project over one source
    New(args::NewArgs),
    /// Apply edit operations to a project
    Edit(args::EditArgs),
    /// Show a project or probe a media file
    Inspect(args::InspectArgs),
    /// Convert between timeline and source time
    Map(args::MapArgs),
    /// Render a project to a media file
    Export(args::ExportArgs),
    /// Remove stale scratch directories
    Clean(args::CleanArgs),
}

impl Cli {
    /// Command-line flags take precedence over file and environment
    pub fn apply_overrides(&self, config: &mut CutlistConfig) -> Result<()> {
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.json_logs {
            config.logging.json = true;
        }

        if let Commands::Export(args) = &self.command {
            if let Some(codec) = &args.codec {
                config.encoder.video_codec = codec.clone();
            }
            if let Some(crf) = args.crf {
                config.encoder.crf = crf;
            }
            if let Some(workers) = args.workers {
                config.export.workers = workers;
            }
            if args.parallel {
                config.export.parallel = true;
            }
            if let Some(dir) = &args.scratch_dir {
                config.export.scratch_dir = Some(dir.clone());
            }
        }

        config.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_flags_override_config() {
        let cli = Cli::parse_from([
            "cutlist",
            "--log-level",
            "debug",
            "export",
            "p.json",
            "--out",
            "o.mp4",
            "--crf",
            "30",
            "--parallel",
            "--workers",
            "3",
        ]);
        let mut config = CutlistConfig::default();
        cli.apply_overrides(&mut config).unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.encoder.crf, 30);
        assert!(config.export.parallel);
        assert_eq!(config.export.workers, 3);
    }

    #[test]
    fn test_map_requires_a_time() {
        assert!(Cli::try_parse_from(["cutlist", "map", "p.json"]).is_err());
        assert!(Cli::try_parse_from(["cutlist", "map", "p.json", "--at", "5", "--source-time", "3"]).is_err());
        assert!(Cli::try_parse_from(["cutlist", "map", "p.json", "--source-time", "3", "--nearest"]).is_ok());
    }

    #[test]
    fn test_crf_out_of_range_rejected() {
        assert!(Cli::try_parse_from(["cutlist", "export", "p.json", "--out", "o.mp4", "--crf", "60"]).is_err());
    }
}
