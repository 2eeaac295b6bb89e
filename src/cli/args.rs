//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;
use clap_num::number_range;

use crate::domain::model::TimeSpec;

/// Seconds, `MM:SS.ms` or `HH:MM:SS.ms`
pub fn parse_time(value: &str) -> Result<f64, String> {
    TimeSpec::parse(value)
        .map(|spec| spec.as_seconds())
        .map_err(|e| e.to_string())
}

fn parse_crf(value: &str) -> Result<u8, String> {
    number_range(value, 0, 51)
}

fn parse_workers(value: &str) -> Result<usize, String> {
    number_range(value, 1, 256)
}

/// Arguments for the new command
#[derive(Args, Debug)]
pub struct NewArgs {
    /// Project file to create (.json, .yaml or .yml)
    pub project: PathBuf,

    /// Primary source media
    #[arg(short, long)]
    pub source: PathBuf,

    /// Source duration; probed when omitted
    #[arg(short, long, value_parser = parse_time)]
    pub duration: Option<f64>,

    /// Replace an existing project file
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the edit command
#[derive(Args, Debug)]
pub struct EditArgs {
    /// Project file
    pub project: PathBuf,

    /// Edit operation, e.g. "delete 10 20" (repeatable)
    #[arg(long = "op", value_name = "OP")]
    pub ops: Vec<String>,

    /// File with one operation per line; `#` starts a comment
    #[arg(long)]
    pub script: Option<PathBuf>,

    /// Apply and print without saving
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the inspect command
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Project file or media file
    pub target: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Preview how a media range would be cut
    #[arg(long, num_args = 2, value_names = ["START", "END"], value_parser = parse_time)]
    pub plan: Option<Vec<f64>>,
}

/// Arguments for the map command
#[derive(Args, Debug)]
pub struct MapArgs {
    /// Project file
    pub project: PathBuf,

    /// Timeline time to resolve to a source position
    #[arg(long, value_parser = parse_time, conflicts_with = "source_time", required_unless_present = "source_time")]
    pub at: Option<f64>,

    /// Source time to place on the timeline
    #[arg(long, value_parser = parse_time)]
    pub source_time: Option<f64>,

    /// Source of --source-time (default: primary source)
    #[arg(long, requires = "source_time")]
    pub source: Option<String>,

    /// Snap deleted source times to the nearest kept boundary
    #[arg(long, requires = "source_time")]
    pub nearest: bool,
}

/// Arguments for the export command
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Project file
    pub project: PathBuf,

    /// Output media file
    #[arg(short, long)]
    pub out: PathBuf,

    /// Video codec for re-encoded parts (auto, libx264, h264_nvenc, ...)
    #[arg(long)]
    pub codec: Option<String>,

    /// Constant Rate Factor (0-51)
    #[arg(long, value_parser = parse_crf)]
    pub crf: Option<u8>,

    /// Parallel cut workers
    #[arg(long, value_parser = parse_workers)]
    pub workers: Option<usize>,

    /// Cut segments in parallel
    #[arg(long)]
    pub parallel: bool,

    /// Skip transition rendering
    #[arg(long)]
    pub no_transitions: bool,

    /// Directory for intermediate files
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,
}

/// Arguments for the clean command
#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Only remove scratch directories older than this
    #[arg(long, default_value_t = 24)]
    pub older_than_hours: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_formats() {
        assert_eq!(parse_time("90").unwrap(), 90.0);
        assert_eq!(parse_time("01:30.5").unwrap(), 90.5);
        assert_eq!(parse_time("00:01:30").unwrap(), 90.0);
        assert!(parse_time("abc").is_err());
    }

    #[test]
    fn test_crf_range() {
        assert_eq!(parse_crf("23").unwrap(), 23);
        assert!(parse_crf("52").is_err());
    }
}
