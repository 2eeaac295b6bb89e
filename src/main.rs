//! cutlist - edit decision lists with smart-cut export
//!
//! # Usage
//!
//! ```bash
//! cutlist new talk.json --source talk.mp4
//! cutlist edit talk.json --op "delete 1:00 1:30" --op "transition 45 fade-black 1"
//! cutlist map talk.json --at 50
//! cutlist export talk.json --out talk-edit.mp4 --parallel
//! ```

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error};

use cutlist::adapters::TomlConfigAdapter;
use cutlist::cli::{commands, Cli};
use cutlist::utils::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Precedence: defaults < config file < CUTLIST_* environment < flags
    let mut config = TomlConfigAdapter::new(cli.config.clone()).load()?;
    cli.apply_overrides(&mut config)?;

    init_logging(&config.logging.level, config.logging.json);
    debug!("Configuration: {:?}", config);

    if let Err(e) = commands::run(cli, config).await {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}
