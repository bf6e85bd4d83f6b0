//! Command-line interface definitions for AllFoodSicily.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! With no mode flag the process runs as a daemon executing the full
//! pipeline once a day at the configured hour.

use clap::Parser;

/// Command-line arguments for the AllFoodSicily pipeline.
///
/// # Examples
///
/// ```sh
/// # Run as a daemon with the daily scheduler
/// allfood_sicily
///
/// # Run the full pipeline once and exit
/// allfood_sicily --now
///
/// # Generate one article on demand
/// allfood_sicily --topic "cassata siciliana"
///
/// # Override monitored sites and queries
/// allfood_sicily --now --sources ./sources.yaml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Run the scheduled pipeline once and exit
    #[arg(long)]
    pub now: bool,

    /// Generate a single article for the given topic and exit
    #[arg(long)]
    pub topic: Option<String>,

    /// Optional YAML file overriding monitored sites and search queries
    #[arg(short, long, env = "SOURCES_FILE")]
    pub sources: Option<String>,

    /// Check configuration and exit
    #[arg(long)]
    pub validate: bool,

    /// Also save generated documents into this directory
    #[arg(short, long)]
    pub output_dir: Option<String>,
}
