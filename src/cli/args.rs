use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::app::StoreBackend;

#[derive(Parser, Debug)]
#[command(name = "activity-cache")]
#[command(version)]
#[command(about = "Similarity-based cache for AI-generated family activity recommendations", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Override the configured store backend
    #[arg(long, value_enum, global = true)]
    pub store: Option<BackendArg>,

    /// Override the file store directory
    #[arg(long, global = true, env = "ACTIVITY_CACHE_STORE_PATH")]
    pub store_path: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, global = true, default_value_t = OutputFormat::Text)]
    pub output_format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default configuration file
    Init,
    /// Print the exact-match key for a query
    Key {
        /// Query JSON file
        query: PathBuf,
    },
    /// Print the normalized feature vector for a query
    Features {
        /// Query JSON file
        query: PathBuf,
    },
    /// Score the similarity of two queries
    Compare {
        /// First query JSON file
        a: PathBuf,
        /// Second query JSON file
        b: PathBuf,
        /// Known distance between the two locations
        #[arg(long)]
        distance_km: Option<f64>,
    },
    /// Look a query up in the cache
    Get {
        /// Query JSON file
        query: PathBuf,
    },
    /// Store a result for a query
    Put {
        /// Query JSON file
        query: PathBuf,
        /// File holding the serialized result
        result: PathBuf,
    },
    /// Show store and configuration statistics
    Stats,
    /// Remove every cached entry
    Clear,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BackendArg {
    Memory,
    File,
    None,
}

impl From<BackendArg> for StoreBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Memory => StoreBackend::Memory,
            BackendArg::File => StoreBackend::File,
            BackendArg::None => StoreBackend::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Text,
    /// JSON structured output
    Json,
}
