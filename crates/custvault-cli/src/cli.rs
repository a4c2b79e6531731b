use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "custvault")]
#[command(about = "Customer records service with field-level protection", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (default: platform config dir)
    #[arg(long, global = true, env = "CUSTVAULT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP service
    Serve {
        /// Overrides LISTEN_HOST
        #[arg(long)]
        host: Option<String>,

        /// Overrides LISTEN_PORT
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print customer records as JSON
    Records {
        #[arg(long, default_value = "50")]
        limit: u32,

        /// Show values exactly as stored
        #[arg(long)]
        raw: bool,
    },
}
