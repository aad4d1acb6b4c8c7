pub mod check;
pub mod query;
pub mod serve;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "blogfront")]
#[command(version)]
#[command(about = "Server-rendered blog front end for a headless blog API", long_about = None)]
pub struct Cli {
    #[arg(short, long, default_value = "blogfront.toml", env = "BLOGFRONT_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the web server
    Serve {
        #[arg(short = 'H', long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run a listing query against the live API and print the page
    Query {
        /// Free-text search term
        #[arg(short, long, default_value = "")]
        q: String,
        /// Category slug filter
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value = "1")]
        page: usize,
        /// Page size (defaults to listing.posts_per_page)
        #[arg(long)]
        per_page: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Validate the configuration and probe the API
    Check,
}
