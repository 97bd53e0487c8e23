use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// Watch BibTeX enrichment jobs running on a project-hosting server
#[derive(Parser, Debug)]
#[command(name = "enrich-watch", version, about, long_about = None)]
pub struct Cli {
    /// Path to a RON config file (default: ./enrich-watch.ron if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Server base URL, e.g. http://localhost:8000
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Also write logs to ./enrich-watch.log
    #[arg(long, global = true)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Poll one or more jobs until they finish, then fetch their results
    Watch {
        /// Job ids returned by the upload
        #[arg(required = true)]
        job_ids: Vec<String>,

        /// Delay between status checks in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Give up after this many status checks
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Do not download the result file on completion
        #[arg(long)]
        no_download: bool,

        /// Directory for downloaded results
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Save each completed result to this project
        #[arg(long)]
        project: Option<String>,

        /// Skip fetching the list of URLs to open
        #[arg(long)]
        no_urls: bool,
    },

    /// Ask the server to cancel a job
    Cancel {
        job_id: String,
    },

    /// Download the result file of a completed job
    Download {
        job_id: String,

        /// Directory for the downloaded file
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Print the URLs a completed job suggests opening
    Urls {
        job_id: String,
    },

    /// Save the result of a completed job to a project
    Save {
        job_id: String,

        /// Target project id
        #[arg(long)]
        project: String,
    },

    /// Show the most recent completed result (kept for 24 hours)
    Last,
}
