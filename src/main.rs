use std::path::PathBuf;

use chrono::{Days, Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod api;
mod auth;
mod cli;
mod config;
mod diary;
mod error;
mod http;
mod storage;

const DEFAULT_KEY_FILE: &str = "~/.tokens/fatsecret.json";

#[derive(Parser)]
#[command(name = "fatdiary", about = "Export a FatSecret food diary to JSON")]
struct Cli {
    /// Debug logging (includes OAuth base strings)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the food diary for a date range
    Diary {
        /// Output file
        #[arg(default_value = "fat-secret-diary-data.json")]
        out: PathBuf,
        /// JSON file with consumer_key and consumer_secret
        #[arg(short, long, default_value = DEFAULT_KEY_FILE)]
        key_file: PathBuf,
        /// First day, YYYY-MM-DD (default: two days ago)
        #[arg(short, long)]
        from_date: Option<NaiveDate>,
        /// Last day, YYYY-MM-DD (default: today)
        #[arg(short, long)]
        to_date: Option<NaiveDate>,
    },

    /// Run the OAuth authorization only and cache the access token
    Auth {
        /// JSON file with consumer_key and consumer_secret
        #[arg(short, long, default_value = DEFAULT_KEY_FILE)]
        key_file: PathBuf,
    },

    /// Show cached OAuth secrets and their age
    Status,

    /// Delete cached OAuth secrets to start authorization over
    Reset,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match &cli.command {
        Commands::Diary {
            out,
            key_file,
            from_date,
            to_date,
        } => {
            let today = Local::now().date_naive();
            let from = from_date.unwrap_or_else(|| today.checked_sub_days(Days::new(2)).unwrap_or(today));
            let to = to_date.unwrap_or(today);
            cli::commands::cmd_diary(out, key_file, from, to)
        }
        Commands::Auth { key_file } => cli::commands::cmd_auth(key_file),
        Commands::Status => cli::commands::cmd_status(),
        Commands::Reset => cli::commands::cmd_reset(),
    };

    if let Err(e) = result {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
