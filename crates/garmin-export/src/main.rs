use std::path::PathBuf;

use clap::{Parser, Subcommand};
use garmin_export::cli::commands;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "garmin-export")]
#[command(author, version, about = "Incremental export of Garmin Connect data to CSV", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Profile whose saved login to use
    #[arg(short, long, global = true, env = "GARMIN_PROFILE")]
    profile: Option<String>,

    /// Directory holding the CSV tables
    #[arg(short, long, global = true, env = "GARMIN_EXPORT_DIR")]
    data_dir: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch whatever the local tables are missing
    #[command(alias = "export")]
    Run {
        /// Export activities only
        #[arg(long)]
        activities: bool,
        /// Export daily health only
        #[arg(long)]
        days: bool,
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,
        /// End date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        to: Option<String>,
        /// Dry run (plan only, don't fetch)
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the operations a run would perform
    Plan {
        /// Plan activities only
        #[arg(long)]
        activities: bool,
        /// Plan daily health only
        #[arg(long)]
        days: bool,
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,
        /// End date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        to: Option<String>,
    },
    /// Show table completeness and the last run
    Status,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> garmin_export::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let command = async {
        match cli.command {
            Commands::Run {
                activities,
                days,
                from,
                to,
                dry_run,
            } => {
                commands::run(cli.profile, cli.data_dir, activities, days, from, to, dry_run)
                    .await
            }
            Commands::Plan {
                activities,
                days,
                from,
                to,
            } => commands::plan(cli.profile, cli.data_dir, activities, days, from, to).await,
            Commands::Status => commands::status(cli.data_dir).await,
        }
    };

    // Tables on disk are whatever the last checkpoint saved
    let result = tokio::select! {
        result = command => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nInterrupted. Progress up to the last checkpoint is saved.");
            std::process::exit(130);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", garmin_export::error::format_user_error(&e));
        std::process::exit(1);
    }

    Ok(())
}
