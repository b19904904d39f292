use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "evscan")]
#[command(about = "Positive expected value scanner for sportsbook and exchange odds", long_about = None)]
struct Cli {
    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the feed once and print opportunities
    Scan(commands::ScanArgs),
    /// Refresh on an interval until Ctrl+C
    Watch(commands::WatchArgs),
    /// Analyze a saved feed snapshot offline
    Analyze(commands::AnalyzeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    match &cli.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            // stdout carries the report; logs go to stderr
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .init();
        }
    }

    match cli.command {
        Commands::Scan(args) => commands::run_scan(args).await?,
        Commands::Watch(args) => commands::run_watch(args).await?,
        Commands::Analyze(args) => commands::run_analyze(args)?,
    }

    Ok(())
}
