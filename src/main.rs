use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use hookline::config::{ServerConfig, DEFAULT_DELIMITER, DEFAULT_HOST, DEFAULT_PORT};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hookline")]
#[command(about = "Transaction lifecycle hook handler for API test runners", long_about = None)]
#[command(version)]
struct Cli {
    /// Hook files or glob patterns, loaded in the order given
    #[arg(required = true)]
    files: Vec<String>,

    /// Interface to listen on
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Message delimiter (escape sequences \n, \r and \t are expanded)
    #[arg(long, default_value = "\\n")]
    delimiter: String,

    /// Log every dispatched event and hook invocation
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = ServerConfig {
        host: cli.host,
        port: cli.port,
        delimiter: unescape_delimiter(&cli.delimiter),
    };

    hookline::run(&cli.files, config, |server| {
        let shutdown = server.shutdown_handle();
        ctrlc::set_handler(move || {
            if shutdown.is_shutdown() {
                // Second interrupt while a runner is still connected
                std::process::exit(130);
            }
            eprintln!(
                "{} Stopping after the current connection closes (Ctrl+C again to force)",
                "→".cyan().bold()
            );
            shutdown.shutdown();
        })
        .context("Failed to set Ctrl+C handler")?;

        println!(
            "{} Hook handler listening on {}",
            "✓".green().bold(),
            server.local_addr()
        );
        Ok(())
    })?;

    println!("{} Hook handler stopped", "─".dimmed());
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "hookline=debug" } else { "hookline=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn unescape_delimiter(raw: &str) -> String {
    if raw.is_empty() {
        return DEFAULT_DELIMITER.to_string();
    }
    raw.replace("\\n", "\n")
        .replace("\\r", "\r")
        .replace("\\t", "\t")
}
