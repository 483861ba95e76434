//! Attach harness CLI
//!
//! Launches the configured target, attaches to it and exits with the
//! verdict's exit code (status base + 0 on pass, + 2 on fail).

use std::path::PathBuf;

use attach_harness::common::{config::Config, logging};
use attach_harness::verdict::VerdictPolicy;
use attach_harness::{Harness, Status, Verdict};
use clap::Parser;
use colored::Colorize;

#[derive(Parser)]
#[command(name = "attach-harness", about = "Attach to a freshly launched target and check its exit")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file (default: platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Connector to attach with, overriding the config file
    #[arg(long)]
    connector: Option<String>,

    /// Overall wait time in minutes, overriding the config file
    #[arg(long)]
    wait_time: Option<u64>,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print the verdict as JSON
    #[arg(long)]
    json: bool,

    /// Positional test arguments; the second one overrides the attempt delay in ms
    #[arg(allow_hyphen_values = true)]
    args: Vec<String>,
}

fn load_config(cli: &Cli) -> attach_harness::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(connector) = &cli.connector {
        config.attach.connector = connector.clone();
    }
    if let Some(wait_time) = cli.wait_time {
        config.attach.wait_time_minutes = wait_time;
    }
    Ok(config)
}

fn print_verdict(verdict: &Verdict, json: bool) {
    if json {
        match serde_json::to_string(verdict) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("Error: {e}"),
        }
        return;
    }

    match verdict.status {
        Status::Pass => println!("{} (exit code {})", "PASSED".green().bold(), verdict.exit_code),
        Status::Fail => println!(
            "{} (exit code {}): {}",
            "FAILED".red().bold(),
            verdict.exit_code,
            verdict.message.as_deref().unwrap_or("unknown failure")
        ),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let log_guard = logging::init(cli.log_file.as_deref());

    let verdict = match load_config(&cli) {
        Ok(config) => Harness::from(config).run(&cli.args).await,
        Err(e) => {
            tracing::error!("{}", e);
            VerdictPolicy::default().fail(e.to_string())
        }
    };

    print_verdict(&verdict, cli.json);
    // process::exit skips destructors; flush the file writer first
    drop(log_guard);
    std::process::exit(verdict.exit_code);
}
