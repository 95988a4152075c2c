//! Discover a switch network and print the report as JSON.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example discover -- credentials.toml 192.168.1.1
//! cargo run --example discover -- credentials.toml 192.168.1.1 3
//! cargo run --example discover -- credentials.toml 192.168.1.1 --max-devices 50
//! ```
//!
//! Ctrl-C stops the walk after the device in progress; the partial report
//! is still printed.

use std::env;
use std::path::PathBuf;

use topowalk::{Config, Discovery};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    if let Some(depth) = args.max_depth {
        config.limits.max_depth = Some(depth);
    }
    if let Some(devices) = args.max_devices {
        config.limits.max_devices = Some(devices);
    }

    let discovery = Discovery::from_config(config)?;

    let stop = discovery.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Stopping after the current device...");
            stop.stop();
        }
    });

    let report = discovery.run(args.seed.as_str()).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    eprintln!("\nLinks:");
    for link in report.links() {
        eprintln!("  {} <-> {}", link.a, link.b);
    }

    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    config: PathBuf,
    seed: String,
    max_depth: Option<usize>,
    max_devices: Option<usize>,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut positional = Vec::new();
        let mut max_depth = None;
        let mut max_devices = None;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--max-depth" | "-d" => {
                    i += 1;
                    max_depth = Some(Self::number(args.get(i)));
                }
                "--max-devices" | "-n" => {
                    i += 1;
                    max_devices = Some(Self::number(args.get(i)));
                }
                "--help" | "-h" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                other => positional.push(other.to_string()),
            }
            i += 1;
        }

        if !(2..=3).contains(&positional.len()) {
            Self::print_help();
            std::process::exit(2);
        }
        if positional.len() == 3 {
            max_depth = Some(Self::number(positional.pop().as_ref()));
        }
        let seed = positional.pop().unwrap_or_default();
        let config = PathBuf::from(positional.pop().unwrap_or_default());

        Self {
            config,
            seed,
            max_depth,
            max_devices,
        }
    }

    /// Parse a limit, or print help and exit if it is missing or malformed.
    fn number(value: Option<&String>) -> usize {
        match value.and_then(|v| v.parse().ok()) {
            Some(n) => n,
            None => {
                Self::print_help();
                std::process::exit(2);
            }
        }
    }

    fn print_help() {
        println!(
            r#"topowalk discover example

USAGE:
    cargo run --example discover -- <CONFIG> <SEED> [MAX_DEPTH] [OPTIONS]

ARGS:
    <CONFIG>                   Credential/config TOML file
    <SEED>                     Address of the first switch
    [MAX_DEPTH]                Same as --max-depth

OPTIONS:
    -d, --max-depth <HOPS>     Do not probe further than this from the seed
    -n, --max-devices <N>      Stop after this many devices
    -h, --help                 Print this help message
"#
        );
    }
}
