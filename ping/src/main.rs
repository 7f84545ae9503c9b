use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tokio_icmp_echo::{ping, EchoConfig, EchoResult, Payload};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ping", about = "ICMP echo over a raw socket (needs root or CAP_NET_RAW)")]
struct Args {
    /// Host name or IPv4 address
    target: String,
    /// Number of echo requests
    #[arg(short, long, default_value_t = 4)]
    count: u16,
    /// Payload size in bytes
    #[arg(short, long, default_value_t = 32)]
    size: usize,
    /// Seconds to wait for each reply
    #[arg(short = 'W', long, default_value_t = 5)]
    timeout: u64,
    /// Outgoing IP TTL
    #[arg(short, long)]
    ttl: Option<u8>,
    /// Echo identifier, random by default
    #[arg(long)]
    identifier: Option<u16>,
    /// Ask for the don't-fragment bit
    #[arg(short = 'D', long)]
    dont_fragment: bool,
    /// Debug logging, RUST_LOG takes precedence
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn echo_config(args: &Args) -> EchoConfig {
    let mut config = EchoConfig::new(&args.target)
        .with_count(args.count)
        .with_payload(Payload::Length(args.size))
        .with_timeout(Duration::from_secs(args.timeout))
        .with_dont_fragment(args.dont_fragment);
    config.ttl = args.ttl;
    config.identifier = args.identifier;
    config
}

fn format_result(target: &str, result: &EchoResult) -> String {
    match &result.error {
        None => format!(
            "reply from {}: icmp_seq={} ttl={} time={} ms",
            target, result.sequence, result.ttl, result.time_ms
        ),
        Some(error) => format!("icmp_seq={}: {}", result.sequence, error),
    }
}

fn summary(target: &str, results: &[EchoResult], requested: u16) -> String {
    let received = results.iter().filter(|r| r.success).count();
    format!(
        "--- {}: {} sent, {} received, {} requested ---",
        target,
        results.len(),
        received,
        requested
    )
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = echo_config(&args);
    debug!(?config, "pinging");
    let results = ping(config)
        .await
        .with_context(|| format!("ping {} failed", args.target))?;

    if results.len() < args.count as usize {
        warn!(
            host = %args.target,
            sent = results.len(),
            requested = args.count,
            "session stopped early"
        );
    }
    for r in results.iter() {
        println!("{}", format_result(&args.target, r));
    }
    println!("{}", summary(&args.target, &results, args.count));
    Ok(())
}
