mod configuration;
mod internet;

use anyhow::{Context, Result};
use clap::Parser;
use configuration::{Args, Configuration};
use serde_json::json;
use std::time::Instant;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_icmp_echo::{FanOut, FanOutReport, HostReport};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("info,tokio_icmp_echo=debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn load_configuration(args: &Args) -> Result<Configuration> {
    match &args.config {
        Some(path) => {
            let data = tokio::fs::read(path)
                .await
                .with_context(|| format!("reading {}", path))?;
            Configuration::decode(&data).with_context(|| format!("parsing {}", path))
        }
        None => Ok(Configuration::from_args(args)),
    }
}

fn encode_report(report: &HostReport) -> serde_json::Value {
    match &report.outcome {
        Ok(results) => json!({ "addr": report.addr, "results": results }),
        Err(error) => json!({ "addr": report.addr, "error": error.to_string() }),
    }
}

async fn write_lines<W: AsyncWrite + Unpin>(
    out: &mut W,
    conf: &Configuration,
    report: &FanOutReport,
) -> Result<()> {
    // Write configuration
    out.write_all(conf.encode()?.as_bytes()).await?;
    out.write_all(b"\n").await?;

    for host in report.reports.iter() {
        out.write_all(encode_report(host).to_string().as_bytes())
            .await?;
        out.write_all(b"\n").await?;
    }
    for addr in report.abandoned.iter() {
        out.write_all(json!({ "addr": addr, "abandoned": true }).to_string().as_bytes())
            .await?;
        out.write_all(b"\n").await?;
    }
    let completion = json!({
        "completion": report.completion,
        "reachable": report.reports.iter().filter(|r| r.is_reachable()).count(),
        "reported": report.reports.len(),
        "abandoned": report.abandoned.len(),
    });
    out.write_all(completion.to_string().as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(())
}

pub async fn sweep(conf: Configuration) -> Result<()> {
    let targets = conf
        .targets()
        .map_err(anyhow::Error::msg)
        .context("building target list")?;
    let total = targets.len();
    info!(total, parallelism = conf.fan_out.parallelism, "sweep started");

    let fan_out = FanOut::new(conf.fan_out);
    let cancel = fan_out.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, stopping sweep");
            cancel.cancel();
        }
    });

    let start = Instant::now();
    let report = fan_out.run(targets).await?;
    let reachable = report.reports.iter().filter(|r| r.is_reachable()).count();
    info!(
        reachable,
        reported = report.reports.len(),
        abandoned = report.abandoned.len(),
        completion = ?report.completion,
        elapsed = ?start.elapsed(),
        "sweep done"
    );

    match &conf.out_file {
        Some(path) => {
            let mut out_file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("creating {}", path))?;
            write_lines(&mut out_file, &conf, &report).await?;
        }
        None => write_lines(&mut tokio::io::stdout(), &conf, &report).await?,
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    let conf = load_configuration(&args).await?;

    sweep(conf).await
}

#[cfg(test)]
mod test {
    use super::*;
    use tokio_icmp_echo::{Completion, EchoError, EchoResult};

    #[tokio::test]
    async fn output_is_one_json_line_per_host() {
        let conf = Configuration::decode(
            br#"{"targets": ["a", "b"], "ping": {"timeout": {"secs": 1, "nanos": 0}, "size": 8, "count": 1}}"#,
        )
        .unwrap();
        let report = FanOutReport {
            reports: vec![
                HostReport {
                    index: 0,
                    addr: "a".into(),
                    outcome: Ok(vec![EchoResult::success(1, 64, 3)]),
                },
                HostReport {
                    index: 1,
                    addr: "b".into(),
                    outcome: Err(EchoError::Aborted("stopped".into())),
                },
            ],
            abandoned: vec!["c".into()],
            completion: Completion::Cancelled,
        };

        let mut out = vec![];
        write_lines(&mut out, &conf, &report).await.unwrap();
        let lines: Vec<serde_json::Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0]["targets"], json!(["a", "b"]));
        assert_eq!(lines[1]["results"][0]["ttl"], 64);
        assert_eq!(lines[1]["results"][0]["time_ms"], 3);
        assert!(lines[2]["error"].as_str().unwrap().contains("stopped"));
        assert_eq!(lines[3], json!({ "addr": "c", "abandoned": true }));
        assert_eq!(
            lines[4],
            json!({ "completion": "Cancelled", "reachable": 1, "reported": 2, "abandoned": 1 })
        );
    }
}
