use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::configuration::{EchoConfig, FanOutConfig};
use crate::engine::{self, Connector, RawSocketConnector};
use crate::ping::{EchoError, EchoResult};

/// Everything one host's session produced.
#[derive(Debug)]
pub struct HostReport {
    /// Position of the host in the target list.
    pub index: usize,
    pub addr: String,
    pub outcome: Result<Vec<EchoResult>, EchoError>,
}

impl HostReport {
    /// At least one attempt got its reply.
    pub fn is_reachable(&self) -> bool {
        matches!(&self.outcome, Ok(results) if results.iter().any(|r| r.success))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Completion {
    /// Every host reported.
    Finished,
    DeadlineExceeded,
    Cancelled,
}

#[derive(Debug)]
pub struct FanOutReport {
    /// Reports sorted by host index.
    pub reports: Vec<HostReport>,
    /// Hosts still running or never started when the join was abandoned.
    pub abandoned: Vec<String>,
    pub completion: Completion,
}

/// Worker pool pinging many hosts, one session per host.
///
/// At most `parallelism` sessions are open at once; the next host starts as
/// soon as a report comes back. Without a deadline the join waits for every
/// host, so a session that never returns stalls it. Sessions still running
/// when the join is abandoned are left to finish on their own attempt
/// deadlines.
pub struct FanOut<C = RawSocketConnector> {
    connector: Arc<C>,
    config: FanOutConfig,
    cancel: CancellationToken,
}

impl FanOut<RawSocketConnector> {
    pub fn new(config: FanOutConfig) -> Self {
        Self::with_connector(config, RawSocketConnector)
    }
}

impl<C: Connector> FanOut<C> {
    pub fn with_connector(config: FanOutConfig, connector: C) -> Self {
        Self {
            connector: Arc::new(connector),
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Cancelling the token makes `run` return with what it has.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self, targets: Vec<EchoConfig>) -> Result<FanOutReport, EchoError> {
        self.config.validate()?;
        let parallelism = self.config.parallelism;
        // deadline <= MAX_DEADLINE, checked by validate
        let deadline = self.config.deadline.map(|d| Instant::now() + d);
        let total = targets.len();

        // Setup result channel
        let (tx, mut rx) = mpsc::channel(parallelism);
        let mut queue = targets.into_iter().enumerate();
        let mut running = BTreeMap::new();

        // Start first batch
        for (index, config) in queue.by_ref().take(parallelism) {
            running.insert(index, config.addr.clone());
            tokio::spawn(run_session(
                Arc::clone(&self.connector),
                index,
                config,
                tx.clone(),
            ));
        }
        debug!(total, parallelism, "fan-out started");

        let mut reports = Vec::with_capacity(total);
        let completion = loop {
            if running.is_empty() {
                break Completion::Finished;
            }
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break Completion::Cancelled,
                _ = wait_until(deadline) => break Completion::DeadlineExceeded,
                report = rx.recv() => {
                    // The coordinator holds a sender, the channel cannot close.
                    let report = match report {
                        Some(report) => report,
                        None => break Completion::Finished,
                    };
                    running.remove(&report.index);
                    reports.push(report);

                    // Schedule next target
                    if let Some((index, config)) = queue.next() {
                        running.insert(index, config.addr.clone());
                        tokio::spawn(run_session(
                            Arc::clone(&self.connector),
                            index,
                            config,
                            tx.clone(),
                        ));
                    }
                }
            }
        };

        let abandoned: Vec<String> = running
            .into_values()
            .chain(queue.map(|(_, config)| config.addr))
            .collect();
        if !abandoned.is_empty() {
            warn!(?completion, abandoned = abandoned.len(), "fan-out join abandoned");
        }
        reports.sort_by_key(|r| r.index);
        Ok(FanOutReport {
            reports,
            abandoned,
            completion,
        })
    }
}

async fn run_session<C: Connector>(
    connector: Arc<C>,
    index: usize,
    config: EchoConfig,
    report_tx: mpsc::Sender<HostReport>,
) {
    let addr = config.addr.clone();
    let outcome = tokio::task::spawn_blocking(move || engine::probe(&*connector, &config))
        .await
        .unwrap_or_else(|e| Err(EchoError::Aborted(e.to_string())));
    if let Err(error) = &outcome {
        debug!(%addr, %error, "host failed");
    }
    let _ = report_tx
        .send(HostReport {
            index,
            addr,
            outcome,
        })
        .await;
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => futures::future::pending().await,
    }
}
