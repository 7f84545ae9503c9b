use rand::random;
use tracing::trace;

use crate::configuration::EchoConfig;
use crate::ping::{EchoError, EchoResult, EchoSession, EchoTransport, RawSocketTransport};

/// Opens sessions for the fan-out workers.
pub trait Connector: Send + Sync + 'static {
    type Transport: EchoTransport;

    fn connect(
        &self,
        config: &EchoConfig,
        identifier: u16,
    ) -> Result<EchoSession<Self::Transport>, EchoError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RawSocketConnector;

impl Connector for RawSocketConnector {
    type Transport = RawSocketTransport;

    fn connect(
        &self,
        config: &EchoConfig,
        identifier: u16,
    ) -> Result<EchoSession<RawSocketTransport>, EchoError> {
        EchoSession::open(&config.addr, identifier, config.ttl)
    }
}

/// Open, run and close one session. Blocks for up to `count` timeouts.
pub fn probe<C: Connector>(
    connector: &C,
    config: &EchoConfig,
) -> Result<Vec<EchoResult>, EchoError> {
    config.validate()?;
    let identifier = config.identifier.unwrap_or_else(random);
    if config.dont_fragment {
        trace!(addr = %config.addr, "don't-fragment left to the OS default");
    }

    let payload = config.payload.bytes();
    let mut session = connector.connect(config, identifier)?;
    let results = session.run(config.count, &payload, config.timeout);
    session.close();
    results
}

pub fn ping_blocking(config: &EchoConfig) -> Result<Vec<EchoResult>, EchoError> {
    probe(&RawSocketConnector, config)
}

/// Pings `config.addr` `config.count` times on the blocking pool.
///
/// Needs the privilege to open raw sockets.
pub async fn ping(config: EchoConfig) -> Result<Vec<EchoResult>, EchoError> {
    tokio::task::spawn_blocking(move || ping_blocking(&config))
        .await
        .map_err(|e| EchoError::Aborted(e.to_string()))?
}

/// One attempt with the default payload and timeout.
pub async fn ping_once(addr: impl Into<String>) -> Result<EchoResult, EchoError> {
    ping(EchoConfig::new(addr))
        .await?
        .pop()
        .ok_or_else(|| EchoError::Aborted("no attempt was made".into()))
}
