//! ICMP echo (ping) over raw IPv4 sockets, and a worker pool pinging many
//! hosts at once.
//!
//! Raw sockets need root or `CAP_NET_RAW`. Without it every session fails
//! with [`EchoError::Socket`].
//!
//! ```rust,no_run
//! use tokio_icmp_echo::{ping, EchoConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), tokio_icmp_echo::EchoError> {
//!     for result in ping(EchoConfig::new("192.168.1.1").with_count(4)).await? {
//!         println!("{:?}", result);
//!     }
//!     Ok(())
//! }
//! ```

pub mod configuration;
pub mod engine;
pub mod fan_out;
pub mod ping;

pub use configuration::{EchoConfig, FanOutConfig, Payload};
pub use engine::{ping, ping_blocking, ping_once, Connector, RawSocketConnector};
pub use fan_out::{Completion, FanOut, FanOutReport, HostReport};
pub use ping::{AttemptError, EchoError, EchoResult, ProtocolError};
