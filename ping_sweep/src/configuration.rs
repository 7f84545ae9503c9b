use crate::internet::{parse_subnet, subnet_hosts};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_icmp_echo::{EchoConfig, FanOutConfig, Payload};

#[derive(Parser, Debug)]
#[command(name = "ping_sweep", about = "Ping every host of a subnet (needs root or CAP_NET_RAW)")]
pub struct Args {
    /// JSON configuration file, command line flags are ignored when given
    #[arg(long)]
    pub config: Option<String>,
    /// Subnet to sweep, e.g. 192.168.1.0/24
    #[arg(long, default_value = "192.168.1.0/24")]
    pub subnet: String,
    /// Extra hosts to ping, names or addresses
    #[arg(long = "target")]
    pub targets: Vec<String>,
    /// Echo requests per host
    #[arg(long, default_value_t = 1)]
    pub count: u16,
    /// Payload size in bytes
    #[arg(long, default_value_t = 32)]
    pub size: usize,
    /// Milliseconds to wait for each reply
    #[arg(long, default_value_t = 5000)]
    pub timeout: u64,
    /// Hosts pinged at the same time
    #[arg(long, default_value_t = 64)]
    pub parallelism: usize,
    /// Give up on the whole sweep after this many seconds
    #[arg(long)]
    pub deadline: Option<u64>,
    /// JSON lines output, stdout when absent
    #[arg(long)]
    pub out_file: Option<String>,
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingConfiguration {
    pub timeout: Duration,
    pub size: usize,
    pub count: u16,
    #[serde(default)]
    pub ttl: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub subnet: Option<String>,
    #[serde(default)]
    pub targets: Vec<String>,
    pub ping: PingConfiguration,
    #[serde(default)]
    pub fan_out: FanOutConfig,
    #[serde(default)]
    pub out_file: Option<String>,
}

impl Configuration {
    pub fn from_args(args: &Args) -> Self {
        Self {
            subnet: Some(args.subnet.clone()),
            targets: args.targets.clone(),
            ping: PingConfiguration {
                timeout: Duration::from_millis(args.timeout),
                size: args.size,
                count: args.count,
                ttl: None,
            },
            fan_out: FanOutConfig {
                parallelism: args.parallelism,
                deadline: args.deadline.map(Duration::from_secs),
            },
            out_file: args.out_file.clone(),
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// One echo configuration per host, subnet hosts first.
    pub fn targets(&self) -> Result<Vec<EchoConfig>, String> {
        let mut addrs = vec![];
        if let Some(subnet) = &self.subnet {
            let (base, prefix) = parse_subnet(subnet)?;
            if prefix < 16 {
                return Err(format!("Refusing to sweep /{}, use /16 or longer", prefix));
            }
            addrs.extend(subnet_hosts(base, prefix)?.map(|ip| ip.to_string()));
        }
        addrs.extend(self.targets.iter().cloned());

        Ok(addrs
            .into_iter()
            .map(|addr| {
                let mut conf = EchoConfig::new(addr)
                    .with_count(self.ping.count)
                    .with_payload(Payload::Length(self.ping.size))
                    .with_timeout(self.ping.timeout);
                conf.ttl = self.ping.ttl;
                conf
            })
            .collect())
    }
}
