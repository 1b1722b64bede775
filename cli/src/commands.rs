pub mod ports;
pub mod scan;
pub mod sweep;

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use sweepr_common::config::ScanConfig;
use sweepr_common::network::ports::PortRange;
use sweepr_common::warn;
use sweepr_core::{ProgressSink, RawTransport, Scanner};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "sweepr")]
#[command(about = "Ping sweep a network, then SYN scan every host that answers.")]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,

    /// How long to wait for each reply, in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Probes in flight at once (defaults to the number of CPUs)
    #[arg(short, long, global = true)]
    pub workers: Option<usize>,

    /// Less output; repeat to print bare results only
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub quiet: u8,

    /// Hide the live progress bar
    #[arg(long, global = true)]
    pub no_progress: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find live hosts with an ICMP echo sweep
    #[command(alias = "w")]
    Sweep {
        /// Network address, optionally with a /prefix
        network: String,
        /// Dotted netmask, e.g. 255.255.255.0
        mask: Option<String>,
    },
    /// Sweep a network, then SYN scan every live host
    #[command(alias = "s")]
    Scan {
        network: String,
        mask: Option<String>,
        /// Ports to probe, e.g. 22,80,8000-8080
        #[arg(short, long)]
        ports: Option<PortRange>,
    },
    /// SYN scan a single host without sweeping first
    #[command(alias = "p")]
    Ports {
        host: Ipv4Addr,
        #[arg(short, long)]
        ports: Option<PortRange>,
    },
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Engine settings from the flags, with defaults for anything not given.
    pub fn scan_config(&self) -> ScanConfig {
        let mut cfg = ScanConfig::default();
        if let Some(ms) = self.timeout {
            cfg.timeout = Duration::from_millis(ms);
        }
        if let Some(workers) = self.workers {
            cfg.workers = workers;
        }
        if let Commands::Scan { ports: Some(ports), .. } | Commands::Ports { ports: Some(ports), .. } =
            &self.command
        {
            cfg.ports = ports.clone();
        }
        cfg
    }
}

/// Validates `scan_cfg`, opens the raw sockets and wires up a scanner.
pub fn build_scanner(
    scan_cfg: &ScanConfig,
    progress: ProgressSink,
    cancel: CancellationToken,
) -> anyhow::Result<Scanner> {
    scan_cfg.validate()?;

    if !is_root::is_root() {
        warn!("Not running as root, raw sockets will probably be refused");
    }

    let transport: RawTransport = RawTransport::open().context("failed to open raw sockets")?;
    let scanner: Scanner = Scanner::new(Arc::new(transport), scan_cfg)?
        .with_progress(progress)
        .with_cancellation(cancel);

    Ok(scanner)
}
