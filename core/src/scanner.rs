//! The scan orchestrator.
//!
//! A [`Scanner`] owns the probe sender, the worker pool and the progress sink
//! and drives the two phases in order: one sweep over the whole range, then
//! one port scan per live host. Port scans run one host at a time, so at most
//! one phase worth of probes is ever in flight.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use sweepr_common::ConfigError;
use sweepr_common::config::ScanConfig;
use sweepr_common::network::{ports::PortRange, range::NetworkRange};
use sweepr_common::result::ScanResult;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span};

use crate::error::ScanError;
use crate::network::sender::{ProbeSender, probe};
use crate::pool::WorkerPool;
use crate::probe::{ProbeOutcome, ProbeTask};
use crate::progress::ProgressSink;

mod ports;
mod sweep;

pub struct Scanner {
    sender: Arc<dyn ProbeSender>,
    pool: WorkerPool,
    timeout: Duration,
    progress: ProgressSink,
}

impl Scanner {
    pub fn new(sender: Arc<dyn ProbeSender>, cfg: &ScanConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            sender,
            pool: WorkerPool::new(cfg.workers),
            timeout: cfg.timeout,
            progress: ProgressSink::disabled(),
        })
    }

    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    /// Ties the scan to `cancel`. Once it fires no new probes are sent;
    /// probes already in flight finish or time out on their own.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.pool = self.pool.with_cancellation(cancel);
        self
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.pool.cancellation().clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.pool.is_cancelled()
    }

    pub fn workers(&self) -> usize {
        self.pool.size()
    }

    /// Full two-phase scan of `range`.
    ///
    /// Every live host becomes a key of the result, even when none of `ports`
    /// is open on it.
    pub async fn run(
        &self,
        range: &NetworkRange,
        ports: &PortRange,
    ) -> Result<ScanResult, ScanError> {
        let live_hosts: BTreeSet<Ipv4Addr> = self
            .sweep(range)
            .instrument(info_span!("sweep", %range))
            .await;

        let mut result = ScanResult::new();
        if self.is_cancelled() {
            for host in live_hosts {
                result.insert_host(host, BTreeSet::new());
            }
            return Err(ScanError::Cancelled { partial: result });
        }

        debug!(live = live_hosts.len(), "sweep finished, scanning ports");
        self.scan_each(live_hosts, ports, &mut result).await?;
        Ok(result)
    }

    /// Port scan of a single host, skipping the sweep.
    pub async fn scan_host(
        &self,
        host: Ipv4Addr,
        ports: &PortRange,
    ) -> Result<ScanResult, ScanError> {
        let mut result = ScanResult::new();
        self.scan_each([host], ports, &mut result).await?;
        Ok(result)
    }

    async fn scan_each<I>(
        &self,
        hosts: I,
        ports: &PortRange,
        result: &mut ScanResult,
    ) -> Result<(), ScanError>
    where
        I: IntoIterator<Item = Ipv4Addr>,
    {
        for host in hosts {
            let open_ports: BTreeSet<u16> = self
                .scan_ports(host, ports)
                .instrument(info_span!("ports", %host))
                .await;
            result.insert_host(host, open_ports);

            if self.is_cancelled() {
                return Err(ScanError::Cancelled {
                    partial: std::mem::take(result),
                });
            }
        }
        Ok(())
    }

    /// The closure every pool worker runs: send one probe, classify the reply.
    fn probe_fn(
        &self,
    ) -> impl Fn(ProbeTask) -> BoxFuture<'static, ProbeOutcome> + Send + Sync + use<> {
        let sender: Arc<dyn ProbeSender> = self.sender.clone();
        let timeout: Duration = self.timeout;
        move |task: ProbeTask| {
            let sender = sender.clone();
            async move { probe(sender.as_ref(), task, timeout).await }.boxed()
        }
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
