use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use sweepr_common::network::range::NetworkRange;
use tracing::{debug, warn};

use crate::pool::PoolSummary;
use crate::probe::{ProbeOutcome, ProbeTask};
use crate::progress::{Phase, ScanEvent};

use super::Scanner;

impl Scanner {
    /// Sends one ICMP echo to every usable address of `range` and returns
    /// the addresses that answered.
    pub async fn sweep(&self, range: &NetworkRange) -> BTreeSet<Ipv4Addr> {
        let phase = Phase::Sweep;
        let total: usize = range.len();
        self.progress.emit(ScanEvent::PhaseStarted { phase, total });
        debug!(%range, total, workers = self.workers(), "starting ping sweep");

        let tasks = range.hosts().map(|target| ProbeTask::Echo { target });
        let mut live_hosts: BTreeSet<Ipv4Addr> = BTreeSet::new();
        let mut completed: usize = 0;

        let summary: PoolSummary = self
            .pool
            .run_all(tasks, self.probe_fn(), |outcome| {
                completed += 1;
                self.progress.emit(ScanEvent::Progress {
                    phase,
                    completed,
                    total,
                });

                if let ProbeOutcome::Alive(addr) = outcome
                    && live_hosts.insert(addr)
                {
                    debug!(%addr, "host is online");
                    self.progress.emit(ScanEvent::HostAlive(addr));
                }
            })
            .await;

        if summary.cancelled {
            warn!(
                "sweep cancelled after {} of {total} addresses",
                summary.completed
            );
        }

        self.progress.emit(ScanEvent::PhaseFinished {
            phase,
            found: live_hosts.len(),
        });
        live_hosts
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
