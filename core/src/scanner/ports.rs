use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use sweepr_common::network::ports::PortRange;
use tracing::{debug, warn};

use crate::pool::PoolSummary;
use crate::probe::{ProbeOutcome, ProbeTask};
use crate::progress::{Phase, ScanEvent};

use super::Scanner;

impl Scanner {
    /// Sends one SYN per port in `ports` to `host` and returns the ports that
    /// answered SYN+ACK.
    pub async fn scan_ports(&self, host: Ipv4Addr, ports: &PortRange) -> BTreeSet<u16> {
        let phase = Phase::Ports(host);
        let total: usize = ports.len();
        self.progress.emit(ScanEvent::PhaseStarted { phase, total });
        debug!(%host, total, "starting port scan");

        let tasks: Vec<ProbeTask> = ports
            .iter()
            .map(|port| ProbeTask::Syn { target: host, port })
            .collect();
        let mut open_ports: BTreeSet<u16> = BTreeSet::new();
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

                if let ProbeOutcome::Open(addr, port) = outcome
                    && open_ports.insert(port)
                {
                    debug!(%addr, port, "port is open");
                    self.progress.emit(ScanEvent::PortOpen(addr, port));
                }
            })
            .await;

        if summary.cancelled {
            warn!(
                "port scan of {host} cancelled after {} of {total} ports",
                summary.completed
            );
        }

        self.progress.emit(ScanEvent::PhaseFinished {
            phase,
            found: open_ports.len(),
        });
        open_ports
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::tests::ScriptedSender;
    use std::sync::Arc;
    use sweepr_common::config::ScanConfig;

    const HOST: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 1);

    fn scanner(sender: Arc<ScriptedSender>) -> Scanner {
        let cfg = ScanConfig {
            workers: 4,
            ..ScanConfig::default()
        };
        Scanner::new(sender, &cfg).unwrap()
    }

    #[tokio::test]
    async fn only_syn_ack_ports_are_reported() {
        let sender = Arc::new(
            ScriptedSender::new()
                .open(HOST, [80])
                .closed(HOST, [22]),
        );
        let ports: PortRange = "22,80,443".parse().unwrap();

        let open = scanner(sender.clone()).scan_ports(HOST, &ports).await;

        assert_eq!(open, BTreeSet::from([80]));
        assert_eq!(sender.syn_count(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn default_range_is_probed_once_per_port() {
        let sender = Arc::new(ScriptedSender::new().open(HOST, [21, 22, 1023, 1024]));
        let ports = PortRange::default();

        let open = scanner(sender.clone()).scan_ports(HOST, &ports).await;

        assert_eq!(sender.syn_count(), 1023);
        assert_eq!(sender.distinct_tasks(), 1023);
        assert!(open.iter().all(|port| ports.contains(*port)));
        assert_eq!(open, BTreeSet::from([21, 22, 1023]));
    }
}
