//! Advisory progress events for whoever is watching a scan.
//!
//! Events go out with `try_send`: a slow or absent consumer loses events but
//! never slows the scan down, and nothing here feeds back into the results.

use std::net::Ipv4Addr;

use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Sweep,
    Ports(Ipv4Addr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    PhaseStarted { phase: Phase, total: usize },
    Progress { phase: Phase, completed: usize, total: usize },
    HostAlive(Ipv4Addr),
    PortOpen(Ipv4Addr, u16),
    PhaseFinished { phase: Phase, found: usize },
}

#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<mpsc::Sender<ScanEvent>>,
}

impl ProgressSink {
    pub fn new(tx: mpsc::Sender<ScanEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// A sink plus the receiving end, buffering up to `capacity` events.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ScanEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    pub fn emit(&self, event: ScanEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.try_send(event);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let (sink, mut rx) = ProgressSink::channel(1);
        sink.emit(ScanEvent::HostAlive(Ipv4Addr::new(10, 0, 0, 1)));
        sink.emit(ScanEvent::HostAlive(Ipv4Addr::new(10, 0, 0, 2)));

        assert_eq!(rx.try_recv().ok(), Some(ScanEvent::HostAlive(Ipv4Addr::new(10, 0, 0, 1))));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_or_disabled_sinks_are_silent() {
        let (sink, rx) = ProgressSink::channel(4);
        drop(rx);
        sink.emit(ScanEvent::PortOpen(Ipv4Addr::LOCALHOST, 22));

        ProgressSink::disabled().emit(ScanEvent::PhaseFinished {
            phase: Phase::Sweep,
            found: 0,
        });
    }
}
