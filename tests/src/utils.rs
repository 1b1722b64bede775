use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sweepr_core::{ProbeSender, ProbeTask, RawReply};
use tokio_util::sync::CancellationToken;

const ECHO_REPLY: u8 = 0;
const SYN_ACK: u8 = 0x12;
const RST_ACK: u8 = 0x14;

/// A fake network for driving the engine without raw sockets.
///
/// Hosts listed with `host` answer pings; their ports answer SYN+ACK or RST
/// as configured. Anything else times out, i.e. returns `None` right away.
#[derive(Default)]
pub struct ScriptedNetwork {
    alive: HashSet<Ipv4Addr>,
    ports: HashMap<(Ipv4Addr, u16), u8>,
    panics_on: HashSet<ProbeTask>,
    cancel_after: Option<(usize, CancellationToken)>,
    latency: Duration,
    waits_out_silence: bool,
    log: Mutex<Vec<ProbeTask>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, addr: Ipv4Addr) -> Self {
        self.alive.insert(addr);
        self
    }

    pub fn open(mut self, addr: Ipv4Addr, ports: &[u16]) -> Self {
        for port in ports {
            self.ports.insert((addr, *port), SYN_ACK);
        }
        self
    }

    pub fn closed(mut self, addr: Ipv4Addr, ports: &[u16]) -> Self {
        for port in ports {
            self.ports.insert((addr, *port), RST_ACK);
        }
        self
    }

    /// Makes the sender panic while handling `task`.
    pub fn panics_on(mut self, task: ProbeTask) -> Self {
        self.panics_on.insert(task);
        self
    }

    pub fn cancel_after(mut self, probes: usize, cancel: CancellationToken) -> Self {
        self.cancel_after = Some((probes, cancel));
        self
    }

    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Silent probes sleep for the full timeout instead of returning at once,
    /// the way a real sender waits for a reply that never comes.
    pub fn waits_out_silence(mut self) -> Self {
        self.waits_out_silence = true;
        self
    }

    pub fn probes(&self) -> Vec<ProbeTask> {
        self.log.lock().unwrap().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProbeSender for ScriptedNetwork {
    async fn send(&self, task: &ProbeTask, timeout: Duration) -> Option<RawReply> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let sent = {
            let mut log = self.log.lock().unwrap();
            log.push(*task);
            log.len()
        };
        if let Some((limit, cancel)) = &self.cancel_after {
            if sent >= *limit {
                cancel.cancel();
            }
        }

        if self.latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.latency).await;
        }

        if self.panics_on.contains(task) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            panic!("scripted failure for {task:?}");
        }

        let reply = match *task {
            ProbeTask::Echo { target } if self.alive.contains(&target) => {
                Some(RawReply::Icmp { icmp_type: ECHO_REPLY })
            }
            ProbeTask::Syn { target, port } if self.alive.contains(&target) => self
                .ports
                .get(&(target, port))
                .map(|flags| RawReply::Tcp { flags: *flags }),
            _ => None,
        };

        if reply.is_none() && self.waits_out_silence {
            tokio::time::sleep(timeout).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}
