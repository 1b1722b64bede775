//! Raw layer-4 transport shared by every probe in the process.
//!
//! Two pnet channels are opened once: one for ICMP, one for TCP. Sending is
//! serialized through a mutex per channel, but only for the `send_to` call
//! itself. Each channel has a listener thread that matches incoming packets to
//! the probe waiting for them and wakes it through a oneshot, so any number of
//! probes can wait out their timeouts at the same time.
//!
//! Opening the channels needs `CAP_NET_RAW` (or root). That failure is the
//! only one surfaced as an error; everything that goes wrong per probe ends
//! up as "no reply".

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use pnet::packet::{
    Packet,
    icmp::{IcmpPacket, IcmpTypes},
    ip::IpNextHeaderProtocols,
    tcp::TcpPacket,
};
use pnet::transport::{
    self,
    TransportChannelType,
    TransportProtocol,
    TransportReceiver,
    TransportSender,
};
use sweepr_common::ConfigError;
use sweepr_protocols::{
    icmp::{self, IcmpMessage},
    quoted::QuotedProbe,
    tcp,
};
use tokio::sync::oneshot;
use tracing::debug;

use crate::network::sender::ProbeSender;
use crate::probe::{ProbeTask, RawReply};

const TRANSPORT_BUFFER_SIZE: usize = 4096;
const CHANNEL_TYPE_ICMP: TransportChannelType =
    TransportChannelType::Layer4(TransportProtocol::Ipv4(IpNextHeaderProtocols::Icmp));
const CHANNEL_TYPE_TCP: TransportChannelType =
    TransportChannelType::Layer4(TransportProtocol::Ipv4(IpNextHeaderProtocols::Tcp));

const LISTEN_POLL: Duration = Duration::from_millis(250);
const LOCAL_PORT_BASE: u16 = 40_000;
const LOCAL_PORT_SPAN: u32 = 20_000;
const REGISTER_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Copy)]
enum TransportType {
    IcmpLayer4,
    TcpLayer4,
}

/// Identity of an outstanding probe as seen in its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ProbeKey {
    Echo {
        target: Ipv4Addr,
        sequence: u16,
    },
    Syn {
        target: Ipv4Addr,
        remote_port: u16,
        local_port: u16,
    },
}

struct Pending {
    expected_ack: Option<u32>,
    reply_tx: oneshot::Sender<Option<RawReply>>,
}

#[derive(Default)]
struct Waiters {
    pending: Mutex<HashMap<ProbeKey, Pending>>,
}

impl Waiters {
    /// Returns `None` when the key is already taken.
    fn register(
        &self,
        key: ProbeKey,
        expected_ack: Option<u32>,
    ) -> Option<oneshot::Receiver<Option<RawReply>>> {
        let mut pending = self.pending.lock().ok()?;
        if pending.contains_key(&key) {
            return None;
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        pending.insert(key, Pending { expected_ack, reply_tx });
        Some(reply_rx)
    }

    /// Wakes the probe waiting on `key`. A TCP acknowledgement number that
    /// does not match the probe's ISN + 1 is ignored.
    fn resolve(&self, key: &ProbeKey, ack: Option<u32>, reply: Option<RawReply>) {
        let Ok(mut pending) = self.pending.lock() else {
            return;
        };

        let accepted = match (pending.get(key), ack) {
            (Some(Pending { expected_ack: Some(expected), .. }), Some(ack)) => *expected == ack,
            (Some(_), _) => true,
            (None, _) => false,
        };

        if accepted && let Some(waiter) = pending.remove(key) {
            let _ = waiter.reply_tx.send(reply);
        }
    }

    fn forget(&self, key: &ProbeKey) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(key);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }
}

macro_rules! spawn_listener {
    ($rx:expr, $iter_func:path, $running:expr, $handler:expr) => {{
        let mut rx = $rx;
        let running = $running;
        let handler = $handler;
        std::thread::spawn(move || {
            let mut iterator = $iter_func(&mut rx);
            while running.load(Ordering::Relaxed) {
                match iterator.next_with_timeout(LISTEN_POLL) {
                    Ok(Some((packet, IpAddr::V4(source)))) => handler(packet.packet(), source),
                    Ok(_) => {}
                    Err(e) => debug!("raw receive failed: {e}"),
                }
            }
        })
    }};
}

pub struct RawTransport {
    icmp_tx: Arc<Mutex<TransportSender>>,
    tcp_tx: Arc<Mutex<TransportSender>>,
    waiters: Arc<Waiters>,
    identifier: u16,
    sequence: AtomicU16,
    local_ports: AtomicU32,
    source_addrs: Mutex<HashMap<Ipv4Addr, Ipv4Addr>>,
    running: Arc<AtomicBool>,
}

impl RawTransport {
    /// Opens both raw channels and starts their listeners.
    pub fn open() -> Result<Self, ConfigError> {
        let (icmp_tx, icmp_rx) = open_channel(TransportType::IcmpLayer4)?;
        let (tcp_tx, tcp_rx) = open_channel(TransportType::TcpLayer4)?;

        let waiters: Arc<Waiters> = Arc::new(Waiters::default());
        let running: Arc<AtomicBool> = Arc::new(AtomicBool::new(true));
        let identifier: u16 = rand::random();

        let icmp_waiters = waiters.clone();
        spawn_listener!(
            icmp_rx,
            transport::icmp_packet_iter,
            running.clone(),
            move |bytes: &[u8], source: Ipv4Addr| handle_icmp(&icmp_waiters, identifier, bytes, source)
        );

        let tcp_waiters = waiters.clone();
        spawn_listener!(
            tcp_rx,
            transport::tcp_packet_iter,
            running.clone(),
            move |bytes: &[u8], source: Ipv4Addr| handle_tcp(&tcp_waiters, bytes, source)
        );

        debug!(identifier, "raw transport ready");

        Ok(Self {
            icmp_tx: Arc::new(Mutex::new(icmp_tx)),
            tcp_tx: Arc::new(Mutex::new(tcp_tx)),
            waiters,
            identifier,
            sequence: AtomicU16::new(rand::random()),
            local_ports: AtomicU32::new(rand::random_range(0..LOCAL_PORT_SPAN)),
            source_addrs: Mutex::new(HashMap::new()),
            running,
        })
    }

    async fn exchange(&self, task: &ProbeTask, timeout: Duration) -> Option<RawReply> {
        let target: Ipv4Addr = task.target();
        let isn: u32 = rand::random();
        let expected_ack: Option<u32> = task.port().map(|_| isn.wrapping_add(1));

        let (key, reply_rx) = self.register(task, expected_ack)?;

        let sent = match key {
            ProbeKey::Echo { sequence, .. } => self.send_echo(target, sequence).await,
            ProbeKey::Syn { remote_port, local_port, .. } => {
                self.send_syn(target, local_port, remote_port, isn).await
            }
        };

        if let Err(e) = sent {
            debug!(%target, "probe not sent: {e:#}");
            self.waiters.forget(&key);
            return None;
        }

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_closed)) => None,
            Err(_elapsed) => {
                self.waiters.forget(&key);
                None
            }
        }
    }

    fn register(
        &self,
        task: &ProbeTask,
        expected_ack: Option<u32>,
    ) -> Option<(ProbeKey, oneshot::Receiver<Option<RawReply>>)> {
        for _ in 0..REGISTER_ATTEMPTS {
            let key = match *task {
                ProbeTask::Echo { target } => ProbeKey::Echo {
                    target,
                    sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
                },
                ProbeTask::Syn { target, port } => ProbeKey::Syn {
                    target,
                    remote_port: port,
                    local_port: self.next_local_port(),
                },
            };
            if let Some(reply_rx) = self.waiters.register(key, expected_ack) {
                return Some((key, reply_rx));
            }
        }
        debug!(?task, "no free probe identity");
        None
    }

    fn next_local_port(&self) -> u16 {
        let offset = self.local_ports.fetch_add(1, Ordering::Relaxed) % LOCAL_PORT_SPAN;
        LOCAL_PORT_BASE + offset as u16
    }

    async fn send_echo(&self, target: Ipv4Addr, sequence: u16) -> anyhow::Result<()> {
        let bytes: Vec<u8> = icmp::create_echo_request(self.identifier, sequence)?;
        transmit(self.icmp_tx.clone(), bytes, target, TransportType::IcmpLayer4).await
    }

    async fn send_syn(
        &self,
        target: Ipv4Addr,
        local_port: u16,
        remote_port: u16,
        isn: u32,
    ) -> anyhow::Result<()> {
        let source: Ipv4Addr = self
            .source_addr_for(target)
            .with_context(|| format!("no local route towards {target}"))?;
        let bytes: Vec<u8> = tcp::create_syn_packet(source, target, local_port, remote_port, isn)?;
        transmit(self.tcp_tx.clone(), bytes, target, TransportType::TcpLayer4).await
    }

    /// The address the kernel would use to reach `target`, needed for the
    /// TCP checksum pseudo-header. Cached per target.
    fn source_addr_for(&self, target: Ipv4Addr) -> Option<Ipv4Addr> {
        if let Some(addr) = self.source_addrs.lock().ok()?.get(&target) {
            return Some(*addr);
        }
        let addr = route_source_addr(target)?;
        self.source_addrs.lock().ok()?.insert(target, addr);
        Some(addr)
    }
}

impl Drop for RawTransport {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

#[async_trait]
impl ProbeSender for RawTransport {
    async fn send(&self, task: &ProbeTask, timeout: Duration) -> Option<RawReply> {
        self.exchange(task, timeout).await
    }
}

fn open_channel(transport_type: TransportType) -> Result<(TransportSender, TransportReceiver), ConfigError> {
    let channel_type: TransportChannelType = match transport_type {
        TransportType::IcmpLayer4 => CHANNEL_TYPE_ICMP,
        TransportType::TcpLayer4 => CHANNEL_TYPE_TCP,
    };
    transport::transport_channel(TRANSPORT_BUFFER_SIZE, channel_type)
        .map_err(ConfigError::from_channel_error)
}

async fn transmit(
    tx: Arc<Mutex<TransportSender>>,
    bytes: Vec<u8>,
    target: Ipv4Addr,
    transport_type: TransportType,
) -> anyhow::Result<()> {
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let destination = IpAddr::V4(target);
        let mut sender = tx.lock().map_err(|_| anyhow!("transport sender lock poisoned"))?;
        match transport_type {
            TransportType::IcmpLayer4 => {
                let packet = IcmpPacket::new(&bytes).context("creating icmp packet")?;
                sender.send_to(packet, destination)?;
            }
            TransportType::TcpLayer4 => {
                let packet = TcpPacket::new(&bytes).context("creating tcp packet")?;
                sender.send_to(packet, destination)?;
            }
        }
        Ok(())
    })
    .await??;
    Ok(())
}

fn route_source_addr(target: Ipv4Addr) -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((target, 53)).ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(addr) => Some(addr),
        IpAddr::V6(_) => None,
    }
}

fn handle_icmp(waiters: &Waiters, identifier: u16, bytes: &[u8], source: Ipv4Addr) {
    let Ok(message) = icmp::parse_message(bytes) else {
        return;
    };

    match message {
        IcmpMessage::EchoReply { identifier: id, sequence } if id == identifier => {
            let key = ProbeKey::Echo { target: source, sequence };
            let reply = RawReply::Icmp {
                icmp_type: IcmpTypes::EchoReply.0,
            };
            waiters.resolve(&key, None, Some(reply));
        }
        IcmpMessage::Error { icmp_type, quoted } => {
            let key = match quoted.probe {
                QuotedProbe::Echo { identifier: id, sequence } if id == identifier => ProbeKey::Echo {
                    target: quoted.destination,
                    sequence,
                },
                QuotedProbe::Tcp { source_port, destination_port } => ProbeKey::Syn {
                    target: quoted.destination,
                    remote_port: destination_port,
                    local_port: source_port,
                },
                _ => return,
            };
            debug!(%source, icmp_type, target = %quoted.destination, "probe rejected by the network");
            waiters.resolve(&key, None, None);
        }
        _ => {}
    }
}

fn handle_tcp(waiters: &Waiters, bytes: &[u8], source: Ipv4Addr) {
    let Ok(segment) = tcp::summarize(bytes) else {
        return;
    };
    let key = ProbeKey::Syn {
        target: source,
        remote_port: segment.source_port,
        local_port: segment.destination_port,
    };
    let reply = RawReply::Tcp {
        flags: segment.flags,
    };
    waiters.resolve(&key, Some(segment.acknowledgement), Some(reply));
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
