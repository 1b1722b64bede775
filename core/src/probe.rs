//! Probe tasks, raw replies and the classifier that turns one into an outcome.

use std::net::Ipv4Addr;

use sweepr_protocols::tcp;

use crate::pool::Job;

/// One unit of work for the pool: a single probe to a single target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeTask {
    Echo { target: Ipv4Addr },
    Syn { target: Ipv4Addr, port: u16 },
}

impl ProbeTask {
    pub fn target(&self) -> Ipv4Addr {
        match self {
            Self::Echo { target } | Self::Syn { target, .. } => *target,
        }
    }

    pub fn port(&self) -> Option<u16> {
        match self {
            Self::Echo { .. } => None,
            Self::Syn { port, .. } => Some(*port),
        }
    }
}

/// The part of a captured reply the classifier looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawReply {
    Icmp { icmp_type: u8 },
    Tcp { flags: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeOutcome {
    Alive(Ipv4Addr),
    Open(Ipv4Addr, u16),
    Closed(Ipv4Addr, u16),
    /// No usable reply before the timeout. For SYN probes this covers both
    /// filtered and silently dropped ports; it is not the same as `Closed`.
    Unreachable(Ipv4Addr, Option<u16>),
}

impl ProbeOutcome {
    pub fn unreachable(task: &ProbeTask) -> Self {
        Self::Unreachable(task.target(), task.port())
    }

    pub fn target(&self) -> Ipv4Addr {
        match self {
            Self::Alive(addr)
            | Self::Open(addr, _)
            | Self::Closed(addr, _)
            | Self::Unreachable(addr, _) => *addr,
        }
    }
}

impl Job for ProbeTask {
    type Output = ProbeOutcome;

    fn failed(&self) -> ProbeOutcome {
        ProbeOutcome::unreachable(self)
    }
}

/// Maps a probe and whatever came back for it onto exactly one outcome.
///
/// * echo: any reply means `Alive`, silence means `Unreachable`.
/// * SYN: SYN+ACK means `Open`, RST means `Closed`, silence or any other
///   flag combination means `Unreachable`.
pub fn classify(task: &ProbeTask, reply: Option<RawReply>) -> ProbeOutcome {
    match (task, reply) {
        (ProbeTask::Echo { target }, Some(_)) => ProbeOutcome::Alive(*target),
        (ProbeTask::Syn { target, port }, Some(RawReply::Tcp { flags })) => {
            if tcp::is_syn_ack(flags) {
                ProbeOutcome::Open(*target, *port)
            } else if tcp::is_rst(flags) {
                ProbeOutcome::Closed(*target, *port)
            } else {
                ProbeOutcome::unreachable(task)
            }
        }
        _ => ProbeOutcome::unreachable(task),
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
    use pnet::packet::tcp::TcpFlags;

    const HOST: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 1);

    #[test]
    fn echo_outcomes() {
        let task = ProbeTask::Echo { target: HOST };
        assert_eq!(
            classify(&task, Some(RawReply::Icmp { icmp_type: 0 })),
            ProbeOutcome::Alive(HOST)
        );
        assert_eq!(classify(&task, None), ProbeOutcome::Unreachable(HOST, None));
    }

    #[test]
    fn syn_outcomes() {
        let task = ProbeTask::Syn { target: HOST, port: 80 };
        let reply = |flags| Some(RawReply::Tcp { flags });

        assert_eq!(
            classify(&task, reply(TcpFlags::SYN | TcpFlags::ACK)),
            ProbeOutcome::Open(HOST, 80)
        );
        assert_eq!(
            classify(&task, reply(TcpFlags::RST | TcpFlags::ACK)),
            ProbeOutcome::Closed(HOST, 80)
        );
        assert_eq!(classify(&task, reply(TcpFlags::RST)), ProbeOutcome::Closed(HOST, 80));
        assert_eq!(classify(&task, None), ProbeOutcome::Unreachable(HOST, Some(80)));
    }

    #[test]
    fn unexpected_replies_stay_ambiguous() {
        let task = ProbeTask::Syn { target: HOST, port: 22 };
        assert_eq!(
            classify(&task, Some(RawReply::Tcp { flags: TcpFlags::ACK })),
            ProbeOutcome::Unreachable(HOST, Some(22))
        );
        assert_eq!(
            classify(&task, Some(RawReply::Icmp { icmp_type: 3 })),
            ProbeOutcome::Unreachable(HOST, Some(22))
        );
    }

    #[test]
    fn failed_job_reports_unreachable() {
        let task = ProbeTask::Syn { target: HOST, port: 443 };
        assert_eq!(task.failed(), ProbeOutcome::Unreachable(HOST, Some(443)));
        assert_eq!(task.failed().target(), HOST);
    }
}
