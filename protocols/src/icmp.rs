use anyhow::Context;
use pnet::packet::Packet;
use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet::packet::icmp::{IcmpCode, IcmpPacket, IcmpTypes, checksum};

use crate::quoted::{self, QuotedDatagram};

pub const ECHO_HDR_LEN: usize = 8;
const ECHO_PAYLOAD: &[u8] = b"sweepr-echo-probe";

/// What an incoming ICMP message means for an outstanding probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpMessage {
    EchoReply { identifier: u16, sequence: u16 },
    /// Destination unreachable or time exceeded, carrying the head of the
    /// datagram that triggered it.
    Error { icmp_type: u8, quoted: QuotedDatagram },
    Other { icmp_type: u8 },
}

pub fn create_echo_request(identifier: u16, sequence: u16) -> anyhow::Result<Vec<u8>> {
    let mut buffer: Vec<u8> = vec![0u8; ECHO_HDR_LEN + ECHO_PAYLOAD.len()];
    {
        let mut echo = MutableEchoRequestPacket::new(&mut buffer)
            .context("creating icmp echo request")?;
        echo.set_icmp_type(IcmpTypes::EchoRequest);
        echo.set_icmp_code(IcmpCode(0));
        echo.set_identifier(identifier);
        echo.set_sequence_number(sequence);
        echo.set_payload(ECHO_PAYLOAD);

        echo.set_checksum(0);
        let echo_imm = echo.to_immutable();
        let icmp_pkt = IcmpPacket::new(echo_imm.packet()).context("transforming echo request to icmp")?;
        let csm = checksum(&icmp_pkt);
        echo.set_checksum(csm);
    }
    Ok(buffer)
}

pub fn parse_message(bytes: &[u8]) -> anyhow::Result<IcmpMessage> {
    let icmp = IcmpPacket::new(bytes).context("truncated or invalid ICMP packet")?;
    let icmp_type = icmp.get_icmp_type();

    if icmp_type == IcmpTypes::EchoReply {
        let reply = EchoReplyPacket::new(bytes).context("truncated echo reply")?;
        return Ok(IcmpMessage::EchoReply {
            identifier: reply.get_identifier(),
            sequence: reply.get_sequence_number(),
        });
    }

    if icmp_type == IcmpTypes::DestinationUnreachable || icmp_type == IcmpTypes::TimeExceeded {
        let quoted = quoted::parse(icmp.payload())?;
        return Ok(IcmpMessage::Error {
            icmp_type: icmp_type.0,
            quoted,
        });
    }

    Ok(IcmpMessage::Other {
        icmp_type: icmp_type.0,
    })
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
