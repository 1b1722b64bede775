//! The "quoted" datagram inside ICMP error messages.
//!
//! Routers and hosts that reject a probe send back an ICMP error carrying the
//! original IP header plus at least the first 8 bytes of its payload. That is
//! enough to recover the echo identifier or the TCP port pair, which is how a
//! rejection is tied back to the probe that caused it.

use std::net::Ipv4Addr;

use anyhow::{Context, ensure};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;

/// Bytes between the ICMP checksum and the quoted IP header.
const ERROR_PREAMBLE_LEN: usize = 4;
const QUOTED_PAYLOAD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotedDatagram {
    pub destination: Ipv4Addr,
    pub probe: QuotedProbe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotedProbe {
    Echo { identifier: u16, sequence: u16 },
    Tcp { source_port: u16, destination_port: u16 },
    Other,
}

/// Parses the payload of an ICMP error, starting right after the checksum.
pub fn parse(icmp_payload: &[u8]) -> anyhow::Result<QuotedDatagram> {
    ensure!(
        icmp_payload.len() > ERROR_PREAMBLE_LEN,
        "icmp error too short to quote a datagram"
    );
    let ip_bytes = &icmp_payload[ERROR_PREAMBLE_LEN..];
    let ipv4 = Ipv4Packet::new(ip_bytes).context("truncated or invalid quoted IPv4 header")?;

    let header_len = usize::from(ipv4.get_header_length()) * 4;
    let inner = ip_bytes
        .get(header_len..header_len + QUOTED_PAYLOAD_LEN)
        .context("quoted datagram lacks its first 8 payload bytes")?;

    let probe = match ipv4.get_next_level_protocol() {
        IpNextHeaderProtocols::Icmp => QuotedProbe::Echo {
            identifier: u16::from_be_bytes([inner[4], inner[5]]),
            sequence: u16::from_be_bytes([inner[6], inner[7]]),
        },
        IpNextHeaderProtocols::Tcp => QuotedProbe::Tcp {
            source_port: u16::from_be_bytes([inner[0], inner[1]]),
            destination_port: u16::from_be_bytes([inner[2], inner[3]]),
        },
        _ => QuotedProbe::Other,
    };

    Ok(QuotedDatagram {
        destination: ipv4.get_destination(),
        probe,
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
