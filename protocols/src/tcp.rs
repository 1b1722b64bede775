use std::net::Ipv4Addr;

use anyhow::Context;
use pnet::packet::tcp::{MutableTcpPacket, TcpFlags, TcpPacket, ipv4_checksum};

pub const TCP_HDR_LEN: usize = 20;
const SYN_WINDOW: u16 = 1024;

/// Fields of a reply segment needed to match it to a probe and classify it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSummary {
    pub source_port: u16,
    pub destination_port: u16,
    pub acknowledgement: u32,
    pub flags: u8,
}

/// Builds a bare SYN segment (no options, no payload).
///
/// The source address is only used for the checksum pseudo-header; the
/// kernel writes the IP header.
pub fn create_syn_packet(
    src_addr: Ipv4Addr,
    dst_addr: Ipv4Addr,
    src_port: u16,
    dst_port: u16,
    sequence: u32,
) -> anyhow::Result<Vec<u8>> {
    let mut buffer: Vec<u8> = vec![0u8; TCP_HDR_LEN];
    {
        let mut tcp = MutableTcpPacket::new(&mut buffer).context("creating tcp packet")?;
        tcp.set_source(src_port);
        tcp.set_destination(dst_port);
        tcp.set_sequence(sequence);
        tcp.set_acknowledgement(0);
        tcp.set_data_offset(5);
        tcp.set_flags(TcpFlags::SYN);
        tcp.set_window(SYN_WINDOW);
        tcp.set_urgent_ptr(0);

        tcp.set_checksum(0);
        let csm = ipv4_checksum(&tcp.to_immutable(), &src_addr, &dst_addr);
        tcp.set_checksum(csm);
    }
    Ok(buffer)
}

pub fn summarize(bytes: &[u8]) -> anyhow::Result<SegmentSummary> {
    let tcp = TcpPacket::new(bytes).context("truncated or invalid TCP segment")?;
    Ok(SegmentSummary {
        source_port: tcp.get_source(),
        destination_port: tcp.get_destination(),
        acknowledgement: tcp.get_acknowledgement(),
        flags: tcp.get_flags(),
    })
}

pub fn is_syn_ack(flags: u8) -> bool {
    let syn_ack = TcpFlags::SYN | TcpFlags::ACK;
    flags & syn_ack == syn_ack
}

pub fn is_rst(flags: u8) -> bool {
    flags & TcpFlags::RST != 0
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
