//! Packet construction and reply parsing for the two probes the engine sends:
//! ICMP echo requests and bare TCP SYN segments.
//!
//! Everything here is pure byte work on top of `pnet`; opening sockets and
//! matching replies to probes happens in `sweepr-core`.

pub mod icmp;
pub mod quoted;
pub mod tcp;
