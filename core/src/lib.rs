//! The `sweepr` discovery engine.
//!
//! A scan runs in two phases: an ICMP echo sweep over a [`NetworkRange`] to
//! find live hosts, then a TCP SYN probe of a [`PortRange`] on each live host.
//! Both phases push their probes through the same bounded [`WorkerPool`] and
//! fold the outcomes in a single reduction loop, so the accumulators are never
//! touched by more than one task.
//!
//! The [`Scanner`] orchestrates the phases; [`ProbeSender`] is the seam
//! between the engine and the network, implemented for real by
//! [`RawTransport`].
//!
//! [`NetworkRange`]: sweepr_common::network::range::NetworkRange
//! [`PortRange`]: sweepr_common::network::ports::PortRange

pub mod error;
pub mod network;
pub mod pool;
pub mod probe;
pub mod progress;
pub mod scanner;

pub use error::ScanError;
pub use network::sender::ProbeSender;
pub use network::transport::RawTransport;
pub use pool::{Job, PoolSummary, WorkerPool};
pub use probe::{ProbeOutcome, ProbeTask, RawReply};
pub use progress::{Phase, ProgressSink, ScanEvent};
pub use scanner::Scanner;
