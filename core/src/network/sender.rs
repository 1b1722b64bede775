use std::time::Duration;

use async_trait::async_trait;

use crate::probe::{self, ProbeOutcome, ProbeTask, RawReply};

/// Sends one probe and waits for the reply that belongs to it.
///
/// Implementations must give up after `timeout`, must not retransmit, and
/// must report every network-level failure as `None`, the same as silence.
#[async_trait]
pub trait ProbeSender: Send + Sync {
    async fn send(&self, task: &ProbeTask, timeout: Duration) -> Option<RawReply>;
}

/// Sends `task` and classifies whatever came back.
pub async fn probe(sender: &dyn ProbeSender, task: ProbeTask, timeout: Duration) -> ProbeOutcome {
    let reply: Option<RawReply> = sender.send(&task, timeout).await;
    probe::classify(&task, reply)
}
