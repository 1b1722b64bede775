use std::net::Ipv4Addr;
use std::time::Instant;

use sweepr_common::config::{Config, ScanConfig};
use sweepr_common::info;
use sweepr_common::result::ScanResult;
use sweepr_core::ProgressSink;
use tokio_util::sync::CancellationToken;

use crate::commands::{self, scan};
use crate::terminal::progress;

pub async fn ports(
    host: Ipv4Addr,
    scan_cfg: &ScanConfig,
    cfg: &Config,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let (sink, events) = ProgressSink::channel(progress::EVENT_BUFFER);
    let scanner = commands::build_scanner(scan_cfg, sink, cancel)?;
    let reporter = progress::spawn(events, cfg);

    info!("Probing {} ports on {host}", scan_cfg.ports.len());

    let start_time: Instant = Instant::now();
    let outcome = scanner.scan_host(host, &scan_cfg.ports).await;
    drop(scanner);
    let _ = reporter.await;

    let result: ScanResult = scan::settle(outcome)?;
    scan::report(&result, start_time.elapsed(), cfg);
    Ok(())
}
