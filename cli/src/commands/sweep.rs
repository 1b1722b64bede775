use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use colored::*;
use sweepr_common::config::{Config, ScanConfig};
use sweepr_common::network::range::NetworkRange;
use sweepr_common::{info, success, warn};
use sweepr_core::ProgressSink;
use tokio_util::sync::CancellationToken;

use crate::commands;
use crate::mprint;
use crate::terminal::{colors, print, progress};

pub async fn sweep(
    network: &str,
    mask: Option<&str>,
    scan_cfg: &ScanConfig,
    cfg: &Config,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let range: NetworkRange = NetworkRange::from_parts(network, mask)?;

    let (sink, events) = ProgressSink::channel(progress::EVENT_BUFFER);
    let scanner = commands::build_scanner(scan_cfg, sink, cancel.clone())?;
    let reporter = progress::spawn(events, cfg);

    info!(
        "Sweeping {range} ({} addresses) with {} workers",
        range.len(),
        scanner.workers()
    );

    let start_time: Instant = Instant::now();
    let live_hosts: BTreeSet<Ipv4Addr> = scanner.sweep(&range).await;
    drop(scanner);
    let _ = reporter.await;

    if cancel.is_cancelled() {
        warn!("Sweep was interrupted, the host list below is incomplete");
    }

    sweep_ends(&live_hosts, start_time.elapsed(), cfg);
    Ok(())
}

fn sweep_ends(live_hosts: &BTreeSet<Ipv4Addr>, total_time: Duration, cfg: &Config) {
    if live_hosts.is_empty() {
        print::header("zero hosts detected", cfg.quiet);
        print::no_results();
        return;
    }

    if cfg.quiet > 0 {
        mprint!();
    }

    print::header("ping sweep", cfg.quiet);
    for (idx, host) in live_hosts.iter().enumerate() {
        match cfg.quiet {
            2 => print::print(&host.to_string()),
            _ => print::tree_head(idx, &host.to_string().color(colors::IPV4_ADDR).to_string()),
        }
    }
    print_summary(live_hosts.len(), total_time, cfg);
}

fn print_summary(hosts_len: usize, total_time: Duration, cfg: &Config) {
    let active_hosts: ColoredString = format!("{hosts_len} live hosts").bold().green();
    let total_time: ColoredString = format!("{:.2}s", total_time.as_secs_f64()).bold().yellow();
    let output: ColoredString =
        format!("Sweep Complete: {active_hosts} found in {total_time}").color(colors::TEXT_DEFAULT);

    match cfg.quiet {
        0 => {
            print::fat_separator();
            print::centerln(&output.to_string());
        }
        _ => {
            mprint!();
            success!("{}", output)
        }
    }
}
