use std::time::{Duration, Instant};

use colored::*;
use sweepr_common::config::{Config, ScanConfig};
use sweepr_common::network::range::NetworkRange;
use sweepr_common::result::ScanResult;
use sweepr_common::{info, success, warn};
use sweepr_core::{ProgressSink, ScanError};
use tokio_util::sync::CancellationToken;

use crate::commands;
use crate::mprint;
use crate::terminal::{colors, print, progress};

type Detail = (String, ColoredString);

pub async fn scan(
    network: &str,
    mask: Option<&str>,
    scan_cfg: &ScanConfig,
    cfg: &Config,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let range: NetworkRange = NetworkRange::from_parts(network, mask)?;

    let (sink, events) = ProgressSink::channel(progress::EVENT_BUFFER);
    let scanner = commands::build_scanner(scan_cfg, sink, cancel)?;
    let reporter = progress::spawn(events, cfg);

    info!(
        "Scanning {range} ({} addresses), ports {} with {} workers",
        range.len(),
        scan_cfg.ports,
        scanner.workers()
    );

    let start_time: Instant = Instant::now();
    let outcome = scanner.run(&range, &scan_cfg.ports).await;
    drop(scanner);
    let _ = reporter.await;

    let result: ScanResult = settle(outcome)?;
    report(&result, start_time.elapsed(), cfg);
    Ok(())
}

/// Unwraps a scan outcome, keeping whatever a cancelled scan managed to find.
pub fn settle(outcome: Result<ScanResult, ScanError>) -> anyhow::Result<ScanResult> {
    match outcome {
        Ok(result) => Ok(result),
        Err(ScanError::Cancelled { partial }) => {
            warn!("Scan was interrupted, results below are partial");
            Ok(partial)
        }
        Err(e) => Err(e.into()),
    }
}

/// Prints the host to open-ports tree followed by a summary line.
pub fn report(result: &ScanResult, total_time: Duration, cfg: &Config) {
    if result.is_empty() {
        print::header("zero hosts detected", cfg.quiet);
        print::no_results();
        return;
    }

    if cfg.quiet > 0 {
        mprint!();
    }

    print::header("scan results", cfg.quiet);
    for (idx, (host, ports)) in result.iter().enumerate() {
        match cfg.quiet {
            2 => {
                let joined: String = ports.iter().map(u16::to_string).collect::<Vec<_>>().join(",");
                print::print(&format!("{host} {joined}"));
            }
            _ => {
                print::tree_head(idx, &host.to_string().color(colors::IPV4_ADDR).to_string());
                print::as_tree_one_level(port_details(ports.iter().copied()));
                if idx + 1 != result.len() {
                    mprint!();
                }
            }
        }
    }
    print_summary(result, total_time, cfg);
}

fn port_details(ports: impl ExactSizeIterator<Item = u16>) -> Vec<Detail> {
    if ports.len() == 0 {
        return vec![("Ports".to_string(), "none open".dimmed())];
    }
    ports
        .map(|port| ("Port".to_string(), format!("{port}/tcp open").color(colors::PORT)))
        .collect()
}

fn print_summary(result: &ScanResult, total_time: Duration, cfg: &Config) {
    let hosts: ColoredString = format!("{} hosts", result.len()).bold().green();
    let ports: ColoredString = format!("{} open ports", result.open_port_count()).bold().green();
    let total_time: ColoredString = format!("{:.2}s", total_time.as_secs_f64()).bold().yellow();
    let output: ColoredString =
        format!("Scan Complete: {ports} on {hosts} in {total_time}").color(colors::TEXT_DEFAULT);

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
