use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use sweepr_common::config::Config;
use sweepr_common::success;
use sweepr_core::{Phase, ScanEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use crate::terminal::{colors, logging::SweeprFormatter};

/// Events buffered between the engine and the bar before new ones are dropped.
pub const EVENT_BUFFER: usize = 1024;

/// The bar currently on screen, if any. Log lines go through it so they
/// don't tear the bar.
static ACTIVE: Mutex<Option<ProgressBar>> = Mutex::new(None);

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .event_format(SweeprFormatter)
        .with_env_filter(filter)
        .with_writer(|| ProgressWriter)
        .init();
}

/// Drains scan events into the progress bar and live result lines until the
/// sending side is dropped.
pub fn spawn(mut events: mpsc::Receiver<ScanEvent>, cfg: &Config) -> JoinHandle<()> {
    let show_bar: bool = !cfg.no_progress && cfg.quiet < 2;
    let live_lines: bool = cfg.quiet < 2;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ScanEvent::PhaseStarted { phase, total } => {
                    let bar = if show_bar {
                        new_bar(phase, total)
                    } else {
                        ProgressBar::hidden()
                    };
                    set_active(Some(bar));
                }
                ScanEvent::Progress { completed, .. } => {
                    if let Some(bar) = active() {
                        bar.set_position(completed as u64);
                    }
                }
                ScanEvent::HostAlive(addr) if live_lines => {
                    success!("Host {} is online.", addr.to_string().color(colors::IPV4_ADDR));
                }
                ScanEvent::PortOpen(addr, port) if live_lines => {
                    success!(
                        "Port {} is open on host {}",
                        port.to_string().color(colors::PORT),
                        addr.to_string().color(colors::IPV4_ADDR)
                    );
                }
                ScanEvent::PhaseFinished { .. } => {
                    if let Some(bar) = active() {
                        bar.finish_and_clear();
                    }
                    set_active(None);
                }
                _ => {}
            }
        }

        if let Some(bar) = active() {
            bar.finish_and_clear();
        }
        set_active(None);
    })
}

fn new_bar(phase: Phase, total: usize) -> ProgressBar {
    let label: String = match phase {
        Phase::Sweep => "Sweeping".to_string(),
        Phase::Ports(host) => format!("Scanning {host}"),
    };

    let pb = ProgressBar::new(total as u64);
    let style = ProgressStyle::with_template(
        "{spinner:.blue} {msg} [{bar:32.green/bright_black}] Scanning: {pos}/{len}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .tick_strings(&[
        "▁▁▁▁▁",
        "▁▂▂▂▁",
        "▁▄▂▄▁",
        "▂▄▆▄▂",
        "▄▆█▆▄",
        "▂▄▆▄▂",
        "▁▄▂▄▁",
        "▁▂▂▂▁",
    ])
    .progress_chars("━╸ ");

    pb.set_style(style);
    pb.set_message(label.color(colors::TEXT_DEFAULT).to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn active() -> Option<ProgressBar> {
    ACTIVE.lock().ok().and_then(|bar| bar.clone())
}

fn set_active(bar: Option<ProgressBar>) {
    if let Ok(mut slot) = ACTIVE.lock() {
        *slot = bar;
    }
}

/// Routes formatted log lines above the active bar, or straight to stdout
/// when no bar is showing.
pub struct ProgressWriter;

impl Write for ProgressWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match active() {
            Some(bar) if !bar.is_hidden() => {
                let msg = String::from_utf8_lossy(buf);
                bar.println(msg.trim_end());
                Ok(buf.len())
            }
            _ => std::io::stdout().write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stdout().flush()
    }
}
