mod commands;
mod terminal;

use commands::{CommandLine, Commands, ports, scan, sweep};
use sweepr_common::config::{Config, ScanConfig};
use sweepr_common::{error, warn};
use terminal::{print, progress};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    progress::init_logging();

    let cfg = Config {
        quiet: commands.quiet,
        no_progress: commands.no_progress,
    };
    let scan_cfg: ScanConfig = commands.scan_config();

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    let outcome: anyhow::Result<()> = match commands.command {
        Commands::Sweep { network, mask } => {
            print::header("starting ping sweep", cfg.quiet);
            sweep::sweep(&network, mask.as_deref(), &scan_cfg, &cfg, cancel).await
        }
        Commands::Scan { network, mask, .. } => {
            print::header("starting scanner", cfg.quiet);
            scan::scan(&network, mask.as_deref(), &scan_cfg, &cfg, cancel).await
        }
        Commands::Ports { host, .. } => {
            print::header("starting port scan", cfg.quiet);
            ports::ports(host, &scan_cfg, &cfg, cancel).await
        }
    };

    if let Err(e) = outcome {
        error!("{e:#}");
        std::process::exit(1);
    }
    Ok(())
}

fn cancel_on_interrupt(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, waiting for probes in flight to finish...");
            cancel.cancel();
        }
    });
}
