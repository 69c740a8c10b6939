use std::time::Duration;

use chrono::Local;
use tokio::sync::watch;
use tracing::{error, info, warn};

use super::run::{pass, print_summary};
use crate::PassArgs;

/// Run a pass, sleep, repeat. Passes run one at a time on the blocking
/// pool; Ctrl-C ends the loop after the current pass.
pub async fn watch(args: PassArgs, interval_secs: u64) -> anyhow::Result<()> {
    let interval = Duration::from_secs(interval_secs);
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    info!(interval_secs, fleet = %args.fleet.display(), "watch started");

    loop {
        let pass_args = args.clone();
        let result = tokio::task::spawn_blocking(move || pass(&pass_args, Local::now())).await;
        match result {
            Ok(Ok(runs)) => {
                print_summary(&runs);
                if runs.iter().any(|run| !run.is_success()) {
                    warn!("pass finished with failures");
                }
            }
            Ok(Err(e)) => error!(error = %e, "pass failed"),
            Err(e) => error!(error = %e, "pass did not complete"),
        }

        if *shutdown_rx.borrow() {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown_rx.changed() => break,
        }
    }

    info!("watch stopped");
    Ok(())
}
