//! `deposit-orchestrator` — the CLI wrapper around the Deposit Processing
//! Core. Minimal by design (§6): each subcommand invokes exactly one of
//! C6/C7/C8 and exits; `serve` runs the periodic reconcilers continuously.
//! The heavy lifting lives in `deposit-core`; this binary only wires it to
//! concrete collaborators and a configuration surface.

mod args;
mod config;
mod fs_store;
mod fs_transport;
mod logging;
mod manifest_assembler;
mod wiring;

use anyhow::Context;
use args::{Args, Command};
use deposit_core::{run_deposit_updater_once, run_submission_status_updater_once};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();

    match run(args).await {
        Ok(()) => Ok(()),
        Err(err) => {
            eprintln!("FATAL ERROR: {err:?}");
            std::process::exit(1);
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = args.resolve_config().context("failed to resolve runtime configuration")?;
    let logging_config = args.resolve_logging(&config);
    let _log_guard = logging::init(&logging_config);

    let wiring = wiring::assemble(&config).context("failed to wire up the orchestrator")?;

    let wiring::Wiring {
        store,
        submission_processor,
        deposit_updater,
        submission_status_updater,
        worker_pool,
        failure_rx,
        critical_locks,
        critical_config,
    } = wiring;

    let failure_handler =
        tokio::spawn(async move { deposit_core::run_failure_channel(store.as_ref(), &critical_locks, failure_rx, critical_config).await });

    match args.command {
        Command::ProcessSubmission(cmd) => {
            let id = deposit_primitives::ResourceId::from_str(cmd.id);
            info!(%id, "processing submission");
            submission_processor.process(id).await;
        }
        Command::UpdateDeposits(cmd) => {
            let ids = args::deposit_ids(&cmd.id);
            let scope = if ids.is_empty() { None } else { Some(ids.as_slice()) };
            let summary = run_deposit_updater_once(
                deposit_updater.store.as_ref(),
                &deposit_updater.locks,
                &deposit_updater.critical_config,
                deposit_updater.config_registry.as_ref(),
                deposit_updater.status_fetcher.as_ref(),
                scope,
            )
            .await;
            info!(scanned = summary.scanned, advanced = summary.advanced, "deposit reconciliation pass complete");
        }
        Command::UpdateSubmissions(_) => {
            let summary = run_submission_status_updater_once(
                submission_status_updater.store.as_ref(),
                &submission_status_updater.locks,
                &submission_status_updater.critical_config,
                None,
            )
            .await;
            info!(scanned = summary.scanned, advanced = summary.advanced, "submission status reconciliation pass complete");
        }
        Command::Serve(_) => {
            info!("starting periodic reconcilers; press ctrl-c to stop");
            let deposits = tokio::spawn(deposit_updater.run());
            let submissions = tokio::spawn(submission_status_updater.run());

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("received shutdown signal");
                }
                result = deposits => {
                    error!(?result, "deposit updater loop exited unexpectedly");
                }
                result = submissions => {
                    error!(?result, "submission status updater loop exited unexpectedly");
                }
            }
        }
    }

    // Dropping the submission processor (and its cloned FailureReporter)
    // closes the failure channel once the pool drains, letting the handler
    // task observe `None` and return on its own.
    drop(submission_processor);
    match std::sync::Arc::try_unwrap(worker_pool) {
        Ok(pool) => pool.shutdown().await,
        Err(pool) => {
            // Still shared (e.g. a `serve` loop holds no reference itself,
            // but a clone escaped some other way); nothing left to drain
            // against, just let it drop.
            drop(pool);
        }
    }
    let _ = failure_handler.await;

    Ok(())
}
