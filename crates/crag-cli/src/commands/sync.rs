use crag_core::sync::SyncStep;
use crag_core::{Error, SyncEngine, SyncOutcome};
use tokio_util::sync::CancellationToken;

use crate::commands::common::CliContext;
use crate::error::CliError;

pub async fn run_sync(ctx: &CliContext, force: bool, retries: u32) -> Result<(), CliError> {
    let api = ctx.api_client()?;
    let catalog = ctx.open_catalog().await?;
    let engine = SyncEngine::new(catalog, api);
    let cancel = CancellationToken::new();

    let mut status = engine.subscribe();
    let printer = tokio::spawn(async move {
        let mut last_step: Option<SyncStep> = None;
        while status.changed().await.is_ok() {
            let Some(progress) = status.borrow_and_update().progress else {
                continue;
            };
            if last_step != Some(progress.step) || progress.progress == progress.max {
                eprintln!("{progress}");
                last_step = Some(progress.step);
            }
        }
    });

    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Stopping after the current record...");
                cancel.cancel();
            }
        })
    };

    let result = engine.sync_with_retries(force, retries, &cancel).await;
    interrupt.abort();
    drop(engine);
    printer.await.ok();

    match result {
        Ok(SyncOutcome::Completed(report)) => {
            println!("Sync completed: {report}");
            if report.skipped > 0 {
                println!("Run `crag config init --api-key KEY` to push local edits.");
            }
            Ok(())
        }
        Ok(SyncOutcome::AlreadyUpToDate) => {
            println!("Catalog already up to date");
            Ok(())
        }
        Ok(SyncOutcome::AlreadyRunning) => {
            println!("Another sync is already running");
            Ok(())
        }
        Err(Error::Cancelled) => Err(CliError::Interrupted),
        Err(error) => Err(error.into()),
    }
}
