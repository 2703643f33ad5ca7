use std::collections::HashSet;

use crag_core::db::EntityStore;
use crag_core::models::{Area, Blocking, Path, Sector, Zone};
use crag_core::{CatalogService, Entity, FileId};

use crate::cli::FileCommands;
use crate::commands::common::{parse_file_id, CliContext};
use crate::error::CliError;

pub async fn run_file(ctx: &CliContext, command: FileCommands) -> Result<(), CliError> {
    match command {
        FileCommands::Fetch {
            id,
            width,
            permanent,
        } => run_fetch(ctx, &id, width, permanent).await,
        FileCommands::RefreshAll { width } => run_refresh_all(ctx, width).await,
        FileCommands::Evict { id, permanent } => run_evict(ctx, &id, permanent).await,
    }
}

async fn run_fetch(
    ctx: &CliContext,
    id: &str,
    width: Option<u32>,
    permanent: bool,
) -> Result<(), CliError> {
    let file_id = parse_file_id(id)?;
    let files = ctx.open_files().await?;
    let width = ctx.image_width(width);

    if permanent {
        let path = files
            .make_permanent(file_id, width)
            .await?
            .ok_or_else(|| CliError::NotFound(format!("file {file_id}")))?;
        println!("{}", path.display());
        return Ok(());
    }

    let outcome = files
        .refresh(file_id, width, |done, total| {
            eprint!("\r{} / {}", format_bytes(done), format_bytes(total));
        })
        .await?
        .ok_or_else(|| CliError::NotFound(format!("file {file_id}")))?;
    if outcome.downloaded {
        eprintln!();
    } else {
        tracing::debug!("File {file_id} unchanged");
    }
    println!("{}", outcome.path.display());
    Ok(())
}

async fn run_refresh_all(ctx: &CliContext, width: Option<u32>) -> Result<(), CliError> {
    let catalog = ctx.open_catalog().await?;
    let files = ctx.open_files().await?;

    let mut file_ids = HashSet::new();
    collect_file_ids::<Area>(&catalog, &mut file_ids).await?;
    collect_file_ids::<Zone>(&catalog, &mut file_ids).await?;
    collect_file_ids::<Sector>(&catalog, &mut file_ids).await?;
    collect_file_ids::<Path>(&catalog, &mut file_ids).await?;
    collect_file_ids::<Blocking>(&catalog, &mut file_ids).await?;

    let total = file_ids.len();
    let summary = files
        .refresh_all(file_ids, ctx.image_width(width))
        .await;
    println!(
        "{total} files: {} downloaded, {} unchanged, {} removed, {} failed",
        summary.downloaded, summary.unchanged, summary.removed, summary.failed
    );
    Ok(())
}

async fn run_evict(ctx: &CliContext, id: &str, permanent: bool) -> Result<(), CliError> {
    let file_id = parse_file_id(id)?;
    let files = ctx.open_files().await?;
    files.evict(file_id).await?;
    if permanent {
        files.delete_permanent(file_id).await?;
    }
    println!("Evicted {file_id}");
    Ok(())
}

/// Collect the valid file ids referenced by every stored record of `E`;
/// empty or malformed references are skipped.
async fn collect_file_ids<E: Entity>(
    catalog: &CatalogService,
    file_ids: &mut HashSet<FileId>,
) -> Result<(), CliError> {
    for entity in catalog.get_all::<E>().await? {
        file_ids.extend(
            entity
                .file_ids()
                .into_iter()
                .filter_map(|id| id.trim().parse::<FileId>().ok()),
        );
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let value = bytes as f64;
    if value < KIB {
        format!("{bytes} B")
    } else if value < KIB * KIB {
        format!("{:.1} KiB", value / KIB)
    } else {
        format!("{:.1} MiB", value / (KIB * KIB))
    }
}
