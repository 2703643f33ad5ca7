use crag_core::models::{Area, Blocking, Path, Sector, Zone};
use crag_core::{EntityKind, Error};

use crate::cli::KindArg;
use crate::commands::common::CliContext;
use crate::error::CliError;

pub async fn run_delete(ctx: &CliContext, kind: KindArg, id: i64) -> Result<(), CliError> {
    let catalog = ctx.open_catalog().await?;
    let result = match kind {
        KindArg::Area => catalog.remove::<Area>(id).await,
        KindArg::Zone => catalog.remove::<Zone>(id).await,
        KindArg::Sector => catalog.remove::<Sector>(id).await,
        KindArg::Path => catalog.remove::<Path>(id).await,
        KindArg::Block => catalog.remove::<Blocking>(id).await,
    };

    let kind = EntityKind::from(kind);
    match result {
        Ok(tombstones) => {
            println!(
                "Deleted {kind} {id}; {} deletions will be sent on the next sync",
                tombstones.len()
            );
            Ok(())
        }
        Err(Error::NotFound(_)) => Err(CliError::NotFound(format!("{kind} {id}"))),
        Err(error) => Err(error.into()),
    }
}
