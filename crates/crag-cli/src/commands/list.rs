use crag_core::models::{Area, Blocking, Path, Sector, Zone};
use crag_core::{CatalogService, Entity};

use crate::cli::KindArg;
use crate::commands::common::{entity_to_list_item, format_entity_lines, CliContext, Describe};
use crate::error::CliError;

pub async fn run_list(
    ctx: &CliContext,
    kind: KindArg,
    parent: Option<i64>,
    as_json: bool,
) -> Result<(), CliError> {
    let catalog = ctx.open_catalog().await?;
    match kind {
        KindArg::Area => print_list::<Area>(&catalog, parent, as_json).await,
        KindArg::Zone => print_list::<Zone>(&catalog, parent, as_json).await,
        KindArg::Sector => print_list::<Sector>(&catalog, parent, as_json).await,
        KindArg::Path => print_list::<Path>(&catalog, parent, as_json).await,
        KindArg::Block => print_list::<Blocking>(&catalog, parent, as_json).await,
    }
}

async fn print_list<E: Entity + Describe>(
    catalog: &CatalogService,
    parent: Option<i64>,
    as_json: bool,
) -> Result<(), CliError> {
    let entities = catalog.list::<E>(parent).await?;

    if as_json {
        let json_items = entities.iter().map(entity_to_list_item).collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_entity_lines(&entities) {
            println!("{line}");
        }
    }

    Ok(())
}
