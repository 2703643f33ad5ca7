use crag_core::db::EntityStore;
use crag_core::models::{Area, Blocking, Path, Sector, Zone};
use crag_core::{CatalogService, Entity, EntityKind};
use serde_json::Value;

use crate::cli::{FavoriteCommands, KindArg};
use crate::commands::common::{entity_to_list_item, CliContext, Describe};
use crate::error::CliError;

pub async fn run_favorite(ctx: &CliContext, command: FavoriteCommands) -> Result<(), CliError> {
    let catalog = ctx.open_catalog().await?;
    match command {
        FavoriteCommands::Add { kind, id } => set_favorite(&catalog, kind.into(), id, true).await,
        FavoriteCommands::Remove { kind, id } => {
            set_favorite(&catalog, kind.into(), id, false).await
        }
        FavoriteCommands::List { kind, json } => list_favorites(&catalog, kind, json).await,
    }
}

async fn set_favorite(
    catalog: &CatalogService,
    kind: EntityKind,
    id: i64,
    favorite: bool,
) -> Result<(), CliError> {
    if favorite && !catalog.ids(kind).await?.contains(&id) {
        return Err(CliError::NotFound(format!("{kind} {id}")));
    }
    catalog.set_favorite(kind, id, favorite).await?;
    if favorite {
        println!("Bookmarked {kind} {id}");
    } else {
        println!("Removed bookmark for {kind} {id}");
    }
    Ok(())
}

async fn list_favorites(
    catalog: &CatalogService,
    kind: Option<KindArg>,
    as_json: bool,
) -> Result<(), CliError> {
    let kinds = kind.map_or_else(
        || vec![KindArg::Area, KindArg::Zone, KindArg::Sector, KindArg::Path, KindArg::Block],
        |kind| vec![kind],
    );

    let mut items = Vec::new();
    for kind in kinds {
        match kind {
            KindArg::Area => collect::<Area>(catalog, &mut items).await?,
            KindArg::Zone => collect::<Zone>(catalog, &mut items).await?,
            KindArg::Sector => collect::<Sector>(catalog, &mut items).await?,
            KindArg::Path => collect::<Path>(catalog, &mut items).await?,
            KindArg::Block => collect::<Blocking>(catalog, &mut items).await?,
        }
    }

    if as_json {
        let values = items.into_iter().map(|(_, value)| value).collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&values)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("No favorites yet.");
        return Ok(());
    }
    for (line, _) in items {
        println!("{line}");
    }
    Ok(())
}

async fn collect<E: Entity + Describe>(
    catalog: &CatalogService,
    items: &mut Vec<(String, Value)>,
) -> Result<(), CliError> {
    for entity in catalog.favorites::<E>().await? {
        let line = format!("{:<7} {:>8}  {}", E::KIND, entity.id(), entity.describe());
        items.push((line, serde_json::to_value(entity_to_list_item(&entity))?));
    }
    Ok(())
}
