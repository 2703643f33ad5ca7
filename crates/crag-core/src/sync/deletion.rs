//! Deletion propagation in both directions, children before parents.

use crate::api::RemoteApi;
use crate::db::EntityStore;
use crate::error::Result;
use crate::models::EntityKind;

use super::progress::{SyncProgress, SyncStep};
use super::reconcile::SyncContext;

/// Send queued tombstones to the server.
///
/// A confirmed deletion clears the tombstone and removes the id from the seen
/// set, so the inbound pass drops any copy the snapshot re-inserted.
pub async fn push_deletions<S: EntityStore, A: RemoteApi>(
    store: &S,
    api: &A,
    ctx: &mut SyncContext,
    on_progress: &mut impl FnMut(SyncProgress),
) -> Result<()> {
    for kind in EntityKind::DELETION_ORDER {
        let step = SyncStep::delete(kind);
        let pending = store.pending_deletions(kind).await?;
        if pending.is_empty() {
            continue;
        }
        tracing::info!("{step}: {} queued remote deletions", pending.len());
        on_progress(SyncProgress::new(step, 0, pending.len()));

        for (index, deletion) in pending.iter().enumerate() {
            ctx.check_cancelled()?;
            api.delete(kind, deletion.delete_id).await?;
            store.clear_deletion(deletion).await?;
            ctx.forget(kind, deletion.delete_id);
            ctx.report_mut().deleted_remote += 1;
            tracing::debug!("Server confirmed deletion of {kind} {}", deletion.delete_id);
            on_progress(SyncProgress::new(step, index + 1, pending.len()));
        }
    }
    Ok(())
}

/// Delete every local record the server did not report in this run.
///
/// Id 0 marks records never created remotely and is always kept.
pub async fn prune_unseen<S: EntityStore>(
    store: &S,
    ctx: &mut SyncContext,
    on_progress: &mut impl FnMut(SyncProgress),
) -> Result<()> {
    for kind in EntityKind::DELETION_ORDER {
        let step = SyncStep::delete(kind);
        let stale = store
            .ids(kind)
            .await?
            .into_iter()
            .filter(|id| *id != 0 && !ctx.is_seen(kind, *id))
            .collect::<Vec<_>>();
        on_progress(SyncProgress::new(step, 0, stale.len()));
        if stale.is_empty() {
            continue;
        }
        tracing::info!("{step}: {} records removed on the server", stale.len());

        for (index, id) in stale.iter().enumerate() {
            ctx.check_cancelled()?;
            store.delete(kind, *id).await?;
            ctx.report_mut().deleted_local += 1;
            on_progress(SyncProgress::new(step, index + 1, stale.len()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::{Area, Entity, LocalDeletion, Path};
    use crate::services::CatalogService;
    use crate::sync::fake::{sample_path, FakeApi};
    use pretty_assertions::assert_eq;
    use tokio_util::sync::CancellationToken;

    fn area(id: i64) -> Area {
        Area {
            id,
            timestamp: 1,
            display_name: format!("Area {id}"),
            web_url: String::new(),
            image: String::new(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unseen_local_entity_is_deleted_once() {
        let store = CatalogService::open_in_memory().await.unwrap();
        for id in [1, 2, 3, 5] {
            store.insert(&area(id)).await.unwrap();
        }
        let mut ctx = SyncContext::new(CancellationToken::new());
        for id in [1, 2, 3] {
            ctx.mark_seen(EntityKind::Area, id);
        }

        prune_unseen(&store, &mut ctx, &mut |_| {}).await.unwrap();
        assert_eq!(ctx.report().deleted_local, 1);
        assert_eq!(
            store.ids(EntityKind::Area).await.unwrap().into_iter().collect::<Vec<_>>(),
            vec![1, 2, 3]
        );

        prune_unseen(&store, &mut ctx, &mut |_| {}).await.unwrap();
        assert_eq!(ctx.report().deleted_local, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unsaved_records_survive_pruning() {
        let store = CatalogService::open_in_memory().await.unwrap();
        store.insert(&area(0)).await.unwrap();
        let mut ctx = SyncContext::new(CancellationToken::new());

        prune_unseen(&store, &mut ctx, &mut |_| {}).await.unwrap();
        assert!(store.get::<Area>(0).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_gone_clears_tombstone_without_error() {
        let store = CatalogService::open_in_memory().await.unwrap();
        let api = FakeApi::with_credential();
        api.delete_status(EntityKind::Path, 7, 410);
        let tombstone = LocalDeletion::new(EntityKind::Path, 7);
        store.notify_deletion(&tombstone).await.unwrap();

        let mut ctx = SyncContext::new(CancellationToken::new());
        ctx.mark_seen(EntityKind::Path, 7);
        push_deletions(&store, &api, &mut ctx, &mut |_| {}).await.unwrap();

        assert!(store.pending_deletions(EntityKind::Path).await.unwrap().is_empty());
        assert!(!ctx.is_seen(EntityKind::Path, 7));
        assert_eq!(ctx.report().deleted_remote, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rejected_deletion_keeps_tombstone() {
        let store = CatalogService::open_in_memory().await.unwrap();
        let api = FakeApi::with_credential();
        api.delete_status(EntityKind::Path, 7, 403);
        let tombstone = LocalDeletion::new(EntityKind::Path, 7);
        store.notify_deletion(&tombstone).await.unwrap();

        let mut ctx = SyncContext::new(CancellationToken::new());
        let err = push_deletions(&store, &api, &mut ctx, &mut |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, Error::RequestFailed { status: 403, .. }));
        assert_eq!(
            store.pending_deletions(EntityKind::Path).await.unwrap(),
            vec![tombstone]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_deletions_run_children_first() {
        let store = CatalogService::open_in_memory().await.unwrap();
        let api = FakeApi::with_credential();
        store
            .notify_deletion(&LocalDeletion::new(EntityKind::Area, 1))
            .await
            .unwrap();
        store
            .notify_deletion(&LocalDeletion::new(EntityKind::Path, 9))
            .await
            .unwrap();

        let mut ctx = SyncContext::new(CancellationToken::new());
        push_deletions(&store, &api, &mut ctx, &mut |_| {}).await.unwrap();

        assert_eq!(
            api.deletes(),
            vec![(EntityKind::Path, 9), (EntityKind::Area, 1)]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pruning_reports_each_kind() {
        let store = CatalogService::open_in_memory().await.unwrap();
        let path: Path = sample_path(4, 3, 1);
        store.insert(&path).await.unwrap();
        let mut ctx = SyncContext::new(CancellationToken::new());
        let mut steps = Vec::new();

        prune_unseen(&store, &mut ctx, &mut |progress| steps.push(progress)).await.unwrap();

        assert_eq!(steps.len(), EntityKind::ALL.len() + 1);
        assert_eq!(steps[1], SyncProgress::new(SyncStep::DeletePaths, 0, 1));
        assert_eq!(steps[2], SyncProgress::new(SyncStep::DeletePaths, 1, 1));
        assert!(store.get::<Path>(path.id()).await.unwrap().is_none());
    }
}
