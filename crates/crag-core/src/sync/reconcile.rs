//! Last-writer-wins merge of server records into the local store.

use std::collections::{BTreeSet, HashMap};

use tokio_util::sync::CancellationToken;

use crate::api::RemoteApi;
use crate::db::EntityStore;
use crate::error::{Error, Result};
use crate::models::{changed_fields, Entity, EntityKind};

use super::progress::{SyncProgress, SyncReport, SyncStep};

/// What to do with one server record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No local copy
    Insert,
    /// Same timestamp on both sides
    Unchanged,
    /// Server copy is newer
    UpdateLocal,
    /// Local copy is newer
    Push,
}

impl Decision {
    pub const fn decide(local_timestamp: Option<i64>, server_timestamp: i64) -> Self {
        match local_timestamp {
            None => Self::Insert,
            Some(local) if local == server_timestamp => Self::Unchanged,
            Some(local) if local < server_timestamp => Self::UpdateLocal,
            Some(_) => Self::Push,
        }
    }
}

/// State owned by a single run: the ids the server reported per kind, the
/// running totals and the cancellation token checked between records.
#[derive(Debug)]
pub struct SyncContext {
    seen: HashMap<EntityKind, BTreeSet<i64>>,
    report: SyncReport,
    cancel: CancellationToken,
}

impl SyncContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            seen: HashMap::new(),
            report: SyncReport::default(),
            cancel,
        }
    }

    pub fn mark_seen(&mut self, kind: EntityKind, id: i64) {
        self.seen.entry(kind).or_default().insert(id);
    }

    pub fn forget(&mut self, kind: EntityKind, id: i64) {
        if let Some(ids) = self.seen.get_mut(&kind) {
            ids.remove(&id);
        }
    }

    pub fn is_seen(&self, kind: EntityKind, id: i64) -> bool {
        self.seen.get(&kind).is_some_and(|ids| ids.contains(&id))
    }

    pub fn seen(&self, kind: EntityKind) -> BTreeSet<i64> {
        self.seen.get(&kind).cloned().unwrap_or_default()
    }

    pub const fn report(&self) -> &SyncReport {
        &self.report
    }

    pub(crate) fn report_mut(&mut self) -> &mut SyncReport {
        &mut self.report
    }

    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

/// Reconcile every server record of one kind, in order.
///
/// Records with a queued local deletion are marked seen but never restored.
/// Push failures are logged and counted; only store errors and cancellation
/// abort the level.
pub async fn reconcile_level<E, S, A>(
    store: &S,
    api: &A,
    ctx: &mut SyncContext,
    server_entities: &[E],
    on_progress: &mut impl FnMut(SyncProgress),
) -> Result<()>
where
    E: Entity,
    S: EntityStore,
    A: RemoteApi,
{
    let step = SyncStep::reconcile(E::KIND);
    let total = server_entities.len();
    tracing::info!("{step}: {total} records");
    on_progress(SyncProgress::new(step, 0, total));

    let tombstoned = store
        .pending_deletions(E::KIND)
        .await?
        .into_iter()
        .map(|deletion| deletion.delete_id)
        .collect::<BTreeSet<_>>();

    for (index, server) in server_entities.iter().enumerate() {
        ctx.check_cancelled()?;
        ctx.mark_seen(E::KIND, server.id());

        if tombstoned.contains(&server.id()) {
            tracing::debug!("{} {} is queued for deletion; not restoring", E::KIND, server.id());
            on_progress(SyncProgress::new(step, index + 1, total));
            continue;
        }

        let local = store.get::<E>(server.id()).await?;
        let local_timestamp = local.as_ref().map(Entity::timestamp);
        let decision = Decision::decide(local_timestamp, server.timestamp());
        tracing::debug!("{} {}: {decision:?}", E::KIND, server.id());

        match (decision, local) {
            (Decision::Insert, _) => {
                store.insert(server).await?;
                ctx.report_mut().inserted += 1;
            }
            (Decision::UpdateLocal, _) => {
                store.update(server).await?;
                ctx.report_mut().updated += 1;
            }
            (Decision::Push, Some(local)) => push(api, ctx, &local, server).await?,
            (Decision::Unchanged | Decision::Push, _) => {}
        }

        on_progress(SyncProgress::new(step, index + 1, total));
    }
    Ok(())
}

async fn push<E: Entity, A: RemoteApi>(
    api: &A,
    ctx: &mut SyncContext,
    local: &E,
    server: &E,
) -> Result<()> {
    let fields = changed_fields(local, server)?;
    if fields.is_empty() {
        tracing::debug!("{} {} is newer locally but has no field changes", E::KIND, local.id());
        return Ok(());
    }

    if !api.has_credential() {
        tracing::warn!(
            "Local changes to {} {} were not pushed: no API key is configured. \
             They may be lost if the server copy changes",
            E::KIND,
            local.id()
        );
        ctx.report_mut().skipped += 1;
        return Ok(());
    }

    match api.patch(E::KIND, local.id(), &fields).await {
        Ok(()) => {
            tracing::debug!("Pushed {} fields of {} {}", fields.len(), E::KIND, local.id());
            ctx.report_mut().pushed += 1;
        }
        Err(error) => {
            tracing::error!("Failed to push {} {}: {error}", E::KIND, local.id());
            ctx.report_mut().failed += 1;
        }
    }
    Ok(())
}
