// src/services/cleanup.rs

//! Background housekeeping: purging trashed documents past retention and
//! expired refresh tokens. Each sweep runs in its own loop and survives
//! failing iterations.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::db;
use crate::error::ServiceError;
use crate::models::AppState;
use crate::storage::{DocumentStorage, StorageError};
use crate::store::DocumentStore;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PurgeReport {
    pub due: usize,
    pub purged: u64,
    pub failed: usize,
}

/// Deletes files of documents trashed before `now - retention`, then the
/// rows of exactly those whose file went away. A file that is already
/// missing counts as gone; its row is only dropped if it still sits in the
/// trash at the path that was purged.
pub async fn purge_deleted_documents(
    store: &dyn DocumentStore,
    storage: &dyn DocumentStorage,
    now: DateTime<Utc>,
    retention: Duration,
    cancel: &CancellationToken,
) -> Result<PurgeReport, ServiceError> {
    let due: Vec<_> = store
        .deleted_before(now - retention)
        .await?
        .into_iter()
        .filter(|d| d.state.purge_due(now, retention))
        .collect();
    let mut report = PurgeReport {
        due: due.len(),
        ..PurgeReport::default()
    };

    let mut removable: Vec<(Uuid, String)> = Vec::with_capacity(due.len());
    for doc in &due {
        if cancel.is_cancelled() {
            tracing::info!("document purge interrupted by shutdown");
            break;
        }
        match storage.purge(&doc.storage_path).await {
            Ok(()) => removable.push((doc.document_id, doc.storage_path.clone())),
            Err(StorageError::Missing(path)) => {
                tracing::warn!(document_id = %doc.document_id, path, "file already gone, dropping row");
                removable.push((doc.document_id, doc.storage_path.clone()));
            }
            Err(e) => {
                tracing::error!(document_id = %doc.document_id, error = %e, "failed to purge document file");
                report.failed += 1;
            }
        }
    }

    report.purged = store.remove(&removable).await?;
    Ok(report)
}

/// Runs `job` on every tick of `period` until `cancel` fires. The first tick
/// is immediate.
pub async fn run_periodic<F, Fut>(
    name: &'static str,
    period: StdDuration,
    cancel: CancellationToken,
    mut job: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if let Err(e) = job().await {
            tracing::error!(task = name, error = ?e, "sweep iteration failed");
        }
    }
    tracing::info!(task = name, "sweep stopped");
}

pub struct SweepSettings {
    pub period: StdDuration,
    pub document_retention: Duration,
}

/// Starts the document purge and token purge loops.
pub fn spawn_sweeps(
    state: &AppState,
    settings: SweepSettings,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    let documents: Arc<dyn DocumentStore> = state.documents.clone();
    let storage: Arc<dyn DocumentStorage> = state.storage.clone();
    let retention = settings.document_retention;
    let doc_cancel = cancel.clone();

    let document_sweep = tokio::spawn(run_periodic(
        "document-purge",
        settings.period,
        cancel.clone(),
        move || {
            let documents = documents.clone();
            let storage = storage.clone();
            let cancel = doc_cancel.clone();
            async move {
                let report = purge_deleted_documents(
                    documents.as_ref(),
                    storage.as_ref(),
                    Utc::now(),
                    retention,
                    &cancel,
                )
                .await?;
                tracing::info!(
                    due = report.due,
                    purged = report.purged,
                    failed = report.failed,
                    "document purge finished"
                );
                Ok::<(), anyhow::Error>(())
            }
        },
    ));

    let pool = state.db.clone();
    let token_sweep = tokio::spawn(run_periodic(
        "token-purge",
        settings.period,
        cancel,
        move || {
            let pool = pool.clone();
            async move {
                let removed = db::purge_expired_tokens(&pool).await?;
                tracing::info!(removed, "expired refresh tokens purged");
                Ok::<(), anyhow::Error>(())
            }
        },
    ));

    vec![document_sweep, token_sweep]
}
