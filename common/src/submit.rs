//! Batched submission of reconciled records.
//!
//! Records move through a small state machine:
//!
//! ```text
//! unmatched -> insert -> Inserted
//!                     -> AlreadyExists -> update -> Updated | Failed
//!                     -> Failed
//! matched   -> update -> Updated | Failed
//! ```
//!
//! The update queue can only be built from a finished [`InsertPhase`], so every
//! insert batch has been answered before the first update batch is sent.
//! Failures are isolated per batch and per record; nothing is retried.

use crate::client_api::{BatchError, BatchOperation, ConferenceStore};
use crate::{ConferenceRecord, DeleteRequest, RecordResult, ResponseMessages, SyncConfig};
use log::{error, info, warn};
use serde::Serialize;

/// What happened to a single record in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Inserted { id: Option<u64> },
    /// The insert was refused as a duplicate; the record moves to the update queue.
    AlreadyExists { id: u64 },
    Updated,
    Deleted,
    Failed { reason: String },
}

impl RecordOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            RecordOutcome::Inserted { .. } | RecordOutcome::Updated | RecordOutcome::Deleted
        )
    }
}

/// Match a per-record result against the phrases valid for `operation`.
#[must_use]
pub fn classify_result(
    operation: BatchOperation,
    result: &RecordResult,
    messages: &ResponseMessages,
) -> RecordOutcome {
    let message = result.message.as_deref().unwrap_or_default();
    match operation {
        BatchOperation::Insert if message == messages.inserted => RecordOutcome::Inserted {
            id: result.id_conference,
        },
        BatchOperation::Insert if message == messages.already_exists => {
            match result.id_conference {
                Some(id) => RecordOutcome::AlreadyExists { id },
                None => RecordOutcome::Failed {
                    reason: "already exists, but no id_conference was returned".to_string(),
                },
            }
        }
        BatchOperation::Update if message == messages.updated => RecordOutcome::Updated,
        BatchOperation::Delete if message == messages.deleted => RecordOutcome::Deleted,
        _ => RecordOutcome::Failed {
            reason: result
                .error
                .clone()
                .unwrap_or_else(|| format!("unexpected message {message:?}")),
        },
    }
}

/// Counters for one phase (all insert, update, or delete batches).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseStats {
    pub batches_sent: usize,
    pub batches_failed: usize,
    pub succeeded: usize,
    pub requeued: usize,
    pub failed: usize,
    /// Records in batches whose response could not be read.
    pub unattributed: usize,
}

impl PhaseStats {
    fn record(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::AlreadyExists { .. } => self.requeued += 1,
            RecordOutcome::Failed { .. } => self.failed += 1,
            _ => self.succeeded += 1,
        }
    }
}

trait BatchItem: Serialize {
    fn acronym(&self) -> &str;
}

impl BatchItem for ConferenceRecord {
    fn acronym(&self) -> &str {
        &self.acronym
    }
}

impl BatchItem for DeleteRequest {
    fn acronym(&self) -> &str {
        &self.acronym
    }
}

fn log_outcome(position: usize, total: usize, acronym: &str, outcome: &RecordOutcome) {
    match outcome {
        RecordOutcome::Inserted { id } => {
            info!("  Record {position}/{total} - {acronym}: inserted. ID: {id:?}");
        }
        RecordOutcome::AlreadyExists { id } => {
            info!("  Record {position}/{total} - {acronym}: already exists. ID: {id}");
        }
        RecordOutcome::Updated => info!("  Record {position}/{total} - {acronym}: updated."),
        RecordOutcome::Deleted => info!("  Record {position}/{total} - {acronym}: deleted."),
        RecordOutcome::Failed { reason } => {
            warn!("  Record {position}/{total} - {acronym}: failed: {reason}");
        }
    }
}

/// Send `items` in batches and hand every attributable outcome to `on_outcome`.
fn run_phase<S, T, F>(
    store: &S,
    operation: BatchOperation,
    items: &[T],
    config: &SyncConfig,
    mut on_outcome: F,
) -> PhaseStats
where
    S: ConferenceStore + ?Sized,
    T: BatchItem,
    F: FnMut(&T, &RecordOutcome),
{
    let mut stats = PhaseStats::default();
    if items.is_empty() {
        return stats;
    }

    let batch_size = config.batch_size.max(1);
    let total = items.len();
    info!("Sending {total} records to the API ({operation})...");

    for (batch_index, batch) in items.chunks(batch_size).enumerate() {
        let batch_number = batch_index + 1;
        let offset = batch_index * batch_size;
        stats.batches_sent += 1;

        let response = serde_json::to_value(batch)
            .map_err(|e| BatchError::Encode(e.to_string()))
            .and_then(|body| store.send_batch(operation, &body));

        match response {
            Ok(response) => {
                let mut results = response.results.iter();
                for (j, item) in batch.iter().enumerate() {
                    let outcome = match results.next() {
                        Some(result) => classify_result(operation, result, &config.messages),
                        None => RecordOutcome::Failed {
                            reason: "no result returned".to_string(),
                        },
                    };
                    log_outcome(offset + j + 1, total, item.acronym(), &outcome);
                    stats.record(&outcome);
                    on_outcome(item, &outcome);
                }
                let extra = results.count();
                if extra > 0 {
                    warn!("Batch {batch_number}: ignoring {extra} results beyond the batch size.");
                }
                info!("Batch {batch_number} ({} records): processed.", batch.len());
            }
            Err(BatchError::Decode { message, body }) => {
                stats.batches_failed += 1;
                stats.unattributed += batch.len();
                warn!(
                    "Batch {batch_number} ({} records): response is not JSON ({message}): {body}",
                    batch.len()
                );
            }
            Err(e) => {
                stats.batches_failed += 1;
                error!("Batch {batch_number} ({} records): {e}", batch.len());
                let outcome = RecordOutcome::Failed {
                    reason: e.to_string(),
                };
                for (j, item) in batch.iter().enumerate() {
                    warn!("  Record {}/{total} - {}: failed.", offset + j + 1, item.acronym());
                    stats.record(&outcome);
                    on_outcome(item, &outcome);
                }
            }
        }
    }

    stats
}

/// The finished insert pass, holding the records to retry as updates.
#[derive(Debug)]
pub struct InsertPhase {
    pub stats: PhaseStats,
    requeued: Vec<ConferenceRecord>,
}

impl InsertPhase {
    /// Records the API refused as duplicates, each carrying the id it reported.
    #[must_use]
    pub fn requeued(&self) -> &[ConferenceRecord] {
        &self.requeued
    }

    /// Close the insert phase and queue `matched` plus every requeued record for update.
    #[must_use]
    pub fn into_update_queue(self, matched: Vec<ConferenceRecord>) -> (PhaseStats, UpdateQueue) {
        let requeued = self.requeued.len();
        let mut records = matched;
        records.extend(self.requeued);
        (self.stats, UpdateQueue { records, requeued })
    }
}

/// Records to send as updates. Only obtainable from [`InsertPhase::into_update_queue`].
#[derive(Debug, Clone)]
pub struct UpdateQueue {
    records: Vec<ConferenceRecord>,
    requeued: usize,
}

impl UpdateQueue {
    #[must_use]
    pub fn records(&self) -> &[ConferenceRecord] {
        &self.records
    }

    /// How many queued records came from refused inserts.
    #[must_use]
    pub fn requeued(&self) -> usize {
        self.requeued
    }
}

/// POST the new records in batches.
pub fn run_inserts<S: ConferenceStore + ?Sized>(
    store: &S,
    inserts: &[ConferenceRecord],
    config: &SyncConfig,
) -> InsertPhase {
    let mut requeued = Vec::new();
    let stats = run_phase(
        store,
        BatchOperation::Insert,
        inserts,
        config,
        |record, outcome| {
            if let RecordOutcome::AlreadyExists { id } = outcome {
                let mut record = record.clone();
                record.id_conference = Some(*id);
                requeued.push(record);
            }
        },
    );
    InsertPhase { stats, requeued }
}

/// PUT the queued records in batches.
pub fn run_updates<S: ConferenceStore + ?Sized>(
    store: &S,
    queue: &UpdateQueue,
    config: &SyncConfig,
) -> PhaseStats {
    run_phase(
        store,
        BatchOperation::Update,
        &queue.records,
        config,
        |_, _| {},
    )
}

/// DELETE the requested conferences in batches. Does nothing for an empty list.
pub fn run_deletes<S: ConferenceStore + ?Sized>(
    store: &S,
    deletes: &[DeleteRequest],
    config: &SyncConfig,
) -> PhaseStats {
    run_phase(store, BatchOperation::Delete, deletes, config, |_, _| {})
}
