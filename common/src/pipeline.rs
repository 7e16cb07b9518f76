//! The sync run: reconcile extracted records and submit them in order.

use crate::client_api::ConferenceStore;
use crate::extract::{ExtractStats, Extraction};
use crate::reconcile::{load_existing_index, reconcile};
use crate::submit::{PhaseStats, run_deletes, run_inserts, run_updates};
use crate::{NaturalKey, SyncConfig};
use log::info;

/// Everything that happened during one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub total_records: usize,
    pub extract: ExtractStats,
    pub lookup_degraded: bool,
    pub existing_count: usize,
    pub duplicate_keys: Vec<NaturalKey>,
    /// Records matched to a stored conference before any insert was sent.
    pub matched: usize,
    pub inserts: PhaseStats,
    /// Inserts refused as duplicates and retried as updates.
    pub requeued: usize,
    pub updates: PhaseStats,
    pub deletes: PhaseStats,
}

impl SyncReport {
    /// Successful inserts, updates and deletes.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.inserts.succeeded + self.updates.succeeded + self.deletes.succeeded
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.inserts.failed + self.updates.failed + self.deletes.failed
    }

    #[must_use]
    pub fn unattributed_count(&self) -> usize {
        self.inserts.unattributed + self.updates.unattributed + self.deletes.unattributed
    }
}

/// Reconcile `extraction` against `store` and submit the result.
///
/// Inserts run first; updates follow with any records the API refused as
/// duplicates; deletes (if any were requested) run last.
pub fn sync_extraction<S: ConferenceStore + ?Sized>(
    store: &S,
    extraction: Extraction,
    config: &SyncConfig,
) -> SyncReport {
    let total_records = extraction.records.len();

    info!("Checking existing conferences in the database...");
    let lookup = load_existing_index(store);
    let reconciliation = reconcile(extraction.records, &lookup.index);
    let matched = reconciliation.updates.len();

    let insert_phase = run_inserts(store, &reconciliation.inserts, config);
    let (inserts, queue) = insert_phase.into_update_queue(reconciliation.updates);
    let updates = run_updates(store, &queue, config);
    let deletes = run_deletes(store, &config.deletes, config);

    let report = SyncReport {
        total_records,
        extract: extraction.stats,
        lookup_degraded: lookup.degraded,
        existing_count: lookup.index.len(),
        duplicate_keys: reconciliation.duplicate_keys,
        matched,
        inserts,
        requeued: queue.requeued(),
        updates,
        deletes,
    };
    info!(
        "Done! Processed {}/{} records successfully.",
        report.success_count(),
        report.total_records
    );
    report
}
