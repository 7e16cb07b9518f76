//! Reconcile scraped conferences against the ones already stored remotely.

use crate::client_api::ConferenceStore;
use crate::{ConferenceRecord, ExistingConference, NaturalKey};
use itertools::Itertools;
use log::{info, warn};
use std::collections::HashMap;

/// Stored conference ids, keyed by natural key. Rebuilt from scratch every run.
#[derive(Debug, Clone, Default)]
pub struct ExistingIndex {
    ids: HashMap<NaturalKey, u64>,
}

impl ExistingIndex {
    /// Build the index. If the store holds the same key twice, the last one wins.
    #[must_use]
    pub fn from_conferences(conferences: Vec<ExistingConference>) -> Self {
        let mut ids = HashMap::with_capacity(conferences.len());
        for conference in conferences {
            let key = conference.natural_key();
            if let Some(previous) = ids.insert(key.clone(), conference.id_conference) {
                warn!(
                    "Stored conference {key} appears more than once (ids {previous} and {}), using the latter.",
                    conference.id_conference
                );
            }
        }
        Self { ids }
    }

    #[must_use]
    pub fn get(&self, key: &NaturalKey) -> Option<u64> {
        self.ids.get(key).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// The index plus whether it had to fall back to empty.
#[derive(Debug, Clone, Default)]
pub struct Lookup {
    pub index: ExistingIndex,
    pub degraded: bool,
}

/// Read the stored conferences into an index.
/// A failed read is not fatal: the index is empty and every record will be tried
/// as an insert, leaving conflicts to the API's duplicate detection.
pub fn load_existing_index<S: ConferenceStore + ?Sized>(store: &S) -> Lookup {
    match store.fetch_existing() {
        Ok(conferences) => {
            let index = ExistingIndex::from_conferences(conferences);
            info!("Found {} conferences in the database.", index.len());
            Lookup {
                index,
                degraded: false,
            }
        }
        Err(e) => {
            warn!("Could not read existing conferences, treating every record as new: {e:#}");
            Lookup {
                index: ExistingIndex::default(),
                degraded: true,
            }
        }
    }
}

/// Scraped records split by what the API should do with them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub inserts: Vec<ConferenceRecord>,
    /// Records matched to a stored conference, with `id_conference` filled in.
    pub updates: Vec<ConferenceRecord>,
    /// Natural keys shared by more than one scraped record.
    pub duplicate_keys: Vec<NaturalKey>,
}

/// Natural keys that occur more than once, in order of their second occurrence.
#[must_use]
pub fn find_duplicate_keys(records: &[ConferenceRecord]) -> Vec<NaturalKey> {
    records
        .iter()
        .map(ConferenceRecord::natural_key)
        .duplicates()
        .collect()
}

/// Classify each record as an insert or an update.
///
/// Natural keys are expected to be unique among the scraped records. Records that
/// break this are still classified, but their keys are reported, since the later
/// record will overwrite the earlier one on the remote side.
#[must_use]
pub fn reconcile(records: Vec<ConferenceRecord>, index: &ExistingIndex) -> Reconciliation {
    let duplicate_keys = find_duplicate_keys(&records);
    for key in &duplicate_keys {
        warn!("Conference {key} was scraped more than once; later rows will overwrite earlier ones.");
    }

    let mut inserts = Vec::new();
    let mut updates = Vec::new();
    for mut record in records {
        match index.get(&record.natural_key()) {
            Some(id) => {
                record.id_conference = Some(id);
                updates.push(record);
            }
            None => inserts.push(record),
        }
    }

    info!(
        "Classified {} records as new and {} as existing.",
        inserts.len(),
        updates.len()
    );
    Reconciliation {
        inserts,
        updates,
        duplicate_keys,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockStore, icml_record, record};

    fn existing(acronym: &str, start_date: &str, id: u64) -> ExistingConference {
        ExistingConference {
            acronym: acronym.to_string(),
            start_date: start_date.to_string(),
            id_conference: id,
        }
    }

    #[test_log::test]
    fn test_reconcile_empty_index_inserts_everything() {
        let records = vec![icml_record(), record("NEURIPS", "2025-12-01")];
        let result = reconcile(records.clone(), &ExistingIndex::default());
        assert_eq!(result.inserts, records);
        assert!(result.updates.is_empty());
        assert!(result.duplicate_keys.is_empty());
    }

    #[test_log::test]
    fn test_reconcile_matched_record_is_update() {
        let index = ExistingIndex::from_conferences(vec![existing("ICML2025", "2025-07-10", 42)]);
        let result = reconcile(vec![icml_record()], &index);

        assert!(result.inserts.is_empty());
        assert_eq!(result.updates.len(), 1);
        assert_eq!(result.updates[0].id_conference, Some(42));
        assert_eq!(result.updates[0].acronym, "ICML2025");
    }

    #[test_log::test]
    fn test_reconcile_requires_both_key_parts() {
        let index = ExistingIndex::from_conferences(vec![
            existing("ICML2025", "2024-07-10", 1),
            existing("ICML2024", "2025-07-10", 2),
        ]);
        let result = reconcile(vec![icml_record()], &index);
        assert_eq!(result.inserts.len(), 1);
        assert!(result.updates.is_empty());
    }

    #[test_log::test]
    fn test_reconcile_reports_duplicate_keys() {
        let records = vec![
            icml_record(),
            record("NEURIPS", "2025-12-01"),
            icml_record(),
            icml_record(),
        ];
        let result = reconcile(records, &ExistingIndex::default());
        assert_eq!(
            result.duplicate_keys,
            vec![NaturalKey::new("ICML2025", "2025-07-10")]
        );
        // nothing is dropped
        assert_eq!(result.inserts.len(), 4);
    }

    #[test_log::test]
    fn test_index_last_duplicate_wins() {
        let index = ExistingIndex::from_conferences(vec![
            existing("A", "2025-01-01", 1),
            existing("A", "2025-01-01", 2),
        ]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(&NaturalKey::new("A", "2025-01-01")), Some(2));
    }

    #[test_log::test]
    fn test_load_existing_index() {
        let store = MockStore::new(Some(vec![existing("ICML2025", "2025-07-10", 42)]));
        let lookup = load_existing_index(&store);
        assert!(!lookup.degraded);
        assert_eq!(
            lookup.index.get(&NaturalKey::new("ICML2025", "2025-07-10")),
            Some(42)
        );
    }

    #[test_log::test]
    fn test_load_existing_index_degrades_on_failure() {
        let store = MockStore::new(None);
        let lookup = load_existing_index(&store);
        assert!(lookup.degraded);
        assert!(lookup.index.is_empty());

        let result = reconcile(vec![icml_record()], &lookup.index);
        assert_eq!(result.inserts.len(), 1);
        assert!(result.updates.is_empty());
    }
}
