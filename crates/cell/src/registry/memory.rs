use std::collections::BTreeMap;

use chrono::Utc;
use parking_lot::Mutex;

use crate::{Error, RegistryRecord, RegistryStore, RegistryTransaction, Result};

/// An in-memory [`RegistryStore`].
///
/// A single mutex stands in for the row locks of a relational store: every
/// [`advance_and_fetch`](RegistryStore::advance_and_fetch) and every
/// [`transaction`](RegistryStore::transaction) runs with the whole table
/// locked, so concurrent callers always receive disjoint ranges. Share one
/// instance (behind an `Arc`) between managers to model several processes
/// backed by the same database.
#[derive(Debug)]
pub struct MemoryRegistryStore {
    table_exists: bool,
    rows: Mutex<BTreeMap<String, RegistryRecord>>,
}

impl Default for MemoryRegistryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRegistryStore {
    /// An empty store whose table exists.
    pub fn new() -> Self {
        Self {
            table_exists: true,
            rows: Mutex::new(BTreeMap::new()),
        }
    }

    /// A store that reports its table as missing.
    pub fn without_table() -> Self {
        Self {
            table_exists: false,
            rows: Mutex::new(BTreeMap::new()),
        }
    }

    /// A store pre-seeded with `records`, keyed by name.
    pub fn with_records(records: impl IntoIterator<Item = RegistryRecord>) -> Self {
        let rows = records
            .into_iter()
            .map(|record| (record.name.clone(), record))
            .collect();
        Self {
            table_exists: true,
            rows: Mutex::new(rows),
        }
    }

    /// Snapshot of the stored row for `name`.
    pub fn get(&self, name: &str) -> Option<RegistryRecord> {
        self.rows.lock().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }
}

impl RegistryStore for MemoryRegistryStore {
    fn exists_table(&self) -> Result<bool> {
        Ok(self.table_exists)
    }

    fn query_all_names(&self) -> Result<Vec<String>> {
        Ok(self.rows.lock().keys().cloned().collect())
    }

    fn advance_and_fetch(&self, name: &str, step: u64) -> Result<RegistryRecord> {
        if step == 0 {
            return Err(Error::persistence(format!(
                "refusing to advance `{name}` by a zero step"
            )));
        }

        let mut rows = self.rows.lock();
        let row = rows
            .get_mut(name)
            .ok_or_else(|| Error::persistence(format!("no registry row updated for `{name}`")))?;

        // A range that would run past the maximum restarts from the minimum.
        if row.range_end(step) > row.max_value {
            row.value = row.min_value;
        }
        let headroom = row.max_value.saturating_sub(row.value).saturating_add(1);
        let granted = step.min(headroom);

        let mut reserved = row.clone();
        reserved.step = granted;

        // Saturates only once a range ending at `u64::MAX` is spent, which
        // `needs_reset` then wraps.
        row.value = row.value.saturating_add(granted);
        if row.needs_reset(granted) {
            row.value = row.min_value;
        }
        row.update_time = Utc::now();
        reserved.update_time = row.update_time;

        Ok(reserved)
    }

    fn transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn RegistryTransaction) -> Result<()>,
    ) -> Result<()> {
        let mut rows = self.rows.lock();
        let mut tx = MemoryTransaction {
            staged: rows.clone(),
        };
        work(&mut tx)?;
        *rows = tx.staged;
        Ok(())
    }
}

/// Stages writes on a copy of the table; committed only if the unit of work
/// succeeds.
struct MemoryTransaction {
    staged: BTreeMap<String, RegistryRecord>,
}

impl RegistryTransaction for MemoryTransaction {
    fn lock_query_by_name(&mut self, name: &str) -> Result<Option<RegistryRecord>> {
        Ok(self.staged.get(name).cloned())
    }

    fn save(&mut self, record: RegistryRecord) -> Result<()> {
        if self.staged.contains_key(&record.name) {
            return Err(Error::persistence(format!(
                "registry row `{}` already exists",
                record.name
            )));
        }
        self.staged.insert(record.name.clone(), record);
        Ok(())
    }
}
