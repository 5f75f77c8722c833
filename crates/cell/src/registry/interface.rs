use crate::{RegistryRecord, Result};

/// Durable backing store for per-name counters.
///
/// The in-process buffers are only a latency-hiding cache; all cross-process
/// correctness comes from this trait. Implementations must serialize
/// [`advance_and_fetch`](Self::advance_and_fetch) per name (for example with a
/// row lock) so that concurrent callers, in this process or another, receive
/// disjoint ranges.
pub trait RegistryStore: Send + Sync {
    /// Whether the backing table exists. Checked once at startup.
    fn exists_table(&self) -> Result<bool>;

    /// Every registered name.
    fn query_all_names(&self) -> Result<Vec<String>>;

    /// Atomically reserves `step` values for `name`.
    ///
    /// Returns the record as it was *before* the reservation, with `step` set
    /// to the granted step, so the caller owns
    /// `[record.value, record.value + step - 1]`. If the advanced value leaves
    /// too little headroom (see [`RegistryRecord::needs_reset`]) the stored
    /// value wraps to `min_value` as part of the same update.
    ///
    /// # Errors
    ///
    /// [`Error::Persistence`](crate::Error::Persistence) if the name is not
    /// registered, no row was updated, or the store is unreachable.
    fn advance_and_fetch(&self, name: &str, step: u64) -> Result<RegistryRecord>;

    /// Runs `work` as a single transaction.
    ///
    /// Locks taken through [`RegistryTransaction::lock_query_by_name`] are
    /// held until `work` returns. An `Err` from `work` aborts the transaction.
    fn transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn RegistryTransaction) -> Result<()>,
    ) -> Result<()>;
}

/// Operations available inside [`RegistryStore::transaction`].
pub trait RegistryTransaction {
    /// Row-locking read. `None` if `name` is not registered.
    fn lock_query_by_name(&mut self, name: &str) -> Result<Option<RegistryRecord>>;

    /// Inserts a new row.
    ///
    /// # Errors
    ///
    /// [`Error::Persistence`](crate::Error::Persistence) if a row with the
    /// same name already exists.
    fn save(&mut self, record: RegistryRecord) -> Result<()>;
}

impl<S: RegistryStore + ?Sized> RegistryStore for std::sync::Arc<S> {
    fn exists_table(&self) -> Result<bool> {
        (**self).exists_table()
    }

    fn query_all_names(&self) -> Result<Vec<String>> {
        (**self).query_all_names()
    }

    fn advance_and_fetch(&self, name: &str, step: u64) -> Result<RegistryRecord> {
        (**self).advance_and_fetch(name, step)
    }

    fn transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn RegistryTransaction) -> Result<()>,
    ) -> Result<()> {
        (**self).transaction(work)
    }
}
