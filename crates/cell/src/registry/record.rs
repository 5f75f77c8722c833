use chrono::{DateTime, Utc};

use crate::CellConfig;

/// One row of the registry: the durable counter behind a category name.
///
/// The store keeps `min_value <= value <= max_value`. When advancing the
/// counter would leave less than a quarter of a step of headroom, the store
/// wraps `value` back to `min_value` in the same update.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegistryRecord {
    pub name: String,
    /// Next value that has not yet been reserved by any process.
    pub value: u64,
    pub min_value: u64,
    pub max_value: u64,
    /// Range size. On a record returned by
    /// [`advance_and_fetch`](crate::RegistryStore::advance_and_fetch) this is
    /// the step that was actually granted.
    pub step: u64,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl RegistryRecord {
    /// Builds the bootstrap row for `name`, starting at the configured
    /// minimum.
    pub fn init(name: impl Into<String>, config: &CellConfig) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            value: config.min_value,
            min_value: config.min_value,
            max_value: config.max_value,
            step: config.step,
            create_time: now,
            update_time: now,
        }
    }

    /// Whether the stored value must wrap back to `min_value`.
    ///
    /// True once `value` has passed `max_value`, or once the headroom left
    /// before `max_value` is at most 25% of `step`.
    pub fn needs_reset(&self, step: u64) -> bool {
        match self.max_value.checked_sub(self.value) {
            None => true,
            // headroom <= step / 4, kept in integers
            Some(headroom) => u128::from(headroom) * 4 <= u128::from(step),
        }
    }

    /// Last value of a range of `step` values starting at `value`.
    pub(crate) fn range_end(&self, step: u64) -> u64 {
        self.value.saturating_add(step.saturating_sub(1))
    }
}
