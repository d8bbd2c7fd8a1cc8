//! Update dispatch
//!
//! Applies a batch of target-value updates to the mapping table and reports
//! which CAN frames have to be sent again.

use crate::mapping::MappingTable;
use crate::transform;
use crate::types::SignalValue;
use std::collections::BTreeSet;

impl MappingTable {
    /// Apply one batch of `(path, value)` updates in arrival order
    ///
    /// Every entry mapped from an updated path gets its last value replaced by
    /// the transformed value, including `None` when the transform produced
    /// nothing. Paths without a mapping are skipped. Returns the CAN ids of
    /// all frames touched by the batch.
    pub fn apply_updates<'a, I>(&mut self, batch: I) -> BTreeSet<u32>
    where
        I: IntoIterator<Item = (&'a str, &'a SignalValue)>,
    {
        let mut touched = BTreeSet::new();

        for (path, value) in batch {
            let indices = match self.indices_for_path(path) {
                Some(indices) => indices.to_vec(),
                None => {
                    log::trace!("No mapping for {}, update ignored", path);
                    continue;
                }
            };

            for index in indices {
                let entry = self.entry_mut(index);
                entry.last_value = transform::apply(entry.transform.as_ref(), value, &entry.dbc_name);
                touched.insert(entry.frame_id);
            }
        }

        touched
    }
}
