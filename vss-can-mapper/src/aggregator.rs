//! Frame value aggregation
//!
//! Builds the complete signal map for one CAN frame: the frame's defaults
//! overlaid with the last value of every mapping entry packed into it.

use crate::defaults::FrameDefaults;
use crate::mapping::MappingTable;
use crate::types::{MapperError, Result, SignalValue};
use std::collections::BTreeMap;

impl MappingTable {
    /// Current signal values for a frame, ready for encoding
    ///
    /// Entries without a last value keep the default. Frames without a
    /// declared default set are refused with [`MapperError::UnsupportedFrame`].
    pub fn frame_values(
        &self,
        frame_id: u32,
        defaults: &FrameDefaults,
    ) -> Result<BTreeMap<String, SignalValue>> {
        log::debug!("Using stored information to create CAN frame for {}", frame_id);
        let mut values = defaults
            .get(frame_id)
            .cloned()
            .ok_or(MapperError::UnsupportedFrame(frame_id))?;

        for entry in self.entries_for_frame(frame_id) {
            if let Some(value) = &entry.last_value {
                log::info!("Using DBC signal {} with value {}", entry.dbc_name, value);
                values.insert(entry.dbc_name.clone(), value.clone());
            }
        }
        Ok(values)
    }
}
