//! VSS to CAN Mapper Library
//!
//! Translates actuator target values from a VSS (Vehicle Signal Specification)
//! tree into CAN frames described by DBC files.
//!
//! # Architecture
//!
//! - [`FrameCodec`] loads DBC files, resolves which frame carries a signal and
//!   packs signal values into frame bytes
//! - [`MappingTable`] is built once from a mapping file that mirrors the VSS
//!   tree; each mapped leaf names a DBC signal and an optional [`Transform`]
//! - [`MappingTable::apply_updates`] applies a batch of target values and
//!   returns the CAN ids of the frames to send again
//! - [`MappingTable::frame_values`] merges [`FrameDefaults`] with the last
//!   known values into a complete signal map for one frame
//!
//! The library does NOT talk to the VSS server or the CAN bus; that is the
//! application layer's job (vss-can-provider).
//!
//! # Example Usage
//!
//! ```no_run
//! use vss_can_mapper::{FrameCodec, FrameDefaults, MappingTable, SignalValue};
//! use std::path::Path;
//!
//! let codec = FrameCodec::from_dbc_file(Path::new("Model3CAN.dbc")).unwrap();
//! let mut table = MappingTable::from_file(Path::new("vss_dbc.json"), &codec).unwrap();
//! let defaults = FrameDefaults::builtin();
//!
//! let open = SignalValue::Boolean(true);
//! for frame_id in table.apply_updates([("Vehicle.Cabin.Door.Row1.DriverSide.IsOpen", &open)]) {
//!     let values = table.frame_values(frame_id, &defaults).unwrap();
//!     let data = codec.encode(frame_id, &values).unwrap();
//!     println!("0x{:X}: {:02X?}", frame_id, data);
//! }
//! ```

// Public modules
pub mod codec;
pub mod defaults;
pub mod mapping;
pub mod transform;
pub mod types;

// Re-export main types for convenience
pub use codec::FrameCodec;
pub use defaults::FrameDefaults;
pub use mapping::{MappingEntry, MappingTable};
pub use signals::{ByteOrder, DatabaseStats, MessageDefinition, SignalDefinition, ValueType};
pub use transform::Transform;
pub use types::{CanFrame, EntryUpdate, Field, MapperError, Result, SignalValue, SubscribeEntry};

// Internal modules (not exposed in public API)
mod aggregator;
mod dispatcher;
mod signals;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        let codec = FrameCodec::new();
        let stats = codec.database_stats();
        assert_eq!(stats.num_messages, 0);
        assert!(MappingTable::default().is_empty());
    }
}
