//! Signal database and DBC parser
//!
//! This module contains the parser for DBC signal definition files and the
//! database the frame codec queries.

pub mod dbc;
pub mod database;

// Re-export key types for convenience
pub use database::{
    ByteOrder, DatabaseStats, MessageDefinition, SignalDatabase, SignalDefinition, ValueType,
};
