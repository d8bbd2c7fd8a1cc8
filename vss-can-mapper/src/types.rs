//! Core types for the VSS to CAN mapper library
//!
//! This module defines the values that flow between the tree model (VSS) and
//! the bus model (DBC/CAN), the update records received from the tree-model
//! client, and the raw frames handed to the transport.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for mapper operations
pub type Result<T> = std::result::Result<T, MapperError>;

/// Raw CAN frame ready to be handed to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanFrame {
    /// CAN message ID (11-bit or 29-bit)
    pub id: u32,
    /// Encoded frame payload
    pub data: Vec<u8>,
    /// True if this is an extended (29-bit) CAN ID
    pub is_extended: bool,
}

impl CanFrame {
    /// Get the data length code (DLC) - number of data bytes
    pub fn dlc(&self) -> usize {
        self.data.len()
    }
}

/// Errors that can occur while building mappings or encoding frames
#[derive(Debug, thiserror::Error)]
pub enum MapperError {
    #[error("Failed to parse DBC file: {0}")]
    DbcParseError(String),

    #[error("Invalid mapping for {path}: {detail}")]
    InvalidMapping { path: String, detail: String },

    #[error("Failed to read mapping file: {0}")]
    MappingFileError(String),

    #[error("Message not found: CAN ID 0x{0:X}")]
    MessageNotFound(u32),

    #[error("No default values declared for CAN ID 0x{0:X}")]
    UnsupportedFrame(u32),

    #[error("No value for signal '{signal}' in CAN ID 0x{frame_id:X}")]
    MissingSignalValue { frame_id: u32, signal: String },

    #[error("Value {value} for signal '{signal}' is not numeric")]
    NonNumericValue { signal: String, value: SignalValue },

    #[error("Value {value} for signal '{signal}' does not fit in {length} bits")]
    ValueOutOfRange {
        signal: String,
        value: SignalValue,
        length: u16,
    },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl MapperError {
    pub(crate) fn invalid_mapping(path: &str, detail: impl Into<String>) -> Self {
        MapperError::InvalidMapping {
            path: path.to_string(),
            detail: detail.into(),
        }
    }
}

/// A scalar value on either side of the mapping
///
/// Tree-model values arrive as JSON scalars; bus-model values are whatever a
/// transform produced and are converted to numbers only when a frame is
/// encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    /// Boolean value
    Boolean(bool),
    /// Signed integer value
    Integer(i64),
    /// Floating-point value
    Float(f64),
    /// Text value
    String(String),
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalValue::Boolean(v) => write!(f, "{}", if *v { "true" } else { "false" }),
            SignalValue::Integer(v) => write!(f, "{}", v),
            SignalValue::Float(v) => write!(f, "{}", v),
            SignalValue::String(v) => write!(f, "\"{}\"", v),
        }
    }
}

impl SignalValue {
    /// Convert signal value to f64 for encoding, if it is numeric
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SignalValue::Boolean(v) => Some(if *v { 1.0 } else { 0.0 }),
            SignalValue::Integer(v) => Some(*v as f64),
            SignalValue::Float(v) => Some(*v),
            SignalValue::String(_) => None,
        }
    }

    /// Name of the variant, used in log messages
    pub fn type_name(&self) -> &'static str {
        match self {
            SignalValue::Boolean(_) => "bool",
            SignalValue::Integer(_) => "int",
            SignalValue::Float(_) => "float",
            SignalValue::String(_) => "string",
        }
    }

    /// Convert a JSON value into a scalar signal value
    ///
    /// Arrays, objects and `null` have no scalar representation and yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(SignalValue::Boolean(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(SignalValue::Integer)
                .or_else(|| n.as_f64().map(SignalValue::Float)),
            serde_json::Value::String(s) => Some(SignalValue::String(s.clone())),
            _ => None,
        }
    }
}

impl From<bool> for SignalValue {
    fn from(v: bool) -> Self {
        SignalValue::Boolean(v)
    }
}

impl From<i64> for SignalValue {
    fn from(v: i64) -> Self {
        SignalValue::Integer(v)
    }
}

impl From<f64> for SignalValue {
    fn from(v: f64) -> Self {
        SignalValue::Float(v)
    }
}

impl From<&str> for SignalValue {
    fn from(v: &str) -> Self {
        SignalValue::String(v.to_string())
    }
}

/// Which field of a tree-model entry an update carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Current (reported) value of a sensor or actuator
    Value,
    /// Desired (commanded) value of an actuator
    ActuatorTarget,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Value => write!(f, "value"),
            Field::ActuatorTarget => write!(f, "actuator_target"),
        }
    }
}

/// A subscription request for one tree-model path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeEntry {
    /// Dotted tree-model path
    pub path: String,
    /// Fields to receive updates for
    pub fields: Vec<Field>,
}

/// One update notification from the tree-model client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryUpdate {
    /// Dotted tree-model path
    pub path: String,
    /// Which field changed
    pub field: Field,
    /// New value; `None` when the client reported the field as cleared
    #[serde(default)]
    pub value: Option<SignalValue>,
}
