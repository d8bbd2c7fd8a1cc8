//! Signal database
//!
//! Holds the message definitions parsed from DBC files and indexes them by
//! CAN ID and by signal name.

use std::collections::HashMap;

/// A complete CAN message definition
#[derive(Debug, Clone)]
pub struct MessageDefinition {
    /// CAN message ID (extended flag stripped)
    pub id: u32,
    /// True if the DBC declares a 29-bit identifier
    pub is_extended: bool,
    /// Message name
    pub name: String,
    /// Message size in bytes
    pub size: usize,
    /// Sender ECU name (optional)
    pub sender: Option<String>,
    /// All signals in this message
    pub signals: Vec<SignalDefinition>,
    /// Multiplexer signal name (if multiplexed)
    pub multiplexer_signal: Option<String>,
}

/// A CAN signal definition
#[derive(Debug, Clone)]
pub struct SignalDefinition {
    /// Signal name
    pub name: String,
    /// Start bit in the CAN frame (DBC numbering)
    pub start_bit: u16,
    /// Length in bits
    pub length: u16,
    pub byte_order: ByteOrder,
    pub value_type: ValueType,
    /// Scale factor to convert raw value to physical value
    pub factor: f64,
    /// Offset to add after scaling
    pub offset: f64,
    /// Minimum physical value
    pub min: f64,
    /// Maximum physical value
    pub max: f64,
    /// Engineering unit (e.g., "km/h", "V")
    pub unit: Option<String>,
    /// Multiplexer value selecting this signal (None if not multiplexed)
    pub multiplexer_value: Option<u64>,
}

/// Byte order for signal packing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian (Intel format)
    LittleEndian,
    /// Big-endian (Motorola format)
    BigEndian,
}

/// Value type for signal interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Signed,
    Unsigned,
}

/// The signal database
pub struct SignalDatabase {
    /// All message definitions by CAN ID
    messages: HashMap<u32, MessageDefinition>,

    /// Signal name lookup
    /// Key: Signal name, Value: CAN IDs of the messages carrying it, in load order
    signal_lookup: HashMap<String, Vec<u32>>,
}

impl SignalDatabase {
    /// Create a new empty signal database
    pub fn new() -> Self {
        Self {
            messages: HashMap::new(),
            signal_lookup: HashMap::new(),
        }
    }

    /// Add a message definition to the database
    ///
    /// A later definition with the same CAN ID replaces the earlier one.
    pub fn add_message(&mut self, message: MessageDefinition) {
        let can_id = message.id;

        if let Some(previous) = self.messages.remove(&can_id) {
            log::warn!(
                "CAN ID 0x{:X} defined twice ({} and {}), keeping {}",
                can_id,
                previous.name,
                message.name,
                message.name
            );
            for signal in &previous.signals {
                if let Some(ids) = self.signal_lookup.get_mut(&signal.name) {
                    ids.retain(|id| *id != can_id);
                }
            }
        }

        for signal in &message.signals {
            self.signal_lookup
                .entry(signal.name.clone())
                .or_default()
                .push(can_id);
        }

        self.messages.insert(can_id, message);
    }

    /// Get the message definition for a CAN ID
    pub fn get_message(&self, can_id: u32) -> Option<&MessageDefinition> {
        self.messages.get(&can_id)
    }

    /// Find the CAN ID of the first message carrying a signal
    pub fn find_frame_id(&self, signal_name: &str) -> Option<u32> {
        self.signal_lookup
            .get(signal_name)
            .and_then(|ids| ids.first())
            .copied()
    }

    /// Get database statistics
    pub fn stats(&self) -> DatabaseStats {
        DatabaseStats {
            num_messages: self.messages.len(),
            num_signals: self.messages.values().map(|msg| msg.signals.len()).sum(),
        }
    }

    /// Get all unique CAN IDs in the database
    pub fn get_all_can_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.messages.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

/// Database statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Total number of message definitions
    pub num_messages: usize,
    /// Total number of signal definitions
    pub num_signals: usize,
}

impl Default for SignalDatabase {
    fn default() -> Self {
        Self::new()
    }
}
