//! Frame codec
//!
//! Wraps the signal database loaded from DBC files and converts between a
//! map of signal values and the packed bytes of a CAN frame. Handles bit
//! placement for both byte orders, signedness, scaling and multiplexing.

use crate::signals::database::{ByteOrder, MessageDefinition, SignalDefinition, ValueType};
use crate::signals::{DatabaseStats, SignalDatabase};
use crate::types::{MapperError, Result, SignalValue};
use std::collections::BTreeMap;
use std::path::Path;

/// Frame codec - entry point for DBC loading, encoding and decoding
pub struct FrameCodec {
    signal_db: SignalDatabase,
}

impl FrameCodec {
    /// Create a codec with an empty signal database
    pub fn new() -> Self {
        Self {
            signal_db: SignalDatabase::new(),
        }
    }

    /// Create a codec from a single DBC file
    pub fn from_dbc_file(path: &Path) -> Result<Self> {
        let mut codec = Self::new();
        codec.add_dbc(path)?;
        Ok(codec)
    }

    /// Load a DBC file and add its definitions to the signal database
    ///
    /// # Example
    /// ```no_run
    /// use vss_can_mapper::FrameCodec;
    /// use std::path::Path;
    ///
    /// let mut codec = FrameCodec::new();
    /// codec.add_dbc(Path::new("Model3CAN.dbc")).unwrap();
    /// ```
    pub fn add_dbc(&mut self, path: &Path) -> Result<()> {
        let messages = crate::signals::dbc::parse_dbc_file(path)?;
        for message in messages {
            self.signal_db.add_message(message);
        }
        log::info!("DBC file loaded successfully: {:?}", path);
        Ok(())
    }

    /// Add definitions from DBC content already in memory
    pub fn add_dbc_str(&mut self, content: &str) -> Result<()> {
        for message in crate::signals::dbc::parse_dbc_str(content)? {
            self.signal_db.add_message(message);
        }
        Ok(())
    }

    /// Resolve which CAN frame carries a signal
    pub fn resolve_frame_id(&self, signal_name: &str) -> Option<u32> {
        match self.signal_db.find_frame_id(signal_name) {
            Some(id) => {
                log::info!(
                    "Found signal {} in CAN frame id 0x{:02x}",
                    signal_name,
                    id
                );
                Some(id)
            }
            None => {
                log::warn!("Signal {} not found in DBC file", signal_name);
                None
            }
        }
    }

    /// Get the message definition for a CAN ID
    pub fn message(&self, frame_id: u32) -> Result<&MessageDefinition> {
        self.signal_db
            .get_message(frame_id)
            .ok_or(MapperError::MessageNotFound(frame_id))
    }

    /// Names of all signals packed into a frame
    pub fn signal_names(&self, frame_id: u32) -> Result<Vec<&str>> {
        Ok(self
            .message(frame_id)?
            .signals
            .iter()
            .map(|s| s.name.as_str())
            .collect())
    }

    /// True if the frame uses a 29-bit identifier
    pub fn is_extended(&self, frame_id: u32) -> bool {
        self.signal_db
            .get_message(frame_id)
            .map(|m| m.is_extended)
            .unwrap_or(false)
    }

    pub fn database_stats(&self) -> DatabaseStats {
        self.signal_db.stats()
    }

    /// Encode physical signal values into frame bytes
    ///
    /// Every signal active in the frame must have a value. Multiplexed
    /// signals are packed only when the multiplexer value selects them.
    pub fn encode(&self, frame_id: u32, values: &BTreeMap<String, SignalValue>) -> Result<Vec<u8>> {
        let message = self.message(frame_id)?;
        let mut data = vec![0u8; message.size];

        let multiplexer_value = match &message.multiplexer_signal {
            Some(mux_name) => {
                let mux_signal = message
                    .signals
                    .iter()
                    .find(|s| s.name == *mux_name)
                    .ok_or_else(|| missing(frame_id, mux_name))?;
                let value = values
                    .get(mux_name)
                    .ok_or_else(|| missing(frame_id, mux_name))?;
                Some(physical_to_raw(mux_signal, value)?)
            }
            None => None,
        };

        for signal in &message.signals {
            if !is_active(signal, multiplexer_value) {
                continue;
            }
            let value = values
                .get(&signal.name)
                .ok_or_else(|| missing(frame_id, &signal.name))?;
            let raw = physical_to_raw(signal, value)?;
            let positions = bit_positions(signal, message.size)?;
            for (i, pos) in positions.into_iter().enumerate() {
                if (raw >> i) & 1 == 1 {
                    data[pos / 8] |= 1 << (pos % 8);
                }
            }
        }

        Ok(data)
    }

    /// Decode frame bytes into physical signal values
    pub fn decode(&self, frame_id: u32, data: &[u8]) -> Result<BTreeMap<String, SignalValue>> {
        let message = self.message(frame_id)?;
        if data.len() < message.size {
            return Err(MapperError::InvalidData(format!(
                "CAN ID 0x{:X} needs {} bytes but frame has {}",
                frame_id,
                message.size,
                data.len()
            )));
        }

        let multiplexer_value = match &message.multiplexer_signal {
            Some(mux_name) => match message.signals.iter().find(|s| s.name == *mux_name) {
                Some(mux_signal) => Some(extract_raw(data, mux_signal, message.size)?),
                None => None,
            },
            None => None,
        };

        let mut values = BTreeMap::new();
        for signal in &message.signals {
            if !is_active(signal, multiplexer_value) {
                continue;
            }
            let raw = extract_raw(data, signal, message.size)?;
            let raw = match signal.value_type {
                ValueType::Unsigned => raw as i64,
                ValueType::Signed => sign_extend(raw, signal.length as usize),
            };
            let value = if signal.factor == 1.0 && signal.offset == 0.0 {
                SignalValue::Integer(raw)
            } else {
                SignalValue::Float(signal.offset + signal.factor * raw as f64)
            };
            values.insert(signal.name.clone(), value);
        }

        Ok(values)
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn missing(frame_id: u32, signal: &str) -> MapperError {
    MapperError::MissingSignalValue {
        frame_id,
        signal: signal.to_string(),
    }
}

fn is_active(signal: &SignalDefinition, multiplexer_value: Option<u64>) -> bool {
    match signal.multiplexer_value {
        Some(selector) => multiplexer_value == Some(selector),
        None => true,
    }
}

/// Convert a physical value to the raw bit pattern of a signal
fn physical_to_raw(signal: &SignalDefinition, value: &SignalValue) -> Result<u64> {
    let physical = value.as_f64().ok_or_else(|| MapperError::NonNumericValue {
        signal: signal.name.clone(),
        value: value.clone(),
    })?;

    let raw = ((physical - signal.offset) / signal.factor).round();
    let length = signal.length as i32;
    let (min_raw, max_raw) = match signal.value_type {
        ValueType::Unsigned => (0.0, 2f64.powi(length) - 1.0),
        ValueType::Signed => (-(2f64.powi(length - 1)), 2f64.powi(length - 1) - 1.0),
    };
    if !raw.is_finite() || raw < min_raw || raw > max_raw {
        return Err(MapperError::ValueOutOfRange {
            signal: signal.name.clone(),
            value: value.clone(),
            length: signal.length,
        });
    }

    let bits = match signal.value_type {
        ValueType::Unsigned => raw as u64,
        ValueType::Signed => raw as i64 as u64,
    };
    Ok(bits & mask(signal.length as usize))
}

fn mask(length: usize) -> u64 {
    if length >= 64 {
        u64::MAX
    } else {
        (1u64 << length) - 1
    }
}

/// Absolute bit positions of a signal, least significant bit first
///
/// Positions use DBC numbering: `byte * 8 + bit`, bit 0 being the LSB of the
/// byte. Intel signals start at their LSB and grow upward; Motorola signals
/// start at their MSB and walk down each byte before jumping to the MSB of
/// the next one.
fn bit_positions(signal: &SignalDefinition, frame_size: usize) -> Result<Vec<usize>> {
    let start = signal.start_bit as usize;
    let length = signal.length as usize;
    let frame_bits = frame_size * 8;

    let positions: Vec<usize> = match signal.byte_order {
        ByteOrder::LittleEndian => (start..start + length).collect(),
        ByteOrder::BigEndian => {
            let mut msb_first = Vec::with_capacity(length);
            let mut pos = start;
            for i in 0..length {
                msb_first.push(pos);
                if i + 1 < length {
                    pos = if pos % 8 == 0 { pos + 15 } else { pos - 1 };
                }
            }
            msb_first.reverse();
            msb_first
        }
    };

    if positions.iter().any(|&pos| pos >= frame_bits) {
        return Err(MapperError::InvalidData(format!(
            "Signal '{}' does not fit in a {} byte frame",
            signal.name, frame_size
        )));
    }
    Ok(positions)
}

fn extract_raw(data: &[u8], signal: &SignalDefinition, frame_size: usize) -> Result<u64> {
    let mut raw = 0u64;
    for (i, pos) in bit_positions(signal, frame_size)?.into_iter().enumerate() {
        let bit = (data[pos / 8] >> (pos % 8)) & 0x01;
        raw |= (bit as u64) << i;
    }
    Ok(raw)
}

/// Sign-extend a value from N bits to 64 bits
fn sign_extend(value: u64, bit_length: usize) -> i64 {
    if bit_length >= 64 {
        return value as i64;
    }

    let sign_bit = 1u64 << (bit_length - 1);
    if (value & sign_bit) != 0 {
        let mask = !0u64 << bit_length;
        (value | mask) as i64
    } else {
        value as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_DBC: &str = r#"
VERSION ""

NS_ :

BS_:

BU_: ECU1 ECU2

BO_ 291 EngineData: 8 ECU1
 SG_ EngineSpeed : 0|16@1+ (1,0) [0|8000] "rpm" ECU2
 SG_ EngineTemp : 16|8@1+ (1,-40) [-40|215] "C" ECU2
 SG_ Torque : 31|12@0- (0.5,0) [-1024|1023.5] "Nm" ECU2

BO_ 512 MultiplexedMsg: 4 ECU1
 SG_ Mode M : 0|8@1+ (1,0) [0|3] "" ECU1
 SG_ SignalA m0 : 8|16@1+ (1,0) [0|100] "%" ECU1
 SG_ SignalB m1 : 8|16@1+ (0.1,0) [0|1000] "mV" ECU1
"#;

    fn codec() -> FrameCodec {
        let mut codec = FrameCodec::new();
        codec.add_dbc_str(TEST_DBC).unwrap();
        codec
    }

    fn values(pairs: &[(&str, SignalValue)]) -> BTreeMap<String, SignalValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_encode_little_endian_with_offset() {
        let codec = codec();
        let data = codec
            .encode(
                291,
                &values(&[
                    ("EngineSpeed", SignalValue::Integer(0x1234)),
                    ("EngineTemp", SignalValue::Integer(20)),
                    ("Torque", SignalValue::Integer(0)),
                ]),
            )
            .unwrap();
        assert_eq!(data.len(), 8);
        assert_eq!(data[0], 0x34);
        assert_eq!(data[1], 0x12);
        // 20 C with offset -40 is raw 60
        assert_eq!(data[2], 60);
    }

    #[test]
    fn test_encode_big_endian_signed() {
        let codec = codec();
        let data = codec
            .encode(
                291,
                &values(&[
                    ("EngineSpeed", SignalValue::Integer(0)),
                    ("EngineTemp", SignalValue::Integer(-40)),
                    ("Torque", SignalValue::Float(-0.5)),
                ]),
            )
            .unwrap();
        // raw -1 in 12 bits: MSB at bit 31, all of byte 3 plus the top nibble of byte 4
        assert_eq!(data[3], 0xFF);
        assert_eq!(data[4], 0xF0);

        let decoded = codec.decode(291, &data).unwrap();
        assert_eq!(decoded["Torque"], SignalValue::Float(-0.5));
        assert_eq!(decoded["EngineTemp"], SignalValue::Float(-40.0));
    }

    #[test]
    fn test_encode_missing_signal() {
        let codec = codec();
        let result = codec.encode(291, &values(&[("EngineSpeed", SignalValue::Integer(1))]));
        assert!(matches!(
            result,
            Err(MapperError::MissingSignalValue { frame_id: 291, .. })
        ));
    }

    #[test]
    fn test_encode_rejects_out_of_range_and_text() {
        let codec = codec();
        let too_big = codec.encode(
            291,
            &values(&[
                ("EngineSpeed", SignalValue::Integer(70_000)),
                ("EngineTemp", SignalValue::Integer(0)),
                ("Torque", SignalValue::Integer(0)),
            ]),
        );
        assert!(matches!(too_big, Err(MapperError::ValueOutOfRange { .. })));

        let text = codec.encode(
            291,
            &values(&[
                ("EngineSpeed", SignalValue::from("fast")),
                ("EngineTemp", SignalValue::Integer(0)),
                ("Torque", SignalValue::Integer(0)),
            ]),
        );
        assert!(matches!(text, Err(MapperError::NonNumericValue { .. })));
    }

    #[test]
    fn test_encode_multiplexed_only_packs_selected_signal() {
        let codec = codec();
        // SignalA is not needed when Mode selects SignalB
        let data = codec
            .encode(
                512,
                &values(&[
                    ("Mode", SignalValue::Integer(1)),
                    ("SignalB", SignalValue::Float(25.6)),
                ]),
            )
            .unwrap();
        assert_eq!(data, vec![0x01, 0x00, 0x01, 0x00]);

        let decoded = codec.decode(512, &data).unwrap();
        assert!(decoded.contains_key("SignalB"));
        assert!(!decoded.contains_key("SignalA"));
    }

    #[test]
    fn test_unknown_frame() {
        let codec = codec();
        assert!(matches!(
            codec.encode(999, &BTreeMap::new()),
            Err(MapperError::MessageNotFound(999))
        ));
        assert_eq!(codec.resolve_frame_id("NoSuchSignal"), None);
        assert_eq!(codec.resolve_frame_id("SignalB"), Some(512));
    }

    #[test]
    fn test_decode_short_frame() {
        let codec = codec();
        assert!(matches!(
            codec.decode(291, &[0x00, 0x01]),
            Err(MapperError::InvalidData(_))
        ));
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0x7F, 8), 127);
        assert_eq!(sign_extend(0xFF, 8), -1);
        assert_eq!(sign_extend(0x8000, 16), -32768);
    }
}
