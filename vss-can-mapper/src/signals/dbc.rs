//! DBC file parser
//!
//! Parses Vector DBC files and converts them into our internal signal database format.

use crate::signals::database::{ByteOrder, MessageDefinition, SignalDefinition, ValueType};
use crate::types::{MapperError, Result};
use std::path::Path;

/// Bit 31 of a DBC message ID marks an extended (29-bit) identifier
const EXTENDED_ID_FLAG: u32 = 0x8000_0000;

/// Parse a DBC file and return message definitions
pub fn parse_dbc_file(path: &Path) -> Result<Vec<MessageDefinition>> {
    log::info!("Parsing DBC file: {:?}", path);

    let bytes = std::fs::read(path).map_err(|e| {
        MapperError::DbcParseError(format!("Failed to read file {:?}: {}", path, e))
    })?;

    // Non-UTF8 files are treated as Latin-1 (compatible with Windows-1252)
    let dbc_content = match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(e) => {
            log::warn!("DBC file is not UTF-8, trying Latin-1 encoding");
            e.into_bytes().iter().map(|&b| b as char).collect()
        }
    };

    let messages = parse_dbc_str(&dbc_content).map_err(|e| match e {
        MapperError::DbcParseError(detail) => {
            MapperError::DbcParseError(format!("{:?}: {}", path, detail))
        }
        other => other,
    })?;

    log::info!("Parsed {} messages from {:?}", messages.len(), path);
    Ok(messages)
}

/// Parse DBC content that is already in memory
pub fn parse_dbc_str(content: &str) -> Result<Vec<MessageDefinition>> {
    let dbc = can_dbc::DBC::from_slice(content.as_bytes())
        .map_err(|e| MapperError::DbcParseError(format!("{:?}", e)))?;

    dbc.messages().iter().map(convert_message).collect()
}

/// Convert a can-dbc message to our MessageDefinition
fn convert_message(dbc_msg: &can_dbc::Message) -> Result<MessageDefinition> {
    let multiplexer_signal = dbc_msg
        .signals()
        .iter()
        .find(|sig| {
            matches!(
                sig.multiplexer_indicator(),
                can_dbc::MultiplexIndicator::Multiplexor
            )
        })
        .map(|sig| sig.name().to_string());

    let signals = dbc_msg
        .signals()
        .iter()
        .map(|sig| convert_signal(sig, multiplexer_signal.is_some()))
        .collect::<Result<Vec<_>>>()?;

    let raw_id = dbc_msg.message_id().0;

    Ok(MessageDefinition {
        id: raw_id & !EXTENDED_ID_FLAG,
        is_extended: raw_id & EXTENDED_ID_FLAG != 0,
        name: dbc_msg.message_name().to_string(),
        size: *dbc_msg.message_size() as usize,
        sender: match dbc_msg.transmitter() {
            can_dbc::Transmitter::NodeName(name) => Some(name.to_string()),
            _ => None,
        },
        signals,
        multiplexer_signal,
    })
}

/// Convert a can-dbc signal to our SignalDefinition
fn convert_signal(dbc_sig: &can_dbc::Signal, has_multiplexer: bool) -> Result<SignalDefinition> {
    let byte_order = match *dbc_sig.byte_order() {
        can_dbc::ByteOrder::LittleEndian => ByteOrder::LittleEndian,
        can_dbc::ByteOrder::BigEndian => ByteOrder::BigEndian,
    };

    let value_type = match *dbc_sig.value_type() {
        can_dbc::ValueType::Signed => ValueType::Signed,
        can_dbc::ValueType::Unsigned => ValueType::Unsigned,
    };

    let multiplexer_value = match *dbc_sig.multiplexer_indicator() {
        can_dbc::MultiplexIndicator::MultiplexedSignal(switch_value) => {
            if !has_multiplexer {
                return Err(MapperError::DbcParseError(format!(
                    "Multiplexed signal '{}' but no multiplexer found",
                    dbc_sig.name()
                )));
            }
            Some(switch_value)
        }
        _ => None,
    };

    let length = *dbc_sig.signal_size() as u16;
    if length == 0 || length > 64 {
        return Err(MapperError::DbcParseError(format!(
            "Signal '{}' has unsupported length {}",
            dbc_sig.name(),
            length
        )));
    }

    Ok(SignalDefinition {
        name: dbc_sig.name().to_string(),
        start_bit: *dbc_sig.start_bit() as u16,
        length,
        byte_order,
        value_type,
        factor: *dbc_sig.factor(),
        offset: *dbc_sig.offset(),
        min: *dbc_sig.min(),
        max: *dbc_sig.max(),
        unit: if dbc_sig.unit().is_empty() {
            None
        } else {
            Some(dbc_sig.unit().to_string())
        },
        multiplexer_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_simple_dbc() {
        let dbc_content = r#"
VERSION ""

NS_ :
    NS_DESC_
    CM_
    BA_DEF_
    BA_
    VAL_

BS_:

BU_: VCLEFT Receiver

BO_ 258 ID102VCLEFT_doorStatus: 8 VCLEFT
 SG_ VCLEFT_frontLatchStatus : 0|4@1+ (1,0) [0|8] "" Receiver
 SG_ VCLEFT_mirrorTiltXPosition : 44|8@1+ (0.02,0) [0|5] "V" Receiver

BO_ 2147484417 ExtendedMsg: 4 VCLEFT
 SG_ Counter : 7|8@0- (1,0) [-128|127] "" Receiver
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(dbc_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let messages = parse_dbc_file(temp_file.path()).unwrap();
        assert_eq!(messages.len(), 2);

        let door = &messages[0];
        assert_eq!(door.id, 258);
        assert!(!door.is_extended);
        assert_eq!(door.name, "ID102VCLEFT_doorStatus");
        assert_eq!(door.size, 8);
        assert_eq!(door.sender, Some("VCLEFT".to_string()));
        assert_eq!(door.signals.len(), 2);

        let tilt = &door.signals[1];
        assert_eq!(tilt.name, "VCLEFT_mirrorTiltXPosition");
        assert_eq!(tilt.start_bit, 44);
        assert_eq!(tilt.length, 8);
        assert_eq!(tilt.factor, 0.02);
        assert_eq!(tilt.unit, Some("V".to_string()));

        let extended = &messages[1];
        assert_eq!(extended.id, 0x301);
        assert!(extended.is_extended);
        assert_eq!(extended.signals[0].byte_order, ByteOrder::BigEndian);
        assert_eq!(extended.signals[0].value_type, ValueType::Signed);
    }

    #[test]
    fn test_parse_multiplexed_signals() {
        let dbc_content = r#"
VERSION ""

NS_ :

BS_:

BU_: ECU1

BO_ 512 MultiplexedMsg: 8 ECU1
 SG_ Mode M : 0|8@1+ (1,0) [0|3] "" ECU1
 SG_ SignalA m0 : 8|16@1+ (1,0) [0|100] "%" ECU1
 SG_ SignalB m1 : 8|16@1+ (0.1,0) [0|1000] "mV" ECU1
"#;

        let messages = parse_dbc_str(dbc_content).unwrap();

        assert_eq!(messages.len(), 1);
        let msg = &messages[0];
        assert_eq!(msg.multiplexer_signal, Some("Mode".to_string()));
        assert_eq!(msg.signals.len(), 3);

        let sig_b = msg.signals.iter().find(|s| s.name == "SignalB").unwrap();
        assert_eq!(sig_b.multiplexer_value, Some(1));
    }

    #[test]
    fn test_parse_invalid_dbc() {
        let result = parse_dbc_str("this is not a dbc file");
        assert!(matches!(result, Err(MapperError::DbcParseError(_))));
    }

    #[test]
    fn test_parse_invalid_dbc_file_names_path_once() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"this is not a dbc file").unwrap();
        temp_file.flush().unwrap();

        let message = parse_dbc_file(temp_file.path()).unwrap_err().to_string();
        assert!(message.starts_with("Failed to parse DBC file: "));
        assert_eq!(message.matches("Failed to parse DBC file").count(), 1);
        assert!(message.contains(&format!("{:?}", temp_file.path())));
    }
}
