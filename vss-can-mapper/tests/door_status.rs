// End-to-end mapping of VSS door and mirror targets onto the left door status frame
use std::path::PathBuf;
use vss_can_mapper::{FrameCodec, FrameDefaults, MapperError, MappingTable, SignalValue};

const DRIVER_DOOR: &str = "Vehicle.Cabin.Door.Row1.DriverSide.IsOpen";
const PASSENGER_DOOR: &str = "Vehicle.Cabin.Door.Row1.PassengerSide.IsOpen";
const MIRROR_TILT: &str = "Vehicle.Body.Mirrors.DriverSide.Tilt";

fn demo_file(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("demos")
        .join(name)
}

fn setup() -> (FrameCodec, MappingTable) {
    let _ = env_logger::builder().is_test(true).try_init();
    let codec = FrameCodec::from_dbc_file(&demo_file("vcleft.dbc")).unwrap();
    let table = MappingTable::from_file(&demo_file("vss_dbc.json"), &codec).unwrap();
    (codec, table)
}

#[test]
fn door_open_sets_latch_status() {
    let (codec, mut table) = setup();
    let defaults = FrameDefaults::builtin();

    let open = SignalValue::Boolean(true);
    let touched = table.apply_updates([(DRIVER_DOOR, &open)]);
    assert_eq!(touched.iter().copied().collect::<Vec<_>>(), vec![258]);

    let latch = table.entries_for_path(DRIVER_DOOR).next().unwrap();
    assert_eq!(latch.last_value, Some(SignalValue::Integer(1)));

    let values = table.frame_values(258, &defaults).unwrap();
    assert_eq!(values.len(), 20);
    assert_eq!(values["VCLEFT_frontLatchStatus"], SignalValue::Integer(1));
    assert!(values
        .iter()
        .filter(|(name, _)| *name != "VCLEFT_frontLatchStatus")
        .all(|(_, value)| *value == SignalValue::Integer(0)));

    let data = codec.encode(258, &values).unwrap();
    assert_eq!(data, vec![0x01, 0, 0, 0, 0, 0, 0, 0]);

    let decoded = codec.decode(258, &data).unwrap();
    assert_eq!(decoded["VCLEFT_frontLatchStatus"], SignalValue::Integer(1));
}

#[test]
fn mirror_tilt_goes_through_expression() {
    let (codec, mut table) = setup();
    let defaults = FrameDefaults::builtin();

    let centered = SignalValue::Integer(0);
    let touched = table.apply_updates([(MIRROR_TILT, &centered)]);
    assert!(touched.contains(&258));

    let values = table.frame_values(258, &defaults).unwrap();
    assert_eq!(values["VCLEFT_mirrorTiltYPosition"], SignalValue::Float(2.5));

    // 2.5 V at 0.02 V/bit is raw 125 in bits 52..60
    let data = codec.encode(258, &values).unwrap();
    assert_eq!(data[6], 0xD0);
    assert_eq!(data[7], 0x07);
}

#[test]
fn unmatched_lookup_falls_back_to_default() {
    let (_codec, mut table) = setup();
    let defaults = FrameDefaults::builtin();

    let open = SignalValue::Boolean(true);
    table.apply_updates([(DRIVER_DOOR, &open)]);

    let not_a_bool = SignalValue::from("ajar");
    table.apply_updates([(DRIVER_DOOR, &not_a_bool)]);

    let values = table.frame_values(258, &defaults).unwrap();
    assert_eq!(values["VCLEFT_frontLatchStatus"], SignalValue::Integer(0));
}

#[test]
fn frames_without_defaults_are_not_built() {
    let (codec, mut table) = setup();
    let defaults = FrameDefaults::builtin();

    let open = SignalValue::Boolean(true);
    let touched = table.apply_updates([(PASSENGER_DOOR, &open)]);
    assert_eq!(touched.iter().copied().collect::<Vec<_>>(), vec![259]);
    assert!(!defaults.supports(259));
    assert!(matches!(
        table.frame_values(259, &defaults),
        Err(MapperError::UnsupportedFrame(259))
    ));

    assert!(matches!(
        table.frame_values(999, &defaults),
        Err(MapperError::UnsupportedFrame(999))
    ));
    assert_eq!(codec.signal_names(259).unwrap().len(), 2);
}

#[test]
fn unmapped_path_changes_nothing() {
    let (_codec, mut table) = setup();

    let on = SignalValue::Boolean(true);
    let touched = table.apply_updates([("Vehicle.Body.Mirrors.DriverSide.IsHeatingOn", &on)]);
    assert!(touched.is_empty());
    assert!(table
        .frame_ids()
        .into_iter()
        .flat_map(|id| table.entries_for_frame(id).collect::<Vec<_>>())
        .all(|entry| entry.last_value.is_none()));
}

#[test]
fn demo_updates_reach_mapped_paths() {
    let (_codec, table) = setup();
    assert!(table.contains_path(DRIVER_DOOR));
    assert!(table.contains_path(PASSENGER_DOOR));

    let updates = std::fs::read_to_string(demo_file("updates.jsonl")).unwrap();
    for line in updates.lines().filter(|line| !line.trim().is_empty()) {
        let batch: Vec<serde_json::Value> = serde_json::from_str(line).unwrap();
        for update in batch {
            let path = update["path"].as_str().unwrap();
            assert!(table.contains_path(path), "{} is not mapped", path);
        }
    }
}
