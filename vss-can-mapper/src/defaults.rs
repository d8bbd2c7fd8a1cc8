//! Default signal values per frame
//!
//! The encoder needs a value for every signal of a frame even when only one
//! of them changed. Frames are only built for CAN ids that have a default set
//! here; the shipped table covers the left door status frame (0x102) only.

use crate::types::SignalValue;
use std::collections::{BTreeMap, HashMap};

/// CAN id of `ID102VCLEFT_doorStatus`
pub const VCLEFT_DOOR_STATUS_ID: u32 = 258;

const VCLEFT_DOOR_STATUS_SIGNALS: [&str; 20] = [
    "VCLEFT_frontHandlePWM",
    "VCLEFT_frontHandlePulled",
    "VCLEFT_frontHandlePulledPersist",
    "VCLEFT_frontIntSwitchPressed",
    "VCLEFT_frontLatchStatus",
    "VCLEFT_frontLatchSwitch",
    "VCLEFT_frontRelActuatorSwitch",
    "VCLEFT_mirrorDipped",
    "VCLEFT_mirrorFoldState",
    "VCLEFT_mirrorHeatState",
    "VCLEFT_mirrorRecallState",
    "VCLEFT_mirrorState",
    "VCLEFT_mirrorTiltXPosition",
    "VCLEFT_mirrorTiltYPosition",
    "VCLEFT_rearHandlePWM",
    "VCLEFT_rearHandlePulled",
    "VCLEFT_rearIntSwitchPressed",
    "VCLEFT_rearLatchStatus",
    "VCLEFT_rearLatchSwitch",
    "VCLEFT_rearRelActuatorSwitch",
];

/// Default value sets keyed by CAN id
#[derive(Debug, Clone, Default)]
pub struct FrameDefaults {
    frames: HashMap<u32, BTreeMap<String, SignalValue>>,
}

impl FrameDefaults {
    /// An empty table; no frame can be built from it
    pub fn new() -> Self {
        Self::default()
    }

    /// The shipped table: zero for every signal of the left door status frame
    pub fn builtin() -> Self {
        let mut defaults = Self::new();
        defaults.insert(
            VCLEFT_DOOR_STATUS_ID,
            VCLEFT_DOOR_STATUS_SIGNALS
                .iter()
                .map(|name| (name.to_string(), SignalValue::Integer(0))),
        );
        defaults
    }

    /// Declare the default set for a frame, replacing any previous one
    pub fn insert<I>(&mut self, frame_id: u32, values: I)
    where
        I: IntoIterator<Item = (String, SignalValue)>,
    {
        self.frames.insert(frame_id, values.into_iter().collect());
    }

    pub fn get(&self, frame_id: u32) -> Option<&BTreeMap<String, SignalValue>> {
        self.frames.get(&frame_id)
    }

    /// True if frames with this id may be built and sent
    pub fn supports(&self, frame_id: u32) -> bool {
        self.frames.contains_key(&frame_id)
    }
}
