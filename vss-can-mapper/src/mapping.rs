//! VSS to CAN mapping table
//!
//! The mapping file mirrors the VSS tree. Leaf signals that should be written
//! to the bus carry a `vss2dbc` declaration naming the DBC signal and an
//! optional transform:
//!
//! ```json
//! {"Vehicle": {"type": "branch", "children": {
//!     "Cabin": {"type": "branch", "children": {
//!         "Door": {"type": "branch", "children": {
//!             "IsOpen": {"type": "actuator", "datatype": "boolean",
//!                 "vss2dbc": {"signal": "VCLEFT_frontLatchStatus",
//!                             "transform": {"mapping": [{"from": true, "to": 1},
//!                                                       {"from": false, "to": 0}]}}}}}}}}}}
//! ```
//!
//! The table is built once and indexed both by VSS path and by CAN frame id.

use crate::codec::FrameCodec;
use crate::transform::Transform;
use crate::types::{Field, MapperError, Result, SignalValue, SubscribeEntry};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Key of the tree-model to bus-model declaration on a leaf signal
pub const DECLARATION_KEY: &str = "vss2dbc";

const SIGNAL_TYPES: [&str; 3] = ["sensor", "actuator", "attribute"];
const BRANCH_TYPE: &str = "branch";

/// One VSS path to DBC signal correspondence
#[derive(Debug, Clone)]
pub struct MappingEntry {
    /// Target signal name in the DBC
    pub dbc_name: String,
    /// CAN frame carrying the target signal
    pub frame_id: u32,
    /// Conversion rule; `None` is the identity
    pub transform: Option<Transform>,
    /// Most recent transformed value; `None` until the first update and
    /// after an update whose transform produced nothing
    pub last_value: Option<SignalValue>,
}

impl MappingEntry {
    pub fn new(dbc_name: impl Into<String>, frame_id: u32, transform: Option<Transform>) -> Self {
        Self {
            dbc_name: dbc_name.into(),
            frame_id,
            transform,
            last_value: None,
        }
    }
}

/// All mappings, indexed by VSS path and by CAN frame id
///
/// Entries live in a single arena; the two indices hold positions into it so
/// that a value written through the path index is visible through the frame
/// index.
#[derive(Debug, Default)]
pub struct MappingTable {
    entries: Vec<MappingEntry>,
    by_path: HashMap<String, Vec<usize>>,
    by_frame: BTreeMap<u32, Vec<usize>>,
}

impl MappingTable {
    /// Build the table from a parsed mapping document
    ///
    /// `frame_lookup` resolves a DBC signal name to the CAN id of the frame
    /// carrying it. Declarations naming an unknown signal are dropped with a
    /// warning; malformed declarations are an error.
    pub fn build<F>(schema: &serde_json::Value, frame_lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<u32>,
    {
        let mut table = Self::default();
        table.traverse("", schema, "", &frame_lookup)?;
        log::info!(
            "Mapping table built: {} entries for {} paths in {} frames",
            table.entries.len(),
            table.by_path.len(),
            table.by_frame.len()
        );
        Ok(table)
    }

    /// Read a mapping file and build the table against a codec's DBC
    pub fn from_file(path: &Path, codec: &FrameCodec) -> Result<Self> {
        log::info!("Reading mapping from {:?}", path);
        let content = std::fs::read_to_string(path).map_err(|e| {
            MapperError::MappingFileError(format!("Failed to read {:?}: {}", path, e))
        })?;
        let schema: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
            MapperError::MappingFileError(format!("Failed to read json from {:?}: {}", path, e))
        })?;
        Self::build(&schema, |name| codec.resolve_frame_id(name))
    }

    /// Add an entry under a VSS path
    pub fn insert(&mut self, path: impl Into<String>, entry: MappingEntry) {
        let index = self.entries.len();
        self.by_frame.entry(entry.frame_id).or_default().push(index);
        self.by_path.entry(path.into()).or_default().push(index);
        self.entries.push(entry);
    }

    fn traverse<F>(&mut self, name: &str, node: &serde_json::Value, prefix: &str, frame_lookup: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<u32>,
    {
        let object = match node.as_object() {
            Some(object) => object,
            None => return Ok(()),
        };

        match object.get("type").and_then(|t| t.as_str()) {
            Some(BRANCH_TYPE) => {
                let branch_path = format!("{}{}", prefix, name);
                match object.get("children").and_then(|c| c.as_object()) {
                    Some(children) => {
                        let child_prefix = format!("{}.", branch_path);
                        for (child_name, child) in children {
                            self.traverse(child_name, child, &child_prefix, frame_lookup)?;
                        }
                    }
                    None => log::warn!("Branch {} has no children", branch_path),
                }
            }
            Some(kind) if SIGNAL_TYPES.contains(&kind) => {
                self.analyze_signal(&format!("{}{}", prefix, name), object, frame_lookup)?;
            }
            _ => {
                // Grouping object without a path component of its own
                for (member_name, member) in object {
                    self.traverse(member_name, member, prefix, frame_lookup)?;
                }
            }
        }
        Ok(())
    }

    fn analyze_signal<F>(
        &mut self,
        path: &str,
        node: &serde_json::Map<String, serde_json::Value>,
        frame_lookup: &F,
    ) -> Result<()>
    where
        F: Fn(&str) -> Option<u32>,
    {
        let declaration = match node.get(DECLARATION_KEY) {
            Some(declaration) => declaration,
            None => return Ok(()),
        };
        log::debug!("Signal {} has {}", path, DECLARATION_KEY);

        let declaration = declaration.as_object().ok_or_else(|| {
            MapperError::invalid_mapping(path, format!("{} is not an object", DECLARATION_KEY))
        })?;

        let dbc_name = declaration
            .get("signal")
            .and_then(|s| s.as_str())
            .unwrap_or("");
        if dbc_name.is_empty() {
            return Err(MapperError::invalid_mapping(path, "no dbc signal found"));
        }

        let transform = extract_transform(path, declaration)?;

        let frame_id = match frame_lookup(dbc_name) {
            Some(frame_id) => frame_id,
            None => {
                log::warn!(
                    "Signal {} for {} not found in any frame, mapping dropped",
                    dbc_name,
                    path
                );
                return Ok(());
            }
        };

        self.insert(path, MappingEntry::new(dbc_name, frame_id, transform));
        Ok(())
    }

    /// Entries mapped from a VSS path, in declaration order
    pub fn entries_for_path(&self, path: &str) -> impl Iterator<Item = &MappingEntry> {
        self.by_path
            .get(path)
            .into_iter()
            .flatten()
            .map(move |&i| &self.entries[i])
    }

    /// Entries packed into a CAN frame
    pub fn entries_for_frame(&self, frame_id: u32) -> impl Iterator<Item = &MappingEntry> {
        self.by_frame
            .get(&frame_id)
            .into_iter()
            .flatten()
            .map(move |&i| &self.entries[i])
    }

    pub(crate) fn indices_for_path(&self, path: &str) -> Option<&[usize]> {
        self.by_path.get(path).map(|v| v.as_slice())
    }

    pub(crate) fn entry_mut(&mut self, index: usize) -> &mut MappingEntry {
        &mut self.entries[index]
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }

    /// All mapped VSS paths, sorted
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.by_path.keys().map(|p| p.as_str()).collect();
        paths.sort_unstable();
        paths
    }

    /// All CAN frames with at least one mapped signal
    pub fn frame_ids(&self) -> Vec<u32> {
        self.by_frame.keys().copied().collect()
    }

    /// Subscription requests for every mapped path, target value only
    pub fn subscribe_entries(&self) -> Vec<SubscribeEntry> {
        self.paths()
            .into_iter()
            .map(|path| {
                log::info!("Subscribing to {}", path);
                SubscribeEntry {
                    path: path.to_string(),
                    fields: vec![Field::ActuatorTarget],
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Pull the transform section out of a declaration
///
/// The section is normally nested under `transform`; a declaration carrying
/// `mapping` or `math` directly is accepted as well.
fn extract_transform(
    path: &str,
    declaration: &serde_json::Map<String, serde_json::Value>,
) -> Result<Option<Transform>> {
    if let Some(section) = declaration.get("transform") {
        return Transform::from_json(path, section).map(Some);
    }
    if declaration.contains_key("mapping") || declaration.contains_key("math") {
        let mut section = declaration.clone();
        section.remove("signal");
        return Transform::from_json(path, &serde_json::Value::Object(section)).map(Some);
    }
    log::debug!("No transformation found for {}", path);
    Ok(None)
}
