//! Wire types served by the sniffer's web API.
//!
//! `/log` returns a window over the device's ring buffer as a JSON array of
//! [`RemoteEntry`] values; `/status` returns a single [`DeviceStatus`] object.

use serde::{Deserialize, Deserializer, Serialize};

/// Largest payload a classic CAN frame can carry.
pub const MAX_DLC: u8 = 8;

/// One entry in the device's log buffer.
///
/// Anything carrying a `mark` key is an annotation, regardless of what else
/// it carries; everything else must be a complete data frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteEntry {
    /// Free-text mark inserted from the web UI.
    Annotation(Annotation),
    /// A received CAN frame.
    Frame(Frame),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(rename = "s")]
    pub sequence: u64,
    #[serde(rename = "t")]
    pub timestamp_ms: u64,
    #[serde(rename = "mark")]
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "s")]
    pub sequence: u64,
    #[serde(rename = "t")]
    pub timestamp_ms: u64,
    /// Frame identifier (11-bit in practice, but not enforced)
    pub id: u32,
    #[serde(rename = "dlc")]
    pub length: u8,
    /// Payload bytes as the device renders them, e.g. `"0a ff 12"`
    #[serde(rename = "data")]
    pub payload: String,
}

impl RemoteEntry {
    /// Sequence number assigned by the device.
    pub fn sequence(&self) -> u64 {
        match self {
            RemoteEntry::Annotation(a) => a.sequence,
            RemoteEntry::Frame(f) => f.sequence,
        }
    }

    /// Milliseconds since the device booted.
    pub fn timestamp_ms(&self) -> u64 {
        match self {
            RemoteEntry::Annotation(a) => a.timestamp_ms,
            RemoteEntry::Frame(f) => f.timestamp_ms,
        }
    }

    pub fn is_annotation(&self) -> bool {
        matches!(self, RemoteEntry::Annotation(_))
    }

    /// Checks constraints serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            RemoteEntry::Frame(f) if f.length > MAX_DLC => Err(format!(
                "entry s={} has dlc {} (max {})",
                f.sequence, f.length, MAX_DLC
            )),
            _ => Ok(()),
        }
    }
}

/// Parsed `/status` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    #[serde(default)]
    pub running: bool,

    /// Bus configuration, e.g. `"250K"`
    #[serde(deserialize_with = "string_or_number")]
    pub baud: String,

    /// Frames received since boot
    #[serde(default)]
    pub messages: u64,

    /// Controller read errors since boot
    #[serde(default)]
    pub errors: u64,

    /// Distinct identifiers seen since boot
    #[serde(default, rename = "uniqueIds")]
    pub unique_ids: u64,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Baud {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Baud::deserialize(deserializer)? {
        Baud::Text(s) => s,
        Baud::Number(n) => n.to_string(),
    })
}

/// Decodes a `/log` body, rejecting the whole snapshot if any entry is bad.
pub fn decode_snapshot(body: &[u8]) -> Result<Vec<RemoteEntry>, String> {
    let entries: Vec<RemoteEntry> = serde_json::from_slice(body).map_err(|e| e.to_string())?;
    for entry in &entries {
        entry.validate()?;
    }
    Ok(entries)
}

/// Decodes a `/status` body.
pub fn decode_status(body: &[u8]) -> Result<DeviceStatus, String> {
    serde_json::from_slice(body).map_err(|e| e.to_string())
}
