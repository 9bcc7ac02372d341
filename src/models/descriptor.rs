//! Normalized listing entry shared by both providers.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer, ser::SerializeStruct};

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Metadata describing one remote object, whichever provider it lives in.
///
/// A descriptor never carries the object's bytes. `human_size` and
/// `transferable` are derived from `size_bytes` at serialization time and are
/// not stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    /// Name shown to the operator; unique within the provider's scope.
    pub name: String,

    /// Size in bytes. `0` means unknown size or a container-like entry.
    pub size_bytes: u64,

    /// MIME type reported by the hierarchical provider.
    pub kind: Option<String>,

    /// Creation time, when the provider exposes one.
    pub created_at: Option<DateTime<Utc>>,

    /// Opaque id used to fetch the content again (source listing only).
    pub provider_object_id: Option<String>,
}

impl ObjectDescriptor {
    pub fn new(name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            kind: None,
            created_at: None,
            provider_object_id: None,
        }
    }

    pub fn with_kind(mut self, kind: Option<String>) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_created_at(mut self, created_at: Option<DateTime<Utc>>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_provider_object_id(mut self, id: impl Into<String>) -> Self {
        self.provider_object_id = Some(id.into());
        self
    }

    pub fn human_size(&self) -> String {
        human_size(self.size_bytes)
    }

    /// Zero-sized entries (folders, shortcuts, native documents) are listed
    /// but never offered as migration sources.
    pub fn is_transferable(&self) -> bool {
        self.size_bytes > 0
    }
}

impl Serialize for ObjectDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ObjectDescriptor", 7)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("humanSize", &self.human_size())?;
        state.serialize_field("sizeBytes", &self.size_bytes)?;
        match &self.kind {
            Some(kind) => state.serialize_field("kind", kind)?,
            None => state.skip_field("kind")?,
        }
        match &self.created_at {
            Some(created_at) => state.serialize_field("createdAt", created_at)?,
            None => state.skip_field("createdAt")?,
        }
        match &self.provider_object_id {
            Some(id) => state.serialize_field("providerObjectId", id)?,
            None => state.skip_field("providerObjectId")?,
        }
        state.serialize_field("transferable", &self.is_transferable())?;
        state.end()
    }
}

/// Format a byte count with the largest unit whose scaled value is at least 1.
///
/// The scaled value is rounded to two decimals with trailing zeros dropped,
/// so `1536` becomes `"1.5 KB"` and `1024` becomes `"1 KB"`.
pub fn human_size(size_bytes: u64) -> String {
    let mut unit = 0usize;
    let mut threshold = 1024u64;
    while unit + 1 < SIZE_UNITS.len() && size_bytes >= threshold {
        unit += 1;
        threshold = threshold.saturating_mul(1024);
    }

    let scaled = size_bytes as f64 / 1024f64.powi(unit as i32);
    let rounded = (scaled * 100.0).round() / 100.0;
    format!("{} {}", rounded, SIZE_UNITS[unit])
}
