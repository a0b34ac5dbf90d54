use serde::Serialize;

use super::event::OldRow;

#[derive(Serialize)]
struct NewImage<'a, T> {
    new: &'a T,
}

#[derive(Serialize)]
struct OldImage {
    old: OldRow,
}

/// A change as delivered by the platform, before decoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEnvelope {
    /// Delivery identifier (redeliveries of the same change share it)
    pub id: String,
    /// "INSERT", "UPDATE" or "DELETE"
    pub event_type: String,
    /// JSON body with `new` and/or `old` row images
    pub payload: Vec<u8>,
    /// Optional metadata (schema, table, commit timestamp, ...)
    pub metadata: Option<Vec<(String, String)>>,
}

impl ChangeEnvelope {
    pub const INSERT: &'static str = "INSERT";
    pub const UPDATE: &'static str = "UPDATE";
    pub const DELETE: &'static str = "DELETE";

    /// Create an envelope from raw parts.
    pub fn new(id: impl Into<String>, event_type: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            event_type: event_type.into(),
            payload,
            metadata: None,
        }
    }

    /// Envelope announcing a newly inserted row.
    pub fn inserted<T: Serialize>(
        id: impl Into<String>,
        row: &T,
    ) -> Result<Self, serde_json::Error> {
        let payload = serde_json::to_vec(&NewImage { new: row })?;
        Ok(Self::new(id, Self::INSERT, payload))
    }

    /// Envelope announcing a changed row.
    pub fn updated<T: Serialize>(
        id: impl Into<String>,
        row: &T,
    ) -> Result<Self, serde_json::Error> {
        let payload = serde_json::to_vec(&NewImage { new: row })?;
        Ok(Self::new(id, Self::UPDATE, payload))
    }

    /// Envelope announcing a deleted row, identified by key only.
    pub fn removed(id: impl Into<String>, row_id: impl Into<String>) -> Self {
        let image = OldImage {
            old: OldRow { id: row_id.into() },
        };
        // A single string field always serializes.
        let payload = serde_json::to_vec(&image).unwrap_or_default();
        Self::new(id, Self::DELETE, payload)
    }

    /// Add metadata to the envelope.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(Vec::new)
            .push((key.into(), value.into()));
        self
    }

    /// Look up a metadata value.
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .as_ref()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Get the payload as a string (if valid UTF-8).
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}
