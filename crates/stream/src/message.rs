// Stream entry layout and XREAD reply handling

use chrono::Utc;
use redis::streams::StreamReadReply;
use tracing::warn;

pub const DATA_FIELD: &str = "data";
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// The fields written for every stream entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEnvelope {
    pub data: Vec<u8>,
    pub timestamp: String,
}

impl StreamEnvelope {
    pub fn new(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn fields(&self) -> [(&'static str, &[u8]); 2] {
        [
            (DATA_FIELD, self.data.as_slice()),
            (TIMESTAMP_FIELD, self.timestamp.as_bytes()),
        ]
    }
}

/// A raw note as received from Redis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub bytes: Vec<u8>,
    /// Stream entry id, for payloads read from a stream.
    pub id: Option<String>,
}

impl Payload {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, id: None }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct StreamBatch {
    pub payloads: Vec<Payload>,
    pub last_id: Option<String>,
}

/// Pull the `data` field out of every entry read from `stream_key`.
///
/// The last id advances past entries without usable data so they are not
/// read again.
pub fn collect_entries(reply: StreamReadReply, stream_key: &str) -> StreamBatch {
    let mut batch = StreamBatch::default();

    for key in reply.keys {
        if key.key != stream_key {
            warn!("⚠️  Got an entry from the wrong stream {}", key.key);
            continue;
        }
        for entry in key.ids {
            batch.last_id = Some(entry.id.clone());
            match entry.get::<Vec<u8>>(DATA_FIELD) {
                Some(bytes) => batch.payloads.push(Payload::new(bytes).with_id(entry.id)),
                None => warn!("⚠️  Stream entry {} has no '{}' field", entry.id, DATA_FIELD),
            }
        }
    }

    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::streams::{StreamId, StreamKey};
    use redis::Value;
    use std::collections::HashMap;

    fn entry(id: &str, fields: &[(&str, &[u8])]) -> StreamId {
        let map: HashMap<String, Value> = fields
            .iter()
            .map(|(k, v)| (k.to_string(), Value::Data(v.to_vec())))
            .collect();
        StreamId { id: id.to_string(), map }
    }

    #[test]
    fn test_envelope_fields() {
        let envelope = StreamEnvelope::new(b"{\"note\":\"C4\"}");
        let fields = envelope.fields();

        assert_eq!(fields[0].0, "data");
        assert_eq!(fields[0].1, b"{\"note\":\"C4\"}");
        assert_eq!(fields[1].0, "timestamp");
        assert!(chrono::DateTime::parse_from_rfc3339(&envelope.timestamp).is_ok());
    }

    #[test]
    fn test_collect_entries() {
        let reply = StreamReadReply {
            keys: vec![
                StreamKey {
                    key: "music_stream".to_string(),
                    ids: vec![
                        entry("1-0", &[("data", b"one"), ("timestamp", b"t")]),
                        entry("2-0", &[("timestamp", b"t")]),
                        entry("3-0", &[("data", b"three")]),
                    ],
                },
                StreamKey {
                    key: "other".to_string(),
                    ids: vec![entry("9-0", &[("data", b"nope")])],
                },
            ],
        };

        let batch = collect_entries(reply, "music_stream");

        assert_eq!(
            batch.payloads,
            vec![
                Payload::new(b"one".to_vec()).with_id("1-0"),
                Payload::new(b"three".to_vec()).with_id("3-0"),
            ]
        );
        assert_eq!(batch.last_id.as_deref(), Some("3-0"));
    }

    #[test]
    fn test_empty_reply() {
        let batch = collect_entries(StreamReadReply { keys: vec![] }, "music_stream");
        assert!(batch.payloads.is_empty());
        assert_eq!(batch.last_id, None);
    }
}
