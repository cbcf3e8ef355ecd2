use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::error::{TunesError, Result};
use crate::note::NoteEvent;

/// How a note travels through Redis.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    #[default]
    Json,
    Bincode,
}

impl PayloadFormat {
    pub fn encode(&self, note: &NoteEvent) -> Result<Vec<u8>> {
        match self {
            PayloadFormat::Json => Ok(serde_json::to_vec(note)?),
            PayloadFormat::Bincode => Ok(bincode::serialize(note)?),
        }
    }

    pub fn decode(&self, payload: &[u8]) -> Result<NoteEvent> {
        match self {
            PayloadFormat::Json => decode_json(payload),
            PayloadFormat::Bincode => Ok(bincode::deserialize(payload)?),
        }
    }
}

impl FromStr for PayloadFormat {
    type Err = TunesError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(PayloadFormat::Json),
            "bincode" | "binary" => Ok(PayloadFormat::Bincode),
            other => Err(TunesError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadFormat::Json => f.write_str("json"),
            PayloadFormat::Bincode => f.write_str("bincode"),
        }
    }
}

// Accepts anything other producers reasonably send: only `note` and
// `duration` are required and the duration may arrive as a string.
fn decode_json(payload: &[u8]) -> Result<NoteEvent> {
    let text = String::from_utf8_lossy(payload);
    let value: Value = serde_json::from_slice(payload)
        .map_err(|e| TunesError::MalformedMessage(format!("invalid JSON {text}: {e}")))?;

    let object = value
        .as_object()
        .ok_or_else(|| TunesError::MalformedMessage(format!("not a JSON object: {text}")))?;

    let (note, duration) = match (object.get("note"), object.get("duration")) {
        (Some(note), Some(duration)) => (note, duration),
        _ => {
            return Err(TunesError::MalformedMessage(format!(
                "missing 'note' or 'duration': {text}"
            )))
        }
    };

    let note = match note {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    let duration = match duration {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| TunesError::MalformedMessage(format!("invalid duration: {duration}")))?;

    let priority = object.get("priority").and_then(Value::as_i64);
    let seq = object.get("seq").and_then(Value::as_u64).unwrap_or(0);

    Ok(NoteEvent {
        note,
        duration,
        priority,
        seq,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_layout() {
        let note = NoteEvent::new("C4", 0.5).with_priority(2).with_seq(7);
        let bytes = PayloadFormat::Json.encode(&note).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["note"], "C4");
        assert_eq!(value["duration"], 0.5);
        assert_eq!(value["priority"], 2);
        assert_eq!(value["seq"], 7);
        assert_eq!(PayloadFormat::Json.decode(&bytes).unwrap(), note);
    }

    #[test]
    fn test_json_decoding_is_lenient() {
        let note = PayloadFormat::Json
            .decode(br#"{"note": "A4", "duration": "0.75"}"#)
            .unwrap();
        assert_eq!(note.note, "A4");
        assert_eq!(note.duration, 0.75);
        assert_eq!(note.priority, None);
        assert_eq!(note.seq, 0);

        let numeric_note = PayloadFormat::Json
            .decode(br#"{"note": 5, "duration": 1}"#)
            .unwrap();
        assert_eq!(numeric_note.note, "5");
        assert_eq!(numeric_note.duration, 1.0);
    }

    #[test]
    fn test_json_rejections() {
        let cases: [&[u8]; 5] = [
            b"not json",
            b"[1, 2]",
            br#"{"note": "C4"}"#,
            br#"{"duration": 1.0}"#,
            br#"{"note": "C4", "duration": "slow"}"#,
        ];
        for payload in cases {
            let result = PayloadFormat::Json.decode(payload);
            assert!(
                matches!(result, Err(TunesError::MalformedMessage(_))),
                "payload {:?} should be rejected",
                String::from_utf8_lossy(payload)
            );
        }
    }

    #[test]
    fn test_bincode_is_strict() {
        let note = NoteEvent::new("Eb5", 0.25).with_seq(1);
        let bytes = PayloadFormat::Bincode.encode(&note).unwrap();
        assert_eq!(PayloadFormat::Bincode.decode(&bytes).unwrap(), note);

        assert!(PayloadFormat::Bincode.decode(&bytes[..3]).is_err());
        assert!(PayloadFormat::Json.decode(&bytes).is_err());
    }

    #[test]
    fn test_format_names() {
        assert_eq!("JSON".parse::<PayloadFormat>().unwrap(), PayloadFormat::Json);
        assert_eq!("binary".parse::<PayloadFormat>().unwrap(), PayloadFormat::Bincode);
        assert!("pickle".parse::<PayloadFormat>().is_err());
        assert_eq!(PayloadFormat::Bincode.to_string(), "bincode");
    }
}
