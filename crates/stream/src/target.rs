use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tunes_models::{Result, TunesError};

pub const DEFAULT_CHANNEL: &str = "music";
pub const DEFAULT_STREAM_KEY: &str = "music_stream";
pub const DEFAULT_STREAM_MAXLEN: usize = 100;

/// Which Redis primitive the publisher writes to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PublishMode {
    #[default]
    Pubsub,
    Key,
    Set,
    List,
    Stream,
}

impl FromStr for PublishMode {
    type Err = TunesError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pubsub" => Ok(PublishMode::Pubsub),
            "key" => Ok(PublishMode::Key),
            "set" => Ok(PublishMode::Set),
            "list" => Ok(PublishMode::List),
            "stream" => Ok(PublishMode::Stream),
            other => Err(TunesError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for PublishMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PublishMode::Pubsub => "pubsub",
            PublishMode::Key => "key",
            PublishMode::Set => "set",
            PublishMode::List => "list",
            PublishMode::Stream => "stream",
        };
        f.write_str(name)
    }
}

/// Names the publisher writes under, before a mode is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetNames {
    pub channel: String,
    pub stream_key: String,
    pub stream_maxlen: Option<usize>,
    pub ttl_seconds: Option<u64>,
}

impl Default for TargetNames {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_string(),
            stream_key: DEFAULT_STREAM_KEY.to_string(),
            stream_maxlen: Some(DEFAULT_STREAM_MAXLEN),
            ttl_seconds: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishTarget {
    Channel { name: String },
    Key { name: String, ttl_seconds: Option<u64> },
    Set { name: String },
    List { name: String },
    Stream { name: String, maxlen: Option<usize> },
}

impl PublishTarget {
    pub fn resolve(mode: PublishMode, names: &TargetNames) -> Self {
        let name = names.channel.clone();
        match mode {
            PublishMode::Pubsub => PublishTarget::Channel { name },
            PublishMode::Key => PublishTarget::Key {
                name,
                ttl_seconds: names.ttl_seconds.filter(|ttl| *ttl > 0),
            },
            PublishMode::Set => PublishTarget::Set { name },
            PublishMode::List => PublishTarget::List { name },
            PublishMode::Stream => PublishTarget::Stream {
                name: names.stream_key.clone(),
                maxlen: names.stream_maxlen.filter(|len| *len > 0),
            },
        }
    }

    pub fn mode(&self) -> PublishMode {
        match self {
            PublishTarget::Channel { .. } => PublishMode::Pubsub,
            PublishTarget::Key { .. } => PublishMode::Key,
            PublishTarget::Set { .. } => PublishMode::Set,
            PublishTarget::List { .. } => PublishMode::List,
            PublishTarget::Stream { .. } => PublishMode::Stream,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PublishTarget::Channel { name }
            | PublishTarget::Key { name, .. }
            | PublishTarget::Set { name }
            | PublishTarget::List { name }
            | PublishTarget::Stream { name, .. } => name,
        }
    }
}

/// What Redis answered for a single write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteReceipt {
    /// Number of subscribers that received the message.
    Delivered(i64),
    Stored,
    /// Length of the list after the push.
    Pushed(i64),
    /// False when the member was already in the set.
    Added(bool),
    /// Id assigned to the stream entry.
    Appended(String),
}

/// Anything a score can be published into.
#[allow(async_fn_in_trait)]
pub trait NoteStore {
    async fn write(&mut self, target: &PublishTarget, payload: &[u8]) -> Result<WriteReceipt>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("pubsub".parse::<PublishMode>().unwrap(), PublishMode::Pubsub);
        assert_eq!(" Stream ".parse::<PublishMode>().unwrap(), PublishMode::Stream);
        assert_eq!("list".parse::<PublishMode>().unwrap(), PublishMode::List);
        assert!(matches!(
            "queue".parse::<PublishMode>(),
            Err(TunesError::UnknownMode(name)) if name == "queue"
        ));
        assert_eq!(PublishMode::Key.to_string(), "key");
    }

    #[test]
    fn test_target_resolution() {
        let names = TargetNames {
            ttl_seconds: Some(30),
            ..TargetNames::default()
        };

        assert_eq!(
            PublishTarget::resolve(PublishMode::Pubsub, &names),
            PublishTarget::Channel { name: "music".to_string() }
        );
        assert_eq!(
            PublishTarget::resolve(PublishMode::Key, &names),
            PublishTarget::Key { name: "music".to_string(), ttl_seconds: Some(30) }
        );
        assert_eq!(
            PublishTarget::resolve(PublishMode::Stream, &names),
            PublishTarget::Stream { name: "music_stream".to_string(), maxlen: Some(100) }
        );

        let target = PublishTarget::resolve(PublishMode::Set, &names);
        assert_eq!(target.mode(), PublishMode::Set);
        assert_eq!(target.name(), "music");
    }

    #[test]
    fn test_zero_limits_mean_unbounded() {
        let names = TargetNames {
            stream_maxlen: Some(0),
            ttl_seconds: Some(0),
            ..TargetNames::default()
        };
        assert_eq!(
            PublishTarget::resolve(PublishMode::Stream, &names),
            PublishTarget::Stream { name: "music_stream".to_string(), maxlen: None }
        );
        assert_eq!(
            PublishTarget::resolve(PublishMode::Key, &names),
            PublishTarget::Key { name: "music".to_string(), ttl_seconds: None }
        );
    }
}
