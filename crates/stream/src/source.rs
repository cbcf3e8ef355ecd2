use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;

use futures::{Stream, StreamExt};
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Msg};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tunes_models::{Result, TunesError};

use crate::connection::RedisConnection;
use crate::message::{collect_entries, Payload};
use crate::target::{DEFAULT_CHANNEL, DEFAULT_STREAM_KEY};

const STREAM_READ_COUNT: usize = 100;
const STREAM_BLOCK_MS: usize = 1000;
const LIST_POP_TIMEOUT_SECS: u64 = 1;

/// How the player receives notes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedMode {
    #[default]
    Pubsub,
    Poll,
    #[serde(alias = "stream")]
    PollStream,
    List,
}

impl FromStr for FeedMode {
    type Err = TunesError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pubsub" => Ok(FeedMode::Pubsub),
            "poll" => Ok(FeedMode::Poll),
            "poll_stream" | "stream" => Ok(FeedMode::PollStream),
            "list" => Ok(FeedMode::List),
            other => Err(TunesError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for FeedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeedMode::Pubsub => "pubsub",
            FeedMode::Poll => "poll",
            FeedMode::PollStream => "poll_stream",
            FeedMode::List => "list",
        };
        f.write_str(name)
    }
}

/// The default channel name never holds a stream, so stream mode reads the
/// stream the publisher writes by default instead.
pub fn resolve_stream_key(channel: &str) -> String {
    if channel == DEFAULT_CHANNEL {
        DEFAULT_STREAM_KEY.to_string()
    } else {
        channel.to_string()
    }
}

/// Somewhere notes arrive from, one payload at a time.
#[allow(async_fn_in_trait)]
pub trait NoteSource {
    /// Wait for the next payload; `None` once the source is closed.
    async fn next_payload(&mut self) -> Result<Option<Payload>>;

    /// Last stream id consumed, for sources that have one.
    fn position(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct SourceOptions {
    pub channel: String,
    pub poll_interval: Duration,
    pub stream_from_id: String,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_string(),
            poll_interval: Duration::from_millis(500),
            stream_from_id: "0".to_string(),
        }
    }
}

pub struct PubSubSource {
    channel: String,
    messages: Pin<Box<dyn Stream<Item = Msg>>>,
}

impl PubSubSource {
    pub async fn subscribe(connection: &RedisConnection, channel: &str) -> Result<Self> {
        let mut pubsub = connection.client().get_async_connection().await?.into_pubsub();
        pubsub.subscribe(channel).await?;
        info!("🎧 Subscribed to Redis channel '{}'", channel);

        Ok(Self {
            channel: channel.to_string(),
            messages: Box::pin(pubsub.into_on_message()),
        })
    }
}

impl NoteSource for PubSubSource {
    async fn next_payload(&mut self) -> Result<Option<Payload>> {
        match self.messages.next().await {
            Some(msg) => {
                debug!("📨 Message on '{}'", msg.get_channel_name());
                Ok(Some(Payload::new(msg.get_payload::<Vec<u8>>()?)))
            }
            None => {
                info!("Subscription to '{}' ended", self.channel);
                Ok(None)
            }
        }
    }
}

/// Remembers the last value handed out so an unchanged key is played once.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    last: Option<Vec<u8>>,
}

impl ChangeDetector {
    pub fn observe(&mut self, value: Vec<u8>) -> Option<Vec<u8>> {
        if self.last.as_ref() == Some(&value) {
            return None;
        }
        self.last = Some(value.clone());
        Some(value)
    }
}

/// The single-key read behind [`KeyPollSource`].
#[allow(async_fn_in_trait)]
pub trait KeyReader {
    async fn read_key(&mut self, key: &str) -> Result<Option<Vec<u8>>>;
}

impl KeyReader for MultiplexedConnection {
    async fn read_key(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.get(key).await?)
    }
}

/// The blocking stream read behind [`StreamPollSource`].
#[allow(async_fn_in_trait)]
pub trait StreamReader {
    /// Entries of `key` after `id`; `None` when the block timed out.
    async fn read_stream(&mut self, key: &str, id: &str) -> Result<Option<StreamReadReply>>;
}

impl StreamReader for MultiplexedConnection {
    async fn read_stream(&mut self, key: &str, id: &str) -> Result<Option<StreamReadReply>> {
        let options = StreamReadOptions::default()
            .count(STREAM_READ_COUNT)
            .block(STREAM_BLOCK_MS);
        Ok(self.xread_options(&[key], &[id], &options).await?)
    }
}

pub struct KeyPollSource<C = MultiplexedConnection> {
    conn: C,
    key: String,
    interval: Duration,
    changes: ChangeDetector,
    polled: bool,
}

impl<C: KeyReader> KeyPollSource<C> {
    pub fn new(conn: C, key: &str, interval: Duration) -> Self {
        Self {
            conn,
            key: key.to_string(),
            interval,
            changes: ChangeDetector::default(),
            polled: false,
        }
    }
}

impl<C: KeyReader> NoteSource for KeyPollSource<C> {
    async fn next_payload(&mut self) -> Result<Option<Payload>> {
        loop {
            if self.polled {
                tokio::time::sleep(self.interval).await;
            }
            self.polled = true;

            let value = self.conn.read_key(&self.key).await?;
            if let Some(fresh) = value.and_then(|v| self.changes.observe(v)) {
                return Ok(Some(Payload::new(fresh)));
            }
        }
    }
}

pub struct StreamPollSource<C = MultiplexedConnection> {
    conn: C,
    key: String,
    next_id: String,
    last_seen: Option<String>,
    pending: VecDeque<Payload>,
}

impl<C: StreamReader> StreamPollSource<C> {
    pub fn new(conn: C, key: &str, from_id: &str) -> Self {
        Self {
            conn,
            key: key.to_string(),
            next_id: from_id.to_string(),
            last_seen: None,
            pending: VecDeque::new(),
        }
    }
}

impl<C: StreamReader> NoteSource for StreamPollSource<C> {
    async fn next_payload(&mut self) -> Result<Option<Payload>> {
        loop {
            if let Some(payload) = self.pending.pop_front() {
                self.last_seen = payload.id.clone();
                return Ok(Some(payload));
            }

            debug!("Reading from Redis stream {} at id {}", self.key, self.next_id);
            if let Some(reply) = self.conn.read_stream(&self.key, &self.next_id).await? {
                let batch = collect_entries(reply, &self.key);
                if let Some(id) = batch.last_id {
                    self.next_id = id;
                }
                self.pending.extend(batch.payloads);
            }
        }
    }

    fn position(&self) -> Option<String> {
        self.last_seen.clone()
    }
}

pub struct ListPopSource {
    conn: MultiplexedConnection,
    key: String,
}

impl ListPopSource {
    pub fn new(conn: MultiplexedConnection, key: &str) -> Self {
        Self { conn, key: key.to_string() }
    }
}

impl NoteSource for ListPopSource {
    async fn next_payload(&mut self) -> Result<Option<Payload>> {
        loop {
            let popped: Option<(String, Vec<u8>)> = redis::cmd("BLPOP")
                .arg(&self.key)
                .arg(LIST_POP_TIMEOUT_SECS)
                .query_async(&mut self.conn)
                .await?;
            if let Some((_, bytes)) = popped {
                return Ok(Some(Payload::new(bytes)));
            }
        }
    }
}

/// A source picked at runtime from a [`FeedMode`].
pub enum RedisSource {
    PubSub(PubSubSource),
    KeyPoll(KeyPollSource),
    StreamPoll(StreamPollSource),
    ListPop(ListPopSource),
}

impl RedisSource {
    pub async fn open(connection: &RedisConnection, mode: FeedMode, options: &SourceOptions) -> Result<Self> {
        let source = match mode {
            FeedMode::Pubsub => RedisSource::PubSub(PubSubSource::subscribe(connection, &options.channel).await?),
            FeedMode::Poll => {
                info!("🔁 Polling key '{}' every {:?}", options.channel, options.poll_interval);
                RedisSource::KeyPoll(KeyPollSource::new(
                    connection.dedicated().await?,
                    &options.channel,
                    options.poll_interval,
                ))
            }
            FeedMode::PollStream => {
                let key = resolve_stream_key(&options.channel);
                info!("🌊 Reading stream '{}' from id {}", key, options.stream_from_id);
                RedisSource::StreamPoll(StreamPollSource::new(
                    connection.dedicated().await?,
                    &key,
                    &options.stream_from_id,
                ))
            }
            FeedMode::List => {
                info!("📥 Popping notes from list '{}'", options.channel);
                RedisSource::ListPop(ListPopSource::new(connection.dedicated().await?, &options.channel))
            }
        };
        Ok(source)
    }
}

impl NoteSource for RedisSource {
    async fn next_payload(&mut self) -> Result<Option<Payload>> {
        match self {
            RedisSource::PubSub(source) => source.next_payload().await,
            RedisSource::KeyPoll(source) => source.next_payload().await,
            RedisSource::StreamPoll(source) => source.next_payload().await,
            RedisSource::ListPop(source) => source.next_payload().await,
        }
    }

    fn position(&self) -> Option<String> {
        match self {
            RedisSource::StreamPoll(source) => source.position(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::streams::{StreamId, StreamKey};
    use redis::Value;
    use std::collections::HashMap;
    use tokio::time::Instant;

    #[test]
    fn test_feed_mode_parsing() {
        assert_eq!("pubsub".parse::<FeedMode>().unwrap(), FeedMode::Pubsub);
        assert_eq!("poll".parse::<FeedMode>().unwrap(), FeedMode::Poll);
        assert_eq!("poll_stream".parse::<FeedMode>().unwrap(), FeedMode::PollStream);
        assert_eq!("stream".parse::<FeedMode>().unwrap(), FeedMode::PollStream);
        assert_eq!("LIST".parse::<FeedMode>().unwrap(), FeedMode::List);
        assert!("tail".parse::<FeedMode>().is_err());
        assert_eq!(FeedMode::PollStream.to_string(), "poll_stream");
    }

    #[test]
    fn test_stream_key_substitution() {
        assert_eq!(resolve_stream_key("music"), "music_stream");
        assert_eq!(resolve_stream_key("drums"), "drums");
        assert_eq!(resolve_stream_key("music_stream"), "music_stream");
    }

    struct ScriptedKey {
        values: VecDeque<Option<&'static str>>,
        current: Option<&'static str>,
    }

    impl ScriptedKey {
        fn new(values: &[Option<&'static str>]) -> Self {
            Self {
                values: values.iter().copied().collect(),
                current: None,
            }
        }
    }

    impl KeyReader for ScriptedKey {
        // Holds the last scripted value once the script runs out.
        async fn read_key(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
            assert_eq!(key, "music");
            if let Some(next) = self.values.pop_front() {
                self.current = next;
            }
            Ok(self.current.map(|v| v.as_bytes().to_vec()))
        }
    }

    struct ScriptedStream {
        replies: VecDeque<(&'static str, StreamReadReply)>,
    }

    impl StreamReader for ScriptedStream {
        async fn read_stream(&mut self, key: &str, id: &str) -> Result<Option<StreamReadReply>> {
            assert_eq!(key, "music_stream");
            match self.replies.pop_front() {
                Some((expected_id, reply)) => {
                    assert_eq!(id, expected_id);
                    Ok(Some(reply))
                }
                None => {
                    tokio::time::sleep(Duration::from_millis(STREAM_BLOCK_MS as u64)).await;
                    Ok(None)
                }
            }
        }
    }

    fn reply(entries: &[(&str, Option<&str>)]) -> StreamReadReply {
        let ids = entries
            .iter()
            .map(|(id, data)| {
                let mut map = HashMap::new();
                map.insert("timestamp".to_string(), Value::Data(b"t".to_vec()));
                if let Some(data) = data {
                    map.insert("data".to_string(), Value::Data(data.as_bytes().to_vec()));
                }
                StreamId { id: id.to_string(), map }
            })
            .collect();
        StreamReadReply {
            keys: vec![StreamKey { key: "music_stream".to_string(), ids }],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_poll_waits_for_missing_key() {
        let reader = ScriptedKey::new(&[None, None, Some("C4")]);
        let mut source = KeyPollSource::new(reader, "music", Duration::from_millis(100));

        let started = Instant::now();
        let payload = source.next_payload().await.unwrap().unwrap();
        assert_eq!(payload.bytes, b"C4");
        assert_eq!(started.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_poll_skips_unchanged_values() {
        let reader = ScriptedKey::new(&[Some("C4"), Some("C4"), Some("C4"), Some("D4")]);
        let mut source = KeyPollSource::new(reader, "music", Duration::from_millis(100));

        assert_eq!(source.next_payload().await.unwrap().unwrap().bytes, b"C4");
        let started = Instant::now();
        assert_eq!(source.next_payload().await.unwrap().unwrap().bytes, b"D4");
        assert_eq!(started.elapsed(), Duration::from_millis(300));

        // the key keeps holding D4, which is never handed out again
        let again = tokio::time::timeout(Duration::from_secs(5), source.next_payload()).await;
        assert!(again.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_poll_advances_past_entries_without_data() {
        let reader = ScriptedStream {
            replies: VecDeque::from([
                ("0", reply(&[("1-0", Some("C4")), ("2-0", None)])),
                ("2-0", reply(&[("3-0", None)])),
                ("3-0", reply(&[("4-0", Some("E4"))])),
            ]),
        };
        let mut source = StreamPollSource::new(reader, "music_stream", "0");
        assert_eq!(source.position(), None);

        let first = source.next_payload().await.unwrap().unwrap();
        assert_eq!(first, Payload::new(b"C4".to_vec()).with_id("1-0"));
        assert_eq!(source.position().as_deref(), Some("1-0"));

        let second = source.next_payload().await.unwrap().unwrap();
        assert_eq!(second, Payload::new(b"E4".to_vec()).with_id("4-0"));
        assert_eq!(source.position().as_deref(), Some("4-0"));

        // nothing new: the read keeps blocking and timing out
        let idle = tokio::time::timeout(Duration::from_secs(3), source.next_payload()).await;
        assert!(idle.is_err());
        assert_eq!(source.position().as_deref(), Some("4-0"));
    }

    #[test]
    fn test_change_detector() {
        let mut changes = ChangeDetector::default();
        assert_eq!(changes.observe(b"a".to_vec()), Some(b"a".to_vec()));
        assert_eq!(changes.observe(b"a".to_vec()), None);
        assert_eq!(changes.observe(b"a".to_vec()), None);
        assert_eq!(changes.observe(b"b".to_vec()), Some(b"b".to_vec()));
        assert_eq!(changes.observe(b"a".to_vec()), Some(b"a".to_vec()));
    }
}
