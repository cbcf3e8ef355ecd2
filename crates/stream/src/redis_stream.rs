// Redis publishing implementation

use redis::aio::MultiplexedConnection;
use redis::streams::StreamMaxlen;
use redis::AsyncCommands;
use tracing::{debug, info};
use tunes_models::Result;

use crate::connection::RedisConnection;
use crate::message::StreamEnvelope;
use crate::target::{NoteStore, PublishTarget, WriteReceipt};

pub struct RedisPublisher {
    conn: MultiplexedConnection,
}

impl RedisPublisher {
    pub fn new(connection: &RedisConnection) -> Self {
        Self { conn: connection.connection() }
    }

    /// `PUBLISH`; returns the number of subscribers reached.
    pub async fn publish_to_channel(&mut self, channel: &str, payload: &[u8]) -> Result<i64> {
        let subscribers: i64 = self.conn.publish(channel, payload).await?;
        debug!("📣 Published {} bytes to '{}' ({} subscribers)", payload.len(), channel, subscribers);
        Ok(subscribers)
    }

    /// `SET`, or `SET .. EX` when a TTL is given.
    pub async fn set_object(&mut self, key: &str, payload: &[u8], ttl_seconds: Option<u64>) -> Result<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(payload);
        if let Some(ttl) = ttl_seconds {
            cmd.arg("EX").arg(ttl);
        }
        cmd.query_async::<_, ()>(&mut self.conn).await?;
        Ok(())
    }

    pub async fn push_to_list(&mut self, key: &str, payload: &[u8]) -> Result<i64> {
        Ok(self.conn.rpush(key, payload).await?)
    }

    pub async fn add_to_set(&mut self, key: &str, payload: &[u8]) -> Result<bool> {
        let added: i64 = self.conn.sadd(key, payload).await?;
        Ok(added > 0)
    }

    /// `XADD` with `data` and `timestamp` fields, trimmed to roughly `maxlen`.
    pub async fn add_to_stream(&mut self, stream: &str, payload: &[u8], maxlen: Option<usize>) -> Result<String> {
        let envelope = StreamEnvelope::new(payload);
        let fields = envelope.fields();
        let id: String = match maxlen {
            Some(len) => {
                self.conn
                    .xadd_maxlen(stream, StreamMaxlen::Approx(len), "*", &fields)
                    .await?
            }
            None => self.conn.xadd(stream, "*", &fields).await?,
        };
        Ok(id)
    }

    pub fn close(self) {
        drop(self.conn);
        info!("🔌 Publisher connection closed");
    }
}

impl NoteStore for RedisPublisher {
    async fn write(&mut self, target: &PublishTarget, payload: &[u8]) -> Result<WriteReceipt> {
        match target {
            PublishTarget::Channel { name } => {
                self.publish_to_channel(name, payload).await.map(WriteReceipt::Delivered)
            }
            PublishTarget::Key { name, ttl_seconds } => {
                self.set_object(name, payload, *ttl_seconds).await?;
                Ok(WriteReceipt::Stored)
            }
            PublishTarget::Set { name } => self.add_to_set(name, payload).await.map(WriteReceipt::Added),
            PublishTarget::List { name } => self.push_to_list(name, payload).await.map(WriteReceipt::Pushed),
            PublishTarget::Stream { name, maxlen } => {
                self.add_to_stream(name, payload, *maxlen).await.map(WriteReceipt::Appended)
            }
        }
    }
}
