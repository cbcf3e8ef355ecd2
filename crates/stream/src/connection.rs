use redis::aio::MultiplexedConnection;
use redis::{Client, ConnectionInfo, IntoConnectionInfo};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tunes_models::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub password: Option<String>,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            password: None,
        }
    }
}

impl RedisSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connection_info(&self) -> Result<ConnectionInfo> {
        let mut info = (self.host.as_str(), self.port).into_connection_info()?;
        info.redis.db = self.db;
        info.redis.password = self.password.clone().filter(|p| !p.is_empty());
        Ok(info)
    }
}

/// An open client plus one shared multiplexed connection.
pub struct RedisConnection {
    client: Client,
    conn: MultiplexedConnection,
    address: String,
}

impl RedisConnection {
    /// Open the connection and verify it with `PING`.
    pub async fn connect(settings: &RedisSettings) -> Result<Self> {
        let address = settings.address();
        let client = Client::open(settings.connection_info()?)?;

        let mut conn = match client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("❌ Failed to connect to Redis at {}: {}", address, e);
                return Err(e.into());
            }
        };

        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("✅ Connected to Redis at {} ({}, db {})", address, pong, settings.db);

        Ok(Self { client, conn, address })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// A handle on the shared connection; cheap to clone.
    pub fn connection(&self) -> MultiplexedConnection {
        self.conn.clone()
    }

    /// A separate connection for consumers that block the socket.
    pub async fn dedicated(&self) -> Result<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    pub fn close(self) {
        drop(self.conn);
        info!("🔌 Redis connection to {} closed", self.address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::ConnectionAddr;

    #[test]
    fn test_connection_info_from_settings() {
        let settings = RedisSettings {
            host: "redis".to_string(),
            port: 6380,
            db: 2,
            password: Some("secret".to_string()),
        };
        let info = settings.connection_info().unwrap();

        assert_eq!(info.addr, ConnectionAddr::Tcp("redis".to_string(), 6380));
        assert_eq!(info.redis.db, 2);
        assert_eq!(info.redis.password.as_deref(), Some("secret"));
        assert_eq!(settings.address(), "redis:6380");
    }

    #[test]
    fn test_empty_password_is_no_password() {
        let settings = RedisSettings {
            password: Some(String::new()),
            ..RedisSettings::default()
        };
        let info = settings.connection_info().unwrap();
        assert_eq!(info.redis.password, None);
        assert_eq!(info.redis.db, 0);
    }
}
