use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use tunes_models::PayloadFormat;
use tunes_stream::{FeedMode, PublishMode, RedisSettings};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub redis: RedisSettings,
    pub publisher: PublisherConfig,
    pub player: PlayerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    pub mode: PublishMode,
    pub channel: String,
    pub stream_key: String,
    pub stream_maxlen: usize,
    pub ttl_seconds: Option<u64>,
    pub speed_bpm: u32,
    pub format: PayloadFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    pub mode: FeedMode,
    pub channel: String,
    pub sample_rate: u32,
    pub volume: f32,
    pub poll_interval_secs: f64,
    pub stream_from_id: String,
    pub format: PayloadFormat,
    pub output: OutputKind,
    pub wav_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Silent,
    Pcm,
    Wav,
}

/// Command line values that take precedence over every other source.
#[derive(Debug, Default)]
pub struct Overrides(Vec<(&'static str, Option<String>)>);

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: ToString>(mut self, key: &'static str, value: Option<T>) -> Self {
        self.0.push((key, value.map(|v| v.to_string())));
        self
    }
}

impl AppConfig {
    pub fn load(overrides: Overrides) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            // Start with default values
            .set_default("redis.host", "localhost")?
            .set_default("redis.port", 6379)?
            .set_default("redis.db", 0)?
            .set_default("publisher.mode", "pubsub")?
            .set_default("publisher.channel", "music")?
            .set_default("publisher.stream_key", "music_stream")?
            .set_default("publisher.stream_maxlen", 100)?
            .set_default("publisher.speed_bpm", 120)?
            .set_default("publisher.format", "json")?
            .set_default("player.mode", "pubsub")?
            .set_default("player.channel", "music")?
            .set_default("player.sample_rate", 44100)?
            .set_default("player.volume", 0.3)?
            .set_default("player.poll_interval_secs", 0.5)?
            .set_default("player.stream_from_id", "0")?
            .set_default("player.format", "json")?
            .set_default("player.output", "silent")?
            .set_default("player.wav_path", "playback.wav")?
            // Add in settings from configuration file
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Add in settings from environment variables, e.g. TUNES_PLAYER__SAMPLE_RATE
            .add_source(
                Environment::with_prefix("TUNES")
                    .prefix_separator("_")
                    .separator("__"),
            );

        for (key, value) in overrides.0 {
            builder = builder.set_override_option(key, value)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn redis_address(&self) -> String {
        self.redis.address()
    }
}
