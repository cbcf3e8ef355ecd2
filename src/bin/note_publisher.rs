use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use redis_tunes::{telemetry, AppConfig, Overrides};
use tracing::{error, info, warn};
use tunes_models::{PayloadFormat, Tempo, TunesError};
use tunes_services::{load_score, PublishRunner};
use tunes_stream::{PublishMode, PublishTarget, RedisConnection, RedisPublisher, TargetNames};

#[derive(Parser, Debug)]
#[command(
    name = "note-publisher",
    about = "Publish note objects from a CSV score to Redis",
    version,
    after_help = "\
EXAMPLES:
    note-publisher demos/songs/sample_notes.csv --redis-type pubsub
    note-publisher demos/songs/sample_notes.csv --redis-type key --ttl 30
    note-publisher demos/songs/sample_notes.csv --redis-type stream --speed 90"
)]
struct Args {
    /// Path to the CSV score (note,duration[,priority])
    csv_file: PathBuf,

    /// Redis publishing type: pubsub, key, set, list or stream
    #[arg(long = "redis-type")]
    redis_type: Option<PublishMode>,

    /// Redis server host
    #[arg(long, env = "REDIS_HOST")]
    redis_host: Option<String>,

    /// Redis server port
    #[arg(long, env = "REDIS_PORT")]
    redis_port: Option<u16>,

    /// Redis database number
    #[arg(long, env = "REDIS_DB")]
    redis_db: Option<i64>,

    /// Redis password
    #[arg(long, env = "REDIS_PASSWORD", hide_env_values = true)]
    redis_password: Option<String>,

    /// Speed in beats per minute
    #[arg(long)]
    speed: Option<u32>,

    /// Channel, key, list or set name
    #[arg(long)]
    channel: Option<String>,

    /// Stream name used by the stream type
    #[arg(long)]
    stream_key: Option<String>,

    /// Approximate maximum stream length, 0 for unbounded
    #[arg(long)]
    maxlen: Option<usize>,

    /// Expire the key after this many seconds (key type only)
    #[arg(long)]
    ttl: Option<u64>,

    /// Payload encoding: json or bincode
    #[arg(long)]
    format: Option<PayloadFormat>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides::new()
            .set("redis.host", self.redis_host.as_ref())
            .set("redis.port", self.redis_port)
            .set("redis.db", self.redis_db)
            .set("redis.password", self.redis_password.as_ref())
            .set("publisher.mode", self.redis_type)
            .set("publisher.speed_bpm", self.speed)
            .set("publisher.channel", self.channel.as_ref())
            .set("publisher.stream_key", self.stream_key.as_ref())
            .set("publisher.stream_maxlen", self.maxlen)
            .set("publisher.ttl_seconds", self.ttl)
            .set("publisher.format", self.format)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        if e.downcast_ref::<TunesError>().is_some_and(TunesError::is_connection_error) {
            warn!("⚠️  Redis server is not running or not accessible.");
            warn!("Please start Redis server with: redis-server");
        }
        error!("❌ An error occurred: {:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let config = AppConfig::load(args.overrides()).context("loading configuration")?;
    let publisher_config = &config.publisher;
    let tempo = Tempo::new(publisher_config.speed_bpm)?;

    let score = load_score(&args.csv_file)
        .with_context(|| format!("reading CSV file {}", args.csv_file.display()))?;
    if score.is_empty() {
        return Err(TunesError::EmptyScore)
            .with_context(|| format!("nothing to publish from {}", args.csv_file.display()));
    }

    let connection = RedisConnection::connect(&config.redis).await?;
    let target = PublishTarget::resolve(
        publisher_config.mode,
        &TargetNames {
            channel: publisher_config.channel.clone(),
            stream_key: publisher_config.stream_key.clone(),
            stream_maxlen: Some(publisher_config.stream_maxlen),
            ttl_seconds: publisher_config.ttl_seconds,
        },
    );

    let mut runner = PublishRunner::new(
        RedisPublisher::new(&connection),
        target,
        publisher_config.format,
        tempo,
    );

    let outcome = tokio::select! {
        result = runner.run(&score) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    runner.into_store().close();
    connection.close();

    match outcome {
        Some(result) => {
            let report = result?;
            info!("👋 Published {} notes with '{}'", report.published, report.mode);
        }
        None => info!("🛑 Demo interrupted by user"),
    }
    Ok(())
}
