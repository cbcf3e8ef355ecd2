use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use redis_tunes::{telemetry, AppConfig, OutputKind, Overrides};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tunes_models::{PayloadFormat, TunesError};
use tunes_services::{AudioOutput, MusicPlayer, PcmSink, SilentSink, ToneSpec, WavSink};
use tunes_stream::{FeedMode, RedisConnection, RedisSource, SourceOptions};

#[derive(Parser, Debug)]
#[command(
    name = "music-player",
    about = "Play musical notes received from Redis",
    version,
    after_help = "\
EXAMPLES:
    music-player                                   # subscribe to the 'music' channel
    music-player --redis-host redis                # connect to a Redis container
    music-player --redis-type poll_stream --stream-from-id 0
    music-player --output pcm | aplay -f FLOAT_LE -c1 -r44100"
)]
struct Args {
    /// Redis channel, key or list to read notes from
    #[arg(long)]
    channel: Option<String>,

    /// Redis type: pubsub, poll, poll_stream or list
    #[arg(long = "redis-type")]
    redis_type: Option<FeedMode>,

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

    /// Audio sample rate in Hz
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Tone volume between 0.0 and 1.0
    #[arg(long)]
    volume: Option<f32>,

    /// Seconds between polls of the key (poll type)
    #[arg(long)]
    poll_interval: Option<f64>,

    /// Stream id to start reading after (poll_stream type)
    #[arg(long)]
    stream_from_id: Option<String>,

    /// Payload encoding: json or bincode
    #[arg(long)]
    format: Option<PayloadFormat>,

    /// Where to send audio
    #[arg(long, value_enum)]
    output: Option<OutputKind>,

    /// File to record into (wav output)
    #[arg(long)]
    wav_path: Option<String>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides::new()
            .set("redis.host", self.redis_host.as_ref())
            .set("redis.port", self.redis_port)
            .set("redis.db", self.redis_db)
            .set("redis.password", self.redis_password.as_ref())
            .set("player.channel", self.channel.as_ref())
            .set("player.mode", self.redis_type)
            .set("player.sample_rate", self.sample_rate)
            .set("player.volume", self.volume)
            .set("player.poll_interval_secs", self.poll_interval)
            .set("player.stream_from_id", self.stream_from_id.as_ref())
            .set("player.format", self.format)
            .set("player.output", self.output.map(output_name))
            .set("player.wav_path", self.wav_path.as_ref())
    }
}

fn output_name(kind: OutputKind) -> &'static str {
    match kind {
        OutputKind::Silent => "silent",
        OutputKind::Pcm => "pcm",
        OutputKind::Wav => "wav",
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
    let player_config = &config.player;

    let poll_interval = Duration::try_from_secs_f64(player_config.poll_interval_secs)
        .context("poll interval must be a non-negative number of seconds")?;
    let tone = ToneSpec::new(player_config.sample_rate, player_config.volume);

    let sink = match player_config.output {
        OutputKind::Silent => {
            info!("🔇 Running in silent mode");
            AudioOutput::Silent(SilentSink)
        }
        OutputKind::Pcm => {
            info!("🔊 Writing f32 PCM at {} Hz to stdout", tone.sample_rate);
            AudioOutput::Pcm(PcmSink::new(tokio::io::stdout(), tone.sample_rate))
        }
        OutputKind::Wav => AudioOutput::Wav(WavSink::create(&player_config.wav_path, tone.sample_rate)?),
    };

    let connection = RedisConnection::connect(&config.redis).await?;
    let options = SourceOptions {
        channel: player_config.channel.clone(),
        poll_interval,
        stream_from_id: player_config.stream_from_id.clone(),
    };
    let mut source = RedisSource::open(&connection, player_config.mode, &options).await?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let mut player = MusicPlayer::new(sink, tone, player_config.format);
    let result = player.run(&mut source, &cancel).await;
    connection.close();

    let report = result?;
    info!(
        "👋 Played {} notes, {} rests, {} unplayable, {} skipped",
        report.played, report.rests, report.unplayable, report.skipped
    );
    Ok(())
}
