use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hound::{SampleFormat, WavSpec, WavWriter};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::info;
use tunes_models::{Result, TunesError};

use crate::synth::Tone;

/// Samples buffered per write to a PCM stream.
const PCM_CHUNK_SAMPLES: usize = 4096;

/// Where rendered notes go.
#[allow(async_fn_in_trait)]
pub trait AudioSink {
    /// Output one tone lasting `duration`. Samples are only rendered if pulled.
    async fn play(&mut self, tone: Tone, duration: Duration) -> Result<()>;

    /// Output nothing for `duration`.
    async fn rest(&mut self, duration: Duration) -> Result<()>;

    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Keeps time without producing sound.
#[derive(Debug, Default)]
pub struct SilentSink;

impl AudioSink for SilentSink {
    async fn play(&mut self, _tone: Tone, duration: Duration) -> Result<()> {
        tokio::time::sleep(duration).await;
        Ok(())
    }

    async fn rest(&mut self, duration: Duration) -> Result<()> {
        tokio::time::sleep(duration).await;
        Ok(())
    }
}

/// Raw little-endian f32 mono PCM, e.g. for `aplay -f FLOAT_LE -c1 -r44100`.
pub struct PcmSink<W> {
    writer: W,
    sample_rate: u32,
}

impl<W: AsyncWrite + Unpin> PcmSink<W> {
    pub fn new(writer: W, sample_rate: u32) -> Self {
        Self { writer, sample_rate }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    async fn write_samples(&mut self, samples: impl Iterator<Item = f32>) -> Result<()> {
        let mut bytes = Vec::with_capacity(PCM_CHUNK_SAMPLES * 4);
        for sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
            if bytes.len() >= PCM_CHUNK_SAMPLES * 4 {
                self.writer.write_all(&bytes).await?;
                bytes.clear();
            }
        }
        if !bytes.is_empty() {
            self.writer.write_all(&bytes).await?;
        }
        Ok(())
    }
}

impl<W: AsyncWrite + Unpin> AudioSink for PcmSink<W> {
    async fn play(&mut self, tone: Tone, _duration: Duration) -> Result<()> {
        self.write_samples(tone).await
    }

    async fn rest(&mut self, duration: Duration) -> Result<()> {
        let count = (f64::from(self.sample_rate) * duration.as_secs_f64()).floor() as usize;
        self.write_samples(std::iter::repeat(0.0).take(count)).await
    }

    async fn finish(&mut self) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }
}

/// Records everything played into a 32-bit float mono WAV file.
pub struct WavSink {
    writer: Option<WavWriter<BufWriter<File>>>,
    sample_rate: u32,
    path: PathBuf,
}

impl WavSink {
    pub fn create(path: impl AsRef<Path>, sample_rate: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let writer = WavWriter::create(&path, spec).map_err(audio_error)?;
        info!("💾 Recording playback to {}", path.display());
        Ok(Self {
            writer: Some(writer),
            sample_rate,
            path,
        })
    }

    fn write_samples(&mut self, samples: impl IntoIterator<Item = f32>) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| TunesError::Audio(format!("{} is already finalized", self.path.display())))?;
        for sample in samples {
            writer.write_sample(sample).map_err(audio_error)?;
        }
        Ok(())
    }
}

impl AudioSink for WavSink {
    async fn play(&mut self, tone: Tone, _duration: Duration) -> Result<()> {
        self.write_samples(tone)
    }

    async fn rest(&mut self, duration: Duration) -> Result<()> {
        let count = (f64::from(self.sample_rate) * duration.as_secs_f64()).floor() as usize;
        self.write_samples(std::iter::repeat(0.0).take(count))
    }

    async fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().map_err(audio_error)?;
            info!("💾 Saved recording to {}", self.path.display());
        }
        Ok(())
    }
}

fn audio_error(e: hound::Error) -> TunesError {
    TunesError::Audio(e.to_string())
}

/// The output chosen on the command line.
pub enum AudioOutput {
    Silent(SilentSink),
    Pcm(PcmSink<tokio::io::Stdout>),
    Wav(WavSink),
}

impl AudioSink for AudioOutput {
    async fn play(&mut self, tone: Tone, duration: Duration) -> Result<()> {
        match self {
            AudioOutput::Silent(sink) => sink.play(tone, duration).await,
            AudioOutput::Pcm(sink) => sink.play(tone, duration).await,
            AudioOutput::Wav(sink) => sink.play(tone, duration).await,
        }
    }

    async fn rest(&mut self, duration: Duration) -> Result<()> {
        match self {
            AudioOutput::Silent(sink) => sink.rest(duration).await,
            AudioOutput::Pcm(sink) => sink.rest(duration).await,
            AudioOutput::Wav(sink) => sink.rest(duration).await,
        }
    }

    async fn finish(&mut self) -> Result<()> {
        match self {
            AudioOutput::Silent(sink) => sink.finish().await,
            AudioOutput::Pcm(sink) => sink.finish().await,
            AudioOutput::Wav(sink) => sink.finish().await,
        }
    }
}
