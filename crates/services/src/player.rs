use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tunes_models::{NoteEvent, PayloadFormat, Result, Sound, TunesError};
use tunes_stream::NoteSource;

use crate::sink::AudioSink;
use crate::synth::{Tone, ToneSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Played,
    Rested,
    /// The note name was not understood; its duration was still waited out.
    Unplayable,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    pub played: u64,
    pub rests: u64,
    pub unplayable: u64,
    /// Payloads that could not be decoded or had an unusable duration.
    pub skipped: u64,
    pub last_stream_id: Option<String>,
}

pub struct MusicPlayer<S> {
    sink: S,
    tone: ToneSpec,
    format: PayloadFormat,
    report: PlaybackReport,
}

impl<S: AudioSink> MusicPlayer<S> {
    pub fn new(sink: S, tone: ToneSpec, format: PayloadFormat) -> Self {
        Self {
            sink,
            tone,
            format,
            report: PlaybackReport::default(),
        }
    }

    pub fn report(&self) -> &PlaybackReport {
        &self.report
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub async fn play_note(&mut self, note: &NoteEvent) -> Result<PlayOutcome> {
        let duration = note.checked_duration()?;

        let pitch = match Sound::parse(&note.note) {
            Some(Sound::Rest) => {
                self.sink.rest(duration).await?;
                self.report.rests += 1;
                return Ok(PlayOutcome::Rested);
            }
            Some(Sound::Tone(pitch)) => pitch,
            None => {
                warn!("❌ Cannot play note: {}", note.note);
                self.sink.rest(duration).await?;
                self.report.unplayable += 1;
                return Ok(PlayOutcome::Unplayable);
            }
        };

        if pitch.implied_octave {
            warn!("⚠️  No octave in note {}, playing {}", note.note.trim(), pitch);
        }

        let frequency = pitch.frequency();
        info!("🎵 Playing {} ({:.2} Hz) for {:.2}s", pitch, frequency, note.duration);

        self.sink.play(self.tone.tone(frequency, duration), duration).await?;
        self.report.played += 1;
        Ok(PlayOutcome::Played)
    }

    /// Decode and play one payload; bad payloads are logged and skipped.
    pub async fn play_payload(&mut self, payload: &[u8]) -> Result<Option<PlayOutcome>> {
        let note = match self.format.decode(payload) {
            Ok(note) => note,
            Err(e) => {
                warn!("⚠️  {}", e);
                self.report.skipped += 1;
                return Ok(None);
            }
        };

        match self.play_note(&note).await {
            Ok(outcome) => Ok(Some(outcome)),
            Err(TunesError::InvalidDuration(reason)) => {
                warn!("⚠️  Invalid duration: {}", reason);
                self.report.skipped += 1;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Play everything the source delivers until it closes or `cancel` fires.
    pub async fn run<N: NoteSource>(&mut self, source: &mut N, cancel: &CancellationToken) -> Result<PlaybackReport> {
        info!("🎵 Waiting for musical notes... (Press Ctrl+C to stop)");

        let outcome = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ok(()),
                next = source.next_payload() => next,
            };

            let payload = match next {
                Ok(Some(payload)) => payload,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            };

            let played = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ok(()),
                played = self.play_payload(&payload.bytes) => played,
            };
            if let Err(e) = played {
                break Err(e);
            }
        };

        if cancel.is_cancelled() {
            info!("🛑 Stopping music player...");
        }

        let finished = self.sink.finish().await;
        self.report.last_stream_id = source.position();
        if let Some(id) = &self.report.last_stream_id {
            info!("Last stream ID: {}", id);
        }

        outcome?;
        finished?;
        Ok(self.report.clone())
    }
}
