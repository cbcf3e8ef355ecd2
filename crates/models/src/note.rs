use std::time::Duration;

use serde::{Deserialize, Serialize};
use crate::error::{TunesError, Result};

/// One row of a score: what to play and for how long.
///
/// `duration` is in beats when read from a CSV file and in seconds once
/// [`NoteEvent::scaled`] has been applied by the publisher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoteEvent {
    pub note: String,
    pub duration: f64,
    pub priority: Option<i64>,
    pub seq: u64,
}

impl NoteEvent {
    /// Longest note accepted for playback or pacing.
    pub const MAX_SECONDS: f64 = 3600.0;

    pub fn new(note: impl Into<String>, duration: f64) -> Self {
        Self {
            note: note.into(),
            duration,
            priority: None,
            seq: 0,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    /// Convert a duration in beats into seconds at the given tempo.
    pub fn scaled(&self, tempo: Tempo) -> Self {
        Self {
            duration: tempo.beats_to_seconds(self.duration),
            ..self.clone()
        }
    }

    /// Duration usable for playback or pacing.
    ///
    /// Must be positive, finite and at most [`NoteEvent::MAX_SECONDS`].
    pub fn checked_duration(&self) -> Result<Duration> {
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(self.invalid_duration("must be a positive number of seconds"));
        }
        if self.duration > Self::MAX_SECONDS {
            return Err(self.invalid_duration("is longer than an hour"));
        }
        Duration::try_from_secs_f64(self.duration).map_err(|e| self.invalid_duration(&e.to_string()))
    }

    fn invalid_duration(&self, reason: &str) -> TunesError {
        TunesError::InvalidDuration(format!("{} for note {} {}", self.duration, self.note, reason))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tempo {
    bpm: u32,
}

impl Tempo {
    pub const DEFAULT_BPM: u32 = 120;

    pub fn new(bpm: u32) -> Result<Self> {
        if bpm == 0 {
            return Err(TunesError::InvalidTempo { bpm });
        }
        Ok(Self { bpm })
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn beats_per_second(&self) -> f64 {
        f64::from(self.bpm) / 60.0
    }

    pub fn beats_to_seconds(&self, beats: f64) -> f64 {
        beats / self.beats_per_second()
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self { bpm: Self::DEFAULT_BPM }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tempo_scaling() {
        let tempo = Tempo::new(120).unwrap();
        assert_eq!(tempo.beats_per_second(), 2.0);

        let note = NoteEvent::new("C4", 1.0).with_seq(3);
        let scaled = note.scaled(tempo);
        assert_eq!(scaled.duration, 0.5);
        assert_eq!(scaled.note, "C4");
        assert_eq!(scaled.seq, 3);

        let slow = NoteEvent::new("A4", 2.0).scaled(Tempo::new(60).unwrap());
        assert_eq!(slow.duration, 2.0);
    }

    #[test]
    fn test_zero_tempo_rejected() {
        assert!(matches!(Tempo::new(0), Err(TunesError::InvalidTempo { bpm: 0 })));
        assert_eq!(Tempo::default().bpm(), 120);
    }

    #[test]
    fn test_checked_duration() {
        assert!(NoteEvent::new("C4", 0.25).checked_duration().is_ok());
        assert!(NoteEvent::new("C4", 0.0).checked_duration().is_err());
        assert!(NoteEvent::new("C4", -1.0).checked_duration().is_err());
        assert!(NoteEvent::new("C4", f64::NAN).checked_duration().is_err());
        assert!(NoteEvent::new("C4", f64::INFINITY).checked_duration().is_err());
    }

    #[test]
    fn test_oversized_duration_is_an_error() {
        assert!(matches!(
            NoteEvent::new("C4", 1e20).checked_duration(),
            Err(TunesError::InvalidDuration(_))
        ));
        assert!(matches!(
            NoteEvent::new("C4", 1e300).checked_duration(),
            Err(TunesError::InvalidDuration(_))
        ));
        assert!(NoteEvent::new("C4", 3601.0).checked_duration().is_err());
        assert_eq!(
            NoteEvent::new("C4", NoteEvent::MAX_SECONDS).checked_duration().unwrap(),
            Duration::from_secs(3600)
        );
    }
}
