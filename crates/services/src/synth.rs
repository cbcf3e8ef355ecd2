use std::f64::consts::PI;
use std::time::Duration;

/// Parameters of the sine tones rendered for each note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneSpec {
    pub sample_rate: u32,
    pub volume: f32,
    /// Length of the fade in and fade out ramps.
    pub fade: Duration,
    /// Silence left at the end of every tone so repeated notes stay distinct.
    pub gap: Duration,
}

impl Default for ToneSpec {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            volume: 0.3,
            fade: Duration::from_millis(5),
            gap: Duration::from_millis(30),
        }
    }
}

impl ToneSpec {
    pub fn new(sample_rate: u32, volume: f32) -> Self {
        Self {
            sample_rate,
            volume: volume.clamp(0.0, 1.0),
            ..Self::default()
        }
    }

    pub fn sample_count(&self, duration: Duration) -> usize {
        (f64::from(self.sample_rate) * duration.as_secs_f64()).floor() as usize
    }

    pub fn silence(&self, duration: Duration) -> Vec<f32> {
        vec![0.0; self.sample_count(duration)]
    }

    /// Samples of one tone, produced lazily so sinks can stream them.
    pub fn tone(&self, frequency: f64, duration: Duration) -> Tone {
        let total = self.sample_count(duration);
        let mut fade = self.sample_count(self.fade);
        let mut gap = self.sample_count(self.gap);
        if gap + 2 * fade > total {
            gap = 0;
        }
        if 2 * fade > total {
            fade = total / 2;
        }

        Tone {
            frequency,
            rate: f64::from(self.sample_rate),
            volume: f64::from(self.volume),
            total,
            fade,
            gap,
            next: 0,
        }
    }

    pub fn generate_tone(&self, frequency: f64, duration: Duration) -> Vec<f32> {
        self.tone(frequency, duration).collect()
    }
}

/// A sine tone with a fade in, a fade out and a trailing silent gap.
#[derive(Debug, Clone)]
pub struct Tone {
    frequency: f64,
    rate: f64,
    volume: f64,
    total: usize,
    fade: usize,
    gap: usize,
    next: usize,
}

impl Tone {
    fn level(&self, i: usize) -> f64 {
        let release_start = self.total - self.gap - self.fade;
        if i >= self.total - self.gap {
            0.0
        } else if i >= release_start {
            ramp(i - release_start, self.fade, self.volume, 0.0)
        } else if i < self.fade {
            ramp(i, self.fade, 0.0, self.volume)
        } else {
            self.volume
        }
    }
}

impl Iterator for Tone {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.next >= self.total {
            return None;
        }
        let i = self.next;
        self.next += 1;
        let t = i as f64 / self.rate;
        Some(((2.0 * PI * self.frequency * t).sin() * self.level(i)) as f32)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.total - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Tone {}

// Point `step` of `steps` evenly spaced values from `from` to `to`, ends included.
fn ramp(step: usize, steps: usize, from: f64, to: f64) -> f64 {
    if steps <= 1 {
        return from;
    }
    from + (to - from) * step as f64 / (steps - 1) as f64
}
