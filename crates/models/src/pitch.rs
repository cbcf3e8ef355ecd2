use std::fmt;

const A4_FREQUENCY: f64 = 440.0;
const A4_MIDI: i32 = 69;
const DEFAULT_OCTAVE: u8 = 4;
const MAX_OCTAVE: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accidental {
    Natural,
    Sharp,
    Flat,
}

impl Accidental {
    fn offset(self) -> i32 {
        match self {
            Accidental::Natural => 0,
            Accidental::Sharp => 1,
            Accidental::Flat => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pitch {
    pub letter: char,
    pub accidental: Accidental,
    pub octave: u8,
    /// Set when the name carried no octave and octave 4 was assumed.
    pub implied_octave: bool,
}

impl Pitch {
    /// MIDI note number, C4 = 60.
    pub fn midi_number(&self) -> i32 {
        let semitone = match self.letter {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            _ => 11,
        };
        (i32::from(self.octave) + 1) * 12 + semitone + self.accidental.offset()
    }

    /// Twelve-tone equal temperament, A4 = 440 Hz.
    pub fn frequency(&self) -> f64 {
        A4_FREQUENCY * 2f64.powf(f64::from(self.midi_number() - A4_MIDI) / 12.0)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let accidental = match self.accidental {
            Accidental::Natural => "",
            Accidental::Sharp => "#",
            Accidental::Flat => "b",
        };
        write!(f, "{}{}{}", self.letter, accidental, self.octave)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sound {
    Rest,
    Tone(Pitch),
}

impl Sound {
    /// Parse names such as `C4`, `a#3`, `Bb4`, `F` or `R`.
    ///
    /// Returns `None` for anything that is neither a rest nor a pitch.
    pub fn parse(name: &str) -> Option<Sound> {
        let name = name.trim().to_uppercase();
        if name == "R" || name == "REST" {
            return Some(Sound::Rest);
        }

        let mut chars = name.chars().peekable();
        let letter = chars.next().filter(|c| ('A'..='G').contains(c))?;

        let accidental = match chars.peek() {
            Some('#') => {
                chars.next();
                Accidental::Sharp
            }
            // Upper-casing turns the flat sign into `B`.
            Some('B') => {
                chars.next();
                Accidental::Flat
            }
            _ => Accidental::Natural,
        };

        let rest: String = chars.collect();
        let (octave, implied_octave) = if rest.is_empty() {
            (DEFAULT_OCTAVE, true)
        } else if rest.bytes().all(|b| b.is_ascii_digit()) {
            let octave: u8 = rest.parse().ok()?;
            if octave > MAX_OCTAVE {
                return None;
            }
            (octave, false)
        } else {
            return None;
        };

        Some(Sound::Tone(Pitch {
            letter,
            accidental,
            octave,
            implied_octave,
        }))
    }
}
