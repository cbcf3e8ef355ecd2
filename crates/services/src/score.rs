use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{info, warn};
use tunes_models::{NoteEvent, Result};

const NOTE_HEADERS: [&str; 3] = ["note", "notes", "description"];
const DURATION_HEADERS: [&str; 3] = ["duration", "time", "minutes"];
const PRIORITY_HEADER: &str = "priority";

/// Notes parsed from one CSV file, in row order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Score {
    pub notes: Vec<NoteEvent>,
}

impl Score {
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NoteEvent> {
        self.notes.iter()
    }

    /// Total length in beats.
    pub fn total_beats(&self) -> f64 {
        self.notes.iter().map(|n| n.duration).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    note: usize,
    duration: usize,
    priority: Option<usize>,
}

impl Default for Columns {
    fn default() -> Self {
        Self { note: 0, duration: 1, priority: Some(2) }
    }
}

impl Columns {
    fn from_header(header: &StringRecord) -> Self {
        let find = |names: &[&str]| {
            header
                .iter()
                .position(|cell| names.contains(&cell.to_lowercase().as_str()))
        };
        Self {
            note: find(&NOTE_HEADERS).unwrap_or(0),
            duration: find(&DURATION_HEADERS).unwrap_or(1),
            priority: find(&[PRIORITY_HEADER]),
        }
    }
}

fn is_header(record: &StringRecord) -> bool {
    let cell = |i: usize| record.get(i).map(str::to_lowercase).unwrap_or_default();
    NOTE_HEADERS.contains(&cell(0).as_str()) || DURATION_HEADERS.contains(&cell(1).as_str())
}

pub fn load_score(path: impl AsRef<Path>) -> Result<Score> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let score = parse_score(file)?;
    info!("✅ Parsed {} note objects from {}", score.len(), path.display());
    Ok(score)
}

/// Parse `note,duration[,priority]` rows, with or without a header row.
///
/// Incomplete rows and rows with an unusable duration are skipped with a
/// warning; only a malformed CSV stream is an error.
pub fn parse_score<R: Read>(reader: R) -> Result<Score> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut columns = Columns::default();
    let mut notes = Vec::new();

    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        let row_num = index + 1;

        if index == 0 && is_header(&record) {
            info!("📋 Skipping header row: {:?}", record.iter().collect::<Vec<_>>());
            columns = Columns::from_header(&record);
            continue;
        }

        let note = record.get(columns.note).unwrap_or_default();
        let duration = record.get(columns.duration).unwrap_or_default();
        if record.len() < 2 || note.is_empty() || duration.is_empty() {
            warn!("⚠️  Skipping empty or incomplete row {}: {:?}", row_num, record.iter().collect::<Vec<_>>());
            continue;
        }

        let duration = match duration.parse::<f64>() {
            Ok(d) if d.is_finite() && d > 0.0 => d,
            Ok(d) => {
                warn!("⚠️  Skipping row {}: duration {} must be a positive number", row_num, d);
                continue;
            }
            Err(e) => {
                warn!("⚠️  Skipping invalid row {}: {:?} - {}", row_num, duration, e);
                continue;
            }
        };

        let mut event = NoteEvent::new(note, duration).with_seq(notes.len() as u64);
        if let Some(cell) = columns.priority.and_then(|i| record.get(i)).filter(|c| !c.is_empty()) {
            match cell.parse::<i64>() {
                Ok(priority) => event = event.with_priority(priority),
                Err(_) => warn!("⚠️  Ignoring invalid priority {:?} on row {}", cell, row_num),
            }
        }
        notes.push(event);
    }

    Ok(Score { notes })
}
