use tokio::time::sleep;
use tracing::{debug, info, warn};
use tunes_models::{PayloadFormat, Result, Tempo, TunesError};
use tunes_stream::{NoteStore, PublishMode, PublishTarget, WriteReceipt};

use crate::score::Score;

#[derive(Debug, Clone, PartialEq)]
pub struct PublishReport {
    pub published: usize,
    pub mode: PublishMode,
    pub receipts: Vec<WriteReceipt>,
}

/// Writes a score into a store one note at a time, paced by the music.
pub struct PublishRunner<S> {
    store: S,
    target: PublishTarget,
    format: PayloadFormat,
    tempo: Tempo,
}

impl<S: NoteStore> PublishRunner<S> {
    pub fn new(store: S, target: PublishTarget, format: PayloadFormat, tempo: Tempo) -> Self {
        Self { store, target, format, tempo }
    }

    pub async fn run(&mut self, score: &Score) -> Result<PublishReport> {
        if score.is_empty() {
            return Err(TunesError::EmptyScore);
        }

        let mode = self.target.mode();
        info!(
            "📝 Publishing {} note objects ({} beats) to '{}' using '{}' type at {} bpm ({})",
            score.len(),
            score.total_beats(),
            self.target.name(),
            mode,
            self.tempo.bpm(),
            self.format
        );

        let mut receipts = Vec::with_capacity(score.len());
        for note in score.iter() {
            info!("{}", note.note);
            let scaled = note.scaled(self.tempo);
            let payload = self.format.encode(&scaled)?;

            let receipt = self.store.write(&self.target, &payload).await?;
            debug!("Receipt for note #{}: {:?}", scaled.seq, receipt);
            if let WriteReceipt::Added(false) = receipt {
                warn!("⚠️  Note #{} was already a member of '{}'", scaled.seq, self.target.name());
            }
            receipts.push(receipt);

            match scaled.checked_duration() {
                Ok(pause) => sleep(pause).await,
                Err(e) => warn!("⚠️  Not pausing after note #{}: {}", scaled.seq, e),
            }
        }

        info!("✅ All {} note objects published to Redis using '{}' type!", receipts.len(), mode);
        Ok(PublishReport {
            published: receipts.len(),
            mode,
            receipts,
        })
    }

    pub fn into_store(self) -> S {
        self.store
    }
}
