//! A normalised recording awaiting the user's go-ahead to send.
//!
//! [`PendingAudio`] is move-only: it is released exactly once, either when
//! the send flow finishes with it or when it is discarded.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::debug;

pub const WAV_MIME: &str = "audio/wav";

/// A playable, already-normalised WAV clip.
#[derive(Debug)]
pub struct PendingAudio {
  wav:         Bytes,
  recorded_at: DateTime<Utc>,
}

impl PendingAudio {
  pub fn new(wav: Bytes) -> Self {
    Self { wav, recorded_at: Utc::now() }
  }

  pub fn wav(&self) -> &Bytes { &self.wav }

  pub fn len(&self) -> usize { self.wav.len() }

  pub fn is_empty(&self) -> bool { self.wav.is_empty() }

  /// Upload name: `audio_<unix millis>.wav`.
  pub fn file_name(&self) -> String {
    format!("audio_{}.wav", self.recorded_at.timestamp_millis())
  }
}

impl Drop for PendingAudio {
  fn drop(&mut self) {
    debug!(bytes = self.wav.len(), "released pending recording");
  }
}

/// Holds at most one pending recording. Stashing a new one, or cancelling,
/// releases the previous.
#[derive(Debug, Default)]
pub struct RecordingSlot {
  pending: Option<PendingAudio>,
}

impl RecordingSlot {
  pub fn new() -> Self { Self::default() }

  pub fn stash(&mut self, audio: PendingAudio) {
    self.pending = Some(audio);
  }

  pub fn is_pending(&self) -> bool { self.pending.is_some() }

  pub fn peek(&self) -> Option<&PendingAudio> { self.pending.as_ref() }

  pub fn take(&mut self) -> Option<PendingAudio> { self.pending.take() }

  pub fn cancel(&mut self) { self.pending = None; }
}
