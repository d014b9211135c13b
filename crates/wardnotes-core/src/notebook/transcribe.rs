//! Re-transcribing and downloading existing attachments.
//!
//! Each attachment can have at most one such operation in flight; distinct
//! attachments proceed independently.

use chrono::Utc;
use tracing::info;

use super::{InFlight, Notebook, Scope, compose::finish_transcript};
use crate::{
  Error, Result, ValidationError,
  admission::Admission,
  backend::NotesBackend,
  entry::{EntryId, Transcript},
  record::{NoteUpdate, Transcription, TranscriptionRequest, blob_file_name},
};

/// What a per-entry operation needs, captured under the lock.
struct Claim {
  scope:     Scope,
  blob_url:  String,
  server_id: Option<String>,
}

impl<B: NotesBackend> Notebook<B> {
  /// Transcribe an already-uploaded attachment again.
  ///
  /// When the entry is persisted the new transcription is also written back
  /// to its note; otherwise only the in-memory entry is patched.
  pub async fn retranscribe(&self, id: EntryId) -> Result<Transcript> {
    let claim = self.claim(id, InFlight::Transcribing).await?;
    let outcome = self.retranscribe_claimed(id, &claim).await;
    self.release(claim.scope.generation, id).await;
    outcome
  }

  async fn retranscribe_claimed(&self, id: EntryId, claim: &Claim) -> Result<Transcript> {
    let (response, transcript) = self
      .transcribe_blob(&claim.scope.admission, &claim.blob_url)
      .await?;

    if let Some(server_id) = &claim.server_id {
      self
        .backend
        .update_note(server_id, &NoteUpdate::from(&response))
        .await
        .map_err(Error::transport)?;
    }

    let at = response.timestamp.unwrap_or_else(Utc::now);
    let shown = transcript.clone();
    self
      .settle(claim.scope.generation, |state| {
        finish_transcript(&mut state.timeline, id, shown, at)
      })
      .await?;
    info!(entry = %id, persisted = claim.server_id.is_some(), "attachment re-transcribed");
    Ok(transcript)
  }

  /// Resolve a time-limited download reference for an attachment.
  pub async fn download_link(&self, id: EntryId) -> Result<String> {
    let claim = self.claim(id, InFlight::Downloading).await?;
    let outcome = self.resolve_download(&claim.blob_url).await;
    self.release(claim.scope.generation, id).await;
    outcome
  }

  /// Mark `id` as busy with `op`, failing if anything is already in flight
  /// for it.
  async fn claim(&self, id: EntryId, op: InFlight) -> Result<Claim> {
    let mut state = self.state.lock().await;
    let admission = state.admission.clone().ok_or(ValidationError::NoAdmission)?;

    let entry = state.timeline.get(id).ok_or(Error::EntryNotFound(id))?;
    let attachment = entry.attachment().ok_or(Error::NotAnAttachment(id))?;
    // A placeholder has no blob yet; its upload is the operation in flight.
    let blob_url = attachment.blob_url.clone().ok_or(Error::Busy(id))?;
    let server_id = entry.server_id().map(str::to_string);

    if state.in_flight.contains_key(&id) {
      return Err(Error::Busy(id));
    }
    state.in_flight.insert(id, op);

    Ok(Claim {
      scope: Scope { generation: state.generation, admission },
      blob_url,
      server_id,
    })
  }

  /// Download reference for `blob_url`, or the URL itself when it has no
  /// file name to ask about.
  async fn resolve_download(&self, blob_url: &str) -> Result<String> {
    match blob_file_name(blob_url) {
      Some(name) => self.backend.download_url(name).await.map_err(Error::transport),
      None => Ok(blob_url.to_string()),
    }
  }

  /// Ask the backend to transcribe the blob at `blob_url`. A response with
  /// neither display text field is rejected.
  pub(super) async fn transcribe_blob(
    &self,
    admission: &Admission,
    blob_url: &str,
  ) -> Result<(Transcription, Transcript)> {
    let audio_url = self.resolve_download(blob_url).await?;
    let request = TranscriptionRequest {
      admission_id:  admission.id.clone(),
      patient_id:    admission.patient_id.clone(),
      audio_url,
      patient_notes: String::new(),
    };
    let response = self
      .backend
      .transcribe(&request)
      .await
      .map_err(Error::transport)?;

    let transcript = Transcript::from_response(&response).ok_or_else(|| {
      Error::MalformedResponse(
        "transcription has neither medified_audio_text nor medified_text".to_string(),
      )
    })?;
    Ok((response, transcript))
  }
}
