//! Adding notes: text, file attachments, and recorded audio.
//!
//! Files and audio go through a placeholder: the entry appears as
//! [`EntryState::Pending`] at once, then is either committed with the
//! server's values or removed. Text notes are only appended after the
//! backend has stored them.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::info;

use super::{Notebook, Scope, require_user};
use crate::{
  Error, Result, ValidationError,
  admission::SessionContext,
  backend::NotesBackend,
  entry::{
    Attachment, AttachmentKind, EntryBody, EntryId, EntryState, NoteKind,
    TimelineEntry, Transcript, TranscriptState,
  },
  record::{FileObject, MedicalNote, NewMedicalNote, NoteUpdate},
  recording::{RecordingSlot, WAV_MIME},
  timeline::Timeline,
};

/// A file picked by the user, read into memory.
#[derive(Debug, Clone)]
pub struct LocalFile {
  pub name:      String,
  pub mime_type: String,
  pub bytes:     Bytes,
}

impl LocalFile {
  pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Bytes) -> Self {
    Self { name: name.into(), mime_type: mime_type.into(), bytes }
  }
}

impl<B: NotesBackend> Notebook<B> {
  // ── Text ──────────────────────────────────────────────────────────────

  /// Persist a text note, then append it.
  pub async fn send_text(&self, ctx: &SessionContext, content: &str) -> Result<EntryId> {
    let scope = self.scope().await?;
    if content.trim().is_empty() {
      return Err(ValidationError::EmptyContent.into());
    }
    let user = require_user(ctx)?;

    let note = NewMedicalNote {
      admission_id:    scope.admission.id.clone(),
      patient_id:      scope.admission.patient_id.clone(),
      organization_id: ctx.organization_id.clone(),
      note_type:       NoteKind::Text,
      content:         Some(content.to_string()),
      file:            None,
      created_by:      user.to_string(),
    };
    let persisted = self.backend.create_note(&note).await.map_err(Error::transport)?;

    let entry = TimelineEntry {
      id:        EntryId::new(),
      sender:    user.to_string(),
      timestamp: Utc::now(),
      state:     EntryState::Committed { server_id: persisted.id.clone() },
      body:      EntryBody::Text(content.to_string()),
    };
    let id = entry.id;
    self
      .settle(scope.generation, |state| state.timeline.insert(entry))
      .await?;
    info!(entry = %id, note = %persisted.id, "text note added");
    Ok(id)
  }

  // ── Files ─────────────────────────────────────────────────────────────

  /// Upload `file` and attach it to the selected admission.
  pub async fn attach_file(&self, ctx: &SessionContext, file: LocalFile) -> Result<EntryId> {
    let scope = self.scope().await?;
    if file.name.trim().is_empty() {
      return Err(ValidationError::NoFile.into());
    }
    let user = require_user(ctx)?;

    let id = self.place(scope.generation, placeholder(user, &file)).await?;

    match self.upload_and_persist(&scope, ctx, user, &file).await {
      Ok((note, sent)) => {
        self
          .settle(scope.generation, |state| {
            commit_upload(&mut state.timeline, id, &note, &sent, false)
          })
          .await?;
        info!(entry = %id, note = %note.id, file = %file.name, "attachment committed");
        Ok(id)
      }
      Err(e) => {
        self.discard(scope.generation, id).await;
        Err(e)
      }
    }
  }

  // ── Audio ─────────────────────────────────────────────────────────────

  /// Send the recording pending in `slot`: upload, persist, transcribe, and
  /// store the transcription back on the note.
  ///
  /// If validation fails the recording stays in the slot. Otherwise it is
  /// taken and released once the flow ends, whatever the outcome. A
  /// transcription failure removes the entry from the timeline even though
  /// the upload itself was stored.
  pub async fn send_audio(
    &self,
    ctx: &SessionContext,
    slot: &mut RecordingSlot,
  ) -> Result<EntryId> {
    let scope = self.scope().await?;
    if !slot.is_pending() {
      return Err(ValidationError::NoPendingAudio.into());
    }
    let user = require_user(ctx)?;
    let audio = slot.take().ok_or(ValidationError::NoPendingAudio)?;

    let file = LocalFile::new(audio.file_name(), WAV_MIME, audio.wav().clone());
    let id = self.place(scope.generation, placeholder(user, &file)).await?;

    let outcome = self.upload_and_transcribe(&scope, ctx, user, id, &file).await;
    drop(audio);

    match outcome {
      Ok(transcript) => {
        info!(entry = %id, chars = transcript.text.len(), "audio note transcribed");
        Ok(id)
      }
      Err(e) => {
        self.discard(scope.generation, id).await;
        Err(e)
      }
    }
  }

  async fn upload_and_transcribe(
    &self,
    scope: &Scope,
    ctx: &SessionContext,
    user: &str,
    id: EntryId,
    file: &LocalFile,
  ) -> Result<Transcript> {
    let (note, sent) = self.upload_and_persist(scope, ctx, user, file).await?;
    self
      .settle(scope.generation, |state| {
        commit_upload(&mut state.timeline, id, &note, &sent, true)
      })
      .await?;

    let blob_url = note
      .file
      .as_ref()
      .map(|f| f.blob_url.as_str())
      .filter(|u| !u.is_empty())
      .unwrap_or(sent.blob_url.as_str());
    let (response, transcript) = self.transcribe_blob(&scope.admission, blob_url).await?;

    self
      .backend
      .update_note(&note.id, &NoteUpdate::from(&response))
      .await
      .map_err(Error::transport)?;

    let at = response.timestamp.unwrap_or_else(Utc::now);
    let shown = transcript.clone();
    self
      .settle(scope.generation, |state| {
        finish_transcript(&mut state.timeline, id, shown, at)
      })
      .await?;
    Ok(transcript)
  }

  // ── Shared upload path ────────────────────────────────────────────────

  /// Request a target, store the bytes there, then record the note.
  /// Returns the stored note and the file reference that was sent.
  async fn upload_and_persist(
    &self,
    scope: &Scope,
    ctx: &SessionContext,
    user: &str,
    file: &LocalFile,
  ) -> Result<(MedicalNote, FileObject)> {
    let target = self
      .backend
      .upload_target(&file.name)
      .await
      .map_err(Error::transport)?;
    self
      .backend
      .put_blob(&target, &file.mime_type, file.bytes.clone())
      .await
      .map_err(Error::transport)?;

    let sent = FileObject {
      blob_url:  target.blob_url.clone(),
      file_name: file.name.clone(),
      file_type: file.mime_type.clone(),
      file_size: file.bytes.len() as u64,
    };
    let note = NewMedicalNote {
      admission_id:    scope.admission.id.clone(),
      patient_id:      scope.admission.patient_id.clone(),
      organization_id: ctx.organization_id.clone(),
      note_type:       AttachmentKind::from_mime(&file.mime_type).note_kind(),
      content:         None,
      file:            Some(sent.clone()),
      created_by:      user.to_string(),
    };
    let persisted = self.backend.create_note(&note).await.map_err(Error::transport)?;
    Ok((persisted, sent))
  }
}

fn placeholder(user: &str, file: &LocalFile) -> TimelineEntry {
  TimelineEntry {
    id:        EntryId::new(),
    sender:    user.to_string(),
    timestamp: Utc::now(),
    state:     EntryState::Pending,
    body:      EntryBody::Attachment(Attachment {
      kind:       AttachmentKind::from_mime(&file.mime_type),
      blob_url:   None,
      file_name:  file.name.clone(),
      file_type:  Some(file.mime_type.clone()).filter(|t| !t.is_empty()),
      file_size:  Some(file.bytes.len() as u64),
      transcript: TranscriptState::Absent,
    }),
  }
}

/// Fill a placeholder with the server's confirmed values. The state and the
/// file fields change in one step.
fn commit_upload(
  timeline: &mut Timeline,
  id: EntryId,
  note: &MedicalNote,
  sent: &FileObject,
  transcribing: bool,
) -> Result<()> {
  let confirmed = note.file.as_ref().unwrap_or(sent);
  let found = timeline.update(id, |entry| {
    entry.state = EntryState::Committed { server_id: note.id.clone() };
    if let Some(a) = entry.attachment_mut() {
      a.blob_url = Some(confirmed.blob_url.clone()).filter(|u| !u.is_empty());
      if !confirmed.file_name.is_empty() {
        a.file_name = confirmed.file_name.clone();
      }
      a.file_type = Some(confirmed.file_type.clone()).filter(|t| !t.is_empty());
      a.file_size = Some(confirmed.file_size);
      if transcribing {
        a.transcript = TranscriptState::InProgress;
      }
    }
  });
  if found { Ok(()) } else { Err(Error::EntryNotFound(id)) }
}

pub(super) fn finish_transcript(
  timeline: &mut Timeline,
  id: EntryId,
  transcript: Transcript,
  at: DateTime<Utc>,
) -> Result<()> {
  let found = timeline.update(id, |entry| {
    entry.timestamp = at;
    if let Some(a) = entry.attachment_mut() {
      a.transcript = TranscriptState::Done(transcript);
    }
  });
  if found { Ok(()) } else { Err(Error::EntryNotFound(id)) }
}
