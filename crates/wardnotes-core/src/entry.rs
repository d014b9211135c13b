//! Timeline entries: the renderable items of an admission's notes feed.
//!
//! An entry is one of four bodies (text, attachment, discharge summary,
//! prescription) plus a persistence state. Placeholders are entries in
//! [`EntryState::Pending`]; they carry no server id by construction.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::{
  DischargeSummary, DischargeSummaryFormat, MedicalNote, Prescription,
  PrescriptionFormat, Transcription,
};

/// Sender shown for entries synthesised from summaries and prescriptions.
pub const SYSTEM_SENDER: &str = "System";

// ─── Identity ────────────────────────────────────────────────────────────────

/// Client-local identifier, unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(Uuid);

impl EntryId {
  pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Default for EntryId {
  fn default() -> Self { Self::new() }
}

impl fmt::Display for EntryId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(&self.0, f)
  }
}

impl std::str::FromStr for EntryId {
  type Err = uuid::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> { Ok(Self(s.parse()?)) }
}

// ─── Kinds ───────────────────────────────────────────────────────────────────

/// The `note_type` of a medical note.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum NoteKind {
  Text,
  File,
  Image,
  Audio,
}

impl NoteKind {
  /// Normalise a backend `note_type`. Unrecognised values are shown as text.
  pub fn from_note_type(raw: &str) -> Self {
    raw.trim().parse().unwrap_or(Self::Text)
  }
}

/// What an attachment holds, inferred from its MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
  File,
  Image,
  Audio,
}

impl AttachmentKind {
  pub fn from_mime(mime: &str) -> Self {
    if mime.starts_with("audio/") {
      Self::Audio
    } else if mime.starts_with("image/") {
      Self::Image
    } else {
      Self::File
    }
  }

  pub fn note_kind(self) -> NoteKind {
    match self {
      Self::File => NoteKind::File,
      Self::Image => NoteKind::Image,
      Self::Audio => NoteKind::Audio,
    }
  }
}

// ─── Persistence state ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EntryState {
  /// Placeholder; its remote round trip is still outstanding.
  Pending,
  /// Durably persisted by the backend.
  Committed { server_id: String },
  /// Built from a server record that has no note id of its own.
  Detached,
}

// ─── Bodies ──────────────────────────────────────────────────────────────────

/// A transcription attached to an audio note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
  /// The cleaned-up text shown on the timeline.
  pub text:                  String,
  pub raw_text:              Option<String>,
  pub patient_note:          Option<String>,
  pub medified_patient_note: Option<String>,
}

impl Transcript {
  /// `None` when the response carries neither display field.
  pub fn from_response(t: &Transcription) -> Option<Self> {
    Some(Self {
      text:                  t.display_text()?.to_string(),
      raw_text:              t.transcribed_audio_text.clone(),
      patient_note:          t.patient_note.clone(),
      medified_patient_note: t.medified_patient_note.clone(),
    })
  }

  fn from_note(note: &MedicalNote) -> Option<Self> {
    let text = [&note.medified_audio_text, &note.medified_text]
      .into_iter()
      .flatten()
      .find(|s| !s.trim().is_empty())?;
    Some(Self {
      text:                  text.clone(),
      raw_text:              note.transcribed_audio_text.clone(),
      patient_note:          note.patient_note.clone(),
      medified_patient_note: note.medified_patient_note.clone(),
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "transcript", rename_all = "snake_case")]
pub enum TranscriptState {
  Absent,
  InProgress,
  Done(Transcript),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
  pub kind:       AttachmentKind,
  /// `None` until the upload has been confirmed.
  pub blob_url:   Option<String>,
  pub file_name:  String,
  pub file_type:  Option<String>,
  pub file_size:  Option<u64>,
  pub transcript: TranscriptState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum EntryBody {
  Text(String),
  Attachment(Attachment),
  Summary(DischargeSummaryFormat),
  Prescription(PrescriptionFormat),
}

impl EntryBody {
  pub fn label(&self) -> &'static str {
    match self {
      Self::Text(_) => "text",
      Self::Attachment(a) => match a.kind {
        AttachmentKind::File => "file",
        AttachmentKind::Image => "image",
        AttachmentKind::Audio => "audio",
      },
      Self::Summary(_) => "summary",
      Self::Prescription(_) => "prescription",
    }
  }
}

// ─── Entry ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
  pub id:        EntryId,
  pub sender:    String,
  pub timestamp: DateTime<Utc>,
  pub state:     EntryState,
  pub body:      EntryBody,
}

impl TimelineEntry {
  /// The backend note id, once the entry has been persisted.
  pub fn server_id(&self) -> Option<&str> {
    match &self.state {
      EntryState::Committed { server_id } => Some(server_id),
      EntryState::Pending | EntryState::Detached => None,
    }
  }

  pub fn is_loading(&self) -> bool { matches!(self.state, EntryState::Pending) }

  pub fn is_transcribing(&self) -> bool {
    matches!(
      &self.body,
      EntryBody::Attachment(Attachment { transcript: TranscriptState::InProgress, .. })
    )
  }

  pub fn attachment(&self) -> Option<&Attachment> {
    match &self.body {
      EntryBody::Attachment(a) => Some(a),
      EntryBody::Text(_) | EntryBody::Summary(_) | EntryBody::Prescription(_) => None,
    }
  }

  pub(crate) fn attachment_mut(&mut self) -> Option<&mut Attachment> {
    match &mut self.body {
      EntryBody::Attachment(a) => Some(a),
      EntryBody::Text(_) | EntryBody::Summary(_) | EntryBody::Prescription(_) => None,
    }
  }

  /// Map a stored note onto the timeline.
  pub fn from_note(note: &MedicalNote) -> Self {
    let body = match NoteKind::from_note_type(&note.note_type) {
      NoteKind::Text => EntryBody::Text(note_content(note)),
      NoteKind::File => EntryBody::Attachment(note_attachment(note, AttachmentKind::File)),
      NoteKind::Image => {
        EntryBody::Attachment(note_attachment(note, AttachmentKind::Image))
      }
      NoteKind::Audio => {
        EntryBody::Attachment(note_attachment(note, AttachmentKind::Audio))
      }
    };
    Self {
      id: EntryId::new(),
      sender: note.created_by.clone(),
      timestamp: note.created_at,
      state: EntryState::Committed { server_id: note.id.clone() },
      body,
    }
  }

  /// Summaries carry no timestamp of their own; `received_at` is used.
  pub fn from_summary(summary: &DischargeSummary, received_at: DateTime<Utc>) -> Self {
    Self {
      id:        EntryId::new(),
      sender:    SYSTEM_SENDER.to_string(),
      timestamp: received_at,
      state:     EntryState::Detached,
      body:      EntryBody::Summary(summary.summary.clone()),
    }
  }

  /// Prescriptions carry no timestamp of their own; `received_at` is used.
  pub fn from_prescription(
    prescription: &Prescription,
    received_at: DateTime<Utc>,
  ) -> Self {
    Self {
      id:        EntryId::new(),
      sender:    SYSTEM_SENDER.to_string(),
      timestamp: received_at,
      state:     EntryState::Detached,
      body:      EntryBody::Prescription(prescription.prescription.clone()),
    }
  }
}

fn note_content(note: &MedicalNote) -> String {
  note
    .content
    .clone()
    .filter(|c| !c.is_empty())
    .or_else(|| note.file.as_ref().map(|f| f.blob_url.clone()))
    .unwrap_or_default()
}

fn note_attachment(note: &MedicalNote, kind: AttachmentKind) -> Attachment {
  let file = note.file.as_ref();
  let file_name = file
    .map(|f| f.file_name.clone())
    .filter(|n| !n.is_empty())
    .or_else(|| {
      note
        .content
        .as_deref()
        .and_then(|c| c.rsplit('/').next())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
    })
    .unwrap_or_else(|| "file".to_string());

  let transcript = match Transcript::from_note(note) {
    Some(t) => TranscriptState::Done(t),
    None => TranscriptState::Absent,
  };

  Attachment {
    kind,
    blob_url: Some(note_content(note)).filter(|u| !u.is_empty()),
    file_name,
    file_type: file.map(|f| f.file_type.clone()).filter(|t| !t.is_empty()),
    file_size: file.map(|f| f.file_size),
    transcript,
  }
}
