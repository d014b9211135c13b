//! Wire records exchanged with the notes backend.
//!
//! These mirror the backend's JSON shapes field for field. The timeline
//! never renders them directly; see [`crate::entry`] for the view model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::NoteKind;

// ─── Files ───────────────────────────────────────────────────────────────────

/// A blob reference attached to a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileObject {
  pub blob_url:  String,
  pub file_name: String,
  #[serde(default)]
  pub file_type: String,
  #[serde(default)]
  pub file_size: u64,
}

/// Where to `PUT` a new blob, and the reference it will have once stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
  pub upload_url: String,
  pub blob_url:   String,
}

/// The file name component of a blob reference (its last path segment).
pub fn blob_file_name(blob_url: &str) -> Option<&str> {
  let path = blob_url.split(['?', '#']).next().unwrap_or(blob_url);
  path.rsplit('/').next().filter(|name| !name.is_empty())
}

// ─── Medical notes ───────────────────────────────────────────────────────────

/// A note row as stored by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalNote {
  pub id:                     String,
  pub admission_id:           String,
  pub patient_id:             String,
  pub organization_id:        String,
  /// Free-form on the wire; normalised by [`NoteKind::from_note_type`].
  pub note_type:              String,
  #[serde(default)]
  pub content:                Option<String>,
  #[serde(default)]
  pub file:                   Option<FileObject>,
  pub created_by:             String,
  #[serde(with = "wire_time")]
  pub created_at:             DateTime<Utc>,
  #[serde(default)]
  pub transcribed_audio_text: Option<String>,
  #[serde(default)]
  pub medified_audio_text:    Option<String>,
  #[serde(default)]
  pub patient_note:           Option<String>,
  #[serde(default)]
  pub medified_patient_note:  Option<String>,
  #[serde(default)]
  pub medified_text:          Option<String>,
}

/// Body of `POST /medical-notes`.
#[derive(Debug, Clone, Serialize)]
pub struct NewMedicalNote {
  pub admission_id:    String,
  pub patient_id:      String,
  pub organization_id: String,
  pub note_type:       NoteKind,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub content:         Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub file:            Option<FileObject>,
  pub created_by:      String,
}

/// Body of `PATCH /medical-notes/{id}`. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NoteUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub content:                Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub transcribed_audio_text: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub medified_audio_text:    Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub patient_note:           Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub medified_patient_note:  Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub medified_text:          Option<String>,
}

impl From<&Transcription> for NoteUpdate {
  fn from(t: &Transcription) -> Self {
    Self {
      content:                None,
      transcribed_audio_text: t.transcribed_audio_text.clone(),
      medified_audio_text:    t.medified_audio_text.clone(),
      patient_note:           t.patient_note.clone(),
      medified_patient_note:  t.medified_patient_note.clone(),
      medified_text:          t.medified_text.clone(),
    }
  }
}

// ─── Transcription ───────────────────────────────────────────────────────────

/// Body of `POST /transcribe`.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionRequest {
  pub admission_id:  String,
  pub patient_id:    String,
  pub audio_url:     String,
  pub patient_notes: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcription {
  #[serde(default)]
  pub patient_id:             Option<String>,
  #[serde(default)]
  pub admission_id:           Option<String>,
  #[serde(default, with = "wire_time::option")]
  pub timestamp:              Option<DateTime<Utc>>,
  #[serde(default)]
  pub transcribed_audio_text: Option<String>,
  #[serde(default)]
  pub medified_audio_text:    Option<String>,
  #[serde(default)]
  pub audio_url:              Option<String>,
  #[serde(default)]
  pub patient_note:           Option<String>,
  #[serde(default)]
  pub medified_patient_note:  Option<String>,
  #[serde(default)]
  pub medified_text:          Option<String>,
}

impl Transcription {
  /// The text shown for the note: `medified_audio_text`, else
  /// `medified_text`. `None` means the response is unusable.
  pub fn display_text(&self) -> Option<&str> {
    [&self.medified_audio_text, &self.medified_text]
      .into_iter()
      .flatten()
      .map(String::as_str)
      .find(|s| !s.trim().is_empty())
  }
}

// ─── Discharge summaries and prescriptions ───────────────────────────────────

/// Draft or final, for summaries and prescriptions alike.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftStatus {
  #[default]
  Draft,
  Final,
}

/// The six narrative fields of a discharge summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DischargeSummaryFormat {
  pub symptoms_at_admission:       String,
  pub diagnosis_initial_final:     String,
  pub examinations_investigations: String,
  pub treatments_procedures:       String,
  pub followup_advice:             String,
  pub next_followup:               String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DischargeSummary {
  pub patient_id:   String,
  pub admission_id: String,
  pub summary:      DischargeSummaryFormat,
  #[serde(default)]
  pub message:      String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewDischargeSummary {
  pub patient_id:      String,
  pub admission_id:    String,
  pub organization_id: String,
  pub summary:         DischargeSummaryFormat,
  pub status:          DraftStatus,
}

/// The five narrative fields of a prescription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrescriptionFormat {
  pub vitals:               String,
  pub symptoms:             String,
  pub diagnosis:            String,
  pub medicines_prescribed: String,
  pub advice_followup:      String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
  pub patient_id:   String,
  pub admission_id: String,
  pub prescription: PrescriptionFormat,
  #[serde(default)]
  pub message:      String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPrescription {
  pub patient_id:      String,
  pub admission_id:    String,
  pub organization_id: String,
  pub prescription:    PrescriptionFormat,
  pub status:          DraftStatus,
}

// ─── Timestamps ──────────────────────────────────────────────────────────────

/// The backend emits RFC 3339 timestamps, sometimes without an offset.
/// Offset-less values are taken as UTC.
mod wire_time {
  use chrono::{DateTime, NaiveDateTime, Utc};
  use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

  pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
      return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
      .ok()
      .map(|naive| naive.and_utc())
  }

  pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&dt.to_rfc3339())
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(d)?;
    parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw:?}")))
  }

  pub mod option {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
      dt: &Option<DateTime<Utc>>,
      s: S,
    ) -> Result<S::Ok, S::Error> {
      match dt {
        Some(dt) => super::serialize(dt, s),
        None => s.serialize_none(),
      }
    }

    /// Unparseable values become `None` rather than failing the response.
    pub fn deserialize<'de, D: Deserializer<'de>>(
      d: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
      let raw = Option::<String>::deserialize(d)?;
      Ok(raw.as_deref().and_then(super::parse))
    }
  }
}
