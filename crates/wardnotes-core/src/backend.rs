//! The `NotesBackend` trait: everything the timeline needs from the server.
//!
//! Implemented over HTTP by `wardnotes-client`. The notebook depends on this
//! abstraction only, which is what lets tests script the backend.

use std::future::Future;

use bytes::Bytes;

use crate::record::{
  DischargeSummary, MedicalNote, NewDischargeSummary, NewMedicalNote,
  NewPrescription, NoteUpdate, Prescription, Transcription, TranscriptionRequest,
  UploadTarget,
};

/// Remote operations behind an admission's notes timeline.
///
/// All methods return `Send` futures so notebook operations can be spawned
/// onto a multi-threaded runtime.
pub trait NotesBackend: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// `GET /medical-notes/admission/{id}`
  fn list_notes(
    &self,
    admission_id: &str,
  ) -> impl Future<Output = Result<Vec<MedicalNote>, Self::Error>> + Send;

  /// `GET /discharge-summaries/{admission_id}`
  fn list_discharge_summaries(
    &self,
    admission_id: &str,
  ) -> impl Future<Output = Result<Vec<DischargeSummary>, Self::Error>> + Send;

  /// `GET /prescriptions/{admission_id}`
  fn list_prescriptions(
    &self,
    admission_id: &str,
  ) -> impl Future<Output = Result<Vec<Prescription>, Self::Error>> + Send;

  // ── Notes ─────────────────────────────────────────────────────────────

  /// `POST /medical-notes`
  fn create_note(
    &self,
    note: &NewMedicalNote,
  ) -> impl Future<Output = Result<MedicalNote, Self::Error>> + Send;

  /// `PATCH /medical-notes/{id}`. Whatever the backend answers with is
  /// discarded, including no body at all.
  fn update_note(
    &self,
    note_id: &str,
    update: &NoteUpdate,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send;

  // ── Blobs ─────────────────────────────────────────────────────────────

  /// `GET /generate-upload-url?filename=`
  fn upload_target(
    &self,
    file_name: &str,
  ) -> impl Future<Output = Result<UploadTarget, Self::Error>> + Send;

  /// Store `bytes` at a target obtained from [`Self::upload_target`]. This
  /// goes straight to blob storage, not through the API.
  fn put_blob(
    &self,
    target: &UploadTarget,
    content_type: &str,
    bytes: Bytes,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send;

  /// `GET /generate-download-url?filename=`: a time-limited reference.
  fn download_url(
    &self,
    file_name: &str,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send;

  // ── AI ────────────────────────────────────────────────────────────────

  /// `POST /transcribe`
  fn transcribe(
    &self,
    request: &TranscriptionRequest,
  ) -> impl Future<Output = Result<Transcription, Self::Error>> + Send;

  /// `POST /generate-discharge-summary?admission_id=`
  fn generate_discharge_summary(
    &self,
    admission_id: &str,
  ) -> impl Future<Output = Result<DischargeSummary, Self::Error>> + Send;

  /// `POST /generate-prescription?admission_id=`
  fn generate_prescription(
    &self,
    admission_id: &str,
  ) -> impl Future<Output = Result<Prescription, Self::Error>> + Send;

  // ── Authoring ─────────────────────────────────────────────────────────

  /// `POST /create-discharge-summary`
  fn create_discharge_summary(
    &self,
    summary: &NewDischargeSummary,
  ) -> impl Future<Output = Result<DischargeSummary, Self::Error>> + Send;

  /// `POST /create-prescription`
  fn create_prescription(
    &self,
    prescription: &NewPrescription,
  ) -> impl Future<Output = Result<Prescription, Self::Error>> + Send;
}
