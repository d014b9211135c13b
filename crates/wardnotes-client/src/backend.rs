//! The notes endpoints, as a [`NotesBackend`].

use bytes::Bytes;
use serde::{Deserialize, de::IgnoredAny};
use wardnotes_core::{
  admission::Admission,
  backend::NotesBackend,
  record::{
    DischargeSummary, MedicalNote, NewDischargeSummary, NewMedicalNote, NewPrescription,
    NoteUpdate, Prescription, Transcription, TranscriptionRequest, UploadTarget,
  },
};

use crate::{error::Result, gateway::Gateway};

#[derive(Deserialize)]
struct UploadUrl {
  upload_url: String,
}

#[derive(Deserialize)]
struct DownloadUrl {
  download_url: String,
}

#[derive(Clone)]
pub struct HttpBackend {
  gateway:       Gateway,
  blob_base_url: Option<String>,
}

impl HttpBackend {
  pub fn new(gateway: Gateway) -> Self { Self { gateway, blob_base_url: None } }

  /// Public base of uploaded blobs. Without it the blob reference is the
  /// upload URL minus its signature.
  pub fn with_blob_base_url(mut self, base: impl Into<String>) -> Self {
    self.blob_base_url = Some(base.into()).filter(|b| !b.is_empty());
    self
  }

  pub fn gateway(&self) -> &Gateway { &self.gateway }

  /// `GET /admissions?organization_id=`
  pub async fn list_admissions(&self, organization_id: &str) -> Result<Vec<Admission>> {
    self
      .gateway
      .get("/admissions", &[("organization_id", organization_id)])
      .await
  }

  fn blob_url(&self, file_name: &str, upload_url: &str) -> String {
    match &self.blob_base_url {
      Some(base) => format!("{}/{file_name}", base.trim_end_matches('/')),
      None => upload_url.split('?').next().unwrap_or(upload_url).to_string(),
    }
  }
}

impl NotesBackend for HttpBackend {
  type Error = crate::Error;

  async fn list_notes(&self, admission_id: &str) -> Result<Vec<MedicalNote>> {
    self
      .gateway
      .get(&format!("/medical-notes/admission/{admission_id}"), &[])
      .await
  }

  async fn list_discharge_summaries(&self, admission_id: &str) -> Result<Vec<DischargeSummary>> {
    self
      .gateway
      .get(&format!("/discharge-summaries/{admission_id}"), &[])
      .await
  }

  async fn list_prescriptions(&self, admission_id: &str) -> Result<Vec<Prescription>> {
    self
      .gateway
      .get(&format!("/prescriptions/{admission_id}"), &[])
      .await
  }

  async fn create_note(&self, note: &NewMedicalNote) -> Result<MedicalNote> {
    self.gateway.post("/medical-notes", &[], Some(note)).await
  }

  async fn update_note(&self, note_id: &str, update: &NoteUpdate) -> Result<()> {
    let _: IgnoredAny = self
      .gateway
      .patch(&format!("/medical-notes/{note_id}"), update)
      .await?;
    Ok(())
  }

  async fn upload_target(&self, file_name: &str) -> Result<UploadTarget> {
    let UploadUrl { upload_url } = self
      .gateway
      .get("/generate-upload-url", &[("filename", file_name)])
      .await?;
    let blob_url = self.blob_url(file_name, &upload_url);
    Ok(UploadTarget { upload_url, blob_url })
  }

  async fn put_blob(&self, target: &UploadTarget, content_type: &str, bytes: Bytes) -> Result<()> {
    self
      .gateway
      .put_blob(&target.upload_url, content_type, bytes)
      .await
  }

  async fn download_url(&self, file_name: &str) -> Result<String> {
    let DownloadUrl { download_url } = self
      .gateway
      .get("/generate-download-url", &[("filename", file_name)])
      .await?;
    Ok(download_url)
  }

  async fn transcribe(&self, request: &TranscriptionRequest) -> Result<Transcription> {
    self.gateway.post("/transcribe", &[], Some(request)).await
  }

  async fn generate_discharge_summary(&self, admission_id: &str) -> Result<DischargeSummary> {
    self
      .gateway
      .post::<(), _>(
        "/generate-discharge-summary",
        &[("admission_id", admission_id)],
        None,
      )
      .await
  }

  async fn generate_prescription(&self, admission_id: &str) -> Result<Prescription> {
    self
      .gateway
      .post::<(), _>("/generate-prescription", &[("admission_id", admission_id)], None)
      .await
  }

  async fn create_discharge_summary(
    &self,
    summary: &NewDischargeSummary,
  ) -> Result<DischargeSummary> {
    self
      .gateway
      .post("/create-discharge-summary", &[], Some(summary))
      .await
  }

  async fn create_prescription(&self, prescription: &NewPrescription) -> Result<Prescription> {
    self
      .gateway
      .post("/create-prescription", &[], Some(prescription))
      .await
  }
}
