//! Discharge summaries and prescriptions: AI drafts and saving.

use chrono::Utc;
use tracing::info;

use super::Notebook;
use crate::{
  Error, Result,
  admission::SessionContext,
  backend::NotesBackend,
  entry::{EntryId, TimelineEntry},
  record::{
    DischargeSummaryFormat, DraftStatus, NewDischargeSummary, NewPrescription,
    PrescriptionFormat,
  },
};

impl<B: NotesBackend> Notebook<B> {
  /// Ask the backend for an AI-drafted discharge summary. Nothing is added
  /// to the timeline; the draft is for the user to edit and save.
  pub async fn draft_discharge_summary(&self) -> Result<DischargeSummaryFormat> {
    let scope = self.scope().await?;
    let generated = self
      .backend
      .generate_discharge_summary(&scope.admission.id)
      .await
      .map_err(Error::transport)?;
    Ok(generated.summary)
  }

  /// Save a discharge summary and add it to the timeline.
  pub async fn save_discharge_summary(
    &self,
    ctx: &SessionContext,
    summary: DischargeSummaryFormat,
    status: DraftStatus,
  ) -> Result<EntryId> {
    let scope = self.scope().await?;
    let request = NewDischargeSummary {
      patient_id: scope.admission.patient_id.clone(),
      admission_id: scope.admission.id.clone(),
      organization_id: ctx.organization_id.clone(),
      summary,
      status,
    };
    let saved = self
      .backend
      .create_discharge_summary(&request)
      .await
      .map_err(Error::transport)?;

    let entry = TimelineEntry::from_summary(&saved, Utc::now());
    let id = entry.id;
    self
      .settle(scope.generation, |state| state.timeline.insert(entry))
      .await?;
    info!(entry = %id, admission = %scope.admission.id, "discharge summary saved");
    Ok(id)
  }

  /// Ask the backend for an AI-drafted prescription.
  pub async fn draft_prescription(&self) -> Result<PrescriptionFormat> {
    let scope = self.scope().await?;
    let generated = self
      .backend
      .generate_prescription(&scope.admission.id)
      .await
      .map_err(Error::transport)?;
    Ok(generated.prescription)
  }

  /// Save a prescription and add it to the timeline.
  pub async fn save_prescription(
    &self,
    ctx: &SessionContext,
    prescription: PrescriptionFormat,
    status: DraftStatus,
  ) -> Result<EntryId> {
    let scope = self.scope().await?;
    let request = NewPrescription {
      patient_id: scope.admission.patient_id.clone(),
      admission_id: scope.admission.id.clone(),
      organization_id: ctx.organization_id.clone(),
      prescription,
      status,
    };
    let saved = self
      .backend
      .create_prescription(&request)
      .await
      .map_err(Error::transport)?;

    let entry = TimelineEntry::from_prescription(&saved, Utc::now());
    let id = entry.id;
    self
      .settle(scope.generation, |state| state.timeline.insert(entry))
      .await?;
    info!(entry = %id, admission = %scope.admission.id, "prescription saved");
    Ok(id)
  }
}
