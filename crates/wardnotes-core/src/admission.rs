//! Admissions and the caller's session context.
//!
//! An admission is owned by the backend; the notes timeline only ever reads
//! it. Status transitions happen elsewhere.

use serde::{Deserialize, Serialize};

/// Whether the patient is still on the ward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdmissionStatus {
  Admitted,
  Discharged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdmissionType {
  Inpatient,
  Outpatient,
  Emergency,
}

/// One hospital stay, as returned by `GET /admissions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admission {
  pub id:               String,
  pub patient_id:       String,
  #[serde(default)]
  pub patient_name:     Option<String>,
  pub organization_id:  String,
  pub admission_type:   AdmissionType,
  #[serde(default)]
  pub admission_reason: Option<String>,
  #[serde(default)]
  pub ward:             Option<String>,
  #[serde(default)]
  pub bed_no:           Option<String>,
  /// `yyyy-MM-dd` or a full ISO timestamp; kept as the backend sent it.
  pub admission_date:   String,
  #[serde(default)]
  pub discharge_date:   Option<String>,
  pub status:           AdmissionStatus,
}

impl Admission {
  /// Short human label: patient name (or id) plus ward/bed when known.
  pub fn label(&self) -> String {
    let who = self.patient_name.as_deref().unwrap_or(&self.patient_id);
    match (self.ward.as_deref(), self.bed_no.as_deref()) {
      (Some(ward), Some(bed)) => format!("{who} ({ward}/{bed})"),
      (Some(ward), None) => format!("{who} ({ward})"),
      _ => who.to_string(),
    }
  }
}

/// Who is acting, passed explicitly into every mutating operation.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
  pub organization_id: String,
  /// `None` when nobody is signed in; mutations then fail validation.
  pub user_id:         Option<String>,
}

impl SessionContext {
  pub fn new(organization_id: impl Into<String>, user_id: Option<String>) -> Self {
    Self { organization_id: organization_id.into(), user_id }
  }
}
