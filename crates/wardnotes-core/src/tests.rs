//! Notebook tests against a scripted in-memory backend.

use std::{
  collections::{HashMap, HashSet},
  sync::{Arc, Mutex},
};

use bytes::Bytes;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::Notify;

use crate::{
  Error, LoadOutcome, Notebook, ValidationError,
  admission::{Admission, AdmissionStatus, AdmissionType, SessionContext},
  backend::NotesBackend,
  entry::{
    Attachment, AttachmentKind, EntryBody, EntryId, EntryState, TimelineEntry, TranscriptState,
  },
  notebook::{InFlight, LOAD_FAILED, LocalFile},
  record::{
    DischargeSummary, DischargeSummaryFormat, DraftStatus, FileObject, MedicalNote,
    NewDischargeSummary, NewMedicalNote, NewPrescription, NoteUpdate, Prescription,
    PrescriptionFormat, Transcription, TranscriptionRequest, UploadTarget,
  },
  recording::{PendingAudio, RecordingSlot},
};

// ─── Scripted backend ────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct ScriptError(String);

#[derive(Default)]
struct Script {
  notes:         HashMap<String, Vec<MedicalNote>>,
  summaries:     HashMap<String, Vec<DischargeSummary>>,
  prescriptions: HashMap<String, Vec<Prescription>>,
  /// Call keys (e.g. `"put_blob"`) that fail.
  failing:       HashSet<String>,
  transcription: Option<Transcription>,
  calls:         Vec<String>,
  created:       Vec<NewMedicalNote>,
  updates:       Vec<(String, NoteUpdate)>,
  next_id:       u32,
}

#[derive(Default)]
struct ScriptedBackend {
  script: Mutex<Script>,
  gates:  Mutex<HashMap<String, Arc<Notify>>>,
}

impl ScriptedBackend {
  fn new() -> Arc<Self> { Arc::new(Self::default()) }

  fn with<T>(&self, f: impl FnOnce(&mut Script) -> T) -> T {
    f(&mut self.script.lock().unwrap())
  }

  fn fail(&self, key: &str) { self.with(|s| s.failing.insert(key.to_string())); }

  fn called(&self, key: &str) -> bool { self.with(|s| s.calls.iter().any(|c| c == key)) }

  fn call_count(&self) -> usize { self.with(|s| s.calls.len()) }

  /// Block calls with `key` until the returned gate is notified.
  fn gate(&self, key: &str) -> Arc<Notify> {
    let gate = Arc::new(Notify::new());
    self.gates.lock().unwrap().insert(key.to_string(), Arc::clone(&gate));
    gate
  }

  async fn enter(&self, key: String) -> Result<(), ScriptError> {
    let failing = self.with(|s| {
      s.calls.push(key.clone());
      s.failing.contains(&key) || s.failing.contains(key.split(':').next().unwrap())
    });
    let gate = self.gates.lock().unwrap().get(&key).cloned();
    if let Some(gate) = gate {
      gate.notified().await;
    }
    if failing {
      return Err(ScriptError(format!("{key} failed")));
    }
    Ok(())
  }
}

impl NotesBackend for ScriptedBackend {
  type Error = ScriptError;

  async fn list_notes(&self, admission_id: &str) -> Result<Vec<MedicalNote>, ScriptError> {
    self.enter(format!("list_notes:{admission_id}")).await?;
    Ok(self.with(|s| s.notes.get(admission_id).cloned().unwrap_or_default()))
  }

  async fn list_discharge_summaries(
    &self,
    admission_id: &str,
  ) -> Result<Vec<DischargeSummary>, ScriptError> {
    self.enter(format!("list_discharge_summaries:{admission_id}")).await?;
    Ok(self.with(|s| s.summaries.get(admission_id).cloned().unwrap_or_default()))
  }

  async fn list_prescriptions(
    &self,
    admission_id: &str,
  ) -> Result<Vec<Prescription>, ScriptError> {
    self.enter(format!("list_prescriptions:{admission_id}")).await?;
    Ok(self.with(|s| s.prescriptions.get(admission_id).cloned().unwrap_or_default()))
  }

  async fn create_note(&self, note: &NewMedicalNote) -> Result<MedicalNote, ScriptError> {
    self.enter("create_note".to_string()).await?;
    Ok(self.with(|s| {
      s.next_id += 1;
      s.created.push(note.clone());
      MedicalNote {
        id:                     format!("note-{}", s.next_id),
        admission_id:           note.admission_id.clone(),
        patient_id:             note.patient_id.clone(),
        organization_id:        note.organization_id.clone(),
        note_type:              note.note_type.to_string(),
        content:                note.content.clone(),
        file:                   note.file.clone(),
        created_by:             note.created_by.clone(),
        created_at:             Utc::now(),
        transcribed_audio_text: None,
        medified_audio_text:    None,
        patient_note:           None,
        medified_patient_note:  None,
        medified_text:          None,
      }
    }))
  }

  async fn update_note(
    &self,
    note_id: &str,
    update: &NoteUpdate,
  ) -> Result<(), ScriptError> {
    self.enter(format!("update_note:{note_id}")).await?;
    self.with(|s| s.updates.push((note_id.to_string(), update.clone())));
    Ok(())
  }

  async fn upload_target(&self, file_name: &str) -> Result<UploadTarget, ScriptError> {
    self.enter(format!("upload_target:{file_name}")).await?;
    Ok(UploadTarget {
      upload_url: format!("https://blobs.test/c/{file_name}?sig=up"),
      blob_url:   format!("https://blobs.test/c/{file_name}"),
    })
  }

  async fn put_blob(
    &self,
    target: &UploadTarget,
    content_type: &str,
    bytes: Bytes,
  ) -> Result<(), ScriptError> {
    self
      .enter(format!("put_blob:{}:{content_type}:{}", target.blob_url, bytes.len()))
      .await
  }

  async fn download_url(&self, file_name: &str) -> Result<String, ScriptError> {
    self.enter(format!("download_url:{file_name}")).await?;
    Ok(format!("https://blobs.test/c/{file_name}?sig=down"))
  }

  async fn transcribe(
    &self,
    request: &TranscriptionRequest,
  ) -> Result<Transcription, ScriptError> {
    self.enter(format!("transcribe:{}", request.audio_url)).await?;
    Ok(self.with(|s| {
      s.transcription.clone().unwrap_or_else(|| Transcription {
        timestamp: Some(at(500)),
        transcribed_audio_text: Some("raw words".into()),
        medified_audio_text: Some("clean words".into()),
        ..Default::default()
      })
    }))
  }

  async fn generate_discharge_summary(
    &self,
    admission_id: &str,
  ) -> Result<DischargeSummary, ScriptError> {
    self.enter(format!("generate_discharge_summary:{admission_id}")).await?;
    Ok(summary(admission_id, "drafted"))
  }

  async fn generate_prescription(
    &self,
    admission_id: &str,
  ) -> Result<Prescription, ScriptError> {
    self.enter(format!("generate_prescription:{admission_id}")).await?;
    Ok(prescription(admission_id, "drafted"))
  }

  async fn create_discharge_summary(
    &self,
    request: &NewDischargeSummary,
  ) -> Result<DischargeSummary, ScriptError> {
    self.enter("create_discharge_summary".to_string()).await?;
    Ok(DischargeSummary {
      patient_id:   request.patient_id.clone(),
      admission_id: request.admission_id.clone(),
      summary:      request.summary.clone(),
      message:      "saved".into(),
    })
  }

  async fn create_prescription(
    &self,
    request: &NewPrescription,
  ) -> Result<Prescription, ScriptError> {
    self.enter("create_prescription".to_string()).await?;
    Ok(Prescription {
      patient_id:   request.patient_id.clone(),
      admission_id: request.admission_id.clone(),
      prescription: request.prescription.clone(),
      message:      "saved".into(),
    })
  }
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn at(secs: i64) -> DateTime<Utc> {
  Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn admission(id: &str) -> Admission {
  Admission {
    id:               id.into(),
    patient_id:       format!("P-{id}"),
    patient_name:     Some("Ada".into()),
    organization_id:  "O1".into(),
    admission_type:   AdmissionType::Inpatient,
    admission_reason: None,
    ward:             Some("W3".into()),
    bed_no:           Some("12".into()),
    admission_date:   "2024-05-01".into(),
    discharge_date:   None,
    status:           AdmissionStatus::Admitted,
  }
}

fn ctx() -> SessionContext { SessionContext::new("O1", Some("U1".into())) }

fn stored_note(id: &str, note_type: &str, created_at: DateTime<Utc>) -> MedicalNote {
  MedicalNote {
    id: id.into(),
    admission_id: "A1".into(),
    patient_id: "P-A1".into(),
    organization_id: "O1".into(),
    note_type: note_type.into(),
    content: Some(format!("content of {id}")),
    file: None,
    created_by: "U9".into(),
    created_at,
    transcribed_audio_text: None,
    medified_audio_text: None,
    patient_note: None,
    medified_patient_note: None,
    medified_text: None,
  }
}

fn stored_audio(id: &str, file_name: &str, created_at: DateTime<Utc>) -> MedicalNote {
  MedicalNote {
    content: None,
    file: Some(FileObject {
      blob_url:  format!("https://blobs.test/c/{file_name}"),
      file_name: file_name.into(),
      file_type: "audio/wav".into(),
      file_size: 44,
    }),
    ..stored_note(id, "audio", created_at)
  }
}

fn summary(admission_id: &str, symptoms: &str) -> DischargeSummary {
  DischargeSummary {
    patient_id:   format!("P-{admission_id}"),
    admission_id: admission_id.into(),
    summary:      DischargeSummaryFormat {
      symptoms_at_admission: symptoms.into(),
      ..Default::default()
    },
    message:      String::new(),
  }
}

fn prescription(admission_id: &str, vitals: &str) -> Prescription {
  Prescription {
    patient_id:   format!("P-{admission_id}"),
    admission_id: admission_id.into(),
    prescription: PrescriptionFormat { vitals: vitals.into(), ..Default::default() },
    message:      String::new(),
  }
}

async fn notebook_on(backend: &Arc<ScriptedBackend>, id: &str) -> Notebook<ScriptedBackend> {
  let nb = Notebook::new(Arc::clone(backend));
  nb.select(Some(admission(id))).await.unwrap();
  nb
}

async fn wait_for(backend: &ScriptedBackend, key: &str) {
  while !backend.called(key) {
    tokio::task::yield_now().await;
  }
}

fn assert_sorted_and_unique(entries: &[TimelineEntry]) {
  assert!(entries.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
  let ids: HashSet<_> = entries.iter().map(|e| e.id).collect();
  assert_eq!(ids.len(), entries.len());
}

// ─── Loading ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn load_merges_three_collections_in_time_order() {
  let backend = ScriptedBackend::new();
  backend.with(|s| {
    s.notes.insert(
      "A1".into(),
      vec![stored_note("n2", "text", at(20)), stored_note("n1", "IMAGE", at(10))],
    );
    s.summaries.insert("A1".into(), vec![summary("A1", "fever")]);
    s.prescriptions.insert("A1".into(), vec![prescription("A1", "BP 120/80")]);
  });

  let nb = Notebook::new(Arc::clone(&backend));
  let outcome = nb.select(Some(admission("A1"))).await.unwrap();
  assert_eq!(outcome, LoadOutcome::Loaded { entries: 4 });

  let view = nb.view().await;
  assert!(!view.loading);
  assert!(view.error.is_none());
  let labels: Vec<_> = view.entries.iter().map(|e| e.body.label()).collect();
  assert_eq!(&labels[..2], ["image", "text"]);
  assert_eq!(view.entries[0].server_id(), Some("n1"));
  assert!(view.entries[2..].iter().all(|e| e.state == EntryState::Detached));
  assert_sorted_and_unique(&view.entries);
}

#[tokio::test]
async fn admission_with_only_summary_and_prescription() {
  let backend = ScriptedBackend::new();
  backend.with(|s| {
    s.summaries.insert("A1".into(), vec![summary("A1", "fever")]);
    s.prescriptions.insert("A1".into(), vec![prescription("A1", "stable")]);
  });

  let nb = notebook_on(&backend, "A1").await;
  let view = nb.view().await;
  assert_eq!(view.entries.len(), 2);
  assert!(view.entries.iter().all(|e| e.server_id().is_none()));
  assert_sorted_and_unique(&view.entries);

  let has_fever = view.entries.iter().any(|e| {
    matches!(&e.body, EntryBody::Summary(s) if s.symptoms_at_admission == "fever")
  });
  assert!(has_fever);
  assert!(view.entries.iter().any(|e| matches!(e.body, EntryBody::Prescription(_))));
}

#[tokio::test]
async fn failed_load_leaves_empty_timeline_and_error() {
  let backend = ScriptedBackend::new();
  backend.with(|s| {
    s.notes.insert("A1".into(), vec![stored_note("n1", "text", at(1))]);
    s.notes.insert("B1".into(), vec![stored_note("n2", "text", at(2))]);
  });
  backend.fail("list_prescriptions:B1");

  let nb = notebook_on(&backend, "A1").await;
  assert_eq!(nb.view().await.entries.len(), 1);

  let err = nb.select(Some(admission("B1"))).await.unwrap_err();
  assert!(matches!(err, Error::Transport(_)));

  let view = nb.view().await;
  assert!(view.entries.is_empty());
  assert!(!view.loading);
  assert_eq!(view.error.as_deref(), Some(LOAD_FAILED));
}

#[tokio::test]
async fn deselecting_clears_without_fetching() {
  let backend = ScriptedBackend::new();
  backend.with(|s| {
    s.notes.insert("A1".into(), vec![stored_note("n1", "text", at(1))]);
  });
  backend.fail("list_notes:B1");

  let nb = Notebook::new(Arc::clone(&backend));
  let _ = nb.select(Some(admission("B1"))).await;
  assert!(nb.view().await.error.is_some());

  let calls = backend.call_count();
  assert_eq!(nb.select(None).await.unwrap(), LoadOutcome::Cleared);
  assert_eq!(backend.call_count(), calls);

  let view = nb.view().await;
  assert!(view.entries.is_empty());
  assert!(view.error.is_none());
  assert!(view.admission.is_none());
}

#[tokio::test]
async fn stale_load_is_never_applied() {
  let backend = ScriptedBackend::new();
  backend.with(|s| {
    s.notes.insert("A".into(), vec![stored_note("from-a", "text", at(1))]);
    s.notes.insert("B".into(), vec![stored_note("from-b", "text", at(2))]);
  });
  let gate = backend.gate("list_notes:A");

  let nb = Notebook::new(Arc::clone(&backend));
  let first = tokio::spawn({
    let nb = nb.clone();
    async move { nb.select(Some(admission("A"))).await }
  });
  wait_for(&backend, "list_notes:A").await;

  let second = nb.select(Some(admission("B"))).await.unwrap();
  assert_eq!(second, LoadOutcome::Loaded { entries: 1 });

  gate.notify_one();
  assert_eq!(first.await.unwrap().unwrap(), LoadOutcome::Stale);

  let view = nb.view().await;
  assert_eq!(view.admission.unwrap().id, "B");
  assert_eq!(view.entries.len(), 1);
  assert_eq!(view.entries[0].server_id(), Some("from-b"));
}

#[tokio::test]
async fn view_is_loading_until_fetches_return() {
  let backend = ScriptedBackend::new();
  backend.with(|s| {
    s.notes.insert("A".into(), vec![stored_note("n1", "text", at(1))]);
  });
  let gate = backend.gate("list_notes:A");

  let nb = Notebook::new(Arc::clone(&backend));
  let load = tokio::spawn({
    let nb = nb.clone();
    async move { nb.select(Some(admission("A"))).await }
  });
  wait_for(&backend, "list_notes:A").await;

  let view = nb.view().await;
  assert!(view.loading);
  assert!(view.entries.is_empty());
  assert_eq!(view.admission.unwrap().id, "A");

  gate.notify_one();
  assert_eq!(load.await.unwrap().unwrap(), LoadOutcome::Loaded { entries: 1 });
  assert!(!nb.view().await.loading);
}

// ─── Text notes ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn send_text_appends_committed_entry() {
  let backend = ScriptedBackend::new();
  let nb = notebook_on(&backend, "A2").await;

  let id = nb.send_text(&ctx(), "BP 120/80").await.unwrap();

  let view = nb.view().await;
  assert_eq!(view.entries.len(), 1);
  let entry = view.entry(id).unwrap();
  assert_eq!(entry.body, EntryBody::Text("BP 120/80".into()));
  assert_eq!(entry.sender, "U1");
  assert_eq!(entry.server_id(), Some("note-1"));
  assert!(!entry.is_loading());

  let sent = backend.with(|s| s.created[0].clone());
  assert_eq!(sent.admission_id, "A2");
  assert_eq!(sent.patient_id, "P-A2");
  assert_eq!(sent.organization_id, "O1");
  assert_eq!(sent.created_by, "U1");
}

#[tokio::test]
async fn failed_text_note_leaves_timeline_untouched() {
  let backend = ScriptedBackend::new();
  backend.with(|s| {
    s.notes.insert("A1".into(), vec![stored_note("n1", "text", at(1))]);
    s.summaries.insert("A1".into(), vec![summary("A1", "cough")]);
  });
  let nb = notebook_on(&backend, "A1").await;
  let before = nb.view().await.entries;

  backend.fail("create_note");
  let err = nb.send_text(&ctx(), "will fail").await.unwrap_err();
  assert!(matches!(err, Error::Transport(_)));
  assert_eq!(err.to_string(), "create_note failed");

  assert_eq!(nb.view().await.entries, before);
}

#[tokio::test]
async fn text_preconditions_are_checked_before_any_call() {
  let backend = ScriptedBackend::new();
  let nb = Notebook::new(Arc::clone(&backend));

  let err = nb.send_text(&ctx(), "hello").await.unwrap_err();
  assert!(matches!(err, Error::Validation(ValidationError::NoAdmission)));

  nb.select(Some(admission("A1"))).await.unwrap();
  let calls = backend.call_count();

  let err = nb.send_text(&ctx(), "   ").await.unwrap_err();
  assert!(matches!(err, Error::Validation(ValidationError::EmptyContent)));

  let anonymous = SessionContext::new("O1", None);
  let err = nb.send_text(&anonymous, "hello").await.unwrap_err();
  assert!(matches!(err, Error::Validation(ValidationError::MissingUser)));

  assert_eq!(backend.call_count(), calls);
  assert!(nb.view().await.entries.is_empty());
}

#[tokio::test]
async fn successive_notes_stay_sorted_and_unique() {
  let backend = ScriptedBackend::new();
  backend.with(|s| {
    s.notes.insert(
      "A1".into(),
      vec![stored_note("old", "text", Utc::now() - Duration::hours(1))],
    );
  });
  let nb = notebook_on(&backend, "A1").await;

  for i in 0..5 {
    nb.send_text(&ctx(), &format!("note {i}")).await.unwrap();
  }

  let view = nb.view().await;
  assert_eq!(view.entries.len(), 6);
  assert_sorted_and_unique(&view.entries);
  assert_eq!(view.entries.last().unwrap().body, EntryBody::Text("note 4".into()));
}

#[tokio::test]
async fn result_for_previous_admission_is_not_applied() {
  let backend = ScriptedBackend::new();
  let gate = backend.gate("create_note");
  let nb = notebook_on(&backend, "A1").await;

  let send = tokio::spawn({
    let nb = nb.clone();
    async move { nb.send_text(&ctx(), "late").await }
  });
  wait_for(&backend, "create_note").await;
  nb.select(Some(admission("B1"))).await.unwrap();
  gate.notify_one();

  assert!(matches!(send.await.unwrap(), Err(Error::Superseded)));
  assert!(nb.view().await.entries.is_empty());
}

// ─── Files ───────────────────────────────────────────────────────────────────

fn xray() -> LocalFile {
  LocalFile::new("xray.png", "image/png", Bytes::from_static(b"\x89PNG...."))
}

#[tokio::test]
async fn placeholder_is_pending_until_upload_commits() {
  let backend = ScriptedBackend::new();
  let gate = backend.gate("upload_target:xray.png");
  let nb = notebook_on(&backend, "A1").await;

  let upload = tokio::spawn({
    let nb = nb.clone();
    async move { nb.attach_file(&ctx(), xray()).await }
  });
  wait_for(&backend, "upload_target:xray.png").await;

  let view = nb.view().await;
  assert_eq!(view.entries.len(), 1);
  let pending = &view.entries[0];
  assert!(pending.is_loading());
  assert!(pending.server_id().is_none());
  assert_eq!(pending.attachment().unwrap().file_name, "xray.png");
  assert_eq!(pending.attachment().unwrap().kind, AttachmentKind::Image);

  gate.notify_one();
  let id = upload.await.unwrap().unwrap();
  assert_eq!(id, pending.id);

  let view = nb.view().await;
  let entry = view.entry(id).unwrap();
  assert!(!entry.is_loading());
  assert_eq!(entry.server_id(), Some("note-1"));
  let a = entry.attachment().unwrap();
  assert_eq!(a.blob_url.as_deref(), Some("https://blobs.test/c/xray.png"));
  assert_eq!(a.file_type.as_deref(), Some("image/png"));
  assert_eq!(a.file_size, Some(8));

  assert!(backend.called("put_blob:https://blobs.test/c/xray.png:image/png:8"));
  let sent = backend.with(|s| s.created[0].clone());
  assert_eq!(sent.note_type, crate::entry::NoteKind::Image);
}

#[tokio::test]
async fn failed_upload_removes_placeholder() {
  let backend = ScriptedBackend::new();
  backend.with(|s| {
    s.notes.insert("A1".into(), vec![stored_note("n1", "text", at(1))]);
  });
  backend.fail("put_blob");
  let nb = notebook_on(&backend, "A1").await;
  let before = nb.view().await.entries.len();

  let err = nb.attach_file(&ctx(), xray()).await.unwrap_err();
  assert!(matches!(err, Error::Transport(_)));
  assert_eq!(nb.view().await.entries.len(), before);
  assert!(!backend.called("create_note"));
}

#[tokio::test]
async fn concurrent_uploads_settle_independently() {
  let backend = ScriptedBackend::new();
  let gate = backend.gate("upload_target:slow.pdf");
  let nb = notebook_on(&backend, "A1").await;

  let slow = tokio::spawn({
    let nb = nb.clone();
    async move {
      let file = LocalFile::new("slow.pdf", "application/pdf", Bytes::from_static(b"%PDF"));
      nb.attach_file(&ctx(), file).await
    }
  });
  wait_for(&backend, "upload_target:slow.pdf").await;

  let fast = nb.attach_file(&ctx(), xray()).await.unwrap();
  let view = nb.view().await;
  assert_eq!(view.entries.len(), 2);
  assert!(!view.entry(fast).unwrap().is_loading());
  assert_eq!(view.entries.iter().filter(|e| e.is_loading()).count(), 1);

  gate.notify_one();
  let slow = slow.await.unwrap().unwrap();
  let view = nb.view().await;
  assert!(view.entries.iter().all(|e| !e.is_loading()));
  assert_eq!(view.entry(slow).unwrap().attachment().unwrap().kind, AttachmentKind::File);
}

// ─── Audio ───────────────────────────────────────────────────────────────────

fn recorded() -> RecordingSlot {
  let mut slot = RecordingSlot::new();
  slot.stash(PendingAudio::new(Bytes::from(vec![0u8; 48])));
  slot
}

#[tokio::test]
async fn audio_note_is_uploaded_transcribed_and_written_back() {
  let backend = ScriptedBackend::new();
  let nb = notebook_on(&backend, "A1").await;
  let mut slot = recorded();

  let id = nb.send_audio(&ctx(), &mut slot).await.unwrap();
  assert!(!slot.is_pending());

  let view = nb.view().await;
  let entry = view.entry(id).unwrap();
  assert_eq!(entry.server_id(), Some("note-1"));
  assert_eq!(entry.timestamp, at(500));
  assert!(!entry.is_transcribing());
  let a = entry.attachment().unwrap();
  assert_eq!(a.kind, AttachmentKind::Audio);
  assert!(a.file_name.starts_with("audio_") && a.file_name.ends_with(".wav"));
  match &a.transcript {
    TranscriptState::Done(t) => {
      assert_eq!(t.text, "clean words");
      assert_eq!(t.raw_text.as_deref(), Some("raw words"));
    }
    other => panic!("expected transcript, got {other:?}"),
  }

  let download = format!("download_url:{}", a.file_name);
  assert!(backend.called(&download));
  let (note_id, update) = backend.with(|s| s.updates[0].clone());
  assert_eq!(note_id, "note-1");
  assert_eq!(update.medified_audio_text.as_deref(), Some("clean words"));
  assert_eq!(update.transcribed_audio_text.as_deref(), Some("raw words"));
}

#[tokio::test]
async fn audio_entry_shows_transcribing_between_upload_and_result() {
  let backend = ScriptedBackend::new();
  let nb = notebook_on(&backend, "A1").await;
  let mut slot = recorded();
  let name = slot.peek().unwrap().file_name();
  let gate = backend.gate(&format!("download_url:{name}"));

  let send = tokio::spawn({
    let nb = nb.clone();
    async move { nb.send_audio(&ctx(), &mut slot).await }
  });
  wait_for(&backend, &format!("download_url:{name}")).await;

  let view = nb.view().await;
  let entry = &view.entries[0];
  assert!(!entry.is_loading());
  assert!(entry.is_transcribing());
  assert_eq!(entry.server_id(), Some("note-1"));

  gate.notify_one();
  send.await.unwrap().unwrap();
  assert!(!nb.view().await.entries[0].is_transcribing());
}

#[tokio::test]
async fn malformed_transcription_drops_the_audio_entry() {
  let backend = ScriptedBackend::new();
  backend.with(|s| {
    s.transcription = Some(Transcription {
      timestamp: Some(at(1)),
      transcribed_audio_text: Some("raw only".into()),
      ..Default::default()
    });
  });
  let nb = notebook_on(&backend, "A1").await;
  let mut slot = recorded();

  let err = nb.send_audio(&ctx(), &mut slot).await.unwrap_err();
  assert!(matches!(err, Error::MalformedResponse(_)));

  assert!(nb.view().await.entries.is_empty());
  assert!(!slot.is_pending());
  assert!(backend.called("create_note"));
  assert!(backend.with(|s| s.updates.is_empty()));
}

#[tokio::test]
async fn audio_validation_keeps_the_recording() {
  let backend = ScriptedBackend::new();
  let nb = notebook_on(&backend, "A1").await;

  let mut empty = RecordingSlot::new();
  let err = nb.send_audio(&ctx(), &mut empty).await.unwrap_err();
  assert!(matches!(err, Error::Validation(ValidationError::NoPendingAudio)));

  let mut slot = recorded();
  let anonymous = SessionContext::new("O1", None);
  let err = nb.send_audio(&anonymous, &mut slot).await.unwrap_err();
  assert!(matches!(err, Error::Validation(ValidationError::MissingUser)));
  assert!(slot.is_pending());
  assert!(nb.view().await.entries.is_empty());
}

// ─── Re-transcription and downloads ──────────────────────────────────────────

#[tokio::test]
async fn retranscribe_updates_persisted_note() {
  let backend = ScriptedBackend::new();
  backend.with(|s| {
    s.notes.insert("A1".into(), vec![stored_audio("n7", "ward.wav", at(5))]);
  });
  let nb = notebook_on(&backend, "A1").await;
  let id = nb.view().await.entries[0].id;

  let transcript = nb.retranscribe(id).await.unwrap();
  assert_eq!(transcript.text, "clean words");

  assert!(backend.called("transcribe:https://blobs.test/c/ward.wav?sig=down"));
  assert_eq!(backend.with(|s| s.updates[0].0.clone()), "n7");

  let view = nb.view().await;
  assert!(view.in_flight.is_empty());
  assert!(matches!(
    view.entry(id).unwrap().attachment().unwrap().transcript,
    TranscriptState::Done(_)
  ));
}

#[tokio::test]
async fn retranscribe_of_unpersisted_attachment_stays_local() {
  let backend = ScriptedBackend::new();
  let nb = notebook_on(&backend, "A1").await;
  let id = EntryId::new();
  nb.seed(TimelineEntry {
    id,
    sender: "U1".into(),
    timestamp: at(5),
    state: EntryState::Detached,
    body: EntryBody::Attachment(Attachment {
      kind:       AttachmentKind::Audio,
      blob_url:   Some("https://blobs.test/c/loose.wav".into()),
      file_name:  "loose.wav".into(),
      file_type:  Some("audio/wav".into()),
      file_size:  Some(44),
      transcript: TranscriptState::Absent,
    }),
  })
  .await
  .unwrap();

  let transcript = nb.retranscribe(id).await.unwrap();
  assert_eq!(transcript.text, "clean words");
  assert!(backend.called("transcribe:https://blobs.test/c/loose.wav?sig=down"));
  assert!(backend.with(|s| s.updates.is_empty()));
  assert!(!backend.with(|s| s.calls.iter().any(|c| c.starts_with("update_note"))));

  let view = nb.view().await;
  let entry = view.entry(id).unwrap();
  assert_eq!(entry.state, EntryState::Detached);
  assert!(matches!(
    &entry.attachment().unwrap().transcript,
    TranscriptState::Done(t) if t.text == "clean words"
  ));
}

#[tokio::test]
async fn retranscribe_is_exclusive_per_entry_only() {
  let backend = ScriptedBackend::new();
  backend.with(|s| {
    s.notes.insert(
      "A1".into(),
      vec![stored_audio("n1", "one.wav", at(1)), stored_audio("n2", "two.wav", at(2))],
    );
  });
  let gate = backend.gate("transcribe:https://blobs.test/c/one.wav?sig=down");
  let nb = notebook_on(&backend, "A1").await;
  let view = nb.view().await;
  let (one, two) = (view.entries[0].id, view.entries[1].id);

  let first = tokio::spawn({
    let nb = nb.clone();
    async move { nb.retranscribe(one).await }
  });
  wait_for(&backend, "transcribe:https://blobs.test/c/one.wav?sig=down").await;
  assert_eq!(nb.view().await.in_flight(one), Some(InFlight::Transcribing));

  assert!(matches!(nb.retranscribe(one).await, Err(Error::Busy(id)) if id == one));
  assert!(matches!(nb.download_link(one).await, Err(Error::Busy(_))));
  nb.retranscribe(two).await.unwrap();

  gate.notify_one();
  first.await.unwrap().unwrap();
  assert!(nb.view().await.in_flight.is_empty());
}

#[tokio::test]
async fn retranscribe_failure_keeps_entry_and_clears_marker() {
  let backend = ScriptedBackend::new();
  backend.with(|s| {
    s.notes.insert("A1".into(), vec![stored_audio("n1", "one.wav", at(1))]);
  });
  backend.fail("transcribe");
  let nb = notebook_on(&backend, "A1").await;
  let id = nb.view().await.entries[0].id;

  assert!(nb.retranscribe(id).await.is_err());
  let view = nb.view().await;
  assert_eq!(view.entries.len(), 1);
  assert!(view.in_flight.is_empty());
}

#[tokio::test]
async fn retranscribe_rejects_non_attachments() {
  let backend = ScriptedBackend::new();
  backend.with(|s| {
    s.notes.insert("A1".into(), vec![stored_note("n1", "text", at(1))]);
  });
  let nb = notebook_on(&backend, "A1").await;
  let id = nb.view().await.entries[0].id;

  assert!(matches!(nb.retranscribe(id).await, Err(Error::NotAnAttachment(_))));
  let missing = crate::entry::EntryId::new();
  assert!(matches!(nb.download_link(missing).await, Err(Error::EntryNotFound(_))));
}

#[tokio::test]
async fn download_link_resolves_by_file_name() {
  let backend = ScriptedBackend::new();
  backend.with(|s| {
    s.notes.insert("A1".into(), vec![stored_audio("n1", "scan.wav", at(1))]);
  });
  let nb = notebook_on(&backend, "A1").await;
  let id = nb.view().await.entries[0].id;

  let link = nb.download_link(id).await.unwrap();
  assert_eq!(link, "https://blobs.test/c/scan.wav?sig=down");
  assert!(nb.view().await.in_flight.is_empty());
}

// ─── Summaries and prescriptions ─────────────────────────────────────────────

#[tokio::test]
async fn saved_summary_and_prescription_join_the_timeline() {
  let backend = ScriptedBackend::new();
  backend.with(|s| {
    s.notes.insert("A1".into(), vec![stored_note("n1", "text", at(1))]);
  });
  let nb = notebook_on(&backend, "A1").await;

  let draft = nb.draft_discharge_summary().await.unwrap();
  assert_eq!(draft.symptoms_at_admission, "drafted");

  let summary_id = nb
    .save_discharge_summary(&ctx(), draft, DraftStatus::Final)
    .await
    .unwrap();
  let rx = nb.draft_prescription().await.unwrap();
  let rx_id = nb.save_prescription(&ctx(), rx, DraftStatus::Draft).await.unwrap();

  let view = nb.view().await;
  assert_eq!(view.entries.len(), 3);
  assert_sorted_and_unique(&view.entries);
  assert_eq!(view.entry(summary_id).unwrap().body.label(), "summary");
  assert_eq!(view.entry(rx_id).unwrap().body.label(), "prescription");
  assert!(view.entry(rx_id).unwrap().server_id().is_none());
}
