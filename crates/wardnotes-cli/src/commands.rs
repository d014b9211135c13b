//! Subcommand implementations over a [`Notebook`].

use std::{path::Path, sync::Arc};

use anyhow::{Context as _, Result, bail};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use tracing::info;
use wardnotes_client::HttpBackend;
use wardnotes_core::{
  LoadOutcome, Notebook, NotesView,
  admission::SessionContext,
  entry::{EntryBody, EntryId, TimelineEntry, TranscriptState},
  notebook::LocalFile,
  record::{DischargeSummaryFormat, DraftStatus, PrescriptionFormat},
  recording::{PendingAudio, RecordingSlot},
};

pub struct Session {
  pub backend: Arc<HttpBackend>,
  pub ctx:     SessionContext,
}

impl Session {
  // ── Admissions ────────────────────────────────────────────────────────

  pub async fn admissions(&self) -> Result<()> {
    let admissions = self
      .backend
      .list_admissions(&self.ctx.organization_id)
      .await
      .context("failed to list admissions")?;
    for a in &admissions {
      println!("{}\t{:?}\t{}\t{}", a.id, a.status, a.admission_date, a.label());
    }
    Ok(())
  }

  /// Select `admission_id` in a fresh notebook and load its timeline.
  pub async fn open(&self, admission_id: &str) -> Result<Notebook<HttpBackend>> {
    let admission = self
      .backend
      .list_admissions(&self.ctx.organization_id)
      .await
      .context("failed to list admissions")?
      .into_iter()
      .find(|a| a.id == admission_id)
      .with_context(|| {
        format!(
          "admission {admission_id} not found in organization {}",
          self.ctx.organization_id
        )
      })?;

    let notebook = Notebook::new(Arc::clone(&self.backend));
    match notebook.select(Some(admission)).await? {
      LoadOutcome::Loaded { entries } => info!(admission = admission_id, entries, "timeline loaded"),
      other => bail!("admission {admission_id} did not load ({other:?})"),
    }
    Ok(notebook)
  }

  // ── Notes ─────────────────────────────────────────────────────────────

  pub async fn send_text(&self, admission_id: &str, content: &str) -> Result<()> {
    let notebook = self.open(admission_id).await?;
    let id = notebook.send_text(&self.ctx, content).await?;
    print_entry(&notebook, id).await;
    Ok(())
  }

  pub async fn attach(&self, admission_id: &str, path: &Path, mime: Option<&str>) -> Result<()> {
    let name = file_name(path)?;
    let bytes = tokio::fs::read(path)
      .await
      .with_context(|| format!("reading {}", path.display()))?;
    let mime = mime.map_or_else(|| mime_for(path), str::to_string);

    let notebook = self.open(admission_id).await?;
    let id = notebook
      .attach_file(&self.ctx, LocalFile::new(name, mime, Bytes::from(bytes)))
      .await?;
    print_entry(&notebook, id).await;
    Ok(())
  }

  /// Decode the recording, re-encode it as WAV, then send it. A recording
  /// that cannot be decoded is abandoned before anything is uploaded.
  pub async fn send_audio(&self, admission_id: &str, path: &Path) -> Result<()> {
    let capture = tokio::fs::read(path)
      .await
      .with_context(|| format!("reading {}", path.display()))?;
    let extension = path.extension().and_then(|e| e.to_str()).map(str::to_string);
    let wav = tokio::task::spawn_blocking(move || {
      wardnotes_audio::encode_with_hint(&capture, extension.as_deref())
    })
    .await
    .context("audio conversion task failed")?
    .with_context(|| format!("converting {} to WAV", path.display()))?;

    let mut slot = RecordingSlot::new();
    slot.stash(PendingAudio::new(wav));

    let notebook = self.open(admission_id).await?;
    let id = notebook.send_audio(&self.ctx, &mut slot).await?;
    print_entry(&notebook, id).await;
    Ok(())
  }

  pub async fn retranscribe(&self, admission_id: &str, file_name: &str) -> Result<()> {
    let notebook = self.open(admission_id).await?;
    let id = find_attachment(&notebook.view().await, file_name)?;
    let transcript = notebook.retranscribe(id).await?;
    println!("{}", transcript.text);
    Ok(())
  }

  pub async fn download(&self, admission_id: &str, file_name: &str) -> Result<()> {
    let notebook = self.open(admission_id).await?;
    let id = find_attachment(&notebook.view().await, file_name)?;
    println!("{}", notebook.download_link(id).await?);
    Ok(())
  }

  // ── Summaries and prescriptions ───────────────────────────────────────

  pub async fn draft_summary(&self, admission_id: &str) -> Result<()> {
    let notebook = self.open(admission_id).await?;
    let draft = notebook.draft_discharge_summary().await?;
    println!("{}", serde_json::to_string_pretty(&draft)?);
    Ok(())
  }

  pub async fn save_summary(&self, admission_id: &str, path: &Path, finalize: bool) -> Result<()> {
    let summary: DischargeSummaryFormat = read_json(path).await?;
    let notebook = self.open(admission_id).await?;
    let id = notebook
      .save_discharge_summary(&self.ctx, summary, status(finalize))
      .await?;
    print_entry(&notebook, id).await;
    Ok(())
  }

  pub async fn draft_prescription(&self, admission_id: &str) -> Result<()> {
    let notebook = self.open(admission_id).await?;
    let draft = notebook.draft_prescription().await?;
    println!("{}", serde_json::to_string_pretty(&draft)?);
    Ok(())
  }

  pub async fn save_prescription(
    &self,
    admission_id: &str,
    path: &Path,
    finalize: bool,
  ) -> Result<()> {
    let prescription: PrescriptionFormat = read_json(path).await?;
    let notebook = self.open(admission_id).await?;
    let id = notebook
      .save_prescription(&self.ctx, prescription, status(finalize))
      .await?;
    print_entry(&notebook, id).await;
    Ok(())
  }
}

// ─── Rendering ────────────────────────────────────────────────────────────────

pub fn print_timeline(view: &NotesView) {
  if view.entries.is_empty() {
    println!("(no notes)");
  }
  for entry in &view.entries {
    println!("{}", describe(entry));
  }
}

async fn print_entry(notebook: &Notebook<HttpBackend>, id: EntryId) {
  if let Some(entry) = notebook.view().await.entry(id) {
    println!("{}", describe(entry));
  }
}

/// One line per entry: time, sender, kind, and a short rendering of the body.
fn describe(entry: &TimelineEntry) -> String {
  let body = match &entry.body {
    EntryBody::Text(text) => text.clone(),
    EntryBody::Attachment(a) => match &a.transcript {
      TranscriptState::Done(t) => format!("{}: {}", a.file_name, t.text),
      TranscriptState::InProgress => format!("{} (transcribing)", a.file_name),
      TranscriptState::Absent => a.file_name.clone(),
    },
    EntryBody::Summary(s) => format!("symptoms: {}", s.symptoms_at_admission),
    EntryBody::Prescription(p) => format!("medicines: {}", p.medicines_prescribed),
  };
  format!(
    "{}  {:<12} [{}] {}",
    entry.timestamp.format("%Y-%m-%d %H:%M"),
    entry.sender,
    entry.body.label(),
    body.lines().next().unwrap_or_default()
  )
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn find_attachment(view: &NotesView, file_name: &str) -> Result<EntryId> {
  view
    .entries
    .iter()
    .rev()
    .find(|e| e.attachment().is_some_and(|a| a.file_name == file_name))
    .map(|e| e.id)
    .with_context(|| format!("no attachment named {file_name} on this admission"))
}

fn file_name(path: &Path) -> Result<String> {
  path
    .file_name()
    .and_then(|n| n.to_str())
    .map(str::to_string)
    .with_context(|| format!("{} has no usable file name", path.display()))
}

fn mime_for(path: &Path) -> String {
  mime_guess::from_path(path).first_or_octet_stream().to_string()
}

fn status(finalize: bool) -> DraftStatus {
  if finalize { DraftStatus::Final } else { DraftStatus::Draft }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
  let raw = tokio::fs::read_to_string(path)
    .await
    .with_context(|| format!("reading {}", path.display()))?;
  serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}
