//! The notebook: one admission's timeline plus the operations that change it.
//!
//! State lives behind an async mutex that is only ever held between
//! suspension points, never across a backend call. Every operation captures
//! the load generation when it starts and settles only if that generation is
//! still current, so a result that arrives after the user switched admission
//! is dropped instead of leaking into the new timeline.

mod authoring;
mod compose;
mod load;
mod transcribe;

use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;
use tracing::warn;

pub use compose::LocalFile;
pub use load::{LOAD_FAILED, LoadOutcome, fetch_timeline};

use crate::{
  Error, Result, ValidationError,
  admission::{Admission, SessionContext},
  backend::NotesBackend,
  entry::{EntryId, TimelineEntry},
  timeline::Timeline,
};

// ─── State ───────────────────────────────────────────────────────────────────

/// A per-entry operation that must not run twice concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InFlight {
  Transcribing,
  Downloading,
}

#[derive(Debug, Default)]
struct NotesState {
  /// Bumped on every selection change.
  generation: u64,
  admission:  Option<Admission>,
  timeline:   Timeline,
  loading:    bool,
  error:      Option<String>,
  in_flight:  HashMap<EntryId, InFlight>,
}

/// A point-in-time copy of the notebook, for rendering.
#[derive(Debug, Clone)]
pub struct NotesView {
  pub admission: Option<Admission>,
  pub entries:   Vec<TimelineEntry>,
  pub loading:   bool,
  pub error:     Option<String>,
  pub in_flight: HashMap<EntryId, InFlight>,
}

impl NotesView {
  pub fn in_flight(&self, id: EntryId) -> Option<InFlight> {
    self.in_flight.get(&id).copied()
  }

  pub fn entry(&self, id: EntryId) -> Option<&TimelineEntry> {
    self.entries.iter().find(|e| e.id == id)
  }
}

/// What an operation needs to remember about the selection it started on.
#[derive(Debug, Clone)]
struct Scope {
  generation: u64,
  admission:  Admission,
}

// ─── Notebook ────────────────────────────────────────────────────────────────

/// Shared handle to an admission's notes. Cheap to clone; clones see the
/// same state.
pub struct Notebook<B> {
  backend: Arc<B>,
  state:   Arc<Mutex<NotesState>>,
}

impl<B> Clone for Notebook<B> {
  fn clone(&self) -> Self {
    Self { backend: Arc::clone(&self.backend), state: Arc::clone(&self.state) }
  }
}

impl<B: NotesBackend> Notebook<B> {
  pub fn new(backend: Arc<B>) -> Self {
    Self { backend, state: Arc::new(Mutex::new(NotesState::default())) }
  }

  pub fn backend(&self) -> &Arc<B> { &self.backend }

  pub async fn view(&self) -> NotesView {
    let state = self.state.lock().await;
    NotesView {
      admission: state.admission.clone(),
      entries:   state.timeline.as_slice().to_vec(),
      loading:   state.loading,
      error:     state.error.clone(),
      in_flight: state.in_flight.clone(),
    }
  }

  pub async fn selected(&self) -> Option<Admission> {
    self.state.lock().await.admission.clone()
  }

  /// Put `entry` straight into the timeline, bypassing the backend.
  #[cfg(test)]
  pub(crate) async fn seed(&self, entry: TimelineEntry) -> Result<()> {
    self.state.lock().await.timeline.insert(entry)
  }

  // ── Helpers shared by the operation modules ───────────────────────────

  async fn scope(&self) -> Result<Scope> {
    let state = self.state.lock().await;
    let admission = state.admission.clone().ok_or(ValidationError::NoAdmission)?;
    Ok(Scope { generation: state.generation, admission })
  }

  /// Run `f` against the state if `generation` is still current.
  async fn settle<T, F>(&self, generation: u64, f: F) -> Result<T>
  where
    F: FnOnce(&mut NotesState) -> Result<T>,
  {
    let mut state = self.state.lock().await;
    if state.generation != generation {
      warn!(
        started = generation,
        current = state.generation,
        "admission changed mid-operation; result not applied"
      );
      return Err(Error::Superseded);
    }
    f(&mut state)
  }

  /// Insert a placeholder entry and return its id.
  async fn place(&self, generation: u64, entry: TimelineEntry) -> Result<EntryId> {
    let id = entry.id;
    self.settle(generation, |state| state.timeline.insert(entry)).await?;
    Ok(id)
  }

  /// Drop a placeholder after a failed operation.
  async fn discard(&self, generation: u64, id: EntryId) {
    let mut state = self.state.lock().await;
    if state.generation == generation && state.timeline.remove(id).is_some() {
      warn!(entry = %id, "discarded placeholder after failure");
    }
  }

  /// Clear a per-entry in-flight marker.
  async fn release(&self, generation: u64, id: EntryId) {
    let mut state = self.state.lock().await;
    if state.generation == generation {
      state.in_flight.remove(&id);
    }
  }
}

fn require_user(ctx: &SessionContext) -> Result<&str> {
  ctx
    .user_id
    .as_deref()
    .filter(|u| !u.trim().is_empty())
    .ok_or_else(|| ValidationError::MissingUser.into())
}
