//! Loading an admission: three collections merged into one timeline.

use chrono::Utc;
use tracing::{info, warn};

use super::Notebook;
use crate::{
  Error, Result,
  admission::Admission,
  backend::NotesBackend,
  entry::TimelineEntry,
  timeline::Timeline,
};

/// The message shown when an admission fails to load.
pub const LOAD_FAILED: &str = "Failed to load data. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
  /// The timeline now holds `entries` items for the selected admission.
  Loaded { entries: usize },
  /// No admission is selected; the timeline is empty.
  Cleared,
  /// A newer selection was made while this load was in flight; its result
  /// was dropped.
  Stale,
}

impl<B: NotesBackend> Notebook<B> {
  /// Select `admission` (or nothing) and load its timeline.
  ///
  /// The previous timeline is discarded immediately, so a failed load leaves
  /// the timeline empty with [`LOAD_FAILED`] set as the error.
  pub async fn select(&self, admission: Option<Admission>) -> Result<LoadOutcome> {
    let generation = {
      let mut state = self.state.lock().await;
      state.generation += 1;
      state.timeline.clear();
      state.in_flight.clear();
      state.error = None;
      state.loading = admission.is_some();
      state.admission = admission.clone();
      state.generation
    };

    let Some(admission) = admission else {
      return Ok(LoadOutcome::Cleared);
    };

    info!(admission = %admission.id, generation, "loading admission timeline");
    let fetched = fetch_timeline(self.backend.as_ref(), &admission.id).await;

    let mut state = self.state.lock().await;
    if state.generation != generation {
      warn!(
        admission = %admission.id,
        started = generation,
        current = state.generation,
        "dropping stale admission load"
      );
      return Ok(LoadOutcome::Stale);
    }
    state.loading = false;
    match fetched {
      Ok(timeline) => {
        let entries = timeline.len();
        state.timeline = timeline;
        info!(admission = %admission.id, entries, "admission timeline loaded");
        Ok(LoadOutcome::Loaded { entries })
      }
      Err(e) => {
        warn!(admission = %admission.id, error = %e, "admission load failed");
        state.error = Some(LOAD_FAILED.to_string());
        Err(e)
      }
    }
  }

  /// Load the current selection again from scratch.
  pub async fn reload(&self) -> Result<LoadOutcome> {
    let admission = self.selected().await;
    self.select(admission).await
  }
}

/// Fetch notes, discharge summaries and prescriptions concurrently and merge
/// them. Any one failing fails the whole load.
///
/// Summaries and prescriptions have no server timestamp; they are stamped
/// with the time the batch arrived, so their order relative to notes written
/// around the same moment is approximate.
pub async fn fetch_timeline<B: NotesBackend>(
  backend: &B,
  admission_id: &str,
) -> Result<Timeline> {
  let (notes, summaries, prescriptions) = tokio::try_join!(
    backend.list_notes(admission_id),
    backend.list_discharge_summaries(admission_id),
    backend.list_prescriptions(admission_id),
  )
  .map_err(Error::transport)?;

  let received_at = Utc::now();
  let entries = notes
    .iter()
    .map(TimelineEntry::from_note)
    .chain(summaries.iter().map(|s| TimelineEntry::from_summary(s, received_at)))
    .chain(
      prescriptions
        .iter()
        .map(|p| TimelineEntry::from_prescription(p, received_at)),
    );

  Ok(Timeline::from_entries(entries))
}
