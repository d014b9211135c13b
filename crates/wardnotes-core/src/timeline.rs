//! The ordered, id-unique list of entries for one admission.

use std::collections::HashSet;

use crate::{
  Error, Result,
  entry::{EntryId, TimelineEntry},
};

/// Entries sorted by timestamp ascending. Equal timestamps keep their
/// arrival order, so appending never reshuffles what is already shown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
  entries: Vec<TimelineEntry>,
}

impl Timeline {
  pub fn new() -> Self { Self::default() }

  /// Build a timeline from an unordered batch. Later duplicates of an id are
  /// dropped.
  pub fn from_entries(entries: impl IntoIterator<Item = TimelineEntry>) -> Self {
    let mut seen = HashSet::new();
    let mut entries: Vec<_> = entries.into_iter().filter(|e| seen.insert(e.id)).collect();
    // `sort_by_key` is stable.
    entries.sort_by_key(|e| e.timestamp);
    Self { entries }
  }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }

  pub fn iter(&self) -> std::slice::Iter<'_, TimelineEntry> { self.entries.iter() }

  pub fn as_slice(&self) -> &[TimelineEntry] { &self.entries }

  pub fn get(&self, id: EntryId) -> Option<&TimelineEntry> {
    self.entries.iter().find(|e| e.id == id)
  }

  pub fn contains(&self, id: EntryId) -> bool { self.get(id).is_some() }

  /// Insert after every entry with a timestamp `<=` the new one.
  pub fn insert(&mut self, entry: TimelineEntry) -> Result<()> {
    if self.contains(entry.id) {
      return Err(Error::DuplicateEntry(entry.id));
    }
    let at = self.entries.partition_point(|e| e.timestamp <= entry.timestamp);
    self.entries.insert(at, entry);
    Ok(())
  }

  pub fn remove(&mut self, id: EntryId) -> Option<TimelineEntry> {
    let at = self.entries.iter().position(|e| e.id == id)?;
    Some(self.entries.remove(at))
  }

  /// Apply `f` to the entry with `id`. If `f` moves the timestamp, the entry
  /// is re-slotted to keep the order. Returns `false` if `id` is absent.
  ///
  /// `f` must not change the entry's id.
  pub fn update<F>(&mut self, id: EntryId, f: F) -> bool
  where
    F: FnOnce(&mut TimelineEntry),
  {
    let Some(at) = self.entries.iter().position(|e| e.id == id) else {
      return false;
    };
    let before = self.entries[at].timestamp;
    f(&mut self.entries[at]);
    if self.entries[at].timestamp != before {
      let entry = self.entries.remove(at);
      let to = self.entries.partition_point(|e| e.timestamp <= entry.timestamp);
      self.entries.insert(to, entry);
    }
    true
  }

  pub fn clear(&mut self) { self.entries.clear(); }
}

impl<'a> IntoIterator for &'a Timeline {
  type Item = &'a TimelineEntry;
  type IntoIter = std::slice::Iter<'a, TimelineEntry>;

  fn into_iter(self) -> Self::IntoIter { self.entries.iter() }
}

#[cfg(test)]
mod tests {
  use chrono::{DateTime, TimeZone, Utc};

  use super::*;
  use crate::entry::{EntryBody, EntryState};

  fn at(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(secs, 0).unwrap() }

  fn text(secs: i64, content: &str) -> TimelineEntry {
    TimelineEntry {
      id:        EntryId::new(),
      sender:    "U1".into(),
      timestamp: at(secs),
      state:     EntryState::Detached,
      body:      EntryBody::Text(content.into()),
    }
  }

  fn contents(t: &Timeline) -> Vec<String> {
    t.iter()
      .map(|e| match &e.body {
        EntryBody::Text(s) => s.clone(),
        other => panic!("unexpected body {other:?}"),
      })
      .collect()
  }

  #[test]
  fn from_entries_sorts_stably() {
    let t = Timeline::from_entries(vec![
      text(20, "c"),
      text(10, "a"),
      text(20, "d"),
      text(10, "b"),
    ]);
    assert_eq!(contents(&t), ["a", "b", "c", "d"]);
  }

  #[test]
  fn from_entries_drops_duplicate_ids() {
    let first = text(10, "first");
    let mut dup = text(5, "dup");
    dup.id = first.id;
    let t = Timeline::from_entries(vec![first, dup]);
    assert_eq!(contents(&t), ["first"]);
  }

  #[test]
  fn insert_keeps_arrival_order_for_equal_timestamps() {
    let mut t = Timeline::new();
    t.insert(text(10, "a")).unwrap();
    t.insert(text(30, "z")).unwrap();
    t.insert(text(10, "b")).unwrap();
    t.insert(text(20, "m")).unwrap();
    assert_eq!(contents(&t), ["a", "b", "m", "z"]);
  }

  #[test]
  fn insert_rejects_duplicate_id() {
    let mut t = Timeline::new();
    let entry = text(10, "a");
    t.insert(entry.clone()).unwrap();
    assert!(matches!(t.insert(entry), Err(Error::DuplicateEntry(_))));
    assert_eq!(t.len(), 1);
  }

  #[test]
  fn update_reslots_on_timestamp_change() {
    let mut t = Timeline::new();
    let moving = text(5, "moving");
    let id = moving.id;
    t.insert(moving).unwrap();
    t.insert(text(10, "a")).unwrap();
    t.insert(text(20, "b")).unwrap();

    assert!(t.update(id, |e| e.timestamp = at(15)));
    assert_eq!(contents(&t), ["a", "moving", "b"]);

    assert!(!t.update(EntryId::new(), |_| {}));
  }

  #[test]
  fn remove_returns_entry() {
    let mut t = Timeline::new();
    let e = text(1, "x");
    let id = e.id;
    t.insert(e).unwrap();
    assert!(t.remove(id).is_some());
    assert!(t.remove(id).is_none());
    assert!(t.is_empty());
  }
}
