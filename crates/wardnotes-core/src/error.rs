//! Error types for `wardnotes-core`.

use thiserror::Error;

use crate::entry::EntryId;

/// A precondition that failed before any remote call was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("no admission is selected")]
  NoAdmission,

  #[error("note content is empty")]
  EmptyContent,

  #[error("no signed-in user; please log in")]
  MissingUser,

  #[error("no file selected")]
  NoFile,

  #[error("no recorded audio is pending")]
  NoPendingAudio,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Validation(#[from] ValidationError),

  /// The backend call failed. The message is the backend's, verbatim.
  #[error("{0}")]
  Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// A successful response lacked a field the operation depends on.
  #[error("malformed response: {0}")]
  MalformedResponse(String),

  #[error("an operation is already in flight for entry {0}")]
  Busy(EntryId),

  #[error("timeline entry not found: {0}")]
  EntryNotFound(EntryId),

  #[error("timeline entry {0} is not an attachment")]
  NotAnAttachment(EntryId),

  #[error("timeline entry {0} is already present")]
  DuplicateEntry(EntryId),

  /// The selected admission changed while the request was outstanding; its
  /// result was not applied.
  #[error("the selected admission changed before the request settled")]
  Superseded,
}

impl Error {
  pub(crate) fn transport<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Transport(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
