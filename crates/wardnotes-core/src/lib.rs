//! Core types and the admission-notes timeline for wardnotes.
//!
//! There is no HTTP or audio code here. The backend is reached through the
//! [`backend::NotesBackend`] trait; `wardnotes-client` implements it over
//! HTTP.

pub mod admission;
pub mod backend;
pub mod entry;
pub mod error;
pub mod notebook;
pub mod record;
pub mod recording;
pub mod timeline;

pub use error::{Error, Result, ValidationError};
pub use notebook::{LoadOutcome, Notebook, NotesView};

#[cfg(test)]
mod tests;
