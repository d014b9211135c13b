//! HTTP access to the hospital API for wardnotes.
//!
//! [`Gateway`] is the authenticated JSON transport; [`HttpBackend`] maps the
//! notes endpoints onto [`wardnotes_core::backend::NotesBackend`].

mod backend;
mod error;
mod gateway;

pub use self::{
  backend::HttpBackend,
  error::{Error, Result},
  gateway::{API_PREFIX, DEFAULT_TIMEOUT, Gateway, GatewayConfig},
};
