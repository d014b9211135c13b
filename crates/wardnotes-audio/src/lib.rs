//! Converts a recorded capture into a 16-bit PCM WAV for upload.
//!
//! Any container and codec symphonia understands is accepted. The output is
//! always a canonical 44-byte-header WAV with the capture's own channel
//! count and sample rate.

mod decode;
mod error;
mod wav;

use bytes::Bytes;

pub use self::{
  decode::{DecodedAudio, decode},
  error::{Error, Result},
  wav::{HEADER_LEN, encode_wav},
};

/// Decode `source` and re-encode it as WAV.
pub fn encode(source: &[u8]) -> Result<Bytes> { encode_with_hint(source, None) }

/// Like [`encode`], with a file extension (`"webm"`, `"ogg"`, ...) to help
/// format detection.
pub fn encode_with_hint(source: &[u8], extension: Option<&str>) -> Result<Bytes> {
  let audio = decode(source, extension)?;
  encode_wav(&audio)
}
