//! Error types for `wardnotes-audio`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The capture could not be probed or decoded.
  #[error("could not decode audio: {0}")]
  Decode(String),

  #[error("the capture contains no audio track")]
  NoAudioTrack,

  /// Zero channels, more than fit in a WAV header, or a layout that changed
  /// part-way through the stream.
  #[error("unsupported channel layout")]
  UnsupportedChannelLayout,

  #[error("sample rate changed mid-stream ({first} Hz, then {now} Hz)")]
  SampleRateChanged { first: u32, now: u32 },

  #[error("could not encode WAV: {0}")]
  Encode(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
