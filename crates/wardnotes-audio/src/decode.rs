//! Capture decoding via symphonia.

use std::io::{Cursor, ErrorKind};

use symphonia::core::{
  audio::SampleBuffer,
  codecs::{CODEC_TYPE_NULL, DecoderOptions},
  errors::Error as SymphoniaError,
  formats::FormatOptions,
  io::MediaSourceStream,
  meta::MetadataOptions,
  probe::Hint,
};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Interleaved `f32` PCM in `[-1, 1]` (not enforced; the encoder clamps).
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
  pub samples:     Vec<f32>,
  pub channels:    u16,
  pub sample_rate: u32,
}

impl DecodedAudio {
  pub fn frames(&self) -> usize {
    if self.channels == 0 { 0 } else { self.samples.len() / usize::from(self.channels) }
  }
}

/// Decode a whole capture held in memory.
///
/// The format reader and decoder live only for the duration of this call.
pub fn decode(source: &[u8], extension: Option<&str>) -> Result<DecodedAudio> {
  if source.is_empty() {
    return Err(Error::Decode("empty capture".to_string()));
  }

  let mss = MediaSourceStream::new(Box::new(Cursor::new(source.to_vec())), Default::default());
  let mut hint = Hint::new();
  if let Some(ext) = extension {
    hint.with_extension(ext);
  }

  let probed = symphonia::default::get_probe()
    .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
    .map_err(|e| Error::Decode(e.to_string()))?;
  let mut format = probed.format;

  let track = format
    .tracks()
    .iter()
    .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
    .ok_or(Error::NoAudioTrack)?;
  let track_id = track.id;
  let params = track.codec_params.clone();

  let mut decoder = symphonia::default::get_codecs()
    .make(&params, &DecoderOptions::default())
    .map_err(|e| Error::Decode(e.to_string()))?;

  let mut channels = params.channels.map(|c| c.count());
  let mut decoded_rate = None;
  let mut samples = Vec::new();
  let mut sample_buf: Option<SampleBuffer<f32>> = None;

  loop {
    let packet = match format.next_packet() {
      Ok(packet) => packet,
      Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
      // A chained stream starting over; what was decoded so far is the capture.
      Err(SymphoniaError::ResetRequired) => break,
      Err(e) => return Err(Error::Decode(e.to_string())),
    };
    if packet.track_id() != track_id {
      continue;
    }

    let decoded = match decoder.decode(&packet) {
      Ok(decoded) => decoded,
      Err(SymphoniaError::DecodeError(e)) => {
        warn!(error = e, "skipping corrupt audio packet");
        continue;
      }
      Err(e) => return Err(Error::Decode(e.to_string())),
    };

    let spec = *decoded.spec();
    match channels {
      Some(n) if n != spec.channels.count() => return Err(Error::UnsupportedChannelLayout),
      _ => channels = Some(spec.channels.count()),
    }
    pin_rate(&mut decoded_rate, spec.rate)?;

    let needed = decoded.capacity() * spec.channels.count();
    if sample_buf.as_ref().is_some_and(|b| b.capacity() < needed) {
      sample_buf = None;
    }
    let buf =
      sample_buf.get_or_insert_with(|| SampleBuffer::new(decoded.capacity() as u64, spec));
    buf.copy_interleaved_ref(decoded);
    samples.extend_from_slice(buf.samples());
  }

  let channels = channels
    .filter(|&n| n > 0)
    .and_then(|n| u16::try_from(n).ok())
    .ok_or(Error::UnsupportedChannelLayout)?;
  let sample_rate = decoded_rate
    .or(params.sample_rate)
    .filter(|&r| r > 0)
    .ok_or_else(|| Error::Decode("unknown sample rate".to_string()))?;

  debug!(
    frames = samples.len() / usize::from(channels),
    channels, sample_rate, "capture decoded; decoder released"
  );
  Ok(DecodedAudio { samples, channels, sample_rate })
}

/// Fix the stream's sample rate at the first decoded packet. One header
/// describes every sample, so a later packet at another rate is an error.
fn pin_rate(seen: &mut Option<u32>, rate: u32) -> Result<()> {
  match *seen {
    Some(first) if first != rate => Err(Error::SampleRateChanged { first, now: rate }),
    _ => {
      *seen = Some(rate);
      Ok(())
    }
  }
}
