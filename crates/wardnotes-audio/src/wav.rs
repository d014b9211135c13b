//! Canonical 16-bit PCM WAV writer.
//!
//! The layout is fixed: a `RIFF`/`WAVE` header, a 16-byte `fmt ` chunk with
//! format tag 1, then a single `data` chunk. No extensible header is ever
//! written, whatever the channel count.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
  decode::DecodedAudio,
  error::{Error, Result},
};

/// Length of everything before the first sample.
pub const HEADER_LEN: usize = 44;

const BYTES_PER_SAMPLE: usize = 2;
const PCM_FORMAT: u16 = 1;

/// Encode interleaved samples as WAV. Each sample is clamped to `[-1, 1]`,
/// scaled by 32767 and truncated towards zero.
pub fn encode_wav(audio: &DecodedAudio) -> Result<Bytes> {
  if audio.channels == 0 {
    return Err(Error::UnsupportedChannelLayout);
  }
  let channels = usize::from(audio.channels);
  let frames = audio.frames();

  let data_len = frames * channels * BYTES_PER_SAMPLE;
  let riff_len = u32::try_from(data_len + HEADER_LEN - 8)
    .map_err(|_| Error::Encode(format!("{frames} frames do not fit in a WAV file")))?;
  let block_align = u16::try_from(channels * BYTES_PER_SAMPLE)
    .map_err(|_| Error::UnsupportedChannelLayout)?;
  let byte_rate = audio
    .sample_rate
    .checked_mul(u32::from(block_align))
    .ok_or_else(|| Error::Encode(format!("sample rate {} is too high", audio.sample_rate)))?;

  let mut out = BytesMut::with_capacity(HEADER_LEN + data_len);
  out.put_slice(b"RIFF");
  out.put_u32_le(riff_len);
  out.put_slice(b"WAVE");

  out.put_slice(b"fmt ");
  out.put_u32_le(16);
  out.put_u16_le(PCM_FORMAT);
  out.put_u16_le(audio.channels);
  out.put_u32_le(audio.sample_rate);
  out.put_u32_le(byte_rate);
  out.put_u16_le(block_align);
  out.put_u16_le(16);

  out.put_slice(b"data");
  out.put_u32_le(riff_len - (HEADER_LEN as u32 - 8));

  // A trailing partial frame is dropped.
  for &sample in &audio.samples[..frames * channels] {
    out.put_i16_le(to_i16(sample));
  }

  Ok(out.freeze())
}

fn to_i16(sample: f32) -> i16 {
  let clamped = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
  (clamped * f32::from(i16::MAX)) as i16
}
