//! Decodes WAV and FLAC bytes into one mono channel of `f32` samples.

use std::io::Cursor;

use crate::error::{Result, SpectrogramError};
use crate::types::SampleBuffer;

/// Highest sample rate the timeline runs at. Faster recordings (bat
/// detectors commonly capture at 250-500 kHz) are time-expanded: the
/// samples are kept as-is and read as if captured at this rate, while
/// the true rate is kept for the frequency axis.
pub const MAX_DECODE_RATE: u32 = 48_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Flac,
}

impl AudioFormat {
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            Some(AudioFormat::Wav)
        } else if bytes.starts_with(b"fLaC") {
            Some(AudioFormat::Flac)
        } else {
            None
        }
    }
}

/// Decode `bytes` and keep only `channel`.
pub fn decode(bytes: &[u8], channel: usize) -> Result<SampleBuffer> {
    match AudioFormat::sniff(bytes) {
        Some(AudioFormat::Wav) => decode_wav(bytes, channel),
        Some(AudioFormat::Flac) => decode_flac(bytes, channel),
        None => Err(SpectrogramError::UnsupportedFormat),
    }
}

pub fn decode_wav(bytes: &[u8], channel: usize) -> Result<SampleBuffer> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    check_channel(channel, channels)?;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = int_scale(spec.bits_per_sample as u32);
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    log::info!(
        "decoded WAV: {} Hz, {} ch, {} bit, {} frames",
        spec.sample_rate,
        channels,
        spec.bits_per_sample,
        interleaved.len() / channels.max(1)
    );
    finish(select_channel(&interleaved, channel, channels), spec.sample_rate)
}

pub fn decode_flac(bytes: &[u8], channel: usize) -> Result<SampleBuffer> {
    let mut reader = claxon::FlacReader::new(Cursor::new(bytes))?;
    let info = reader.streaminfo();
    let channels = info.channels as usize;
    check_channel(channel, channels)?;

    let scale = int_scale(info.bits_per_sample);
    let interleaved: Vec<f32> = reader
        .samples()
        .map(|s| s.map(|v| v as f32 * scale))
        .collect::<std::result::Result<_, _>>()?;

    log::info!(
        "decoded FLAC: {} Hz, {} ch, {} bit, {} frames",
        info.sample_rate,
        channels,
        info.bits_per_sample,
        interleaved.len() / channels.max(1)
    );
    finish(select_channel(&interleaved, channel, channels), info.sample_rate)
}

fn check_channel(channel: usize, channels: usize) -> Result<()> {
    if channel >= channels {
        return Err(SpectrogramError::Channel { channel, channels });
    }
    Ok(())
}

fn int_scale(bits: u32) -> f32 {
    1.0 / (1u64 << bits.clamp(1, 32).saturating_sub(1)) as f32
}

fn select_channel(interleaved: &[f32], channel: usize, channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved.iter().skip(channel).step_by(channels).copied().collect()
}

fn finish(samples: Vec<f32>, sample_rate: u32) -> Result<SampleBuffer> {
    if sample_rate == 0 {
        return Err(SpectrogramError::InvalidSampleRate(sample_rate));
    }
    if sample_rate > MAX_DECODE_RATE {
        log::info!("time-expanding {sample_rate} Hz recording to {MAX_DECODE_RATE} Hz");
        Ok(SampleBuffer::new(samples, MAX_DECODE_RATE).with_real_sample_rate(sample_rate))
    } else {
        Ok(SampleBuffer::new(samples, sample_rate))
    }
}
