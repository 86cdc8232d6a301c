use std::io::Cursor;

use anyhow::{anyhow, bail, Context, Result};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::info;

/// Sample rate of converted uploads (what the transcription model expects).
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Decoded PCM audio (16-bit interleaved).
pub struct DecodedAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Decode a compressed/container audio payload into interleaved PCM.
pub fn decode(bytes: Vec<u8>, extension: &str) -> Result<DecodedAudio> {
    let source = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(extension.trim_start_matches('.'));

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("Unrecognized audio container")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("No decodable audio track")?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Unsupported audio codec")?;

    let mut samples: Vec<i16> = Vec::new();
    let mut sample_rate = 0u32;
    let mut channels = 0u16;
    let mut buffer: Option<SampleBuffer<i16>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(anyhow!(e)).context("Failed to read audio packet"),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // A single corrupt packet is recoverable; skip it.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(anyhow!(e)).context("Failed to decode audio"),
        };

        let spec = *decoded.spec();
        sample_rate = spec.rate;
        channels = spec.channels.count() as u16;

        let capacity = decoded.capacity() as u64;
        let needs_new = buffer
            .as_ref()
            .map(|b| b.capacity() < decoded.capacity() * channels as usize)
            .unwrap_or(true);
        if needs_new {
            buffer = Some(SampleBuffer::new(capacity, spec));
        }

        if let Some(buffer) = &mut buffer {
            buffer.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buffer.samples());
        }
    }

    if samples.is_empty() || sample_rate == 0 || channels == 0 {
        bail!("audio payload contained no samples");
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

/// Collapse interleaved multichannel PCM to mono by averaging channels.
pub fn downmix_to_mono(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }

    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Linear-interpolation resampling of mono PCM.
pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).floor() as usize;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos as usize;
            let frac = pos - idx as f64;
            let a = samples[idx] as f64;
            let b = samples[(idx + 1).min(samples.len() - 1)] as f64;
            (a + (b - a) * frac).round() as i16
        })
        .collect()
}

/// Convert an uploaded audio payload to 16 kHz mono WAV bytes.
pub fn convert_to_wav_16k_mono(bytes: Vec<u8>, extension: &str) -> Result<Vec<u8>> {
    let decoded = decode(bytes, extension)?;

    info!(
        "Converting {} upload: {}Hz, {} channels, {} samples",
        extension,
        decoded.sample_rate,
        decoded.channels,
        decoded.samples.len()
    );

    let mono = downmix_to_mono(&decoded.samples, decoded.channels);
    let resampled = resample(&mono, decoded.sample_rate, TARGET_SAMPLE_RATE);

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: TARGET_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut out = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut out, spec).context("Failed to create WAV writer")?;
        for sample in resampled {
            writer
                .write_sample(sample)
                .context("Failed to write sample to WAV")?;
        }
        writer.finalize().context("Failed to finalize WAV")?;
    }

    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_stereo_averages_channels() {
        let samples = vec![100, 300, -200, 200, 50, 50];
        let mono = downmix_to_mono(&samples, 2);
        assert_eq!(mono, vec![200, 0, 50]);
    }

    #[test]
    fn test_downmix_mono_passthrough() {
        let samples = vec![1, 2, 3];
        assert_eq!(downmix_to_mono(&samples, 1), samples);
    }

    #[test]
    fn test_resample_identity() {
        let samples = vec![10, 20, 30];
        assert_eq!(resample(&samples, 16_000, 16_000), samples);
    }

    #[test]
    fn test_resample_halves_length() {
        let samples: Vec<i16> = (0..100).collect();
        let out = resample(&samples, 32_000, 16_000);
        assert_eq!(out.len(), 50);
        // Linear interpolation keeps the ramp monotone.
        assert!(out.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_convert_wav_roundtrip_is_16k_mono() {
        // Build a 8kHz mono WAV in memory, convert, and check the header.
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..8_000i16 {
                writer.write_sample(i % 256).unwrap();
            }
            writer.finalize().unwrap();
        }

        let wav = convert_to_wav_16k_mono(cursor.into_inner(), "wav").unwrap();

        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, TARGET_SAMPLE_RATE);
        assert_eq!(spec.channels, 1);
    }
}
