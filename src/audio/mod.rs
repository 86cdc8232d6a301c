//! Audio decoding and conversion for uploaded files.
//!
//! The hosted transcription endpoint chokes on some compressed containers,
//! so MP3/WebM uploads are decoded with symphonia and re-encoded as
//! 16 kHz mono WAV before submission.

pub mod convert;

pub use convert::{convert_to_wav_16k_mono, decode, downmix_to_mono, resample, DecodedAudio};
