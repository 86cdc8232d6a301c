//! Post-processing for batch transcription results: speaker-merging
//! heuristics and display-name mapping.

mod speakers;

pub use speakers::{merge_similar_speakers, rename_speakers, unique_speakers, DiarizedSegment};
