use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// One diarized transcript segment as returned to API clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiarizedSegment {
    pub speaker: String,
    pub text: String,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
}

/// Fraction of speaker changes (relative to segment count) above which a
/// two-speaker result is treated as over-segmentation of a single voice.
const OVER_SEGMENTATION_RATIO: f64 = 0.4;

/// Mean segment duration below which a 3+-speaker result looks suspicious.
const SHORT_SEGMENT_SECS: f64 = 3.0;

/// Distinct speaker labels in first-appearance order.
pub fn unique_speakers(segments: &[DiarizedSegment]) -> Vec<String> {
    let mut seen = Vec::new();
    for segment in segments {
        if !seen.contains(&segment.speaker) {
            seen.push(segment.speaker.clone());
        }
    }
    seen
}

/// Merge speakers that are likely the same person.
///
/// Simple heuristics over the segment list: a diarizer that flip-flops
/// between two labels on almost every segment has probably split one voice
/// in two, so collapse both labels. Voice embeddings would do better; this
/// stays a stateless pass over the list.
pub fn merge_similar_speakers(segments: &mut [DiarizedSegment]) {
    if segments.len() <= 1 {
        return;
    }

    let speakers = unique_speakers(segments);

    if speakers.len() == 2 {
        let changes = segments
            .windows(2)
            .filter(|pair| pair[0].speaker != pair[1].speaker)
            .count();

        if changes as f64 > segments.len() as f64 * OVER_SEGMENTATION_RATIO {
            warn!(
                changes,
                segments = segments.len(),
                "likely over-segmentation, merging {} and {} into Speaker 1",
                speakers[0],
                speakers[1]
            );
            for segment in segments.iter_mut() {
                segment.speaker = "Speaker 1".to_string();
            }
        }
    } else if speakers.len() >= 3 {
        let durations: Vec<f64> = segments
            .iter()
            .filter_map(|s| Some(s.end_time? - s.start_time?))
            .collect();

        if !durations.is_empty() {
            let avg = durations.iter().sum::<f64>() / segments.len() as f64;
            if avg < SHORT_SEGMENT_SECS {
                warn!(
                    speakers = speakers.len(),
                    avg_secs = format!("{avg:.1}"),
                    "many speakers with very short segments; this may be a single speaker"
                );
            }
        }
    }
}

/// Rename detected speaker labels to user-provided display names, in
/// sorted label order. Labels without a matching name keep their original.
/// Returns the applied mapping.
pub fn rename_speakers(
    segments: &mut [DiarizedSegment],
    names: &[String],
) -> BTreeMap<String, String> {
    let mut detected = unique_speakers(segments);
    detected.sort();

    let mut mapping = BTreeMap::new();
    for (idx, label) in detected.iter().enumerate() {
        let renamed = names.get(idx).cloned().unwrap_or_else(|| label.clone());
        info!("speaker rename: {} -> {}", label, renamed);
        mapping.insert(label.clone(), renamed);
    }

    for segment in segments.iter_mut() {
        if let Some(renamed) = mapping.get(&segment.speaker) {
            segment.speaker = renamed.clone();
        }
    }

    mapping
}
