// Time mapping - conversions between timeline time and per-source time
//
// All functions are pure and walk the segment list once, O(segments).

use crate::domain::model::{Segment, SourceId};

#[cfg(test)]
mod tests;

/// A resolved point inside one source file
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePosition {
    pub source: SourceId,
    pub time: f64,
    /// Index of the segment the timeline time fell into
    pub segment_index: usize,
}

/// Sum of segment durations
pub fn total_duration(segments: &[Segment]) -> f64 {
    segments.iter().map(Segment::duration).sum()
}

/// Locate the segment containing timeline time `t`.
///
/// Returns the index and the timeline time at which that segment starts.
/// Times at or beyond the end resolve to the last segment.
pub fn segment_at(segments: &[Segment], t: f64) -> Option<(usize, f64)> {
    let mut offset = 0.0;
    for (index, segment) in segments.iter().enumerate() {
        let next = offset + segment.duration();
        if t < next {
            return Some((index, offset));
        }
        offset = next;
    }
    segments
        .len()
        .checked_sub(1)
        .map(|last| (last, offset - segments[last].duration()))
}

/// Timeline start offset of every segment
pub fn segment_offsets(segments: &[Segment]) -> Vec<f64> {
    let mut offset = 0.0;
    segments
        .iter()
        .map(|segment| {
            let start = offset;
            offset += segment.duration();
            start
        })
        .collect()
}

/// Map a timeline time to the source time it shows.
///
/// Negative times clamp to the start of the first segment; times past the
/// total duration resolve to the last segment's end. `None` only for an
/// empty segment list.
pub fn timeline_to_source(segments: &[Segment], t: f64) -> Option<SourcePosition> {
    let t = t.max(0.0);
    let mut offset = 0.0;
    for (index, segment) in segments.iter().enumerate() {
        let duration = segment.duration();
        if t < offset + duration {
            return Some(SourcePosition {
                source: segment.source.clone(),
                time: segment.start + (t - offset),
                segment_index: index,
            });
        }
        offset += duration;
    }

    let last_index = segments.len().checked_sub(1)?;
    let last = &segments[last_index];
    Some(SourcePosition {
        source: last.source.clone(),
        time: last.end,
        segment_index: last_index,
    })
}

/// Map a source time back onto the timeline.
///
/// Strict editing-time mapping: `None` means the point is not visible,
/// i.e. it was trimmed away. When a source range appears more than once
/// (copy/paste), the first occurrence wins.
pub fn source_to_timeline(segments: &[Segment], source_time: f64, source: &SourceId) -> Option<f64> {
    let mut offset = 0.0;
    for segment in segments {
        if &segment.source == source && segment.contains_source_time(source_time) {
            return Some(offset + (source_time - segment.start));
        }
        offset += segment.duration();
    }
    None
}

/// Playback mapping that never fails for a known source.
///
/// Visible points map exactly. Hidden points snap to the timeline position
/// of the nearest segment boundary of the same source. Unknown sources map
/// to the start of the timeline.
pub fn source_to_timeline_nearest(segments: &[Segment], source_time: f64, source: &SourceId) -> f64 {
    if let Some(t) = source_to_timeline(segments, source_time, source) {
        return t;
    }

    let mut offset = 0.0;
    let mut best: Option<(f64, f64)> = None;
    for segment in segments {
        let duration = segment.duration();
        if &segment.source == source {
            let candidates = [
                ((source_time - segment.start).abs(), offset),
                ((source_time - segment.end).abs(), offset + duration),
            ];
            for (distance, position) in candidates {
                if best.map_or(true, |(d, _)| distance < d) {
                    best = Some((distance, position));
                }
            }
        }
        offset += duration;
    }

    best.map(|(_, position)| position).unwrap_or(0.0)
}
