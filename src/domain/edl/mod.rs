// EDL store - owns the segment list, clipboard and undo/redo history
//
// Edits are not reentrant: callers serialize access to one store.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::errors::EditError;
use crate::domain::mapper;
use crate::domain::model::{Clipboard, Segment, SourceId, Timeline};


/// Smallest sub-range kept when extracting clipboard material
const MIN_EXTRACT_DURATION: f64 = 1e-6;

/// Tolerances and limits for timeline edits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdlOptions {
    /// Maximum entries kept on each of the undo and redo stacks
    pub history_limit: usize,
    /// Remnants at or below this length are dropped when splitting
    pub split_epsilon: f64,
    /// Same-source segments closer than this are merged after deletes
    pub merge_epsilon: f64,
}

impl Default for EdlOptions {
    fn default() -> Self {
        Self {
            history_limit: 50,
            split_epsilon: 0.1,
            merge_epsilon: 0.05,
        }
    }
}

/// Edit decision list with history
#[derive(Debug, Clone, Default)]
pub struct EdlStore {
    timeline: Timeline,
    undo_stack: VecDeque<Timeline>,
    redo_stack: VecDeque<Timeline>,
    clipboard: Option<Clipboard>,
    options: EdlOptions,
}

impl EdlStore {
    /// Create an empty store
    pub fn new(options: EdlOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Replace the timeline with one segment spanning a freshly loaded source
    pub fn load_source(&mut self, source: impl Into<SourceId>, duration: f64) -> Result<(), EditError> {
        self.timeline = Timeline::from_source(source, duration)?;
        self.reset_history();
        Ok(())
    }

    /// Restore a timeline from a project; history is reset
    pub fn restore(&mut self, timeline: Timeline) {
        self.timeline = timeline;
        self.reset_history();
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn segments(&self) -> &[Segment] {
        self.timeline.segments()
    }

    pub fn total_duration(&self) -> f64 {
        self.timeline.total_duration()
    }

    pub fn options(&self) -> &EdlOptions {
        &self.options
    }

    pub fn clipboard(&self) -> Option<&Clipboard> {
        self.clipboard.as_ref()
    }

    /// Replace the clipboard wholesale
    pub fn set_clipboard(&mut self, clipboard: Option<Clipboard>) {
        self.clipboard = clipboard;
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Remove timeline range `[start, end)`.
    ///
    /// Intersecting segments are split, fully covered ones dropped, and
    /// contiguous same-source neighbours merged afterwards.
    pub fn delete_range(&mut self, start: f64, end: f64) -> Result<(), EditError> {
        if self.timeline.is_empty() {
            return Err(EditError::EmptyTimeline);
        }
        if start >= end {
            return Err(EditError::EmptyRange { start, end });
        }

        let total = self.timeline.total_duration();
        if end <= 0.0 {
            return Err(EditError::OutOfBounds {
                position: end,
                duration: total,
            });
        }
        let start = start.max(0.0);
        if start >= total {
            return Err(EditError::OutOfBounds {
                position: start,
                duration: total,
            });
        }
        let end = end.min(total);

        let remaining = remove_range(self.segments(), start, end, self.options.split_epsilon);
        let merged = merge_adjacent(&remaining, self.options.merge_epsilon);

        debug!(
            "delete [{:.3}, {:.3}): {} -> {} segments",
            start,
            end,
            self.timeline.len(),
            merged.len()
        );
        self.commit(merged);
        Ok(())
    }

    /// Copy timeline range `[start, end)` into the clipboard.
    ///
    /// Each sub-range keeps its own source. The timeline is not modified.
    pub fn copy(&mut self, start: f64, end: f64) -> Result<(), EditError> {
        let (start, end) = self.checked_range(start, end)?;
        let segments = extract_range(self.segments(), start, end);
        if segments.is_empty() {
            return Err(EditError::EmptyRange { start, end });
        }

        let clipboard = Clipboard::new(self.timeline.primary_source.clone(), segments);
        debug!(
            "copied {} segment(s), {:.3}s",
            clipboard.segments.len(),
            clipboard.duration
        );
        self.clipboard = Some(clipboard);
        Ok(())
    }

    /// Copy then delete timeline range `[start, end)`
    pub fn cut(&mut self, start: f64, end: f64) -> Result<(), EditError> {
        self.copy(start, end)?;
        self.delete_range(start, end)
    }

    /// Splice the clipboard in at `insert_time`.
    ///
    /// An empty timeline adopts the clipboard's source as its primary source.
    pub fn paste(&mut self, insert_time: f64) -> Result<(), EditError> {
        let clipboard = match &self.clipboard {
            Some(clipboard) if !clipboard.segments.is_empty() => clipboard.clone(),
            _ => return Err(EditError::ClipboardEmpty),
        };

        if self.timeline.is_empty() {
            let primary = clipboard
                .source
                .clone()
                .or_else(|| clipboard.segments.first().map(|s| s.source.clone()));
            self.push_undo();
            self.timeline.segments = clipboard.segments;
            self.timeline.primary_source = primary;
            return Ok(());
        }

        let at = self.checked_position(insert_time)?;
        let spliced = splice(self.segments(), at, &clipboard.segments, self.options.split_epsilon);
        self.commit(spliced);
        Ok(())
    }

    /// Insert one externally constructed segment at a timeline position
    pub fn insert_segment_at_position(&mut self, position: f64, segment: Segment) -> Result<(), EditError> {
        if segment.end <= segment.start {
            return Err(EditError::InvalidSegment(format!(
                "end ({:.3}s) must be greater than start ({:.3}s)",
                segment.end, segment.start
            )));
        }

        if self.timeline.is_empty() {
            self.push_undo();
            self.timeline.primary_source = Some(segment.source.clone());
            self.timeline.segments = vec![segment];
            return Ok(());
        }

        let at = self.checked_position(position)?;
        let spliced = splice(
            self.segments(),
            at,
            std::slice::from_ref(&segment),
            self.options.split_epsilon,
        );
        self.commit(spliced);
        Ok(())
    }

    /// Insert a source range; `None` falls back to the primary source
    pub fn insert_source_range(
        &mut self,
        position: f64,
        start: f64,
        end: f64,
        source: Option<SourceId>,
    ) -> Result<(), EditError> {
        let source = source
            .or_else(|| self.timeline.primary_source.clone())
            .ok_or_else(|| EditError::InvalidSegment("no source and no primary source".to_string()))?;
        let segment = Segment::new(start, end, source)?;
        self.insert_segment_at_position(position, segment)
    }

    pub fn undo(&mut self) -> Result<(), EditError> {
        let previous = self.undo_stack.pop_back().ok_or(EditError::NothingToUndo)?;
        let current = std::mem::replace(&mut self.timeline, previous);
        push_bounded(&mut self.redo_stack, current, self.options.history_limit);
        Ok(())
    }

    pub fn redo(&mut self) -> Result<(), EditError> {
        let next = self.redo_stack.pop_back().ok_or(EditError::NothingToRedo)?;
        let current = std::mem::replace(&mut self.timeline, next);
        push_bounded(&mut self.undo_stack, current, self.options.history_limit);
        Ok(())
    }

    fn checked_range(&self, start: f64, end: f64) -> Result<(f64, f64), EditError> {
        if self.timeline.is_empty() {
            return Err(EditError::EmptyTimeline);
        }
        if start >= end {
            return Err(EditError::EmptyRange { start, end });
        }
        let total = self.timeline.total_duration();
        if start < 0.0 || start >= total {
            return Err(EditError::OutOfBounds {
                position: start,
                duration: total,
            });
        }
        if end > total + self.options.split_epsilon {
            return Err(EditError::OutOfBounds {
                position: end,
                duration: total,
            });
        }
        Ok((start, end.min(total)))
    }

    fn checked_position(&self, position: f64) -> Result<f64, EditError> {
        let total = self.timeline.total_duration();
        if position < 0.0 || position > total + self.options.split_epsilon {
            return Err(EditError::OutOfBounds { position, duration: total });
        }
        Ok(position.min(total))
    }

    fn commit(&mut self, segments: Vec<Segment>) {
        self.push_undo();
        self.timeline.segments = segments;
    }

    fn push_undo(&mut self) {
        push_bounded(&mut self.undo_stack, self.timeline.clone(), self.options.history_limit);
        self.redo_stack.clear();
    }

    fn reset_history(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

fn push_bounded(stack: &mut VecDeque<Timeline>, snapshot: Timeline, limit: usize) {
    stack.push_back(snapshot);
    while stack.len() > limit.max(1) {
        stack.pop_front();
    }
}

/// Segments left after removing timeline range `[start, end)`.
///
/// Remnants no longer than `split_epsilon` are dropped.
pub fn remove_range(segments: &[Segment], start: f64, end: f64, split_epsilon: f64) -> Vec<Segment> {
    let mut remaining = Vec::with_capacity(segments.len() + 1);
    let mut offset = 0.0;

    for segment in segments {
        let seg_start = offset;
        let seg_end = offset + segment.duration();
        offset = seg_end;

        if seg_end <= start || seg_start >= end {
            remaining.push(segment.clone());
            continue;
        }

        let head = start - seg_start;
        if head > split_epsilon {
            remaining.push(segment.with_bounds(segment.start, segment.start + head));
        }

        let tail = seg_end - end;
        if tail > split_epsilon {
            remaining.push(segment.with_bounds(segment.end - tail, segment.end));
        }
    }

    remaining
}

/// Merge neighbours that share a source and are contiguous within `epsilon`.
///
/// Applying this twice yields the same list as applying it once.
pub fn merge_adjacent(segments: &[Segment], epsilon: f64) -> Vec<Segment> {
    let mut merged: Vec<Segment> = Vec::with_capacity(segments.len());
    for segment in segments {
        if let Some(last) = merged.last_mut() {
            if last.source == segment.source && (segment.start - last.end).abs() <= epsilon {
                *last = last.with_bounds(last.start, segment.end.max(last.end));
                continue;
            }
        }
        merged.push(segment.clone());
    }
    merged
}

/// Sub-ranges of the segments intersecting timeline range `[start, end)`
pub fn extract_range(segments: &[Segment], start: f64, end: f64) -> Vec<Segment> {
    let mut extracted = Vec::new();
    let offsets = mapper::segment_offsets(segments);

    for (segment, seg_start) in segments.iter().zip(offsets) {
        let seg_end = seg_start + segment.duration();
        let from = start.max(seg_start);
        let to = end.min(seg_end);
        if to - from <= MIN_EXTRACT_DURATION {
            continue;
        }
        extracted.push(segment.with_bounds(
            segment.start + (from - seg_start),
            segment.start + (to - seg_start),
        ));
    }

    extracted
}

/// Insert `insert` at timeline time `at`, splitting the host segment when
/// the point falls more than `split_epsilon` inside it.
pub fn splice(segments: &[Segment], at: f64, insert: &[Segment], split_epsilon: f64) -> Vec<Segment> {
    let mut result = Vec::with_capacity(segments.len() + insert.len() + 1);
    let mut offset = 0.0;
    let mut inserted = false;

    for segment in segments {
        let seg_end = offset + segment.duration();
        if !inserted {
            if at <= offset + split_epsilon {
                result.extend_from_slice(insert);
                inserted = true;
            } else if at < seg_end - split_epsilon {
                let split = segment.start + (at - offset);
                result.push(segment.with_bounds(segment.start, split));
                result.extend_from_slice(insert);
                result.push(segment.with_bounds(split, segment.end));
                inserted = true;
                offset = seg_end;
                continue;
            }
        }
        result.push(segment.clone());
        offset = seg_end;
    }

    if !inserted {
        result.extend_from_slice(insert);
    }
    result
}
