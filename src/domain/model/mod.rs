// Domain models - Core types and data structures

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::errors::EditError;

#[cfg(test)]
mod tests;

/// Time specification with precision - represents time in seconds with fractional precision
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct TimeSpec {
    pub seconds: f64,
}

impl TimeSpec {
    /// Create a new TimeSpec from seconds
    pub fn from_seconds(seconds: f64) -> Self {
        Self { seconds }
    }

    pub fn as_seconds(&self) -> f64 {
        self.seconds
    }

    /// Parse time string: seconds, MM:SS.ms or HH:MM:SS.ms
    pub fn parse(time_str: &str) -> Result<Self, EditError> {
        let trimmed = time_str.trim();

        if let Ok(seconds) = trimmed.parse::<f64>() {
            if seconds < 0.0 || !seconds.is_finite() {
                return Err(EditError::BadArgs(format!(
                    "Time must be a non-negative number: {}",
                    trimmed
                )));
            }
            return Ok(Self::from_seconds(seconds));
        }

        let parts: Vec<&str> = trimmed.split(':').collect();
        let parse_unit = |part: &str, what: &str| {
            part.parse::<u32>()
                .map_err(|_| EditError::BadArgs(format!("Invalid {} in '{}'", what, trimmed)))
        };
        let parse_seconds = |part: &str| {
            let value = part
                .parse::<f64>()
                .map_err(|_| EditError::BadArgs(format!("Invalid seconds in '{}'", trimmed)))?;
            if !(0.0..60.0).contains(&value) {
                return Err(EditError::BadArgs(format!(
                    "Seconds must be less than 60 in '{}'",
                    trimmed
                )));
            }
            Ok(value)
        };

        match parts.as_slice() {
            [minutes, seconds] => {
                let minutes = parse_unit(minutes, "minutes")?;
                let seconds = parse_seconds(seconds)?;
                Ok(Self::from_seconds(minutes as f64 * 60.0 + seconds))
            }
            [hours, minutes, seconds] => {
                let hours = parse_unit(hours, "hours")?;
                let minutes = parse_unit(minutes, "minutes")?;
                if minutes >= 60 {
                    return Err(EditError::BadArgs(format!(
                        "Minutes must be less than 60 in '{}'",
                        trimmed
                    )));
                }
                let seconds = parse_seconds(seconds)?;
                Ok(Self::from_seconds(
                    hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds,
                ))
            }
            _ => Err(EditError::BadArgs(format!(
                "Invalid time format '{}'. Supported formats: seconds (123.45), MM:SS.ms (2:30.5), HH:MM:SS.ms (1:02:30.5)",
                trimmed
            ))),
        }
    }

    /// Format as HH:MM:SS.ms (hours omitted when zero)
    pub fn format_hms(&self) -> String {
        let total_millis = (self.seconds.max(0.0) * 1000.0).round() as u64;
        let hours = total_millis / 3_600_000;
        let minutes = (total_millis % 3_600_000) / 60_000;
        let seconds = (total_millis % 60_000) / 1000;
        let milliseconds = total_millis % 1000;

        if hours > 0 {
            format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, milliseconds)
        } else {
            format!("{:02}:{:02}.{:03}", minutes, seconds, milliseconds)
        }
    }
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_hms())
    }
}

/// Identifies one original media file. The value is the media path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SourceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&Path> for SourceId {
    fn from(value: &Path) -> Self {
        Self(value.to_string_lossy().into_owned())
    }
}

/// A contiguous range of one source file, placed on the timeline.
///
/// Segments are values: edits replace them, never mutate them in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub source: SourceId,
}

impl Segment {
    /// Create a segment, enforcing `end > start`
    pub fn new(start: f64, end: f64, source: impl Into<SourceId>) -> Result<Self, EditError> {
        if !start.is_finite() || !end.is_finite() || start < 0.0 {
            return Err(EditError::InvalidSegment(format!(
                "bounds must be finite and non-negative ({}, {})",
                start, end
            )));
        }
        if end <= start {
            return Err(EditError::InvalidSegment(format!(
                "end ({:.3}s) must be greater than start ({:.3}s)",
                end, start
            )));
        }
        Ok(Self {
            start,
            end,
            source: source.into(),
        })
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Same source, new bounds. Callers guarantee `end > start`.
    pub(crate) fn with_bounds(&self, start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            source: self.source.clone(),
        }
    }

    /// Half-open containment `[start, end)` of a source time
    pub fn contains_source_time(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }
}

/// Ordered segments tiling the virtual timeline, plus the default source
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Timeline {
    pub(crate) segments: Vec<Segment>,
    pub(crate) primary_source: Option<SourceId>,
}

impl Timeline {
    /// Empty timeline with no primary source
    pub fn new() -> Self {
        Self::default()
    }

    /// Timeline holding one segment spanning the whole source
    pub fn from_source(source: impl Into<SourceId>, duration: f64) -> Result<Self, EditError> {
        let source = source.into();
        let segment = Segment::new(0.0, duration, source.clone())?;
        Ok(Self {
            segments: vec![segment],
            primary_source: Some(source),
        })
    }

    /// Build from stored segments; segments are checked for `end > start`
    pub fn from_segments(
        segments: Vec<Segment>,
        primary_source: Option<SourceId>,
    ) -> Result<Self, EditError> {
        for segment in &segments {
            if segment.end <= segment.start {
                return Err(EditError::InvalidSegment(format!(
                    "end ({:.3}s) must be greater than start ({:.3}s)",
                    segment.end, segment.start
                )));
            }
        }
        Ok(Self {
            segments,
            primary_source,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn primary_source(&self) -> Option<&SourceId> {
        self.primary_source.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Sum of segment durations
    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(Segment::duration).sum()
    }

    /// Distinct sources in first-appearance order
    pub fn sources(&self) -> Vec<SourceId> {
        let mut seen: Vec<SourceId> = Vec::new();
        for segment in &self.segments {
            if !seen.contains(&segment.source) {
                seen.push(segment.source.clone());
            }
        }
        seen
    }
}

/// Last copied or cut material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clipboard {
    pub source: Option<SourceId>,
    pub segments: Vec<Segment>,
    pub duration: f64,
}

impl Clipboard {
    pub fn new(source: Option<SourceId>, segments: Vec<Segment>) -> Self {
        let duration = segments.iter().map(Segment::duration).sum();
        Self {
            source,
            segments,
            duration,
        }
    }
}

/// Visual style of a timed effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionKind {
    FadeBlack,
    FadeWhite,
    Blur,
    Flash,
}

impl TransitionKind {
    pub fn parse(kind: &str) -> Result<Self, EditError> {
        match kind.trim().to_lowercase().as_str() {
            "fade-black" | "fade" | "fadeblack" => Ok(TransitionKind::FadeBlack),
            "fade-white" | "fadewhite" => Ok(TransitionKind::FadeWhite),
            "blur" => Ok(TransitionKind::Blur),
            "flash" => Ok(TransitionKind::Flash),
            other => Err(EditError::BadArgs(format!(
                "Unknown transition '{}'. Valid kinds: fade-black, fade-white, blur, flash",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::FadeBlack => "fade-black",
            TransitionKind::FadeWhite => "fade-white",
            TransitionKind::Blur => "blur",
            TransitionKind::Flash => "flash",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A timed effect placed on the assembled clip's time axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEffect {
    pub time: f64,
    pub kind: TransitionKind,
    pub duration: f64,
    #[serde(default)]
    pub use_effect_audio: bool,
}

impl TransitionEffect {
    pub fn new(
        time: f64,
        kind: TransitionKind,
        duration: f64,
        use_effect_audio: bool,
    ) -> Result<Self, EditError> {
        if time < 0.0 || !time.is_finite() {
            return Err(EditError::BadArgs(format!("Invalid effect time {}", time)));
        }
        if duration <= 0.0 || !duration.is_finite() {
            return Err(EditError::BadArgs(format!(
                "Effect duration must be positive, got {}",
                duration
            )));
        }
        Ok(Self {
            time,
            kind,
            duration,
            use_effect_audio,
        })
    }

    /// Start of the visible effect, before padding
    pub fn effect_start(&self) -> f64 {
        self.time - self.duration / 2.0
    }

    pub fn effect_end(&self) -> f64 {
        self.time + self.duration / 2.0
    }
}

/// Merged window of nearby effects sharing one re-encode
#[derive(Debug, Clone, PartialEq)]
pub struct RenderCluster {
    pub start: f64,
    pub end: f64,
    pub effects: Vec<TransitionEffect>,
}

impl RenderCluster {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Editable project state: the timeline, placed effects and extra assets
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Project {
    pub timeline: Timeline,
    pub transitions: Vec<TransitionEffect>,
    pub assets: Vec<PathBuf>,
}

impl Project {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            timeline,
            ..Self::default()
        }
    }

    /// Effects in time order
    pub fn sorted_transitions(&self) -> Vec<TransitionEffect> {
        let mut effects = self.transitions.clone();
        effects.sort_by(|a, b| a.time.total_cmp(&b.time));
        effects
    }
}

/// Kind of an elementary media stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Data,
}

/// One stream reported by the probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub index: usize,
    pub kind: StreamKind,
    pub codec: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub sample_rate: Option<u32>,
}

/// Result of probing a media file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaProbe {
    pub path: PathBuf,
    pub duration: f64,
    pub streams: Vec<StreamInfo>,
}

impl MediaProbe {
    pub fn primary_video(&self) -> Option<&StreamInfo> {
        self.streams.iter().find(|s| s.kind == StreamKind::Video)
    }

    pub fn has_audio(&self) -> bool {
        self.streams.iter().any(|s| s.kind == StreamKind::Audio)
    }

    pub fn video_codec(&self) -> Option<&str> {
        self.primary_video().map(|s| s.codec.as_str())
    }

    /// Sample rate of the first audio stream that reports one
    pub fn audio_sample_rate(&self) -> Option<u32> {
        self.streams
            .iter()
            .filter(|s| s.kind == StreamKind::Audio)
            .find_map(|s| s.sample_rate)
    }
}
