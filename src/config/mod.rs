//! Configuration types and defaults
//!
//! Every section is optional in the TOML file; missing keys take the
//! defaults below. Loading and environment overrides live in
//! `adapters::toml_config`.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::edl::EdlOptions;
use crate::domain::model::TransitionKind;
use crate::error::{CutlistError, CutlistResult};

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutlistConfig {
    pub encoder: EncoderSettings,
    pub smart_cut: SmartCutSettings,
    pub concat: ConcatSettings,
    pub transitions: TransitionSettings,
    pub edl: EdlOptions,
    pub export: ExportSettings,
    pub logging: LoggingSettings,
}

/// Encoder invocation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderSettings {
    /// ffmpeg executable
    pub ffmpeg_path: String,
    /// ffprobe executable
    pub ffprobe_path: String,
    /// Video encoder name, or "auto" to follow the source codec
    pub video_codec: String,
    /// Software encoder used when a GPU encoder fails
    pub cpu_fallback_codec: String,
    /// Encoding preset
    pub preset: String,
    /// Constant Rate Factor (0-51)
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub sample_rate: u32,
    /// Upper bound for a single encoder process
    pub process_timeout_secs: u64,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            video_codec: "auto".to_string(),
            cpu_fallback_codec: "libx264".to_string(),
            preset: "medium".to_string(),
            crf: 18,
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            sample_rate: 48000,
            process_timeout_secs: 3600,
        }
    }
}

/// Smart-cut planning parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmartCutSettings {
    /// Re-encode band reserved at each cut boundary (seconds)
    pub margin: f64,
    /// Ranges shorter than this are re-encoded whole
    pub min_split_duration: f64,
    /// Head/tail parts at or below this length are omitted
    pub boundary_epsilon: f64,
    /// Half-width of the keyframe probe window
    pub keyframe_window: f64,
    pub keyframe_timeout_secs: u64,
}

impl Default for SmartCutSettings {
    fn default() -> Self {
        Self {
            margin: 5.0,
            min_split_duration: 5.0,
            boundary_epsilon: 0.1,
            keyframe_window: 20.0,
            keyframe_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcatSettings {
    /// Maximum inputs handed to one concat invocation
    pub batch_size: usize,
}

impl Default for ConcatSettings {
    fn default() -> Self {
        Self { batch_size: 25 }
    }
}

/// Transition clustering parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionSettings {
    /// Padding added on both sides of every effect window
    pub pad: f64,
    /// Windows starting within this distance of a cluster's end join it
    pub merge_tolerance: f64,
    /// Sound mixed in for effects flagged `use_effect_audio`
    pub sounds: HashMap<TransitionKind, PathBuf>,
}

impl Default for TransitionSettings {
    fn default() -> Self {
        Self {
            pad: 1.0,
            merge_tolerance: 0.5,
            sounds: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Parent directory for per-export scratch space; system temp when unset
    pub scratch_dir: Option<PathBuf>,
    /// Worker bound for parallel segment rendering; 0 means one per CPU
    pub workers: usize,
    /// Render independent segments concurrently
    pub parallel: bool,
}

impl ExportSettings {
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get().max(1)
        } else {
            self.workers
        }
    }

    pub fn scratch_root(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl CutlistConfig {
    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> CutlistResult<()> {
        let invalid = |message: String| Err(CutlistError::Config { message });

        if self.encoder.crf > 51 {
            return invalid(format!("crf {} exceeds 51", self.encoder.crf));
        }
        if self.encoder.ffmpeg_path.trim().is_empty() || self.encoder.ffprobe_path.trim().is_empty() {
            return invalid("encoder paths must not be empty".to_string());
        }
        if self.smart_cut.margin <= 0.0 {
            return invalid(format!("smart_cut.margin must be positive, got {}", self.smart_cut.margin));
        }
        if self.smart_cut.keyframe_window <= 0.0 {
            return invalid("smart_cut.keyframe_window must be positive".to_string());
        }
        if self.concat.batch_size < 2 {
            return invalid(format!(
                "concat.batch_size must be at least 2, got {}",
                self.concat.batch_size
            ));
        }
        if self.transitions.pad < 0.0 || self.transitions.merge_tolerance < 0.0 {
            return invalid("transition pad and merge_tolerance must not be negative".to_string());
        }
        if self.edl.history_limit == 0 {
            return invalid("edl.history_limit must be at least 1".to_string());
        }
        if self.edl.split_epsilon < 0.0 || self.edl.merge_epsilon < 0.0 {
            return invalid("edl epsilons must not be negative".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_constants() {
        let config = CutlistConfig::default();
        assert_eq!(config.smart_cut.margin, 5.0);
        assert_eq!(config.concat.batch_size, 25);
        assert_eq!(config.transitions.pad, 1.0);
        assert_eq!(config.transitions.merge_tolerance, 0.5);
        assert_eq!(config.edl.history_limit, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = CutlistConfig::default();
        config.concat.batch_size = 1;
        assert!(config.validate().is_err());

        let mut config = CutlistConfig::default();
        config.encoder.crf = 60;
        assert!(config.validate().is_err());

        let mut config = CutlistConfig::default();
        config.smart_cut.margin = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_workers() {
        let settings = ExportSettings {
            workers: 3,
            ..ExportSettings::default()
        };
        assert_eq!(settings.effective_workers(), 3);
        assert!(ExportSettings::default().effective_workers() >= 1);
    }
}
