//! Job runner
//!
//! Every encoder invocation goes through [`JobRunner::run`]. A job either
//! produces its output file or fails with `CutlistError::Encode` naming the
//! stage. The one automatic retry in the pipeline lives here: a failed
//! GPU re-encode is repeated once with the software encoder.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::EncoderSettings;
use crate::engine::progress::ProgressTracker;
use crate::error::{CutlistError, CutlistResult};
use crate::ports::Encoder;
use crate::utils::temp::remove_artifact;

/// Suffixes of hardware encoder names
const GPU_SUFFIXES: &[&str] = &["_nvenc", "_qsv", "_amf", "_vaapi", "_videotoolbox", "_v4l2m2m"];

/// Filter graph applied by a render job
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterGraph {
    /// Extra inputs after the main one, referenced as `[1:a]`, `[2:a]`, ...
    pub extra_inputs: Vec<PathBuf>,
    /// Video chain reading `[0:v]` and writing `[v]`
    pub video: String,
    /// Audio chain writing `[a]`; `None` keeps the source audio if any
    pub audio: Option<String>,
}

/// One encoder invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JobSpec {
    /// Decode and re-compress `[start, end)` of `source`
    Reencode {
        source: PathBuf,
        start: f64,
        end: f64,
        output: PathBuf,
    },
    /// Re-package `[start, end)` of `source`; `start` should be a keyframe
    Copy {
        source: PathBuf,
        start: f64,
        end: f64,
        output: PathBuf,
    },
    /// Lossless join of the files listed in a concat list
    Concat { list: PathBuf, output: PathBuf },
    /// Re-encode a whole file to the uniform export parameters
    Normalize {
        input: PathBuf,
        duration: f64,
        output: PathBuf,
    },
    /// Re-encode `[start, end)` of `input` through a filter graph
    Render {
        input: PathBuf,
        start: f64,
        end: f64,
        graph: FilterGraph,
        output: PathBuf,
    },
}

impl JobSpec {
    pub fn output(&self) -> &Path {
        match self {
            JobSpec::Reencode { output, .. }
            | JobSpec::Copy { output, .. }
            | JobSpec::Concat { output, .. }
            | JobSpec::Normalize { output, .. }
            | JobSpec::Render { output, .. } => output,
        }
    }

    /// Stage name used in errors and progress
    pub fn stage(&self) -> &'static str {
        match self {
            JobSpec::Reencode { .. } => "reencode",
            JobSpec::Copy { .. } => "copy",
            JobSpec::Concat { .. } => "concat",
            JobSpec::Normalize { .. } => "normalize",
            JobSpec::Render { .. } => "render",
        }
    }

    /// Media seconds this job writes, if known up front
    pub fn duration(&self) -> f64 {
        match self {
            JobSpec::Reencode { start, end, .. }
            | JobSpec::Copy { start, end, .. }
            | JobSpec::Render { start, end, .. } => (end - start).max(0.0),
            JobSpec::Normalize { duration, .. } => *duration,
            JobSpec::Concat { .. } => 0.0,
        }
    }

    /// Whether the job runs through a video encoder
    pub fn is_reencode(&self) -> bool {
        matches!(
            self,
            JobSpec::Reencode { .. } | JobSpec::Normalize { .. } | JobSpec::Render { .. }
        )
    }

    fn label(&self) -> String {
        let name = self
            .output()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{} {}", self.stage(), name)
    }
}

/// Whether `codec` names a hardware encoder
pub fn is_gpu_codec(codec: &str) -> bool {
    GPU_SUFFIXES.iter().any(|suffix| codec.ends_with(suffix))
}

/// Resolve the configured codec against the source's video codec
pub fn resolve_video_codec(configured: &str, source_codec: Option<&str>) -> String {
    if configured != "auto" {
        return configured.to_string();
    }
    match source_codec {
        Some("hevc") | Some("h265") => "libx265".to_string(),
        Some("vp9") => "libvpx-vp9".to_string(),
        Some("av1") => "libsvtav1".to_string(),
        _ => "libx264".to_string(),
    }
}

fn seconds(value: f64) -> String {
    format!("{:.6}", value.max(0.0))
}

fn quality_args(codec: &str, settings: &EncoderSettings) -> Vec<String> {
    let crf = settings.crf.to_string();
    if codec.ends_with("_nvenc") {
        vec!["-preset".into(), "p5".into(), "-rc".into(), "vbr".into(), "-cq".into(), crf]
    } else if codec.ends_with("_qsv") {
        vec!["-global_quality".into(), crf]
    } else if is_gpu_codec(codec) {
        vec!["-qp".into(), crf]
    } else {
        vec!["-preset".into(), settings.preset.clone(), "-crf".into(), crf]
    }
}

fn encode_args(codec: &str, settings: &EncoderSettings) -> Vec<String> {
    let mut args = vec!["-c:v".to_string(), codec.to_string()];
    args.extend(quality_args(codec, settings));
    args.extend([
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-c:a".to_string(),
        settings.audio_codec.clone(),
        "-b:a".to_string(),
        settings.audio_bitrate.clone(),
        "-ar".to_string(),
        settings.sample_rate.to_string(),
    ]);
    args
}

/// Encoder arguments for `job` with the given video codec
pub fn build_args(job: &JobSpec, codec: &str, settings: &EncoderSettings) -> Vec<String> {
    let mut args: Vec<String> = vec!["-hide_banner".into(), "-nostdin".into(), "-y".into()];

    match job {
        JobSpec::Reencode {
            source, start, end, ..
        } => {
            args.extend([
                "-ss".into(),
                seconds(*start),
                "-i".into(),
                source.to_string_lossy().into_owned(),
                "-t".into(),
                seconds(end - start),
                "-map".into(),
                "0:v:0".into(),
                "-map".into(),
                "0:a?".into(),
            ]);
            args.extend(encode_args(codec, settings));
            args.extend(["-avoid_negative_ts".into(), "make_zero".into()]);
        }
        JobSpec::Copy {
            source, start, end, ..
        } => {
            args.extend([
                "-ss".into(),
                seconds(*start),
                "-i".into(),
                source.to_string_lossy().into_owned(),
                "-t".into(),
                seconds(end - start),
                "-map".into(),
                "0:v:0".into(),
                "-map".into(),
                "0:a?".into(),
                "-c".into(),
                "copy".into(),
                "-avoid_negative_ts".into(),
                "make_zero".into(),
            ]);
        }
        JobSpec::Concat { list, .. } => {
            args.extend([
                "-f".into(),
                "concat".into(),
                "-safe".into(),
                "0".into(),
                "-i".into(),
                list.to_string_lossy().into_owned(),
                "-c".into(),
                "copy".into(),
            ]);
        }
        JobSpec::Normalize { input, .. } => {
            args.extend([
                "-i".into(),
                input.to_string_lossy().into_owned(),
                "-map".into(),
                "0:v:0".into(),
                "-map".into(),
                "0:a?".into(),
            ]);
            args.extend(encode_args(codec, settings));
            args.extend(["-ac".into(), "2".into()]);
        }
        JobSpec::Render {
            input,
            start,
            end,
            graph,
            ..
        } => {
            args.extend([
                "-ss".into(),
                seconds(*start),
                "-t".into(),
                seconds(end - start),
                "-i".into(),
                input.to_string_lossy().into_owned(),
            ]);
            for extra in &graph.extra_inputs {
                args.extend(["-i".into(), extra.to_string_lossy().into_owned()]);
            }
            let filter = match &graph.audio {
                Some(audio) => format!("{};{}", graph.video, audio),
                None => graph.video.clone(),
            };
            args.extend(["-filter_complex".into(), filter, "-map".into(), "[v]".into()]);
            match &graph.audio {
                Some(_) => args.extend(["-map".into(), "[a]".into()]),
                None => args.extend(["-map".into(), "0:a?".into()]),
            }
            args.extend(encode_args(codec, settings));
        }
    }

    args.push(job.output().to_string_lossy().into_owned());
    args
}

/// Runs jobs against the encoder and reports their progress
#[derive(Clone)]
pub struct JobRunner {
    encoder: Arc<dyn Encoder>,
    settings: EncoderSettings,
    tracker: ProgressTracker,
    video_codec: String,
}

impl JobRunner {
    pub fn new(encoder: Arc<dyn Encoder>, settings: EncoderSettings, tracker: ProgressTracker) -> Self {
        let video_codec = resolve_video_codec(&settings.video_codec, None);
        Self {
            encoder,
            settings,
            tracker,
            video_codec,
        }
    }

    /// Follow the source codec when the configured codec is "auto"
    pub fn with_source_codec(mut self, source_codec: Option<&str>) -> Self {
        self.video_codec = resolve_video_codec(&self.settings.video_codec, source_codec);
        self
    }

    /// Re-encoded audio keeps the source rate so copied parts can be joined
    /// without resampling; the configured rate applies when none was probed
    pub fn with_source_audio(mut self, sample_rate: Option<u32>) -> Self {
        if let Some(rate) = sample_rate.filter(|rate| *rate > 0) {
            self.settings.sample_rate = rate;
        }
        self
    }

    pub fn video_codec(&self) -> &str {
        &self.video_codec
    }

    pub fn sample_rate(&self) -> u32 {
        self.settings.sample_rate
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    pub fn encoder(&self) -> &Arc<dyn Encoder> {
        &self.encoder
    }

    /// Run one job to completion and return its output path
    pub async fn run(&self, job: &JobSpec) -> CutlistResult<PathBuf> {
        if self.tracker.is_cancelled() {
            return Err(CutlistError::Cancelled);
        }

        let codec = self.video_codec.as_str();
        match self.run_with_codec(job, codec).await {
            Err(CutlistError::Encode { message, .. }) if job.is_reencode() && is_gpu_codec(codec) => {
                let fallback = self.settings.cpu_fallback_codec.as_str();
                warn!(
                    "{} failed with {} ({}), retrying with {}",
                    job.stage(),
                    codec,
                    message,
                    fallback
                );
                self.run_with_codec(job, fallback).await
            }
            result => result,
        }
    }

    async fn run_with_codec(&self, job: &JobSpec, codec: &str) -> CutlistResult<PathBuf> {
        let args = build_args(job, codec, &self.settings);
        let label = job.label();
        let job_seconds = job.duration();
        let output = job.output().to_path_buf();
        debug!("Running {}: {}", label, args.join(" "));

        let tracker = &self.tracker;
        let on_time = |processed: f64| tracker.job_progress(&label, processed, job_seconds);
        let timeout = Duration::from_secs(self.settings.process_timeout_secs.max(1));

        let outcome = tokio::time::timeout(
            timeout,
            self.encoder.run(&args, self.tracker.cancel_token(), &on_time),
        )
        .await;

        let outcome = match outcome {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                remove_artifact(&output);
                return Err(match e {
                    CutlistError::Cancelled => CutlistError::Cancelled,
                    CutlistError::Encode { .. } => e,
                    other => CutlistError::encode(job.stage(), other.to_string()),
                });
            }
            Err(_) => {
                remove_artifact(&output);
                return Err(CutlistError::encode(
                    job.stage(),
                    format!("timed out after {}s", timeout.as_secs()),
                ));
            }
        };

        if self.tracker.is_cancelled() {
            remove_artifact(&output);
            return Err(CutlistError::Cancelled);
        }

        if !outcome.success {
            remove_artifact(&output);
            let code = outcome
                .exit_code
                .map_or_else(|| "signal".to_string(), |code| code.to_string());
            return Err(CutlistError::encode(
                job.stage(),
                format!("exit {}: {}", code, outcome.stderr.trim()),
            ));
        }

        if !output.exists() {
            return Err(CutlistError::encode(
                job.stage(),
                format!("no output written to {}", output.display()),
            ));
        }

        self.tracker.complete_job(&label, job_seconds);
        info!("Finished {}", label);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::MediaProbe;
    use crate::engine::progress::CancelToken;
    use crate::ports::{ProcessOutcome, TimeCallback, TimeWindow};

    fn settings() -> EncoderSettings {
        EncoderSettings::default()
    }

    fn position(args: &[String], flag: &str) -> usize {
        args.iter().position(|a| a == flag).unwrap()
    }

    #[test]
    fn test_gpu_detection() {
        assert!(is_gpu_codec("h264_nvenc"));
        assert!(is_gpu_codec("hevc_videotoolbox"));
        assert!(!is_gpu_codec("libx264"));
    }

    #[test]
    fn test_resolve_video_codec() {
        assert_eq!(resolve_video_codec("auto", Some("hevc")), "libx265");
        assert_eq!(resolve_video_codec("auto", Some("h264")), "libx264");
        assert_eq!(resolve_video_codec("auto", None), "libx264");
        assert_eq!(resolve_video_codec("h264_nvenc", Some("hevc")), "h264_nvenc");
    }

    #[test]
    fn test_reencode_args() {
        let job = JobSpec::Reencode {
            source: "in.mp4".into(),
            start: 10.0,
            end: 12.5,
            output: "out.mp4".into(),
        };
        let args = build_args(&job, "libx264", &settings());
        assert_eq!(args[position(&args, "-ss") + 1], "10.000000");
        assert_eq!(args[position(&args, "-t") + 1], "2.500000");
        assert_eq!(args[position(&args, "-c:v") + 1], "libx264");
        assert_eq!(args[position(&args, "-crf") + 1], "18");
        assert_eq!(args[position(&args, "-ar") + 1], "48000");
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    struct Idle;

    #[async_trait::async_trait]
    impl Encoder for Idle {
        async fn probe(&self, path: &Path) -> CutlistResult<MediaProbe> {
            Err(CutlistError::probe(path.display().to_string()))
        }

        async fn run(
            &self,
            _args: &[String],
            _cancel: &CancelToken,
            _on_time: TimeCallback<'_>,
        ) -> CutlistResult<ProcessOutcome> {
            Ok(ProcessOutcome::ok())
        }

        async fn find_keyframes(&self, _path: &Path, _window: TimeWindow) -> CutlistResult<Vec<f64>> {
            Ok(Vec::new())
        }
    }

    fn idle_runner() -> JobRunner {
        JobRunner::new(Arc::new(Idle), settings(), ProgressTracker::new(CancelToken::new()))
    }

    #[test]
    fn test_source_audio_rate_overrides_configured_rate() {
        assert_eq!(idle_runner().with_source_audio(Some(44100)).sample_rate(), 44100);
        assert_eq!(idle_runner().with_source_audio(None).sample_rate(), 48000);
        assert_eq!(idle_runner().with_source_audio(Some(0)).sample_rate(), 48000);
    }

    #[test]
    fn test_copy_args_use_stream_copy() {
        let job = JobSpec::Copy {
            source: "in.mp4".into(),
            start: 12.0,
            end: 95.0,
            output: "body.mp4".into(),
        };
        let args = build_args(&job, "libx264", &settings());
        assert_eq!(args[position(&args, "-c") + 1], "copy");
        assert!(!args.contains(&"-c:v".to_string()));
    }

    #[test]
    fn test_nvenc_uses_cq() {
        let job = JobSpec::Normalize {
            input: "in.mp4".into(),
            duration: 5.0,
            output: "out.mp4".into(),
        };
        let args = build_args(&job, "h264_nvenc", &settings());
        assert!(args.contains(&"-cq".to_string()));
        assert!(!args.contains(&"-crf".to_string()));
    }

    #[test]
    fn test_render_args_map_filter_outputs() {
        let job = JobSpec::Render {
            input: "clip.mp4".into(),
            start: 8.5,
            end: 12.5,
            graph: FilterGraph {
                extra_inputs: vec!["whoosh.wav".into()],
                video: "[0:v]null[v]".into(),
                audio: Some("[0:a][1:a]amix=inputs=2[a]".into()),
            },
            output: "cluster.mp4".into(),
        };
        let args = build_args(&job, "libx264", &settings());
        assert_eq!(
            args[position(&args, "-filter_complex") + 1],
            "[0:v]null[v];[0:a][1:a]amix=inputs=2[a]"
        );
        assert!(args.contains(&"[a]".to_string()));
        assert!(args.contains(&"whoosh.wav".to_string()));
    }

    #[test]
    fn test_job_metadata() {
        let job = JobSpec::Concat {
            list: "list.txt".into(),
            output: "joined.mp4".into(),
        };
        assert_eq!(job.stage(), "concat");
        assert!(!job.is_reencode());
        assert_eq!(job.label(), "concat joined.mp4");
    }
}
