//! Rendering transition clusters over an assembled clip

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::TransitionSettings;
use crate::domain::model::{RenderCluster, TransitionEffect, TransitionKind};
use crate::engine::concat::ChunkedConcatenator;
use crate::engine::runner::{FilterGraph, JobRunner, JobSpec};
use crate::error::CutlistResult;
use crate::planner::transitions::{cluster_effects, render_spans, RenderSpan};
use crate::utils::temp::{remove_artifacts, ScratchSpace};

/// Blur strength for the blur transition
const BLUR_SIGMA: f64 = 20.0;
/// Source audio level under an effect without a sound
const AUDIO_DIP: f64 = 0.3;

fn between(start: f64, end: f64) -> String {
    format!("enable='between(t,{:.3},{:.3})'", start, end)
}

/// Video filters for one effect, in cluster-local seconds
pub fn video_filter(effect: &TransitionEffect, offset: f64) -> String {
    let start = (effect.effect_start() - offset).max(0.0);
    let end = effect.effect_end() - offset;
    let mid = effect.time - offset;
    let half = effect.duration / 2.0;

    match effect.kind {
        TransitionKind::FadeBlack | TransitionKind::FadeWhite => {
            let color = if effect.kind == TransitionKind::FadeBlack {
                "black"
            } else {
                "white"
            };
            format!(
                "fade=t=out:st={:.3}:d={:.3}:color={c}:{},fade=t=in:st={:.3}:d={:.3}:color={c}:{}",
                start,
                half,
                between(start, mid),
                mid,
                half,
                between(mid, end),
                c = color
            )
        }
        TransitionKind::Blur => format!("gblur=sigma={}:{}", BLUR_SIGMA, between(start, end)),
        TransitionKind::Flash => format!(
            "fade=t=in:st={:.3}:d={:.3}:color=white:{}",
            start,
            effect.duration,
            between(start, end)
        ),
    }
}

/// Filter graph re-encoding one cluster with all its effects.
///
/// Effects flagged for audio mix their configured sound over the source
/// audio; the others dip the source audio for their duration.
pub fn cluster_graph(
    cluster: &RenderCluster,
    has_audio: bool,
    sounds: &HashMap<TransitionKind, PathBuf>,
) -> FilterGraph {
    let mut video = String::from("[0:v]");
    for effect in &cluster.effects {
        video.push_str(&video_filter(effect, cluster.start));
        video.push(',');
    }
    video.push_str("format=yuv420p[v]");

    if !has_audio {
        return FilterGraph {
            extra_inputs: Vec::new(),
            video,
            audio: None,
        };
    }

    let mut extra_inputs = Vec::new();
    let mut audio = String::new();
    let mut dips = Vec::new();
    for effect in &cluster.effects {
        let start = (effect.effect_start() - cluster.start).max(0.0);
        let end = effect.effect_end() - cluster.start;
        let sound = effect
            .use_effect_audio
            .then(|| sounds.get(&effect.kind))
            .flatten();
        match sound {
            Some(path) => {
                extra_inputs.push(path.clone());
                let delay = (start * 1000.0).round() as u64;
                let _ = write!(
                    audio,
                    "[{}:a]adelay={d}|{d}[s{}];",
                    extra_inputs.len(),
                    extra_inputs.len(),
                    d = delay
                );
            }
            None => {
                if effect.use_effect_audio {
                    warn!("No sound configured for {}, dipping audio instead", effect.kind);
                }
                dips.push(format!("volume=volume={}:{}", AUDIO_DIP, between(start, end)));
            }
        }
    }

    let base = if dips.is_empty() {
        "anull".to_string()
    } else {
        dips.join(",")
    };
    if extra_inputs.is_empty() {
        let _ = write!(audio, "[0:a]{}[a]", base);
    } else {
        let _ = write!(audio, "[0:a]{}[base];[base]", base);
        for i in 1..=extra_inputs.len() {
            let _ = write!(audio, "[s{}]", i);
        }
        let _ = write!(
            audio,
            "amix=inputs={}:duration=first:dropout_transition=0[a]",
            extra_inputs.len() + 1
        );
    }

    FilterGraph {
        extra_inputs,
        video,
        audio: Some(audio),
    }
}

/// Applies transition effects by re-encoding only their clusters
#[derive(Clone)]
pub struct TransitionRenderer {
    runner: JobRunner,
    concatenator: ChunkedConcatenator,
    scratch: Arc<ScratchSpace>,
    settings: TransitionSettings,
}

impl TransitionRenderer {
    pub fn new(
        runner: JobRunner,
        concatenator: ChunkedConcatenator,
        scratch: Arc<ScratchSpace>,
        settings: TransitionSettings,
    ) -> Self {
        Self {
            runner,
            concatenator,
            scratch,
            settings,
        }
    }

    /// Spans the clip is split into for `effects`
    pub fn spans(&self, effects: &[TransitionEffect], clip_duration: f64) -> Vec<RenderSpan> {
        let clusters = cluster_effects(
            effects,
            clip_duration,
            self.settings.pad,
            self.settings.merge_tolerance,
        );
        render_spans(clusters, clip_duration, self.settings.merge_tolerance)
    }

    /// Render `effects` over `clip` into `output`
    pub async fn render(
        &self,
        clip: &Path,
        clip_duration: f64,
        has_audio: bool,
        effects: &[TransitionEffect],
        output: &Path,
    ) -> CutlistResult<PathBuf> {
        let spans = self.spans(effects, clip_duration);
        let clusters = spans
            .iter()
            .filter(|span| matches!(span, RenderSpan::Cluster(_)))
            .count();
        info!(
            "Rendering {} effects in {} clusters over {:.3}s",
            effects.len(),
            clusters,
            clip_duration
        );

        let extension = output.extension().and_then(|ext| ext.to_str()).unwrap_or("mp4");
        let mut pieces = Vec::with_capacity(spans.len());
        let mut failure = None;
        for span in &spans {
            let job = match span {
                RenderSpan::Clean { start, end } => JobSpec::Copy {
                    source: clip.to_path_buf(),
                    start: *start,
                    end: *end,
                    output: self.scratch.artifact("clean", extension),
                },
                RenderSpan::Cluster(cluster) => JobSpec::Render {
                    input: clip.to_path_buf(),
                    start: cluster.start,
                    end: cluster.end,
                    graph: cluster_graph(cluster, has_audio, &self.settings.sounds),
                    output: self.scratch.artifact("cluster", extension),
                },
            };
            match self.runner.run(&job).await {
                Ok(path) => pieces.push(path),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let result = match failure {
            Some(e) => Err(e),
            None => self.concatenator.concat(&pieces, output).await,
        };
        remove_artifacts(&pieces);
        result
    }
}
