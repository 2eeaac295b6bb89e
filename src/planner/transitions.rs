//! Transition clustering
//!
//! Groups nearby effects into the smallest set of windows that need a
//! re-encode over an assembled clip. Everything between clusters is copied.

use tracing::{debug, warn};

use crate::domain::model::{RenderCluster, TransitionEffect};

/// One contiguous span of the assembled clip, in clip seconds
#[derive(Debug, Clone, PartialEq)]
pub enum RenderSpan {
    /// Untouched span, stream-copied
    Clean { start: f64, end: f64 },
    /// Re-encoded once with every effect it holds
    Cluster(RenderCluster),
}

impl RenderSpan {
    pub fn start(&self) -> f64 {
        match self {
            RenderSpan::Clean { start, .. } => *start,
            RenderSpan::Cluster(cluster) => cluster.start,
        }
    }

    pub fn end(&self) -> f64 {
        match self {
            RenderSpan::Clean { end, .. } => *end,
            RenderSpan::Cluster(cluster) => cluster.end,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end() - self.start()
    }
}

/// Merge effect windows into clusters.
///
/// Each effect covers `[time - duration/2 - pad, time + duration/2 + pad]`
/// clamped to the clip. A window joins the current cluster when it starts no
/// later than `tolerance` after the cluster's end.
pub fn cluster_effects(
    effects: &[TransitionEffect],
    clip_duration: f64,
    pad: f64,
    tolerance: f64,
) -> Vec<RenderCluster> {
    let mut sorted: Vec<&TransitionEffect> = effects.iter().collect();
    sorted.sort_by(|a, b| a.time.total_cmp(&b.time));

    let mut clusters: Vec<RenderCluster> = Vec::new();
    for effect in sorted {
        let start = (effect.effect_start() - pad).max(0.0);
        let end = (effect.effect_end() + pad).min(clip_duration);
        if end <= start {
            warn!(
                "Skipping {} at {:.3}s, outside the {:.3}s clip",
                effect.kind, effect.time, clip_duration
            );
            continue;
        }

        match clusters.last_mut() {
            Some(current) if start <= current.end + tolerance => {
                current.end = current.end.max(end);
                current.effects.push(effect.clone());
            }
            _ => clusters.push(RenderCluster {
                start,
                end,
                effects: vec![effect.clone()],
            }),
        }
    }

    debug!("{} effects merged into {} clusters", effects.len(), clusters.len());
    clusters
}

/// Cover `[0, clip_duration]` with clean spans and clusters in order.
///
/// Gaps shorter than `tolerance` are absorbed into the neighbouring cluster
/// instead of producing near-empty clean spans.
pub fn render_spans(clusters: Vec<RenderCluster>, clip_duration: f64, tolerance: f64) -> Vec<RenderSpan> {
    let mut spans: Vec<RenderSpan> = Vec::with_capacity(clusters.len() * 2 + 1);
    let mut cursor = 0.0;

    for mut cluster in clusters {
        let gap = cluster.start - cursor;
        if gap >= tolerance {
            spans.push(RenderSpan::Clean {
                start: cursor,
                end: cluster.start,
            });
        } else if gap > 0.0 {
            match spans.last_mut() {
                Some(RenderSpan::Cluster(previous)) => previous.end = cluster.start,
                _ => cluster.start = cursor,
            }
        }
        cursor = cluster.end;
        spans.push(RenderSpan::Cluster(cluster));
    }

    let trailing = clip_duration - cursor;
    if trailing >= tolerance || spans.is_empty() {
        if trailing > 0.0 {
            spans.push(RenderSpan::Clean {
                start: cursor,
                end: clip_duration,
            });
        }
    } else if trailing > 0.0 {
        if let Some(RenderSpan::Cluster(last)) = spans.last_mut() {
            last.end = clip_duration;
        }
    }

    spans
}
