//! Export orchestration
//!
//! Turns a timeline into one output file: every segment is realized through
//! the smart-cut planner, the results are joined in timeline order, optional
//! transitions are rendered, and only the finished file is moved into the
//! destination. Intermediates never leave the scratch directory.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::CutlistConfig;
use crate::domain::model::{MediaProbe, Segment, SourceId, Timeline, TransitionEffect};
use crate::engine::concat::ChunkedConcatenator;
use crate::engine::progress::{ExportPhase, ProgressTracker};
use crate::engine::runner::{JobRunner, JobSpec};
use crate::engine::smart_cut::SmartCutExecutor;
use crate::engine::transitions::TransitionRenderer;
use crate::error::{CutlistError, CutlistResult};
use crate::planner::transitions::RenderSpan;
use crate::planner::{KeyframeLocator, SmartCutPlanner};
use crate::ports::Encoder;
use crate::utils::temp::{remove_artifacts, ScratchSpace};

/// What to export
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub timeline: Timeline,
    pub transitions: Vec<TransitionEffect>,
    pub output: PathBuf,
}

/// Summary of a finished export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportReport {
    pub output: PathBuf,
    pub duration: f64,
    pub segments: usize,
    pub clusters: usize,
    /// Whether the stream-copy join had to fall back to normalize-and-concat
    pub normalized: bool,
    pub elapsed: Duration,
}

/// Tools shared by every phase of one export
struct Pipeline {
    runner: JobRunner,
    planner: SmartCutPlanner,
    executor: SmartCutExecutor,
    concatenator: ChunkedConcatenator,
    renderer: TransitionRenderer,
    scratch: Arc<ScratchSpace>,
}

/// Runs exports against an encoder
pub struct Exporter {
    encoder: Arc<dyn Encoder>,
    config: CutlistConfig,
    tracker: ProgressTracker,
}

impl Exporter {
    pub fn new(encoder: Arc<dyn Encoder>, config: CutlistConfig, tracker: ProgressTracker) -> Self {
        Self {
            encoder,
            config,
            tracker,
        }
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Export `request`, reporting the failing stage on error
    pub async fn export(&self, request: &ExportRequest) -> CutlistResult<ExportReport> {
        match self.run(request).await {
            Ok(report) => {
                self.tracker.set_phase(
                    ExportPhase::Done,
                    &format!("wrote {}", report.output.display()),
                );
                Ok(report)
            }
            Err(e) => {
                self.tracker
                    .set_phase(ExportPhase::Error, &format!("{} failed: {}", e.stage(), e));
                Err(e)
            }
        }
    }

    async fn run(&self, request: &ExportRequest) -> CutlistResult<ExportReport> {
        let started = Instant::now();
        self.tracker.set_phase(ExportPhase::Analyzing, "probing sources");

        let segments = request.timeline.segments();
        if segments.is_empty() {
            return Err(CutlistError::planning("timeline is empty"));
        }
        check_destination(&request.output)?;

        let probes = self.probe_sources(&request.timeline).await?;
        let primary = request
            .timeline
            .primary_source()
            .and_then(|source| probes.get(source))
            .or_else(|| probes.get(&segments[0].source));
        let segments = clamp_to_sources(segments, &probes);
        if segments.is_empty() {
            return Err(CutlistError::planning("no segment lies inside its source"));
        }
        let total = segments.iter().map(Segment::duration).sum::<f64>();
        let has_audio = primary.map_or(false, MediaProbe::has_audio);

        let scratch = Arc::new(ScratchSpace::new(&self.config.export.scratch_root())?);
        let pipeline = self.pipeline(scratch, primary);
        self.tracker.add_work(total);
        if !request.transitions.is_empty() {
            self.tracker.add_work(total);
        }

        self.tracker.set_phase(
            ExportPhase::Cutting,
            &format!("realizing {} segments", segments.len()),
        );
        let extension = extension_of(&request.output);
        let parts = if self.config.export.parallel && segments.len() > 1 {
            self.cut_parallel(&pipeline, &segments, extension).await?
        } else {
            self.cut_sequential(&pipeline, &segments, extension).await?
        };

        self.tracker
            .set_phase(ExportPhase::Concatenating, &format!("joining {} parts", parts.len()));
        let (assembled, normalized) = if parts.len() == 1 {
            (parts[0].clone(), false)
        } else {
            let joined = self.join(&pipeline, &parts, total, extension).await;
            remove_artifacts(&parts);
            joined?
        };

        let mut clusters = 0;
        let finished = if request.transitions.is_empty() {
            assembled
        } else {
            self.tracker.set_phase(
                ExportPhase::Rendering,
                &format!("rendering {} transitions", request.transitions.len()),
            );
            clusters = pipeline
                .renderer
                .spans(&request.transitions, total)
                .iter()
                .filter(|span| matches!(span, RenderSpan::Cluster(_)))
                .count();
            let rendered = pipeline.scratch.artifact("rendered", extension);
            let result = pipeline
                .renderer
                .render(&assembled, total, has_audio, &request.transitions, &rendered)
                .await;
            remove_artifacts([&assembled]);
            result?
        };

        if self.tracker.is_cancelled() {
            return Err(CutlistError::Cancelled);
        }
        move_into_place(&finished, &request.output)?;

        let report = ExportReport {
            output: request.output.clone(),
            duration: total,
            segments: segments.len(),
            clusters,
            normalized,
            elapsed: started.elapsed(),
        };
        info!(
            "Exported {:.3}s from {} segments to {} in {:.1}s",
            report.duration,
            report.segments,
            report.output.display(),
            report.elapsed.as_secs_f64()
        );
        Ok(report)
    }

    async fn probe_sources(&self, timeline: &Timeline) -> CutlistResult<HashMap<SourceId, MediaProbe>> {
        let mut probes = HashMap::new();
        for source in timeline.sources() {
            let probe = self.encoder.probe(source.as_path()).await?;
            debug!("{}: {:.3}s, {} streams", source, probe.duration, probe.streams.len());
            probes.insert(source, probe);
        }
        Ok(probes)
    }

    fn pipeline(&self, scratch: Arc<ScratchSpace>, primary: Option<&MediaProbe>) -> Pipeline {
        let runner = JobRunner::new(
            self.encoder.clone(),
            self.config.encoder.clone(),
            self.tracker.clone(),
        )
        .with_source_codec(primary.and_then(MediaProbe::video_codec))
        .with_source_audio(primary.and_then(MediaProbe::audio_sample_rate));
        let concatenator =
            ChunkedConcatenator::new(runner.clone(), scratch.clone(), self.config.concat.batch_size);
        let locator = KeyframeLocator::new(self.encoder.clone(), &self.config.smart_cut);
        let planner = SmartCutPlanner::new(locator, self.config.smart_cut.clone());
        let executor = SmartCutExecutor::new(runner.clone(), concatenator.clone(), scratch.clone());
        let renderer = TransitionRenderer::new(
            runner.clone(),
            concatenator.clone(),
            scratch.clone(),
            self.config.transitions.clone(),
        );
        Pipeline {
            runner,
            planner,
            executor,
            concatenator,
            renderer,
            scratch,
        }
    }

    async fn cut_sequential(
        &self,
        pipeline: &Pipeline,
        segments: &[Segment],
        extension: &str,
    ) -> CutlistResult<Vec<PathBuf>> {
        let mut parts = Vec::with_capacity(segments.len());
        for segment in segments {
            let output = pipeline.scratch.artifact("segment", extension);
            match realize_segment(&pipeline.planner, &pipeline.executor, segment, &output).await {
                Ok(path) => parts.push(path),
                Err(e) => {
                    remove_artifacts(&parts);
                    return Err(e);
                }
            }
        }
        Ok(parts)
    }

    /// Realize segments concurrently, bounded by the worker count, keeping
    /// results in timeline order
    async fn cut_parallel(
        &self,
        pipeline: &Pipeline,
        segments: &[Segment],
        extension: &str,
    ) -> CutlistResult<Vec<PathBuf>> {
        let workers = self.config.export.effective_workers();
        debug!("Realizing {} segments on {} workers", segments.len(), workers);
        let permits = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();

        for (index, segment) in segments.iter().cloned().enumerate() {
            let planner = pipeline.planner.clone();
            let executor = pipeline.executor.clone();
            let permits = permits.clone();
            let output = pipeline.scratch.artifact("segment", extension);
            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|_| CutlistError::Cancelled)?;
                let path = realize_segment(&planner, &executor, &segment, &output).await?;
                Ok::<_, CutlistError>((index, path))
            });
        }

        let mut slots: Vec<Option<PathBuf>> = vec![None; segments.len()];
        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok((index, path))) => slots[index] = Some(path),
                Ok(Err(e)) => {
                    if failure.is_none() {
                        failure = Some(e);
                        tasks.abort_all();
                    }
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    if failure.is_none() {
                        failure = Some(CutlistError::encode("cut", format!("worker panicked: {}", e)));
                        tasks.abort_all();
                    }
                }
            }
        }

        let parts: Vec<PathBuf> = slots.iter().flatten().cloned().collect();
        if let Some(e) = failure {
            remove_artifacts(&parts);
            return Err(e);
        }
        Ok(parts)
    }

    /// Stream-copy join, falling back to normalizing every part first
    async fn join(
        &self,
        pipeline: &Pipeline,
        parts: &[PathBuf],
        total: f64,
        extension: &str,
    ) -> CutlistResult<(PathBuf, bool)> {
        let assembled = pipeline.scratch.artifact("assembled", extension);
        match pipeline.concatenator.concat(parts, &assembled).await {
            Ok(path) => return Ok((path, false)),
            Err(CutlistError::Cancelled) => return Err(CutlistError::Cancelled),
            Err(e) => warn!("Stream-copy join failed ({}), normalizing parts", e),
        }

        let per_part = total / parts.len() as f64;
        let mut normalized = Vec::with_capacity(parts.len());
        for part in parts {
            let job = JobSpec::Normalize {
                input: part.clone(),
                duration: per_part,
                output: pipeline.scratch.artifact("normalized", extension),
            };
            match pipeline.runner.run(&job).await {
                Ok(path) => normalized.push(path),
                Err(e) => {
                    remove_artifacts(&normalized);
                    return Err(e);
                }
            }
        }

        let result = pipeline.concatenator.concat(&normalized, &assembled).await;
        remove_artifacts(&normalized);
        result.map(|path| (path, true))
    }
}

async fn realize_segment(
    planner: &SmartCutPlanner,
    executor: &SmartCutExecutor,
    segment: &Segment,
    output: &Path,
) -> CutlistResult<PathBuf> {
    let plan = planner
        .plan(segment.source.as_path(), segment.start, segment.end)
        .await?;
    executor.execute(plan, output).await
}

/// Trim segment ends that run past their source
fn clamp_to_sources(segments: &[Segment], probes: &HashMap<SourceId, MediaProbe>) -> Vec<Segment> {
    segments
        .iter()
        .filter_map(|segment| {
            let duration = probes
                .get(&segment.source)
                .map(|probe| probe.duration)
                .filter(|duration| *duration > 0.0);
            match duration {
                Some(duration) if segment.end > duration => {
                    warn!(
                        "Segment {:.3}-{:.3} runs past {} ({:.3}s), trimming",
                        segment.start, segment.end, segment.source, duration
                    );
                    Segment::new(segment.start, duration, segment.source.clone()).ok()
                }
                _ => Some(segment.clone()),
            }
        })
        .collect()
}

fn check_destination(output: &Path) -> CutlistResult<()> {
    let parent = destination_dir(output);
    if !parent.is_dir() {
        return Err(CutlistError::planning(format!(
            "output directory {} does not exist",
            parent.display()
        )));
    }
    Ok(())
}

fn destination_dir(output: &Path) -> &Path {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn extension_of(path: &Path) -> &str {
    path.extension().and_then(|ext| ext.to_str()).unwrap_or("mp4")
}

/// Move the finished file to `output` without exposing a partial file there
pub fn move_into_place(finished: &Path, output: &Path) -> CutlistResult<()> {
    if fs::rename(finished, output).is_ok() {
        return Ok(());
    }

    let mut staged = tempfile::Builder::new()
        .prefix(".cutlist-")
        .suffix(".partial")
        .tempfile_in(destination_dir(output))?;
    let mut source = fs::File::open(finished)?;
    std::io::copy(&mut source, staged.as_file_mut())?;
    staged.as_file().sync_all()?;
    staged.persist(output).map_err(|e| CutlistError::Io(e.error))?;
    remove_artifacts([&finished.to_path_buf()]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{StreamInfo, StreamKind};

    fn probe(duration: f64) -> MediaProbe {
        MediaProbe {
            path: "a.mp4".into(),
            duration,
            streams: vec![StreamInfo {
                index: 0,
                kind: StreamKind::Video,
                codec: "h264".into(),
                width: Some(1920),
                height: Some(1080),
                sample_rate: None,
            }],
        }
    }

    #[test]
    fn test_clamp_to_sources() {
        let mut probes = HashMap::new();
        probes.insert(SourceId::from("a.mp4"), probe(50.0));
        let segments = vec![
            Segment::new(0.0, 10.0, "a.mp4").unwrap(),
            Segment::new(40.0, 60.0, "a.mp4").unwrap(),
            Segment::new(60.0, 70.0, "a.mp4").unwrap(),
        ];
        let clamped = clamp_to_sources(&segments, &probes);
        assert_eq!(clamped.len(), 2);
        assert_eq!(clamped[1].end, 50.0);
    }

    #[test]
    fn test_move_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let finished = dir.path().join("rendered.mp4");
        fs::write(&finished, b"video").unwrap();
        let output = dir.path().join("final.mp4");

        move_into_place(&finished, &output).unwrap();
        assert_eq!(fs::read(&output).unwrap(), b"video");
        assert!(!finished.exists());
    }

    #[test]
    fn test_missing_destination_dir_is_rejected() {
        assert!(check_destination(Path::new("/nonexistent/cutlist/out.mp4")).is_err());
        assert!(check_destination(Path::new("out.mp4")).is_ok());
    }
}
