//! Realizing cut plans

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::engine::concat::ChunkedConcatenator;
use crate::engine::runner::{JobRunner, JobSpec};
use crate::error::CutlistResult;
use crate::planner::{CutPlan, PartMode, PlannedPart};
use crate::utils::temp::{remove_artifacts, ScratchSpace};

/// Executes a [`CutPlan`], walking its fallback chain on failure
#[derive(Clone)]
pub struct SmartCutExecutor {
    runner: JobRunner,
    concatenator: ChunkedConcatenator,
    scratch: Arc<ScratchSpace>,
}

impl SmartCutExecutor {
    pub fn new(runner: JobRunner, concatenator: ChunkedConcatenator, scratch: Arc<ScratchSpace>) -> Self {
        Self {
            runner,
            concatenator,
            scratch,
        }
    }

    /// Realize `plan` into `output`
    pub async fn execute(&self, plan: CutPlan, output: &Path) -> CutlistResult<PathBuf> {
        let mut plan = plan;
        loop {
            match self.execute_once(&plan, output).await {
                Ok(path) => return Ok(path),
                Err(e) if !e.is_recoverable() => return Err(e),
                Err(e) => match plan.fallback() {
                    Some(next) => {
                        warn!(
                            "{} plan for {} failed during {} ({}), falling back to {}",
                            plan.name(),
                            plan.source().display(),
                            e.stage(),
                            e,
                            next.name()
                        );
                        plan = next;
                    }
                    None => return Err(e),
                },
            }
        }
    }

    async fn execute_once(&self, plan: &CutPlan, output: &Path) -> CutlistResult<PathBuf> {
        let parts = plan.parts();
        if let [part] = parts.as_slice() {
            return self.runner.run(&part_job(plan.source(), part, output.to_path_buf())).await;
        }

        let extension = output.extension().and_then(|ext| ext.to_str()).unwrap_or("mp4");
        let mut realized = Vec::with_capacity(parts.len());
        let mut result: CutlistResult<()> = Ok(());
        for part in &parts {
            let path = self.scratch.artifact(part.role.as_str(), extension);
            match self.runner.run(&part_job(plan.source(), part, path)).await {
                Ok(path) => realized.push(path),
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }

        let joined = match result {
            Ok(()) => self.concatenator.concat(&realized, output).await,
            Err(e) => Err(e),
        };
        remove_artifacts(&realized);

        match joined {
            Ok(path) => {
                info!(
                    "Realized {:.3}s of {} with {:.3}s re-encoded",
                    plan.duration(),
                    plan.source().display(),
                    plan.reencoded_seconds()
                );
                Ok(path)
            }
            Err(e) => Err(e),
        }
    }
}

/// Job realizing one planned part
pub fn part_job(source: &Path, part: &PlannedPart, output: PathBuf) -> JobSpec {
    match part.mode {
        PartMode::Copy => JobSpec::Copy {
            source: source.to_path_buf(),
            start: part.start,
            end: part.end,
            output,
        },
        PartMode::Reencode => JobSpec::Reencode {
            source: source.to_path_buf(),
            start: part.start,
            end: part.end,
            output,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::PartRole;

    #[test]
    fn test_part_job_follows_mode() {
        let body = PlannedPart {
            role: PartRole::Body,
            mode: PartMode::Copy,
            start: 12.0,
            end: 95.0,
        };
        let job = part_job(Path::new("a.mp4"), &body, "body.mp4".into());
        assert_eq!(job.stage(), "copy");
        assert_eq!(job.duration(), 83.0);

        let head = PlannedPart {
            role: PartRole::Head,
            mode: PartMode::Reencode,
            ..body
        };
        assert!(part_job(Path::new("a.mp4"), &head, "head.mp4".into()).is_reencode());
    }
}
