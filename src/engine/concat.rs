//! Chunked concatenation
//!
//! Joins any number of clips with the encoder's lossless concat mode while
//! never handing more than `batch_size` inputs to one invocation. Inputs must
//! share codec and container parameters.

use std::fmt::Write as _;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use tracing::{info, warn};

use crate::engine::runner::{JobRunner, JobSpec};
use crate::error::{CutlistError, CutlistResult};
use crate::utils::temp::{remove_artifacts, ScratchSpace};

/// How a list of clips is joined
#[derive(Debug, Clone, PartialEq)]
pub enum ConcatPlan {
    /// One concat invocation over every input
    SinglePass { inputs: Vec<PathBuf> },
    /// Batches joined to intermediates, then the intermediates joined
    Chunked { inputs: Vec<PathBuf>, batch_size: usize },
}

impl ConcatPlan {
    pub fn for_inputs(inputs: &[PathBuf], batch_size: usize) -> Self {
        if inputs.len() <= batch_size {
            ConcatPlan::SinglePass {
                inputs: inputs.to_vec(),
            }
        } else {
            ConcatPlan::Chunked {
                inputs: inputs.to_vec(),
                batch_size,
            }
        }
    }

    pub fn inputs(&self) -> &[PathBuf] {
        match self {
            ConcatPlan::SinglePass { inputs } | ConcatPlan::Chunked { inputs, .. } => inputs,
        }
    }

    /// A failed chunked join is retried once over the original inputs
    pub fn fallback(&self) -> Option<ConcatPlan> {
        match self {
            ConcatPlan::Chunked { inputs, .. } => Some(ConcatPlan::SinglePass {
                inputs: inputs.clone(),
            }),
            ConcatPlan::SinglePass { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConcatPlan::SinglePass { .. } => "single-pass",
            ConcatPlan::Chunked { .. } => "chunked",
        }
    }
}

/// Quote a path for a concat list line
pub fn escape_list_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', "'\\''")
}

/// Contents of a concat list file
pub fn concat_list(inputs: &[PathBuf]) -> String {
    let mut list = String::new();
    for input in inputs {
        let _ = writeln!(list, "file '{}'", escape_list_path(input));
    }
    list
}

type ConcatFuture<'a> = Pin<Box<dyn Future<Output = CutlistResult<()>> + Send + 'a>>;

/// Joins clips in bounded batches
#[derive(Clone)]
pub struct ChunkedConcatenator {
    runner: JobRunner,
    scratch: Arc<ScratchSpace>,
    batch_size: usize,
}

impl ChunkedConcatenator {
    pub fn new(runner: JobRunner, scratch: Arc<ScratchSpace>, batch_size: usize) -> Self {
        Self {
            runner,
            scratch,
            batch_size: batch_size.max(2),
        }
    }

    /// Join `inputs`, in order, into `output`
    pub async fn concat(&self, inputs: &[PathBuf], output: &Path) -> CutlistResult<PathBuf> {
        if inputs.is_empty() {
            return Err(CutlistError::concat("nothing to concatenate"));
        }

        let mut plan = ConcatPlan::for_inputs(inputs, self.batch_size);
        loop {
            let mut intermediates = Vec::new();
            let result = self.execute(&plan, output, &mut intermediates).await;
            remove_artifacts(&intermediates);

            match result {
                Ok(()) => {
                    info!(
                        "Joined {} clips into {} ({})",
                        inputs.len(),
                        output.display(),
                        plan.name()
                    );
                    return Ok(output.to_path_buf());
                }
                Err(CutlistError::Cancelled) => return Err(CutlistError::Cancelled),
                Err(e) => match plan.fallback() {
                    Some(next) => {
                        warn!("{} concat failed ({}), trying {}", plan.name(), e, next.name());
                        plan = next;
                    }
                    None => return Err(into_concat_error(e)),
                },
            }
        }
    }

    fn execute<'a>(
        &'a self,
        plan: &'a ConcatPlan,
        output: &'a Path,
        intermediates: &'a mut Vec<PathBuf>,
    ) -> ConcatFuture<'a> {
        Box::pin(async move {
            match plan {
                ConcatPlan::SinglePass { inputs } => self.single_pass(inputs, output).await,
                ConcatPlan::Chunked { inputs, batch_size } => {
                    let mut joined = Vec::new();
                    for batch in inputs.chunks(*batch_size) {
                        let chunk = self.scratch.artifact("chunk", extension_of(output));
                        intermediates.push(chunk.clone());
                        self.single_pass(batch, &chunk).await?;
                        joined.push(chunk);
                    }
                    let next = ConcatPlan::for_inputs(&joined, *batch_size);
                    self.execute(&next, output, intermediates).await
                }
            }
        })
    }

    async fn single_pass(&self, inputs: &[PathBuf], output: &Path) -> CutlistResult<()> {
        let list = self.scratch.artifact("concat", "txt");
        let result = match fs::write(&list, concat_list(inputs)) {
            Ok(()) => self
                .runner
                .run(&JobSpec::Concat {
                    list: list.clone(),
                    output: output.to_path_buf(),
                })
                .await
                .map(|_| ()),
            Err(e) => Err(e.into()),
        };
        remove_artifacts([&list]);
        result
    }
}

fn extension_of(path: &Path) -> &str {
    path.extension().and_then(|ext| ext.to_str()).unwrap_or("mp4")
}

fn into_concat_error(error: CutlistError) -> CutlistError {
    match error {
        CutlistError::Concat { .. } | CutlistError::Cancelled => error,
        other => CutlistError::concat(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("part-{}.mp4", i))).collect()
    }

    #[test]
    fn test_plan_boundary() {
        assert!(matches!(ConcatPlan::for_inputs(&paths(25), 25), ConcatPlan::SinglePass { .. }));
        assert!(matches!(ConcatPlan::for_inputs(&paths(26), 25), ConcatPlan::Chunked { .. }));
    }

    #[test]
    fn test_chunked_falls_back_to_original_inputs() {
        let inputs = paths(30);
        let fallback = ConcatPlan::for_inputs(&inputs, 25).fallback().unwrap();
        assert_eq!(fallback, ConcatPlan::SinglePass { inputs });
        assert!(fallback.fallback().is_none());
    }

    #[test]
    fn test_concat_list_escapes_quotes() {
        let list = concat_list(&[PathBuf::from("/tmp/a.mp4"), PathBuf::from("/tmp/it's.mp4")]);
        assert_eq!(list, "file '/tmp/a.mp4'\nfile '/tmp/it'\\''s.mp4'\n");
    }
}
