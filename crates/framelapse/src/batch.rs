//! Parallel alignment of independent frames with atomic output files.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::api::{AlignRequest, ContentType, Stabilizer};
use crate::capability::ImageProcessor;
use crate::error::{AlignError, ProcessingError};
use crate::stabilize::{CancellationToken, RunControl, StabilizationProgress, StabilizationResult};

/// One frame on disk and where its aligned version goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub source: PathBuf,
    pub output: PathBuf,
}

impl BatchJob {
    pub fn new(source: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Worker threads; must be at least 1.
    pub concurrency: usize,
    pub content_type: ContentType,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            content_type: ContentType::Face,
        }
    }
}

/// Per-frame outcome, in job order.
#[derive(Debug)]
pub struct BatchOutcome {
    pub index: usize,
    pub source: PathBuf,
    pub output: PathBuf,
    pub result: Result<StabilizationResult, AlignError>,
}

impl BatchOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Progress observer shared by all workers: `(job index, progress)`.
pub type BatchProgressFn<'p> = dyn Fn(usize, &StabilizationProgress) + Sync + 'p;

/// Align every job on its own worker.
///
/// Each output is written to a temporary file beside its destination and
/// renamed into place only when the frame aligned and saved; failed or
/// cancelled frames leave no output. One frame's failure does not affect
/// the others.
pub fn align_batch<P: ImageProcessor>(
    stabilizer: &Stabilizer<'_, P>,
    jobs: &[BatchJob],
    reference: Option<&P::Image>,
    options: &BatchOptions,
    cancel: Option<&CancellationToken>,
    progress: Option<&BatchProgressFn<'_>>,
) -> Result<Vec<BatchOutcome>, AlignError> {
    if options.concurrency == 0 {
        return Err(AlignError::invalid("batch concurrency must be at least 1"));
    }
    if options.content_type == ContentType::Landscape && reference.is_none() {
        return Err(AlignError::invalid("landscape batch needs a reference frame"));
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.concurrency)
        .build()
        .map_err(|e| AlignError::invalid(format!("thread pool: {e}")))?;

    tracing::info!(
        jobs = jobs.len(),
        concurrency = options.concurrency,
        content_type = ?options.content_type,
        "starting batch alignment"
    );

    let outcomes: Vec<BatchOutcome> = pool.install(|| {
        jobs.par_iter()
            .enumerate()
            .map(|(index, job)| {
                let result =
                    align_job(stabilizer, index, job, reference, options, cancel, progress);
                if let Err(e) = &result {
                    tracing::warn!(
                        index,
                        source = %job.source.display(),
                        error = %e,
                        "frame failed"
                    );
                }
                BatchOutcome {
                    index,
                    source: job.source.clone(),
                    output: job.output.clone(),
                    result,
                }
            })
            .collect()
    });

    let aligned = outcomes.iter().filter(|o| o.is_ok()).count();
    tracing::info!(aligned, failed = outcomes.len() - aligned, "batch alignment finished");
    Ok(outcomes)
}

fn align_job<P: ImageProcessor>(
    stabilizer: &Stabilizer<'_, P>,
    index: usize,
    job: &BatchJob,
    reference: Option<&P::Image>,
    options: &BatchOptions,
    cancel: Option<&CancellationToken>,
    progress: Option<&BatchProgressFn<'_>>,
) -> Result<StabilizationResult, AlignError> {
    let cancelled = || cancel.is_some_and(CancellationToken::is_cancelled);
    if cancelled() {
        return Err(AlignError::Cancelled);
    }
    let processor = stabilizer.processor();
    let frame = processor.load(&job.source)?;

    let mut forward = |p: &StabilizationProgress| {
        if let Some(cb) = progress {
            cb(index, p);
        }
    };
    let mut control = RunControl::new().with_progress(&mut forward);
    if let Some(token) = cancel {
        control = control.with_cancel(token);
    }

    let mut request = AlignRequest::new(&frame, options.content_type);
    if let Some(reference) = reference {
        request = request.with_reference(reference);
    }
    let stabilized = stabilizer.align(request, control)?;
    if cancelled() {
        return Err(AlignError::Cancelled);
    }
    write_atomically(processor, &stabilized.image, &job.output)?;
    Ok(stabilized.result)
}

/// Save through a temporary file in the destination directory, then rename.
fn write_atomically<P: ImageProcessor>(
    processor: &P,
    image: &P::Image,
    output: &Path,
) -> Result<(), ProcessingError> {
    let dir = match output.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    let suffix = output
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let temp = tempfile::Builder::new()
        .prefix(".framelapse-")
        .suffix(&suffix)
        .tempfile_in(dir)?;
    processor.save(image, temp.path())?;
    temp.persist(output).map_err(|e| ProcessingError::Io(e.error))?;
    Ok(())
}
