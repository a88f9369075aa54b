//! The chunked read → process → write driver.
//!
//! A [`ChunkStep`] mirrors the job host's step contract (before-step, total count, read,
//! process, write, after-step) as plain methods, so any driver can run it: the
//! [`run_step`] loop below, a scheduler callback, or a test calling the methods by hand.

use crate::error::{ExportError, RunResult, RunStats};
use crate::progress::ProgressScope;

/// What `init` decided.
pub enum StepStart {
    /// Resources are acquired; stream the source.
    Ready,
    /// Nothing to stream (e.g. the step is disabled). Nothing was acquired.
    Finished(RunResult),
}

pub trait ChunkStep {
    type Item;
    type Output;

    /// Validate configuration and acquire resources. An error here means nothing is open.
    fn init(&mut self) -> Result<StepStart, ExportError>;

    /// Items the source will produce; progress only.
    fn total_count(&self) -> u64;

    /// Next source item, or `None` when exhausted.
    fn next(&mut self) -> Option<Result<Self::Item, ExportError>>;

    /// Turn one item into output. `Ok(None)` drops the item without error.
    fn transform(&mut self, item: Self::Item) -> Result<Option<Self::Output>, ExportError>;

    /// Write one chunk; returns the number of records written.
    fn flush(&mut self, chunk: Vec<Self::Output>) -> Result<u64, ExportError>;

    /// Release everything and produce the terminal status. Called exactly once after a
    /// successful `init`, whether streaming finished or failed.
    fn close(&mut self, stats: RunStats, failure: Option<ExportError>) -> RunResult;
}

/// Drive `step` to completion, buffering up to `chunk_size` outputs per write cycle.
pub fn run_step<S: ChunkStep>(step: &mut S, chunk_size: usize, progress_label: Option<&str>) -> RunResult {
    match step.init() {
        Ok(StepStart::Ready) => {}
        Ok(StepStart::Finished(result)) => return result,
        Err(e) => {
            tracing::error!("step initialisation failed: {}", e);
            return RunResult::from_error("FAILED during initialisation", &e, RunStats::default());
        }
    }

    let chunk_size = chunk_size.max(1);
    let total = step.total_count();
    let progress = match progress_label {
        Some(label) => ProgressScope::count(label, total),
        None => ProgressScope::hidden(),
    };
    tracing::info!("Streaming {} items in chunks of {}.", total, chunk_size);

    let mut stats = RunStats::default();
    let mut chunk = Vec::with_capacity(chunk_size);

    let failure = loop {
        let item = match step.next() {
            None => break None,
            Some(Ok(item)) => item,
            Some(Err(e)) if e.is_entity() => {
                tracing::warn!("skipping unreadable item: {}", e);
                stats.entities_skipped += 1;
                progress.inc_items(1);
                continue;
            }
            Some(Err(e)) => break Some(e),
        };
        stats.entities_read += 1;
        progress.inc_items(1);

        match step.transform(item) {
            Ok(Some(out)) => chunk.push(out),
            Ok(None) => stats.entities_skipped += 1,
            Err(e) if e.is_entity() => {
                tracing::warn!("skipping item: {}", e);
                stats.entities_skipped += 1;
            }
            Err(e) => break Some(e),
        }

        if chunk.len() >= chunk_size {
            match step.flush(std::mem::replace(&mut chunk, Vec::with_capacity(chunk_size))) {
                Ok(n) => stats.records_written += n,
                Err(e) => break Some(e),
            }
        }
    };

    // Drain the tail only when streaming ended cleanly.
    let failure = match failure {
        None if !chunk.is_empty() => match step.flush(chunk) {
            Ok(n) => {
                stats.records_written += n;
                None
            }
            Err(e) => Some(e),
        },
        other => other,
    };

    progress.finish(if failure.is_some() { "failed" } else { "done" });
    step.close(stats, failure)
}
