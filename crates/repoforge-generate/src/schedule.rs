//! Priority-ordered parallel task execution.
//!
//! Tasks flow through one bounded channel; priority is realized purely by
//! enqueue order (every task of tier P is queued before any of tier P+1),
//! so a higher tier may start before a lower tier fully drains. That bias
//! is safe because templates read only the in-memory schema, never sibling
//! artifacts on disk.
//!
//! On the first task failure the scheduler stores the error, flips the stop
//! flag, and stops dispatching; queued tasks drain untouched and in-flight
//! renders run to completion. Later errors are logged, not surfaced.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use repoforge_core::{ForgeError, Result, Table};
use tokio::sync::mpsc;

use crate::render::{ArtifactKind, RenderedArtifact, Renderer};

/// One unit of work: render a single artifact for a single table
#[derive(Debug, Clone)]
pub struct Task {
    pub kind: ArtifactKind,
    pub table: Arc<Table>,
}

impl Task {
    pub fn priority(&self) -> u8 {
        self.kind.priority()
    }
}

/// Fixed-size worker pool over a bounded task queue
pub struct WorkScheduler {
    workers: usize,
}

impl WorkScheduler {
    /// `workers` is assumed pre-clamped by the configuration layer; a
    /// stray zero still collapses to sequential execution.
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Execute all tasks. Returns the rendered artifacts on success, the
    /// first error otherwise.
    pub async fn run(
        &self,
        renderer: Arc<Renderer>,
        mut tasks: Vec<Task>,
    ) -> Result<Vec<RenderedArtifact>> {
        tasks.sort_by_key(Task::priority);
        if tasks.is_empty() {
            return Ok(Vec::new());
        }
        if self.workers == 1 {
            return run_sequential(&renderer, tasks);
        }
        self.run_parallel(renderer, tasks).await
    }

    async fn run_parallel(
        &self,
        renderer: Arc<Renderer>,
        tasks: Vec<Task>,
    ) -> Result<Vec<RenderedArtifact>> {
        let (tx, rx) = mpsc::channel::<Task>(self.workers * 2);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let stop = Arc::new(AtomicBool::new(false));
        let first_error: Arc<Mutex<Option<ForgeError>>> = Arc::new(Mutex::new(None));
        let results: Arc<Mutex<Vec<RenderedArtifact>>> = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::with_capacity(self.workers);
        for worker in 0..self.workers {
            let renderer = renderer.clone();
            let rx = rx.clone();
            let stop = stop.clone();
            let first_error = first_error.clone();
            let results = results.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    let task = { rx.lock().await.recv().await };
                    let Some(task) = task else { break };

                    // Drain without dispatching once cancelled.
                    if stop.load(Ordering::Acquire) {
                        continue;
                    }

                    match renderer.render(&task.table, task.kind) {
                        Ok(artifact) => results.lock().push(artifact),
                        Err(e) => {
                            let mut slot = first_error.lock();
                            if slot.is_none() {
                                tracing::error!(
                                    worker,
                                    table = %task.table.name,
                                    kind = %task.kind,
                                    error = %e,
                                    "task failed, cancelling run"
                                );
                                *slot = Some(e);
                                stop.store(true, Ordering::Release);
                            } else {
                                tracing::warn!(
                                    worker,
                                    table = %task.table.name,
                                    kind = %task.kind,
                                    error = %e,
                                    "task failed after cancellation"
                                );
                            }
                        }
                    }
                }
            }));
        }

        // Feed the bounded queue tier by tier; the sort above guarantees
        // priority order. Enqueueing blocks when the channel is full.
        for task in tasks {
            if stop.load(Ordering::Acquire) {
                break;
            }
            if tx.send(task).await.is_err() {
                break;
            }
        }
        drop(tx);

        for handle in handles {
            if handle.await.is_err() {
                tracing::error!("worker task panicked");
            }
        }

        if let Some(e) = first_error.lock().take() {
            return Err(e);
        }
        let mut results = Arc::try_unwrap(results)
            .map(Mutex::into_inner)
            .unwrap_or_default();
        results.sort_by(|a, b| {
            (a.kind.priority(), &a.table).cmp(&(b.kind.priority(), &b.table))
        });
        Ok(results)
    }
}

/// Sequential mode: identical failure semantics, no cancellation machinery
fn run_sequential(renderer: &Renderer, tasks: Vec<Task>) -> Result<Vec<RenderedArtifact>> {
    let mut results = Vec::with_capacity(tasks.len());
    for task in tasks {
        match renderer.render(&task.table, task.kind) {
            Ok(artifact) => results.push(artifact),
            Err(e) => {
                tracing::error!(
                    table = %task.table.name,
                    kind = %task.kind,
                    error = %e,
                    "task failed, aborting sequential run"
                );
                return Err(e);
            }
        }
    }
    Ok(results)
}

/// Expand tables into the full task list, honoring the tests toggle
pub fn build_tasks(tables: &[Arc<Table>], with_tests: bool) -> Vec<Task> {
    let mut tasks = Vec::new();
    for kind in ArtifactKind::ALL {
        if kind == ArtifactKind::Test && !with_tests {
            continue;
        }
        for table in tables {
            tasks.push(Task {
                kind,
                table: table.clone(),
            });
        }
    }
    tasks
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
