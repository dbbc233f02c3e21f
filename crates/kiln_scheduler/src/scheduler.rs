//! Readiness-queue scheduling over a bounded worker pool.
//!
//! The calling thread is the only dispatcher. It owns the in-degree table,
//! the ready queue and the table of known output URLs; workers only run
//! chains and talk to the cache. A module becomes ready once every module
//! it references through an asset edge has finished, so its specifiers can
//! be rewritten to final URLs before its chain runs. Import edges never
//! delay dispatch.

use std::collections::VecDeque;
use std::sync::{mpsc, Arc, Mutex, PoisonError};

use kiln_cache::{Cache, CacheEntry, CacheKey};
use kiln_common::{AssetKind, ContentHash, InternalError, KilnResult};
use kiln_graph::{ModuleGraph, ModuleId};
use kiln_transform::{ChainSet, StepFailure};

use crate::cancel::CancelToken;
use crate::error::{CacheOp, CacheWarning, ModuleError};
use crate::identity::IdentityAssigner;
use crate::results::{TransformOutput, TransformResults};
use crate::rewrite::rewrite_input;

/// A chain invocation handed to a worker.
struct Job {
    module: ModuleId,
    kind: AssetKind,
    extension: String,
    input: Vec<u8>,
}

enum Outcome {
    Done { entry: Arc<CacheEntry>, cached: bool },
    Failed(StepFailure),
    Cancelled,
}

/// Sent back from a worker thread.
struct JobResult {
    module: ModuleId,
    outcome: Outcome,
    warnings: Vec<CacheWarning>,
}

/// Runs transform chains over a module graph.
pub struct Scheduler<'a> {
    chains: &'a ChainSet,
    assigner: &'a dyn IdentityAssigner,
    workers: usize,
}

impl<'a> Scheduler<'a> {
    /// Creates a scheduler using one worker per available CPU.
    pub fn new(chains: &'a ChainSet, assigner: &'a dyn IdentityAssigner) -> Self {
        Self {
            chains,
            assigner,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }

    /// Overrides the worker count. `None` keeps the default; zero is
    /// treated as one.
    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        if let Some(n) = workers {
            self.workers = n.max(1);
        }
        self
    }

    /// The configured worker count.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Transforms every module of `graph`.
    ///
    /// Module failures and cache problems are collected in the returned
    /// results. `Err` is reserved for broken internal invariants.
    #[tracing::instrument(skip_all, fields(modules = graph.len(), workers = self.workers))]
    pub fn run(
        &self,
        graph: &ModuleGraph,
        cache: Option<&Cache>,
        cancel: &CancelToken,
    ) -> KilnResult<TransformResults> {
        let total = graph.len();
        let mut results = TransformResults::with_capacity(total);
        if total == 0 {
            return Ok(results);
        }

        let mut in_degree = vec![0usize; total];
        let mut waiting: Vec<Vec<ModuleId>> = vec![Vec::new(); total];
        for module in graph.modules() {
            let prerequisites = graph.prerequisites(module.id);
            in_degree[module.id.index()] = prerequisites.len();
            for p in prerequisites {
                waiting[p.index()].push(module.id);
            }
        }
        let mut ready: VecDeque<ModuleId> = graph
            .modules()
            .iter()
            .map(|m| m.id)
            .filter(|id| in_degree[id.index()] == 0)
            .collect();

        let mut urls: Vec<Option<String>> = vec![None; total];
        let mut failed = vec![false; total];
        let workers = self.workers.min(total);
        let chains = self.chains;

        // Workers borrow the receiver for the whole scope, so it must
        // outlive it. The senders move in and drop when dispatching ends.
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (result_tx, result_rx) = mpsc::channel::<JobResult>();
        let job_rx = Mutex::new(job_rx);

        std::thread::scope(|s| -> KilnResult<()> {
            let job_tx = job_tx;
            let job_rx = &job_rx;

            for _ in 0..workers {
                let tx = result_tx.clone();
                s.spawn(move || loop {
                    let job = match job_rx.lock().unwrap_or_else(PoisonError::into_inner).recv() {
                        Ok(job) => job,
                        Err(_) => break,
                    };
                    if tx.send(execute(job, chains, cache, cancel)).is_err() {
                        break;
                    }
                });
            }
            drop(result_tx);

            let lost = || InternalError::new("transform workers exited early");
            let mut in_flight = 0usize;

            loop {
                while !cancel.is_cancelled() {
                    let Some(id) = ready.pop_front() else { break };
                    let module = graph.module(id);

                    let blocked = graph
                        .prerequisites(id)
                        .into_iter()
                        .find(|p| failed[p.index()]);
                    let error = match (blocked, module.kind) {
                        (Some(p), _) => Some(ModuleError::PrerequisiteFailed {
                            module: id,
                            path: module.rel_path.clone(),
                            prerequisite: p,
                            prerequisite_path: graph.module(p).rel_path.clone(),
                        }),
                        (None, None) => Some(ModuleError::UnsupportedAssetType {
                            module: id,
                            path: module.rel_path.clone(),
                        }),
                        (None, Some(_)) => None,
                    };
                    if let Some(error) = error {
                        tracing::debug!(module = %module.rel_path, "{error}");
                        results.errors.push(error);
                        results.stats.failed += 1;
                        failed[id.index()] = true;
                        release(id, &waiting, &mut in_degree, &mut ready);
                        continue;
                    }

                    let Some(kind) = module.kind else { continue };
                    let input = rewrite_input(module, &urls).into_owned();
                    tracing::trace!(module = %module.rel_path, "dispatching");
                    job_tx
                        .send(Job {
                            module: id,
                            kind,
                            extension: module.extension().to_string(),
                            input,
                        })
                        .map_err(|_| lost())?;
                    in_flight += 1;
                }

                if in_flight == 0 {
                    break;
                }
                let done = result_rx.recv().map_err(|_| lost())?;
                in_flight -= 1;
                results.cache_warnings.extend(done.warnings);

                let id = done.module;
                let module = graph.module(id);
                match done.outcome {
                    Outcome::Done { entry, cached } => {
                        if cached {
                            results.stats.cache_hits += 1;
                        } else {
                            results.stats.executed += 1;
                        }
                        let emitted = match module.kind {
                            Some(kind) if kind.is_standalone() => {
                                let url = self.assigner.assign(module, &entry);
                                urls[id.index()] = Some(url.clone());
                                Some(url)
                            }
                            _ => None,
                        };
                        results.outputs[id.index()] = Some(TransformOutput {
                            module: id,
                            entry,
                            emitted,
                            cached,
                        });
                    }
                    Outcome::Failed(failure) => {
                        tracing::debug!(module = %module.rel_path, "{failure}");
                        results.errors.push(ModuleError::TransformStep {
                            module: id,
                            path: module.rel_path.clone(),
                            step: failure.step,
                            cause: failure.error,
                        });
                        results.stats.failed += 1;
                        failed[id.index()] = true;
                    }
                    Outcome::Cancelled => continue,
                }
                release(id, &waiting, &mut in_degree, &mut ready);
            }
            Ok(())
        })?;

        let finished = results.success_count() + results.stats.failed;
        results.stats.skipped = total - finished;
        if cancel.is_cancelled() && results.stats.skipped > 0 {
            results.cancelled = true;
            tracing::debug!(skipped = results.stats.skipped, "transform run cancelled");
        } else if results.stats.skipped > 0 {
            return Err(InternalError::new(format!(
                "{} modules never became ready",
                results.stats.skipped
            )));
        }

        tracing::debug!(
            executed = results.stats.executed,
            cache_hits = results.stats.cache_hits,
            failed = results.stats.failed,
            "transform run finished"
        );
        Ok(results)
    }
}

/// Marks `id` finished and queues dependents whose last prerequisite it was.
fn release(
    id: ModuleId,
    waiting: &[Vec<ModuleId>],
    in_degree: &mut [usize],
    ready: &mut VecDeque<ModuleId>,
) {
    for &dependent in &waiting[id.index()] {
        in_degree[dependent.index()] -= 1;
        if in_degree[dependent.index()] == 0 {
            ready.push_back(dependent);
        }
    }
}

/// Runs on a worker: cache lookup, chain, cache store.
fn execute(job: Job, chains: &ChainSet, cache: Option<&Cache>, cancel: &CancelToken) -> JobResult {
    let module = job.module;
    let mut warnings = Vec::new();
    let finish = |outcome, warnings| JobResult {
        module,
        outcome,
        warnings,
    };

    if cancel.is_cancelled() {
        return finish(Outcome::Cancelled, warnings);
    }

    let chain = chains.get(job.kind);
    let key = CacheKey::new(
        ContentHash::from_bytes(&job.input),
        chain.identity(),
        chain.tool_version(),
    );

    if let Some(cache) = cache {
        match cache.lookup(&key) {
            Ok(Some(entry)) => {
                tracing::trace!(%key, "cache hit");
                return finish(Outcome::Done { entry, cached: true }, warnings);
            }
            Ok(None) => tracing::trace!(%key, "cache miss"),
            Err(error) => {
                tracing::warn!("cache lookup failed, recomputing: {error}");
                warnings.push(CacheWarning {
                    module,
                    op: CacheOp::Lookup,
                    error,
                });
            }
        }
    }

    let output = match chain.apply_with(&job.input, |_| !cancel.is_cancelled()) {
        Ok(Some(output)) => output,
        Ok(None) => return finish(Outcome::Cancelled, warnings),
        Err(failure) => return finish(Outcome::Failed(failure), warnings),
    };
    if cancel.is_cancelled() {
        return finish(Outcome::Cancelled, warnings);
    }

    let entry = Arc::new(CacheEntry::new(output, job.kind, job.extension));
    if let Some(cache) = cache {
        if let Err(error) = cache.store(&key, Arc::clone(&entry)) {
            tracing::warn!("cache store failed: {error}");
            warnings.push(CacheWarning {
                module,
                op: CacheOp::Store,
                error,
            });
        }
    }
    finish(Outcome::Done { entry, cached: false }, warnings)
}
