// src/runner.rs

//! Parallel build runner
//!
//! Drives an [`Executor`] over a [`BuildPlan`] on a bounded worker pool. A
//! step starts only after all of its dependencies succeeded. After the first
//! failure no new step is started; steps already running finish, external
//! steps whose dependencies are satisfied are still recorded as external, and
//! every other step that never started is reported as skipped (a dependency
//! failed) or cancelled.

use crate::error::{Error, Result};
use crate::plan::{BuildPlan, Composer};
use crate::recipe::{BuildJob, ExecOutcome, Executor, RecipeRegistry};
use crate::resolver::Resolver;
use crate::spec::PackageSpec;
use crate::version::Version;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Final state of one plan step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NodeStatus {
    /// Built and installed
    Succeeded,
    /// Host-provided, nothing to do
    External,
    /// The executor reported a failure
    Failed { reason: String },
    /// Not started because a dependency did not build
    Skipped { dependency: String },
    /// Not started because the run stopped after another failure
    Cancelled,
}

impl NodeStatus {
    /// True for steps whose prefix is usable by dependents
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Succeeded | Self::External)
    }
}

/// Per-step result
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub name: String,
    pub version: Version,
    pub prefix: PathBuf,
    #[serde(flatten)]
    pub status: NodeStatus,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub log: String,
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Result of running a plan, one entry per step in plan order
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub nodes: Vec<NodeReport>,
}

impl BuildReport {
    /// True if every step succeeded or is external
    pub fn is_success(&self) -> bool {
        self.nodes.iter().all(|n| n.status.is_ok())
    }

    pub fn node(&self, name: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn status_of(&self, name: &str) -> Option<&NodeStatus> {
        self.node(name).map(|n| &n.status)
    }

    /// Steps the executor reported as failed
    pub fn failed(&self) -> impl Iterator<Item = &NodeReport> {
        self.nodes
            .iter()
            .filter(|n| matches!(n.status, NodeStatus::Failed { .. }))
    }

    /// Count steps with a given status kind
    pub fn count(&self, pred: impl Fn(&NodeStatus) -> bool) -> usize {
        self.nodes.iter().filter(|n| pred(&n.status)).count()
    }

    /// Turn the first failure into a `BuildFailure` error
    pub fn into_result(self) -> Result<Self> {
        let failure = self.failed().next().map(|n| match &n.status {
            NodeStatus::Failed { reason } => (n.name.clone(), reason.clone()),
            _ => (n.name.clone(), String::new()),
        });
        match failure {
            Some((package, reason)) => Err(Error::BuildFailure { package, reason }),
            None => Ok(self),
        }
    }
}

/// Options for [`resolve_and_build`]
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub install_root: PathBuf,
    pub workers: usize,
}

/// Plan and report of a complete build
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub plan: BuildPlan,
    pub report: BuildReport,
}

/// Resolve, compose and build in one call
///
/// Resolution and composition errors are returned before anything runs.
/// Build failures are reported in the outcome, not as an error.
pub fn resolve_and_build(
    registry: &RecipeRegistry,
    roots: &[PackageSpec],
    executor: &dyn Executor,
    options: &BuildOptions,
) -> Result<BuildOutcome> {
    let resolution = Resolver::new(registry).resolve_all(roots)?;
    let plan = Composer::new(registry, &options.install_root).compose(&resolution)?;
    let report = BuildRunner::new(executor, options.workers).run(&plan)?;
    Ok(BuildOutcome { plan, report })
}

/// Message from a worker to the coordinator
type Completion = (usize, Result<ExecOutcome>, Duration);

/// Runs plan steps on a bounded worker pool
pub struct BuildRunner<'e> {
    executor: &'e dyn Executor,
    workers: usize,
}

impl<'e> BuildRunner<'e> {
    pub fn new(executor: &'e dyn Executor, workers: usize) -> Self {
        Self {
            executor,
            workers: workers.max(1),
        }
    }

    /// Run every step of the plan
    ///
    /// Only pool construction can fail; build failures are in the report.
    pub fn run(&self, plan: &BuildPlan) -> Result<BuildReport> {
        let count = plan.steps.len();
        let index: HashMap<&str, usize> = plan
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.as_str(), i))
            .collect();

        let mut waiting = vec![0usize; count];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (i, step) in plan.steps.iter().enumerate() {
            for dep in &step.dependencies {
                if let Some(&d) = index.get(dep.as_str()) {
                    waiting[i] += 1;
                    dependents[d].push(i);
                }
            }
        }

        let total = plan.buildable().count();
        let mut results: Vec<Option<(NodeStatus, String, Duration)>> = vec![None; count];
        let mut ready: BTreeSet<usize> = (0..count).filter(|&i| waiting[i] == 0).collect();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("pantry-build-{}", i))
            .build()
            .map_err(|e| Error::Executor(format!("cannot start build workers: {}", e)))?;

        let (tx, rx) = mpsc::channel::<Completion>();
        let executor = self.executor;
        let workers = self.workers;

        pool.in_place_scope(|scope| {
            let mut in_flight = 0usize;
            let mut started = 0usize;
            let mut halted = false;

            loop {
                // External steps have nothing to run, so a halt does not cancel them
                loop {
                    let Some(i) = ready.iter().copied().find(|&i| plan.steps[i].external) else {
                        break;
                    };
                    ready.remove(&i);
                    results[i] = Some((NodeStatus::External, String::new(), Duration::ZERO));
                    release(i, &dependents, &mut waiting, &mut ready);
                }

                while !halted
                    && in_flight < workers
                    && let Some(i) = ready.pop_first()
                {
                    let step = &plan.steps[i];
                    started += 1;
                    let job_index = started;
                    let tx = tx.clone();
                    scope.spawn(move |_| {
                        let begin = Instant::now();
                        let job = BuildJob {
                            step,
                            index: job_index,
                            total,
                        };
                        let result = panic::catch_unwind(AssertUnwindSafe(|| executor.invoke(&job)))
                            .unwrap_or_else(|_| {
                                Err(Error::Executor(format!("executor panicked while building {}", step.name)))
                            });
                        let _ = tx.send((i, result, begin.elapsed()));
                    });
                    in_flight += 1;
                }

                if in_flight == 0 {
                    break;
                }
                let Ok((i, result, elapsed)) = rx.recv() else {
                    break;
                };
                in_flight -= 1;

                let name = &plan.steps[i].name;
                match result {
                    Ok(outcome) if outcome.is_success() => {
                        info!("Built {} in {:.1}s", name, elapsed.as_secs_f64());
                        results[i] = Some((NodeStatus::Succeeded, outcome.log, elapsed));
                        release(i, &dependents, &mut waiting, &mut ready);
                    }
                    Ok(outcome) => {
                        error!("{} failed with exit code {}", name, outcome.exit_code);
                        let reason = format!("build exited with code {}", outcome.exit_code);
                        results[i] = Some((NodeStatus::Failed { reason }, outcome.log, elapsed));
                        halted = true;
                    }
                    Err(e) => {
                        error!("{} failed: {}", name, e);
                        results[i] = Some((NodeStatus::Failed { reason: e.to_string() }, String::new(), elapsed));
                        halted = true;
                    }
                }
            }
        });
        drop(tx);

        // Plan order puts dependencies first, so their status is final here
        let mut nodes: Vec<NodeReport> = Vec::with_capacity(count);
        for (i, step) in plan.steps.iter().enumerate() {
            let (status, log, duration) = match results[i].take() {
                Some(result) => result,
                None => {
                    let status = match blocked_by(step.dependencies.iter(), &index, &nodes) {
                        Some(dep) => NodeStatus::Skipped {
                            dependency: dep.clone(),
                        },
                        None => NodeStatus::Cancelled,
                    };
                    (status, String::new(), Duration::ZERO)
                }
            };
            nodes.push(NodeReport {
                name: step.name.clone(),
                version: step.version.clone(),
                prefix: step.prefix.clone(),
                status,
                log,
                duration,
            });
        }

        let report = BuildReport { nodes };
        if report.is_success() {
            info!("All {} packages built", total);
        } else {
            warn!(
                "Build stopped: {} failed, {} skipped, {} cancelled",
                report.count(|s| matches!(s, NodeStatus::Failed { .. })),
                report.count(|s| matches!(s, NodeStatus::Skipped { .. })),
                report.count(|s| matches!(s, NodeStatus::Cancelled)),
            );
        }
        Ok(report)
    }
}

/// The dependency to blame for a step that never started
///
/// A failed or skipped dependency is the cause; a cancelled one only is if
/// nothing worse is found.
fn blocked_by<'a>(
    dependencies: impl Iterator<Item = &'a String>,
    index: &HashMap<&str, usize>,
    nodes: &[NodeReport],
) -> Option<&'a String> {
    let mut cancelled = None;
    for dep in dependencies {
        let Some(node) = index.get(dep.as_str()).and_then(|&d| nodes.get(d)) else {
            continue;
        };
        match node.status {
            NodeStatus::Failed { .. } | NodeStatus::Skipped { .. } => return Some(dep),
            NodeStatus::Cancelled if cancelled.is_none() => cancelled = Some(dep),
            _ => {}
        }
    }
    cancelled
}

/// Mark `done` finished and queue dependents that became ready
fn release(done: usize, dependents: &[Vec<usize>], waiting: &mut [usize], ready: &mut BTreeSet<usize>) {
    for &d in &dependents[done] {
        waiting[d] -= 1;
        if waiting[d] == 0 {
            ready.insert(d);
        }
    }
}
