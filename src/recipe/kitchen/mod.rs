// src/recipe/kitchen/mod.rs

//! Kitchen: turns plan steps into installed prefixes
//!
//! The [`Executor`] trait is the seam between the build runner and whatever
//! actually builds a package. The [`Kitchen`] is the real implementation:
//! - Fetching and verifying source archives (checksum-keyed cache)
//! - Extracting, patching and filtering sources
//! - Running make or CMake with the step's environment and arguments
//! - Copying results into the install prefix
//!
//! [`DryRunExecutor`] describes the same commands without running anything.

mod archive;
mod config;
mod cook;

pub use archive::{apply_filter, apply_patch, download_file, extract_archive, fetch_source};
pub use config::KitchenConfig;
pub use cook::{Cook, planned_commands};

use crate::error::Result;
use crate::plan::PlanStep;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Directory inside a prefix that records what was installed there
pub const INSTALL_MARKER_DIR: &str = ".pantry";

/// One unit of work handed to an executor
#[derive(Debug, Clone, Copy)]
pub struct BuildJob<'a> {
    pub step: &'a PlanStep,
    /// 1-based position among buildable steps
    pub index: usize,
    pub total: usize,
}

/// What an executor reports back for one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutcome {
    /// Exit code of the failing command, or 0
    pub exit_code: i32,
    /// Captured output
    pub log: String,
}

impl ExecOutcome {
    pub fn success(log: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            log: log.into(),
        }
    }

    pub fn failure(exit_code: i32, log: impl Into<String>) -> Self {
        Self {
            exit_code,
            log: log.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Builds one plan step
///
/// A nonzero exit code means the build itself failed; `Err` means the
/// executor could not run it at all. The runner treats both as a failed node.
pub trait Executor: Send + Sync {
    fn invoke(&self, job: &BuildJob<'_>) -> Result<ExecOutcome>;
}

/// The Kitchen: where recipes are cooked
pub struct Kitchen {
    pub(crate) config: KitchenConfig,
}

impl Kitchen {
    /// Create a new Kitchen with the given configuration
    pub fn new(config: KitchenConfig) -> Self {
        Self { config }
    }

    /// Create a Kitchen with default configuration
    pub fn with_defaults() -> Self {
        Self::new(KitchenConfig::default())
    }

    pub fn config(&self) -> &KitchenConfig {
        &self.config
    }

    /// True if `prefix` already holds this exact step
    pub fn is_installed(&self, step: &PlanStep) -> bool {
        fs::read_to_string(marker_path(&step.prefix))
            .is_ok_and(|recorded| recorded.trim() == step.hash)
    }

    /// Cook a plan step
    ///
    /// ## Process
    /// 1. **Prep**: Fetch the source archive into the cache and verify it
    /// 2. **Unpack**: Extract sources, apply patches and filters
    /// 3. **Simmer**: Run make or CMake
    /// 4. **Plate**: Copy install rules into the prefix and record the hash
    pub fn cook(&self, step: &PlanStep) -> Result<ExecOutcome> {
        if self.is_installed(step) {
            info!("{} is already installed in {}", step.name, step.prefix.display());
            return Ok(ExecOutcome::success(format!(
                "already installed in {}\n",
                step.prefix.display()
            )));
        }

        let mut cook = Cook::new(self, step)?;
        info!("Cooking {}", step.describe());

        cook.prep()?;
        cook.unpack()?;
        cook.patch()?;

        let exit_code = cook.simmer()?;
        if exit_code != 0 {
            warn!("{} failed with exit code {}", step.name, exit_code);
            return Ok(ExecOutcome::failure(exit_code, cook.finish(false)));
        }

        cook.plate()?;
        write_marker(step)?;
        Ok(ExecOutcome::success(cook.finish(true)))
    }
}

impl Executor for Kitchen {
    fn invoke(&self, job: &BuildJob<'_>) -> Result<ExecOutcome> {
        info!("[{}/{}] {}", job.index, job.total, job.step.describe());
        self.cook(job.step)
    }
}

fn marker_path(prefix: &Path) -> PathBuf {
    prefix.join(INSTALL_MARKER_DIR).join("hash")
}

fn write_marker(step: &PlanStep) -> Result<()> {
    let dir = step.prefix.join(INSTALL_MARKER_DIR);
    fs::create_dir_all(&dir)?;
    fs::write(marker_path(&step.prefix), format!("{}\n", step.hash))?;
    let record = serde_json::to_string_pretty(step)
        .map_err(|e| crate::error::Error::Executor(format!("cannot record step: {}", e)))?;
    fs::write(dir.join("step.json"), record)?;
    Ok(())
}

/// Executor that only describes what would run
#[derive(Debug, Clone)]
pub struct DryRunExecutor {
    jobs: u32,
}

impl DryRunExecutor {
    pub fn new(jobs: u32) -> Self {
        Self { jobs: jobs.max(1) }
    }
}

impl Default for DryRunExecutor {
    fn default() -> Self {
        Self::new(KitchenConfig::default().jobs)
    }
}

impl Executor for DryRunExecutor {
    fn invoke(&self, job: &BuildJob<'_>) -> Result<ExecOutcome> {
        let jobs = job.step.jobs.unwrap_or(self.jobs).max(1);
        let mut log = String::new();
        for command in planned_commands(job.step, jobs) {
            log.push_str(&command);
            log.push('\n');
        }
        Ok(ExecOutcome::success(log))
    }
}
