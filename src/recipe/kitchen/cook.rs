// src/recipe/kitchen/cook.rs

//! Cook: the actual build execution for a single plan step

use crate::error::{Error, Result};
use crate::plan::{EnvOp, PlanStep, effective_environment};
use crate::recipe::BuildSystem;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

use super::Kitchen;
use super::archive::{apply_filter, apply_patch, extract_archive, fetch_source, source_root};

/// Default out-of-source build directory for CMake recipes
const DEFAULT_CMAKE_BUILD_DIR: &str = "pantry-build";

/// One external command of the simmer phase
#[derive(Debug, Clone, PartialEq, Eq)]
struct CommandSpec {
    phase: &'static str,
    program: &'static str,
    args: Vec<String>,
    /// Working directory relative to the source root
    dir: PathBuf,
}

impl CommandSpec {
    fn render(&self) -> String {
        let mut line = format!("(cd {} && {}", self.dir.display(), self.program);
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line.push(')');
        line
    }
}

/// Build commands for a step, relative to `source_dir`
fn build_commands(step: &PlanStep, jobs: u32, source_dir: &Path) -> Vec<CommandSpec> {
    match step.system {
        BuildSystem::Makefile => {
            let dir = match &step.build_directory {
                Some(d) => source_dir.join(d),
                None => source_dir.to_path_buf(),
            };
            let mut args = vec![format!("-j{}", jobs)];
            args.extend(step.targets.iter().cloned());
            args.extend(step.arguments.iter().cloned());
            vec![CommandSpec {
                phase: "make",
                program: "make",
                args,
                dir,
            }]
        }
        BuildSystem::CMake => {
            let dir = source_dir.join(step.build_directory.as_deref().unwrap_or(DEFAULT_CMAKE_BUILD_DIR));

            let mut configure = step.arguments.clone();
            configure.push(source_dir.display().to_string());

            let mut build = vec![
                "--build".to_string(),
                ".".to_string(),
                "--parallel".to_string(),
                jobs.to_string(),
            ];
            for target in &step.targets {
                build.push("--target".to_string());
                build.push(target.clone());
            }

            vec![
                CommandSpec {
                    phase: "configure",
                    program: "cmake",
                    args: configure,
                    dir: dir.clone(),
                },
                CommandSpec {
                    phase: "build",
                    program: "cmake",
                    args: build,
                    dir: dir.clone(),
                },
                CommandSpec {
                    phase: "install",
                    program: "cmake",
                    args: vec!["--install".to_string(), ".".to_string()],
                    dir,
                },
            ]
        }
    }
}

/// Human-readable description of everything cooking `step` would do
pub fn planned_commands(step: &PlanStep, jobs: u32) -> Vec<String> {
    let source = Path::new("<source>");
    let mut lines = Vec::new();

    if let Some(url) = &step.source_url {
        lines.push(format!(
            "fetch {} ({})",
            url,
            step.checksum.as_deref().unwrap_or("no checksum")
        ));
    }
    for patch in &step.patches {
        lines.push(format!("patch -p{} -i {}", patch.strip, patch.path.display()));
    }
    for filter in &step.filters {
        lines.push(format!("filter {}: '{}' -> '{}'", filter.file, filter.from, filter.to));
    }
    for binding in &step.environment {
        match binding.op {
            EnvOp::Set => lines.push(format!("export {}={}", binding.name, binding.value)),
            EnvOp::Prepend => lines.push(format!(
                "export {}={}:${}",
                binding.name, binding.value, binding.name
            )),
        }
    }
    lines.extend(build_commands(step, jobs, source).iter().map(CommandSpec::render));
    for rule in &step.install {
        lines.push(format!(
            "install {} -> {}",
            rule.files.join(" "),
            step.prefix.join(&rule.dest).display()
        ));
    }
    lines
}

/// A single cook operation
pub struct Cook<'a> {
    kitchen: &'a Kitchen,
    step: &'a PlanStep,
    /// Stage directory for this build
    build_dir: PathBuf,
    /// Source root within build_dir (set by unpack)
    source_dir: PathBuf,
    /// Cached source archive (set by prep)
    archive: Option<PathBuf>,
    /// Build log accumulator
    log: String,
}

impl<'a> Cook<'a> {
    pub(super) fn new(kitchen: &'a Kitchen, step: &'a PlanStep) -> Result<Self> {
        let build_dir = kitchen
            .config
            .build_root
            .join(format!("{}-{}-{}", step.name, step.version, step.short_hash()));

        if build_dir.exists() {
            fs::remove_dir_all(&build_dir)?;
        }
        fs::create_dir_all(&build_dir)?;

        Ok(Self {
            kitchen,
            step,
            source_dir: build_dir.join("source"),
            build_dir,
            archive: None,
            log: String::new(),
        })
    }

    /// Phase 1: Prep - fetch and verify the source archive
    pub fn prep(&mut self) -> Result<()> {
        let url = self
            .step
            .source_url
            .as_deref()
            .ok_or_else(|| Error::Executor(format!("{} has no source url", self.step.name)))?;
        let checksum = self
            .step
            .checksum
            .as_deref()
            .ok_or_else(|| Error::Executor(format!("{} has no source checksum", self.step.name)))?;

        let config = &self.kitchen.config;
        let path = fetch_source(url, checksum, &config.source_cache, config.offline)?;
        self.log_line(&format!("Fetched source: {}", url));
        self.archive = Some(path);
        Ok(())
    }

    /// Phase 2a: Unpack sources
    pub fn unpack(&mut self) -> Result<()> {
        let archive = self
            .archive
            .clone()
            .ok_or_else(|| Error::Executor("unpack called before prep".to_string()))?;
        let name = self
            .step
            .source_url
            .as_deref()
            .and_then(|url| url.rsplit('/').next())
            .unwrap_or("source.tar.gz")
            .to_string();

        let extract_dir = self.build_dir.join("source");
        fs::create_dir_all(&extract_dir)?;
        extract_archive(&archive, &name, &extract_dir)?;

        self.source_dir = source_root(&extract_dir)?;
        debug!("Source directory: {}", self.source_dir.display());
        self.log_line(&format!("Extracted source to {}", self.source_dir.display()));
        Ok(())
    }

    /// Phase 2b: Apply patches and filters
    pub fn patch(&mut self) -> Result<()> {
        for patch in &self.step.patches {
            info!("Applying patch: {}", patch.path.display());
            let output = apply_patch(&self.source_dir, &patch.path, patch.strip)?;
            self.log_line(&format!("Applied patch: {}", patch.path.display()));
            self.log.push_str(&output);
        }

        for filter in &self.step.filters {
            let count = apply_filter(&self.source_dir, &filter.file, &filter.from, &filter.to)?;
            self.log_line(&format!("Filtered {} ({} replacements)", filter.file, count));
        }

        Ok(())
    }

    /// Phase 3: Simmer - run the build
    ///
    /// Returns the exit code of the first failing command, or 0.
    pub fn simmer(&mut self) -> Result<i32> {
        let jobs = self.kitchen.config.jobs_for(self.step.jobs);
        let env = effective_environment(&self.step.environment, |name| std::env::var(name).ok());
        let search_path = env
            .iter()
            .find(|(name, _)| name == "PATH")
            .map(|(_, value)| value.clone())
            .or_else(|| std::env::var("PATH").ok());

        fs::create_dir_all(&self.step.prefix)?;

        for command in build_commands(self.step, jobs, &self.source_dir) {
            let program = which::which_in(command.program, search_path.as_deref(), &self.source_dir)
                .map_err(|_| Error::Executor(format!("{} not found in PATH", command.program)))?;

            fs::create_dir_all(&command.dir)?;
            info!("Running {} phase", command.phase);
            debug!("Command: {}", command.render());

            let output = Command::new(&program)
                .args(&command.args)
                .current_dir(&command.dir)
                .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .output()
                .map_err(|e| Error::Executor(format!("Failed to run {} phase: {}", command.phase, e)))?;

            self.log_build_output(
                command.phase,
                &String::from_utf8_lossy(&output.stdout),
                &String::from_utf8_lossy(&output.stderr),
            );

            if !output.status.success() {
                let code = output.status.code().unwrap_or(-1);
                self.log_line(&format!("{} phase failed with exit code {}", command.phase, code));
                return Ok(code);
            }
        }

        Ok(0)
    }

    /// Phase 4: Plate - copy install rules into the prefix
    pub fn plate(&mut self) -> Result<()> {
        for rule in &self.step.install {
            let dest = self.step.prefix.join(&rule.dest);
            fs::create_dir_all(&dest)?;

            for pattern in &rule.files {
                let full = self.source_dir.join(pattern);
                let matches: Vec<PathBuf> = glob::glob(&full.to_string_lossy())
                    .map_err(|e| Error::Executor(format!("bad install pattern '{}': {}", pattern, e)))?
                    .filter_map(|entry| entry.ok())
                    .collect();

                if matches.is_empty() {
                    return Err(Error::Executor(format!(
                        "install pattern '{}' matched nothing",
                        pattern
                    )));
                }

                for path in matches {
                    let Some(file_name) = path.file_name() else {
                        continue;
                    };
                    copy_recursive(&path, &dest.join(file_name))?;
                    self.log_line(&format!("Installed {} -> {}", path.display(), dest.display()));
                }
            }
        }

        info!("Installed {} into {}", self.step.name, self.step.prefix.display());
        Ok(())
    }

    /// Clean up and hand back the log
    ///
    /// The stage directory is removed after a successful build unless
    /// `keep_builddir` is set; failed builds always keep it for inspection.
    pub fn finish(mut self, success: bool) -> String {
        if success && !self.kitchen.config.keep_builddir {
            if let Err(e) = fs::remove_dir_all(&self.build_dir) {
                debug!("Could not remove {}: {}", self.build_dir.display(), e);
            }
        } else {
            let kept = format!("Build directory kept at {}", self.build_dir.display());
            self.log_line(&kept);
        }
        self.log
    }

    fn log_line(&mut self, line: &str) {
        self.log.push_str(line);
        self.log.push('\n');
    }

    /// Log build step output (stdout/stderr) with a phase header
    fn log_build_output(&mut self, phase: &str, stdout: &str, stderr: &str) {
        self.log_line(&format!("=== {} ===", phase));
        if !stdout.is_empty() {
            self.log.push_str(stdout);
            self.log.push('\n');
        }
        if !stderr.is_empty() {
            self.log.push_str(stderr);
            self.log.push('\n');
        }
    }
}

fn copy_recursive(from: &Path, to: &Path) -> Result<()> {
    if from.is_dir() {
        fs::create_dir_all(to)?;
        for entry in fs::read_dir(from)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &to.join(entry.file_name()))?;
        }
    } else {
        fs::copy(from, to)?;
    }
    Ok(())
}
