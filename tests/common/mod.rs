// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use pantry::recipe::parse_recipe;
use pantry::{BuildJob, ExecOutcome, Executor, PackageSpec, RecipeRegistry, Result};
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

pub const CHECKSUM: &str =
    "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

/// Recipe text builder for registry fixtures
pub struct RecipeText {
    text: String,
}

impl RecipeText {
    pub fn new(name: &str) -> Self {
        Self {
            text: format!(
                "[package]\nname = \"{}\"\nsummary = \"{} test recipe\"\nurl = \"https://example.com/{}-%(version)s.tar.gz\"\n",
                name, name, name
            ),
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.text.push_str(&format!(
            "[[versions]]\nversion = \"{}\"\nchecksum = \"{}\"\n",
            version, CHECKSUM
        ));
        self
    }

    pub fn variant(mut self, name: &str, default: bool) -> Self {
        self.text.push_str(&format!(
            "[[variants]]\nname = \"{}\"\ndefault = {}\n",
            name, default
        ));
        self
    }

    pub fn depends(mut self, spec: &str) -> Self {
        self.text
            .push_str(&format!("[[dependencies]]\nspec = \"{}\"\n", spec));
        self
    }

    pub fn depends_when(mut self, spec: &str, when: &str) -> Self {
        self.text.push_str(&format!(
            "[[dependencies]]\nspec = \"{}\"\nwhen = \"{}\"\n",
            spec, when
        ));
        self
    }

    pub fn build_tool(mut self, spec: &str) -> Self {
        self.text.push_str(&format!(
            "[[dependencies]]\nspec = \"{}\"\ntype = [\"build\"]\n",
            spec
        ));
        self
    }

    pub fn env_prefix(mut self, name: &str, target: &str, when: Option<&str>) -> Self {
        self.text.push_str(&format!(
            "[[environment]]\nname = \"{}\"\nprefix_of = \"{}\"\n",
            name, target
        ));
        if let Some(when) = when {
            self.text.push_str(&format!("when = \"{}\"\n", when));
        }
        self
    }

    pub fn cmake(mut self) -> Self {
        self.text.push_str("[build]\nsystem = \"cmake\"\n");
        self
    }

    pub fn build(self) -> String {
        self.text
    }
}

/// Registry from recipe texts, registered in order
pub fn registry(recipes: &[String]) -> RecipeRegistry {
    let mut registry = RecipeRegistry::new();
    for text in recipes {
        registry.register(parse_recipe(text).unwrap()).unwrap();
    }
    registry
}

/// The recipes shipped with the crate
pub fn bundled_registry() -> RecipeRegistry {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("recipes");
    RecipeRegistry::from_dirs(&[dir]).unwrap()
}

pub fn spec(text: &str) -> PackageSpec {
    PackageSpec::parse(text).unwrap()
}

/// Executor that records what it was asked to build
///
/// Fails the packages in `fail` and sleeps `delay` per job so concurrency
/// can be observed.
pub struct RecordingExecutor {
    fail: Vec<String>,
    delay: Duration,
    pub started: Mutex<Vec<String>>,
    running: AtomicUsize,
    pub peak: AtomicUsize,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self {
            fail: Vec::new(),
            delay: Duration::ZERO,
            started: Mutex::new(Vec::new()),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn failing(mut self, name: &str) -> Self {
        self.fail.push(name.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Executor for RecordingExecutor {
    fn invoke(&self, job: &BuildJob<'_>) -> Result<ExecOutcome> {
        self.started.lock().unwrap().push(job.step.name.clone());
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }

        self.running.fetch_sub(1, Ordering::SeqCst);
        if self.fail.contains(&job.step.name) {
            return Ok(ExecOutcome::failure(2, format!("{}: build failed", job.step.name)));
        }
        Ok(ExecOutcome::success(format!("built {}", job.step.name)))
    }
}
