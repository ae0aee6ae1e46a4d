//! Runtime configuration for Herald.
//!
//! Values are assembled in two layers: an optional `herald.toml` in the
//! project directory, then environment overrides (`.env` is loaded by `main`
//! before this runs). Durations are stored resolved so the rest of the crate
//! never re-parses.

use crate::ai::BackendKind;
use crate::blocks::{Classifier, FenceClassifier, MarkerClassifier};
use crate::supervisor::SupervisorConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// How narration leaves the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStrategy {
    /// Collect messages and flush on a fixed interval, merged into digests.
    #[default]
    Interval,
    /// Forward complete lines at once, debounce a trailing partial line.
    Debounce,
}

/// How agent output lines are classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierMode {
    /// Markdown fences; `bash`/`sh` blocks are executable. Canonical.
    #[default]
    Fenced,
    /// Marker-prefixed narration lines; everything else is logged only.
    Marker,
}

/// On-disk configuration file. Every field is optional; `Config` holds the
/// effective values.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeraldToml {
    pub repo_url: Option<String>,
    pub base_branch: Option<String>,
    pub backend: Option<String>,
    pub backend_command: Option<String>,
    pub webhook_url: Option<String>,
    pub thread_id: Option<String>,
    pub delivery: Option<DeliveryStrategy>,
    pub classifier: Option<ClassifierMode>,
    pub narration_marker: Option<String>,
    pub silence_threshold_secs: Option<u64>,
    pub silence_check_secs: Option<u64>,
    pub hard_deadline_secs: Option<u64>,
    pub batch_interval_ms: Option<u64>,
    pub batch_max_size: Option<usize>,
    pub debounce_quiet_ms: Option<u64>,
    pub summarize_batches: Option<bool>,
}

impl HeraldToml {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Invalid configuration in {}", path.display()))
    }
}

/// Effective runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub repo_url: Option<String>,
    pub base_branch: String,
    pub backend: BackendKind,
    pub backend_command: Option<String>,
    pub webhook_url: Option<String>,
    pub thread_id: String,
    pub delivery: DeliveryStrategy,
    pub classifier_mode: ClassifierMode,
    pub narration_marker: String,
    pub silence_threshold: Duration,
    pub silence_check_period: Duration,
    pub hard_deadline: Duration,
    pub batch_interval: Duration,
    pub batch_max_size: usize,
    pub debounce_quiet: Duration,
    pub summarize_batches: bool,
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    env_string(key)
        .map(|value| {
            value
                .parse::<u64>()
                .with_context(|| format!("{key} must be an integer, got '{value}'"))
        })
        .transpose()
}

impl Config {
    /// Assemble configuration for a project directory: file values first,
    /// then environment overrides.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let file = HeraldToml::load(&project_dir.join("herald.toml"))?;

        let backend = env_string("HERALD_BACKEND")
            .or(file.backend)
            .unwrap_or_else(|| "claude".to_string())
            .parse::<BackendKind>()?;

        let silence_threshold_secs = env_u64("HERALD_SILENCE_THRESHOLD_SECS")?
            .or(file.silence_threshold_secs)
            .unwrap_or(120);
        let hard_deadline_secs = env_u64("HERALD_HARD_DEADLINE_SECS")?
            .or(file.hard_deadline_secs)
            .unwrap_or(1800);

        Ok(Self {
            repo_url: env_string("HERALD_REPO_URL").or(file.repo_url),
            base_branch: env_string("HERALD_BASE_BRANCH")
                .or(file.base_branch)
                .unwrap_or_else(|| "main".to_string()),
            backend,
            backend_command: env_string("HERALD_BACKEND_CMD").or(file.backend_command),
            webhook_url: env_string("HERALD_WEBHOOK_URL").or(file.webhook_url),
            thread_id: env_string("HERALD_THREAD_ID")
                .or(file.thread_id)
                .unwrap_or_default(),
            delivery: file.delivery.unwrap_or_default(),
            classifier_mode: file.classifier.unwrap_or_default(),
            narration_marker: file.narration_marker.unwrap_or_else(|| "#>".to_string()),
            silence_threshold: Duration::from_secs(silence_threshold_secs),
            silence_check_period: Duration::from_secs(
                file.silence_check_secs.unwrap_or(60),
            ),
            hard_deadline: Duration::from_secs(hard_deadline_secs),
            batch_interval: Duration::from_millis(file.batch_interval_ms.unwrap_or(2000)),
            batch_max_size: file.batch_max_size.unwrap_or(10),
            debounce_quiet: Duration::from_millis(file.debounce_quiet_ms.unwrap_or(1500)),
            summarize_batches: file.summarize_batches.unwrap_or(false),
        })
    }

    pub fn supervisor(&self) -> SupervisorConfig {
        SupervisorConfig {
            silence_threshold: self.silence_threshold,
            silence_check_period: self.silence_check_period,
            hard_deadline: self.hard_deadline,
        }
    }

    /// Fresh classifier state for one run.
    pub fn classifier(&self) -> Classifier {
        match self.classifier_mode {
            ClassifierMode::Fenced => Classifier::Fenced(FenceClassifier::new()),
            ClassifierMode::Marker => {
                Classifier::Marker(MarkerClassifier::new(self.narration_marker.clone()))
            }
        }
    }
}
