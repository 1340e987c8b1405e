//! Executor configuration

use crate::isolation::ResourceLimits;
use crate::policy::AllowlistPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Largest accepted submission, in characters
pub const MAX_CODE_CHARS: usize = 100_000;

/// Captured output kept per execution before truncation
pub const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Timeout applied when a request does not carry one
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Hard ceiling for caller-supplied timeouts
pub const MAX_TIMEOUT_SECS: u64 = 300;

/// Configuration shared by every execution of a service instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Path to Python interpreter
    pub python_path: PathBuf,

    /// Ceilings applied inside each worker process
    pub limits: ResourceLimits,

    /// Timeout used when the request omits one
    pub default_timeout: Duration,

    /// Requested timeouts above this are clamped
    pub max_timeout: Duration,

    /// Maximum submission length in characters
    pub max_code_chars: usize,

    /// Captured output kept before the truncation marker is appended
    pub max_output_bytes: usize,

    /// How long capture readers may keep draining after the worker is gone
    pub drain_grace: Duration,

    /// Top-level modules a submission may import
    pub allowlist: AllowlistPolicy,

    /// Parent directory for per-execution scratch directories (system temp if unset)
    pub scratch_root: Option<PathBuf>,

    /// Environment variables for the worker (the service environment is not inherited)
    pub env: Vec<(String, String)>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            python_path: default_python_path(),
            limits: ResourceLimits::default(),
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_timeout: Duration::from_secs(MAX_TIMEOUT_SECS),
            max_code_chars: MAX_CODE_CHARS,
            max_output_bytes: MAX_OUTPUT_BYTES,
            drain_grace: Duration::from_millis(500),
            allowlist: AllowlistPolicy::default(),
            scratch_root: None,
            env: vec![
                ("PATH".into(), "/usr/local/bin:/usr/bin:/bin".into()),
                ("LANG".into(), "C.UTF-8".into()),
                ("MPLBACKEND".into(), "Agg".into()),
            ],
        }
    }
}

impl ExecutorConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> ExecutorConfigBuilder {
        ExecutorConfigBuilder::default()
    }

    /// Apply `CODE_EXECUTOR_*` environment overrides
    pub fn apply_env(&mut self) -> crate::Result<()> {
        if let Ok(path) = std::env::var("CODE_EXECUTOR_PYTHON") {
            self.python_path = PathBuf::from(path);
        }
        if let Ok(secs) = std::env::var("CODE_EXECUTOR_MAX_TIMEOUT") {
            let secs: u64 = secs.parse().map_err(|e| {
                crate::ExecutorError::Config(format!("CODE_EXECUTOR_MAX_TIMEOUT: {e}"))
            })?;
            self.max_timeout = Duration::from_secs(secs);
        }
        self.validate()
    }

    /// Reject configurations no execution could run under
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_timeout.is_zero() {
            return Err(crate::ExecutorError::Config("max timeout must be positive".into()));
        }
        if self.default_timeout > self.max_timeout {
            return Err(crate::ExecutorError::Config(format!(
                "default timeout {}s exceeds max timeout {}s",
                self.default_timeout.as_secs(),
                self.max_timeout.as_secs()
            )));
        }
        if self.max_output_bytes == 0 {
            return Err(crate::ExecutorError::Config("output cap must be positive".into()));
        }
        Ok(())
    }

    /// Memory ceiling in whole megabytes, as reported to callers
    #[must_use]
    pub const fn memory_limit_mb(&self) -> u64 {
        self.limits.address_space / (1024 * 1024)
    }
}

/// Builder for `ExecutorConfig`
#[derive(Debug, Default)]
pub struct ExecutorConfigBuilder {
    config: ExecutorConfig,
}

impl ExecutorConfigBuilder {
    #[must_use]
    pub fn python_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.python_path = path.into();
        self
    }

    #[must_use]
    pub fn memory_limit(mut self, bytes: u64) -> Self {
        self.config.limits.address_space = bytes;
        self
    }

    #[must_use]
    pub fn memory_limit_mb(self, mb: u64) -> Self {
        self.memory_limit(mb * 1024 * 1024)
    }

    #[must_use]
    pub fn cpu_time_limit_secs(mut self, secs: u64) -> Self {
        self.config.limits.cpu_seconds = secs;
        self
    }

    #[must_use]
    pub fn max_processes(mut self, count: u64) -> Self {
        self.config.limits.max_processes = count;
        self
    }

    #[must_use]
    pub fn default_timeout(mut self, duration: Duration) -> Self {
        self.config.default_timeout = duration;
        self
    }

    #[must_use]
    pub fn max_timeout_secs(mut self, secs: u64) -> Self {
        self.config.max_timeout = Duration::from_secs(secs);
        self
    }

    #[must_use]
    pub fn max_output_bytes(mut self, bytes: usize) -> Self {
        self.config.max_output_bytes = bytes;
        self
    }

    #[must_use]
    pub fn allow_module(mut self, module: impl Into<String>) -> Self {
        self.config.allowlist = self.config.allowlist.with(module);
        self
    }

    #[must_use]
    pub fn allowlist(mut self, allowlist: AllowlistPolicy) -> Self {
        self.config.allowlist = allowlist;
        self
    }

    #[must_use]
    pub fn scratch_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.scratch_root = Some(path.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn build(self) -> ExecutorConfig {
        self.config
    }
}

/// Interpreter from `CODE_EXECUTOR_PYTHON`, or `python3` resolved through `PATH`
pub fn default_python_path() -> PathBuf {
    std::env::var("CODE_EXECUTOR_PYTHON")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("python3"))
}
