//! Submission parsing and validation

use crate::{ExecutorConfig, ValidationError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request body as the caller sent it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmittedRequest {
    /// Python source
    #[serde(default)]
    pub code: Option<String>,
    /// Timeout in seconds
    #[serde(default)]
    pub timeout: Option<i64>,
}

/// Where a submission came from; the rules differ slightly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    /// HTTP `POST /execute`
    Network,
    /// One JSON object on stdin
    Batch,
}

/// A submission that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub code: String,
    pub timeout: Duration,
}

impl ExecutionRequest {
    #[must_use]
    pub fn new(code: impl Into<String>, timeout: Duration) -> Self {
        Self {
            code: code.into(),
            timeout,
        }
    }

    #[must_use]
    pub const fn timeout_secs(&self) -> u64 {
        self.timeout.as_secs()
    }
}

/// Checks submission shape and bounds before any worker exists
#[derive(Debug, Clone)]
pub struct RequestValidator {
    max_code_chars: usize,
    default_timeout: Duration,
    max_timeout: Duration,
}

impl RequestValidator {
    #[must_use]
    pub const fn new(config: &ExecutorConfig) -> Self {
        Self {
            max_code_chars: config.max_code_chars,
            default_timeout: config.default_timeout,
            max_timeout: config.max_timeout,
        }
    }

    /// Decode a raw body and validate it
    pub fn parse(
        &self,
        body: &[u8],
        entry: EntryPoint,
    ) -> Result<ExecutionRequest, ValidationError> {
        let text = std::str::from_utf8(body).map_err(|_| ValidationError::Encoding)?;
        let submitted: SubmittedRequest = serde_json::from_str(text).map_err(|e| {
            if e.is_data() {
                ValidationError::InvalidField(e.to_string())
            } else {
                ValidationError::MalformedJson(e.to_string())
            }
        })?;
        self.validate(submitted, entry)
    }

    pub fn validate(
        &self,
        submitted: SubmittedRequest,
        entry: EntryPoint,
    ) -> Result<ExecutionRequest, ValidationError> {
        let code = submitted.code.unwrap_or_default();

        if entry == EntryPoint::Network && code.is_empty() {
            return Err(ValidationError::MissingCode);
        }

        let len = code.chars().count();
        if len > self.max_code_chars {
            return Err(ValidationError::CodeTooLong {
                len,
                max: self.max_code_chars,
            });
        }

        let timeout = match submitted.timeout {
            None => self.default_timeout,
            Some(secs) if secs <= 0 => return Err(ValidationError::InvalidTimeout(secs)),
            Some(secs) => {
                let requested = Duration::from_secs(secs.unsigned_abs());
                if requested > self.max_timeout {
                    tracing::warn!(
                        requested_secs = secs,
                        max_secs = self.max_timeout.as_secs(),
                        "clamping requested timeout"
                    );
                    self.max_timeout
                } else {
                    requested
                }
            }
        };

        Ok(ExecutionRequest { code, timeout })
    }
}
