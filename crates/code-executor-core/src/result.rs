//! Execution result types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How an execution ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Timeout,
    Error,
}

/// Result of a sandboxed code execution, in its wire shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,

    /// Combined stdout and stderr, capped
    pub output: String,

    /// Diagnostic text, empty on success
    pub error: String,

    /// Wall-clock duration in milliseconds
    #[serde(rename = "execution_time")]
    pub execution_time_ms: u64,
}

impl ExecutionResult {
    #[must_use]
    pub fn success(output: String, elapsed: Duration) -> Self {
        Self {
            status: ExecutionStatus::Success,
            output,
            error: String::new(),
            execution_time_ms: millis(elapsed),
        }
    }

    #[must_use]
    pub fn timeout(output: String, timeout_secs: u64, elapsed: Duration) -> Self {
        Self {
            status: ExecutionStatus::Timeout,
            output,
            error: format!("Execution exceeded {timeout_secs} second timeout"),
            execution_time_ms: millis(elapsed),
        }
    }

    /// Error result; an empty diagnostic is replaced so `error` is never blank
    #[must_use]
    pub fn error(output: String, error: impl Into<String>, elapsed: Duration) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "Execution failed without a diagnostic".into();
        }
        Self {
            status: ExecutionStatus::Error,
            output,
            error,
            execution_time_ms: millis(elapsed),
        }
    }

    /// Error result for a request that never reached a worker
    #[must_use]
    pub fn rejected(error: impl Into<String>) -> Self {
        Self::error(String::new(), error, Duration::ZERO)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_to_wire_shape() {
        let result = ExecutionResult::success("hello\n".into(), Duration::from_millis(12));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "success",
                "output": "hello\n",
                "error": "",
                "execution_time": 12
            })
        );
    }

    #[test]
    fn timeout_message_names_the_limit() {
        let result = ExecutionResult::timeout(String::new(), 1, Duration::from_millis(1003));
        assert_eq!(result.status, ExecutionStatus::Timeout);
        assert_eq!(result.error, "Execution exceeded 1 second timeout");
        assert_eq!(result.execution_time_ms, 1003);
    }

    #[test]
    fn error_is_never_blank() {
        let result = ExecutionResult::error(String::new(), "  ", Duration::ZERO);
        assert!(!result.error.trim().is_empty());
        assert!(!result.is_success());
    }
}
