//! Outcome classification

use crate::config::ExecutorConfig;
use crate::guard::GuardOutcome;
use crate::protocol::{ReportRead, WorkerReport};
use crate::result::ExecutionResult;
use nix::sys::signal::Signal;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::time::Duration;

/// Diagnostic when the worker wrote a report that cannot be decoded
pub const UNREADABLE_REPORT: &str = "Execution produced an unreadable result report";

/// Everything observed about one finished worker
#[derive(Debug)]
pub struct Outcome {
    pub guard: GuardOutcome,
    pub report: ReportRead,
    pub output: String,
    pub elapsed: Duration,
    pub timeout_secs: u64,
}

/// Maps worker outcomes to results
#[derive(Debug, Clone, Copy)]
pub struct ResultClassifier {
    memory_limit_mb: u64,
    cpu_seconds: u64,
}

impl ResultClassifier {
    #[must_use]
    pub const fn new(config: &ExecutorConfig) -> Self {
        Self {
            memory_limit_mb: config.memory_limit_mb(),
            cpu_seconds: config.limits.cpu_seconds,
        }
    }

    #[must_use]
    pub fn classify(&self, outcome: Outcome) -> ExecutionResult {
        let Outcome {
            guard,
            report,
            output,
            elapsed,
            timeout_secs,
        } = outcome;

        let status = match guard {
            GuardOutcome::TimedOut => {
                return ExecutionResult::timeout(output, timeout_secs, elapsed);
            }
            GuardOutcome::Exited(status) => status,
        };

        let report = match report {
            ReportRead::Received(report) => Some(report),
            ReportRead::Empty if status.success() => {
                // os._exit(0) skips the report but is still a clean finish
                return ExecutionResult::success(output, elapsed);
            }
            ReportRead::Unreadable if status.success() => {
                return ExecutionResult::error(output, UNREADABLE_REPORT, elapsed);
            }
            ReportRead::Empty | ReportRead::Unreadable => None,
        };

        match report {
            Some(WorkerReport::Completed) if status.success() => {
                ExecutionResult::success(output, elapsed)
            }
            Some(WorkerReport::Completed) => {
                ExecutionResult::error(output, self.describe_abrupt(status), elapsed)
            }
            Some(WorkerReport::ImportRejected { message, .. }) => {
                ExecutionResult::error(output, message, elapsed)
            }
            Some(WorkerReport::MemoryExhausted) => ExecutionResult::error(
                output,
                format!(
                    "MemoryError: Code exceeded {}MB memory limit",
                    self.memory_limit_mb
                ),
                elapsed,
            ),
            Some(WorkerReport::Exited { code }) => ExecutionResult::error(
                output,
                format!("SystemExit: {}", code.unwrap_or_default()),
                elapsed,
            ),
            Some(WorkerReport::Fault { diagnostic }) => {
                ExecutionResult::error(output, diagnostic, elapsed)
            }
            None => ExecutionResult::error(output, self.describe_abrupt(status), elapsed),
        }
    }

    /// Diagnostic for a worker that died without a usable report
    fn describe_abrupt(&self, status: ExitStatus) -> String {
        if let Some(signo) = status.signal() {
            return match Signal::try_from(signo) {
                Ok(Signal::SIGXCPU) => format!(
                    "Execution exceeded {} second CPU time limit",
                    self.cpu_seconds
                ),
                Ok(signal) => format!(
                    "Execution terminated abnormally by signal {signo} ({})",
                    signal.as_str()
                ),
                Err(_) => format!("Execution terminated abnormally by signal {signo}"),
            };
        }
        match status.code() {
            Some(code) => format!("Execution terminated abnormally with exit status {code}"),
            None => "Execution terminated abnormally".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ExecutionStatus;

    fn exited(code: i32) -> GuardOutcome {
        GuardOutcome::Exited(ExitStatus::from_raw(code << 8))
    }

    fn signaled(signo: i32) -> GuardOutcome {
        GuardOutcome::Exited(ExitStatus::from_raw(signo))
    }

    fn classify(guard: GuardOutcome, report: Option<WorkerReport>) -> ExecutionResult {
        classify_read(guard, report.map_or(ReportRead::Empty, ReportRead::Received))
    }

    fn classify_read(guard: GuardOutcome, report: ReportRead) -> ExecutionResult {
        ResultClassifier::new(&ExecutorConfig::default()).classify(Outcome {
            guard,
            report,
            output: "partial\n".into(),
            elapsed: Duration::from_millis(42),
            timeout_secs: 1,
        })
    }

    #[test]
    fn completed_report_and_clean_exit_is_success() {
        let result = classify(exited(0), Some(WorkerReport::Completed));
        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.output, "partial\n");
        assert!(result.error.is_empty());
        assert_eq!(result.execution_time_ms, 42);
    }

    #[test]
    fn timeout_wins_over_any_report() {
        let result = classify(GuardOutcome::TimedOut, Some(WorkerReport::Completed));
        assert_eq!(result.status, ExecutionStatus::Timeout);
        assert_eq!(result.error, "Execution exceeded 1 second timeout");
        assert_eq!(result.output, "partial\n");
    }

    #[test]
    fn import_rejection_uses_worker_message() {
        let result = classify(
            exited(0),
            Some(WorkerReport::ImportRejected {
                module: "subprocess".into(),
                message: "Import of 'subprocess' is not allowed for security reasons".into(),
            }),
        );
        assert_eq!(result.status, ExecutionStatus::Error);
        assert_eq!(
            result.error,
            "Import of 'subprocess' is not allowed for security reasons"
        );
    }

    #[test]
    fn memory_error_names_configured_limit() {
        let result = classify(exited(0), Some(WorkerReport::MemoryExhausted));
        assert_eq!(result.error, "MemoryError: Code exceeded 2048MB memory limit");
    }

    #[test]
    fn fault_keeps_full_diagnostic() {
        let diagnostic = "Traceback (most recent call last):\n  File \"<submission>\", line 1, in <module>\nZeroDivisionError: division by zero\n";
        let result = classify(
            exited(0),
            Some(WorkerReport::Fault {
                diagnostic: diagnostic.into(),
            }),
        );
        assert_eq!(result.error, diagnostic);
    }

    #[test]
    fn cpu_limit_signal_is_named() {
        let result = classify(signaled(libc::SIGXCPU), None);
        assert_eq!(result.status, ExecutionStatus::Error);
        assert_eq!(result.error, "Execution exceeded 30 second CPU time limit");
    }

    #[test]
    fn abrupt_death_is_a_generic_error() {
        let result = classify(signaled(libc::SIGSEGV), None);
        assert_eq!(
            result.error,
            "Execution terminated abnormally by signal 11 (SIGSEGV)"
        );
        let result = classify(exited(1), None);
        assert_eq!(
            result.error,
            "Execution terminated abnormally with exit status 1"
        );
    }

    #[test]
    fn system_exit_codes() {
        let result = classify(
            exited(0),
            Some(WorkerReport::Exited {
                code: Some("3".into()),
            }),
        );
        assert_eq!(result.error, "SystemExit: 3");
        let result = classify(exited(0), None);
        assert_eq!(result.status, ExecutionStatus::Success);
    }

    #[test]
    fn unreadable_report_is_never_success() {
        let result = classify_read(exited(0), ReportRead::Unreadable);
        assert_eq!(result.status, ExecutionStatus::Error);
        assert_eq!(result.error, UNREADABLE_REPORT);
        assert_eq!(result.output, "partial\n");
    }

    #[test]
    fn abrupt_death_outranks_an_unreadable_report() {
        let result = classify_read(signaled(libc::SIGKILL), ReportRead::Unreadable);
        assert_eq!(
            result.error,
            "Execution terminated abnormally by signal 9 (SIGKILL)"
        );
    }
}
