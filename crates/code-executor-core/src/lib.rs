//! # code-executor-core
//!
//! Execution engine for untrusted Python submissions.
//!
//! Every submission runs in its own short-lived worker process:
//! - request validation before anything is spawned
//! - rlimit ceilings (address space, CPU time, process count) inside the worker
//! - a restricted namespace with allowlisted imports and no `open`/`eval`/`exec`/`compile`
//! - a per-worker wall-clock deadline that kills the worker's process group
//! - private, capped capture of stdout and stderr
//! - classification into success, timeout or error with wall-clock timing

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod capture;
pub mod classify;
pub mod config;
pub mod error;
pub mod executor;
pub mod guard;
pub mod isolation;
pub mod policy;
pub mod protocol;
pub mod request;
pub mod result;
pub mod worker;

pub use config::ExecutorConfig;
pub use error::{ExecutorError, ValidationError};
pub use executor::Executor;
pub use request::{EntryPoint, ExecutionRequest, RequestValidator};
pub use result::{ExecutionResult, ExecutionStatus};

/// Crate-level result type
pub type Result<T> = std::result::Result<T, ExecutorError>;
