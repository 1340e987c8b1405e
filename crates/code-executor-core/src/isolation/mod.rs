//! Worker isolation primitives
//!
//! - `limits` - rlimit ceilings installed in each worker before exec
//! - `environment` - restricted namespace and gated import for submissions
//! - `pipe` - private output and report pipes between worker and supervisor

pub mod environment;
pub mod limits;
pub mod pipe;

pub use self::environment::{RestrictedEnvironment, RestrictedEnvironmentBuilder};
pub use self::limits::{ResourceLimiter, ResourceLimits};
pub use self::pipe::WorkerPipes;
