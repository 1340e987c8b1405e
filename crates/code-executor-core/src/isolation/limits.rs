//! rlimit ceilings for worker processes
//!
//! Limits are installed in the forked worker right before it execs the
//! interpreter, so the service process itself is never constrained.

use nix::sys::resource::{Resource, setrlimit};
use serde::{Deserialize, Serialize};

/// Ceilings applied to one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Address-space ceiling in bytes (RLIMIT_AS)
    pub address_space: u64,
    /// CPU seconds before SIGXCPU (RLIMIT_CPU soft limit)
    pub cpu_seconds: u64,
    /// Processes and threads for the worker's user (RLIMIT_NPROC)
    pub max_processes: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            address_space: 2 * 1024 * 1024 * 1024, // 2GB
            cpu_seconds: 30,
            max_processes: 50,
        }
    }
}

/// Installs [`ResourceLimits`] on the calling process
#[derive(Debug, Clone, Copy)]
pub struct ResourceLimiter {
    limits: ResourceLimits,
}

impl ResourceLimiter {
    #[must_use]
    pub const fn new(limits: ResourceLimits) -> Self {
        Self { limits }
    }

    #[must_use]
    pub const fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Apply every ceiling to the current process.
    ///
    /// Runs between fork and exec: only async-signal-safe calls are allowed
    /// here (no allocation, no logging).
    pub fn apply(&self) -> std::io::Result<()> {
        let limits = &self.limits;
        setrlimit(Resource::RLIMIT_AS, limits.address_space, limits.address_space)?;
        // hard limit one second above soft: SIGXCPU first, SIGKILL after
        setrlimit(
            Resource::RLIMIT_CPU,
            limits.cpu_seconds,
            limits.cpu_seconds.saturating_add(1),
        )?;
        setrlimit(
            Resource::RLIMIT_NPROC,
            limits.max_processes,
            limits.max_processes,
        )?;
        setrlimit(Resource::RLIMIT_CORE, 0, 0)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::CommandExt;
    use std::process::Command;

    fn ulimit_in_limited_child(flag: &str, limits: ResourceLimits) -> String {
        let limiter = ResourceLimiter::new(limits);
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg(format!("ulimit {flag}"));
        // SAFETY: the closure only issues setrlimit calls
        unsafe {
            cmd.pre_exec(move || limiter.apply());
        }
        let output = cmd.output().expect("spawn /bin/sh");
        assert!(output.status.success());
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    #[test]
    fn cpu_ceiling_reaches_child() {
        let limits = ResourceLimits {
            cpu_seconds: 7,
            ..ResourceLimits::default()
        };
        assert_eq!(ulimit_in_limited_child("-t", limits), "7");
    }

    #[test]
    fn address_space_ceiling_reaches_child() {
        let limits = ResourceLimits::default();
        // ulimit -v reports kilobytes
        assert_eq!(ulimit_in_limited_child("-v", limits), "2097152");
    }

    fn proc_limit_in_limited_child(name: &str, limits: ResourceLimits) -> (String, String) {
        let limiter = ResourceLimiter::new(limits);
        let mut cmd = Command::new("cat");
        cmd.arg("/proc/self/limits");
        // SAFETY: the closure only issues setrlimit calls
        unsafe {
            cmd.pre_exec(move || limiter.apply());
        }
        let output = cmd.output().expect("spawn cat");
        assert!(output.status.success());
        let table = String::from_utf8_lossy(&output.stdout).into_owned();
        let line = table
            .lines()
            .find(|l| l.starts_with(name))
            .unwrap_or_else(|| panic!("{name} missing from /proc/self/limits"));
        let mut fields = line[name.len()..].split_whitespace();
        let soft = fields.next().unwrap_or_default().to_string();
        let hard = fields.next().unwrap_or_default().to_string();
        (soft, hard)
    }

    #[test]
    fn process_ceiling_reaches_child() {
        let limits = ResourceLimits::default();
        assert_eq!(
            proc_limit_in_limited_child("Max processes", limits),
            ("50".to_string(), "50".to_string())
        );
    }

    #[test]
    fn core_dumps_are_disabled() {
        let limits = ResourceLimits::default();
        assert_eq!(
            proc_limit_in_limited_child("Max core file size", limits),
            ("0".to_string(), "0".to_string())
        );
    }

    #[test]
    fn parent_is_untouched() {
        let before = nix::sys::resource::getrlimit(Resource::RLIMIT_CPU).unwrap();
        let _ = ulimit_in_limited_child("-t", ResourceLimits::default());
        let after = nix::sys::resource::getrlimit(Resource::RLIMIT_CPU).unwrap();
        assert_eq!(before, after);
    }
}
