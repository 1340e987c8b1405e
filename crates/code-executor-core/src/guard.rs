//! Per-execution deadline enforcement
//!
//! Every worker runs in its own process group. The supervising task owns the
//! only timer for that worker; when it fires the whole group gets SIGKILL.
//! Nothing here is process-wide, so concurrent executions cannot fire each
//! other's deadlines.

use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use std::process::ExitStatus;
use std::time::{Duration, Instant};
use tokio::process::Child;

/// Process group led by a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessGroup(Pid);

impl ProcessGroup {
    /// Group of a child spawned with `process_group(0)`
    #[must_use]
    pub fn of(child: &Child) -> Option<Self> {
        child
            .id()
            .and_then(|pid| i32::try_from(pid).ok())
            .map(|pid| Self(Pid::from_raw(pid)))
    }

    /// SIGKILL every member; a group that is already gone is fine
    pub fn kill(self) -> crate::Result<()> {
        match killpg(self.0, Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    #[must_use]
    pub const fn id(self) -> i32 {
        self.0.as_raw()
    }
}

/// How the watched worker stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Worker exited before its deadline
    Exited(ExitStatus),
    /// Deadline passed first; the group was killed
    TimedOut,
}

/// Wall-clock deadline for one worker
#[derive(Debug, Clone, Copy)]
pub struct TimeoutGuard {
    timeout: Duration,
    deadline: Instant,
}

impl TimeoutGuard {
    #[must_use]
    pub fn new(timeout: Duration, started: Instant) -> Self {
        Self {
            timeout,
            deadline: started + timeout,
        }
    }

    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait for the worker, killing its group if the deadline comes first
    pub async fn watch(&self, child: &mut Child, group: ProcessGroup) -> crate::Result<GuardOutcome> {
        let deadline = tokio::time::Instant::from_std(self.deadline);
        if let Ok(status) = tokio::time::timeout_at(deadline, child.wait()).await {
            return Ok(GuardOutcome::Exited(status?));
        }

        tracing::debug!(
            pgid = group.id(),
            timeout_secs = self.timeout.as_secs(),
            "deadline reached, killing worker group"
        );
        group.kill()?;
        child.wait().await?;
        Ok(GuardOutcome::TimedOut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::process::Command;

    fn spawn_in_group(script: &str) -> (Child, ProcessGroup) {
        let child = Command::new("/bin/sh")
            .arg("-c")
            .arg(script)
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let group = ProcessGroup::of(&child).unwrap();
        (child, group)
    }

    #[tokio::test]
    async fn fast_worker_exits_normally() {
        let (mut child, group) = spawn_in_group("exit 0");
        let guard = TimeoutGuard::new(Duration::from_secs(5), Instant::now());
        let outcome = guard.watch(&mut child, group).await.unwrap();
        assert!(matches!(outcome, GuardOutcome::Exited(status) if status.success()));
    }

    #[tokio::test]
    async fn slow_worker_is_killed_at_deadline() {
        let started = Instant::now();
        let (mut child, group) = spawn_in_group("sleep 30");
        let guard = TimeoutGuard::new(Duration::from_millis(200), started);
        let outcome = guard.watch(&mut child, group).await.unwrap();
        assert_eq!(outcome, GuardOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn background_children_die_with_the_group() {
        let (mut child, group) = spawn_in_group("sleep 30 & echo $! ; wait");
        let guard = TimeoutGuard::new(Duration::from_millis(300), Instant::now());
        assert_eq!(
            guard.watch(&mut child, group).await.unwrap(),
            GuardOutcome::TimedOut
        );
        // killing a dead group is not an error
        assert!(group.kill().is_ok());
    }
}
