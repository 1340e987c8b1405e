//! Private pipes between a worker and its supervisor

use crate::{ExecutorError, Result};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::process::Stdio;
use tokio::net::unix::pipe::Receiver;

/// The two pipes every worker gets: combined output and report
#[derive(Debug)]
pub struct WorkerPipes {
    output_rx: OwnedFd,
    output_tx: OwnedFd,
    report_rx: OwnedFd,
    report_tx: OwnedFd,
}

impl WorkerPipes {
    /// Create a new set of pipes, all close-on-exec
    pub fn new() -> Result<Self> {
        let (output_rx, output_tx) = create_pipe()?;
        let (report_rx, report_tx) = create_pipe()?;

        Ok(Self {
            output_rx,
            output_tx,
            report_rx,
            report_tx,
        })
    }

    /// Split into the supervisor's read ends and the worker's write ends
    pub fn split(self) -> (SupervisorPipes, ChildPipes) {
        let supervisor = SupervisorPipes {
            output: self.output_rx,
            report: self.report_rx,
        };

        let child = ChildPipes {
            output: self.output_tx,
            report: self.report_tx,
        };

        (supervisor, child)
    }
}

/// Read ends, kept by the supervising task
#[derive(Debug)]
pub struct SupervisorPipes {
    output: OwnedFd,
    report: OwnedFd,
}

impl SupervisorPipes {
    /// Register both read ends with the tokio reactor
    pub fn into_receivers(self) -> Result<(Receiver, Receiver)> {
        let output = Receiver::from_owned_fd(self.output)?;
        let report = Receiver::from_owned_fd(self.report)?;
        Ok((output, report))
    }
}

/// Write ends, handed to the worker at spawn and dropped right after
#[derive(Debug)]
pub struct ChildPipes {
    output: OwnedFd,
    report: OwnedFd,
}

impl ChildPipes {
    /// stdout and stderr both write into the same output pipe
    pub fn stdio(&self) -> Result<(Stdio, Stdio)> {
        let stdout = self.output.try_clone()?;
        let stderr = self.output.try_clone()?;
        Ok((Stdio::from(stdout), Stdio::from(stderr)))
    }

    pub fn report_fd(&self) -> RawFd {
        self.report.as_raw_fd()
    }
}

/// Move `fd` to `target` in a freshly forked child, clearing close-on-exec.
///
/// Only async-signal-safe calls: meant for `pre_exec`.
pub fn install_fd(fd: RawFd, target: RawFd) -> std::io::Result<()> {
    if fd == target {
        // SAFETY: fcntl on a descriptor owned by this process
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
        if flags < 0 {
            return Err(std::io::Error::last_os_error());
        }
        // SAFETY: as above
        if unsafe { libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) } < 0 {
            return Err(std::io::Error::last_os_error());
        }
        return Ok(());
    }

    // SAFETY: dup2 between descriptors of this process
    if unsafe { libc::dup2(fd, target) } < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Create a pipe (returns read end, write end)
fn create_pipe() -> Result<(OwnedFd, OwnedFd)> {
    let mut fds = [0i32; 2];

    // SAFETY: pipe2 syscall
    let ret = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };

    if ret != 0 {
        return Err(ExecutorError::Io(std::io::Error::last_os_error()));
    }

    // SAFETY: We just created these file descriptors
    let read_end = unsafe { OwnedFd::from_raw_fd(fds[0]) };
    let write_end = unsafe { OwnedFd::from_raw_fd(fds[1]) };

    Ok((read_end, write_end))
}
