use std::fmt;
use std::io;
use std::os::unix::io::RawFd;

/// Exit status of a reaped child process, decoded from `waitpid()`.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone)]
pub enum ExitStatus {
    /// The process exited voluntarily with the given code.
    Exited(u32),
    /// The process was terminated by the given signal.
    Signaled(u8),
    /// Other wait status - see waitpid(2).
    Other(i32),
}

impl ExitStatus {
    /// True if the process exited with code 0.
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Exited(0))
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Exited(code) => write!(f, "exit code {}", code),
            ExitStatus::Signaled(sig) => write!(f, "signal {}", sig),
            ExitStatus::Other(raw) => write!(f, "wait status {} {:#x}", raw, raw),
        }
    }
}

/// A pipeline stage exited with a non-zero status.
///
/// When several stages fail, the leftmost failure is the one reported:
/// downstream commands often cannot detect upstream failure through the byte
/// stream alone and may succeed on partial input, so the earliest error is
/// the one that explains the run.
#[derive(Debug)]
pub struct ChildFailure {
    /// Status of the earliest failing stage.
    pub status: ExitStatus,
    /// Human-readable rendering of the failing command.
    pub command: String,
    /// Captured stderr of the whole pipeline, decoded as UTF-8, or `None`
    /// if stderr was not captured.
    pub stderr: Option<String>,
}

impl fmt::Display for ChildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` failed with {}", self.command, self.status)?;
        if let Some(stderr) = &self.stderr
            && !stderr.is_empty()
        {
            write!(f, ": {}", stderr.trim_end())?;
        }
        Ok(())
    }
}

impl std::error::Error for ChildFailure {}

/// The error type for pipeline execution.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A pipeline stage exited with a non-zero status.
    #[error(transparent)]
    Child(#[from] ChildFailure),

    /// The readiness primitive reported an error condition on a pipe end
    /// owned by the executor.
    #[error("poll reported {events} on fd {fd}")]
    Channel {
        /// The descriptor the event was reported for.
        fd: RawFd,
        /// Symbolic rendering of the event set, e.g. `"ERR|NVAL"`.
        events: String,
    },

    /// An underlying syscall failed; propagated unchanged.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
