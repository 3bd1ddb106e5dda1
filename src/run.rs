//! Entry points: pipeline orchestration and child reaping.

use std::ffi::{OsStr, OsString};
use std::io;
use std::io::ErrorKind;

use log::debug;

use crate::channel::{ChannelSet, Streams};
use crate::cleanup::Cleanup;
use crate::communicate::communicate;
use crate::error::{ChildFailure, ExitStatus, Result};
use crate::format::{CommandTree, format_commands};
use crate::posix;
use crate::spawn::spawn_pipeline;

/// Executes a pipeline of commands and returns the captured
/// `(stdout, stderr)` buffers.
///
/// Each command is a non-empty argument sequence whose first element is an
/// absolute path to an executable (see [`find_command`]); each stage's
/// stdout feeds the next stage's stdin through a kernel pipe.  The call
/// blocks until every stage has exited and every captured stream has
/// reached end-of-file; input and output of arbitrary size are multiplexed
/// through a readiness loop, so megabyte-scale transfers cannot deadlock.
///
/// Any stage exiting with a non-zero status fails the whole call with
/// [`ChildFailure`], reporting the leftmost failure together with the
/// captured stderr.  All stages are reaped before the error is returned.
/// There is no timeout: a stage that never exits hangs the call.
///
/// ```no_run
/// use pipechain::{find_command, pipeline, Streams};
///
/// let echo = find_command("echo")?.into_os_string();
/// let tr = find_command("tr")?.into_os_string();
/// let (out, _) = pipeline(
///     &[
///         vec![echo, "hello".into()],
///         vec![tr, "a-z".into(), "A-Z".into()],
///     ],
///     Streams::capture_stdout(),
/// )?;
/// assert_eq!(out, b"HELLO\n");
/// # Ok::<(), pipechain::Error>(())
/// ```
///
/// [`find_command`]: crate::find_command
pub fn pipeline<C, S>(commands: &[C], streams: Streams) -> Result<(Vec<u8>, Vec<u8>)>
where
    C: AsRef<[S]>,
    S: AsRef<OsStr>,
{
    if commands.is_empty() {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            "pipeline must contain at least one command",
        )
        .into());
    }
    let commands: Vec<Vec<OsString>> = commands
        .iter()
        .map(|cmd| cmd.as_ref().iter().map(|arg| arg.as_ref().to_owned()).collect())
        .collect();
    if commands.iter().any(Vec::is_empty) {
        return Err(io::Error::new(ErrorKind::InvalidInput, "command must not be empty").into());
    }
    run_pipeline(&commands, streams)
}

/// Executes a single command; equivalent to a one-stage [`pipeline`].
pub fn execute<S: AsRef<OsStr>>(argv: &[S], streams: Streams) -> Result<(Vec<u8>, Vec<u8>)> {
    pipeline(&[argv], streams)
}

fn run_pipeline(commands: &[Vec<OsString>], streams: Streams) -> Result<(Vec<u8>, Vec<u8>)> {
    // Parent-facing pipe ends live on `later`, which outlives the reap;
    // child-facing ends and the null device live on `here`, released right
    // after the fork loop so the kernel can deliver HUP when a child
    // closes its end.
    let mut later = Cleanup::new();
    let mut pids: Vec<u32> = Vec::new();
    let mut channels;
    let spawned;
    {
        let mut here = Cleanup::new();
        channels = ChannelSet::prepare(streams, &mut here, &mut later)?;
        let (child_stdin, child_stdout, child_stderr) = channels.child_fds();
        spawned = spawn_pipeline(commands, child_stdin, child_stdout, child_stderr, &mut pids);
    }

    let transferred = match spawned {
        Ok(()) => communicate(&mut channels),
        Err(_) => Ok(()),
    };

    // Release any parent ends an error path left open, so a stage blocked
    // on one of our pipes can exit and the reap below cannot hang.
    channels.close_parent_ends();
    let failure = reap_all(&pids)?;

    spawned?;
    transferred?;
    if let Some((index, status)) = failure {
        let command = format_commands(&CommandTree::command(&commands[index]));
        let stderr = channels
            .stderr
            .as_ref()
            .map(|ch| String::from_utf8_lossy(&ch.buf).into_owned());
        return Err(ChildFailure {
            status,
            command,
            stderr,
        }
        .into());
    }

    let out = channels.stdout.take().map(|ch| ch.buf).unwrap_or_default();
    let err = channels.stderr.take().map(|ch| ch.buf).unwrap_or_default();
    Ok((out, err))
}

// Waits for every child in launch order, recording the earliest non-zero
// exit.  Every remaining child is reaped even after a failure is seen:
// downstream stages cannot generally detect upstream failure through the
// byte stream, and leaving them unreaped would leak zombies.
fn reap_all(pids: &[u32]) -> Result<Option<(usize, ExitStatus)>> {
    let mut first_failure = None;
    for (i, &pid) in pids.iter().enumerate() {
        let status = match waitpid_retry(pid) {
            Ok(status) => status,
            // Reaped elsewhere; the exit status is unavailable.
            Err(e) if e.raw_os_error() == Some(posix::ECHILD) => continue,
            Err(e) => return Err(e.into()),
        };
        debug!("reaped pid {}: {}", pid, status);
        if first_failure.is_none() && !status.success() {
            first_failure = Some((i, status));
        }
    }
    Ok(first_failure)
}

fn waitpid_retry(pid: u32) -> io::Result<ExitStatus> {
    loop {
        match posix::waitpid(pid, 0) {
            Ok((_, status)) => return Ok(status),
            Err(e) if e.raw_os_error() == Some(posix::EINTR) => continue,
            Err(e) => return Err(e),
        }
    }
}
