//! Forking and wiring the pipeline's child processes.

use std::ffi::OsString;
use std::fs::File;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

use log::debug;

use crate::posix;
use crate::posix::ExecImage;

/// Forks every command of the pipeline left-to-right, connecting each
/// stage's stdout to its successor's stdin through a fresh pipe.
///
/// `child_stdin` becomes descriptor 0 of the first stage, `child_stdout`
/// descriptor 1 of the last, and `child_stderr` descriptor 2 of every
/// stage (stderr is not piped between stages).  The predecessor pipe's
/// ends are closed in the parent as soon as the successor has been forked;
/// at that point they are owned by the kernel and the two children alone.
///
/// Pids are appended to `pids` in launch order as each fork succeeds, so
/// the caller can reap the already-started stages even when a later pipe
/// or fork syscall fails.
pub(crate) fn spawn_pipeline(
    commands: &[Vec<OsString>],
    child_stdin: RawFd,
    child_stdout: RawFd,
    child_stderr: RawFd,
    pids: &mut Vec<u32>,
) -> io::Result<()> {
    // Marshal every argv before the first fork: the child branch below must
    // not allocate.
    let images: Vec<ExecImage> = commands.iter().map(|cmd| ExecImage::new(cmd)).collect::<io::Result<_>>()?;

    let mut prev: Option<(File, File)> = None;
    for (i, image) in images.iter().enumerate() {
        let last = i == images.len() - 1;
        let next = if last { None } else { Some(posix::pipe()?) };

        let pid = posix::fork()?;
        if pid == 0 {
            let fd0 = prev.as_ref().map_or(child_stdin, |(read, _)| read.as_raw_fd());
            let fd1 = next.as_ref().map_or(child_stdout, |(_, write)| write.as_raw_fd());
            exec_stage(image, fd0, fd1, child_stderr, &prev, &next);
        }
        pids.push(pid);
        debug!("forked stage {} as pid {}", i, pid);

        // Both ends of the predecessor pipe were only needed to hand to
        // this child; release our copies.
        prev = next;
    }
    Ok(())
}

// Runs in the child: wire the standard streams, shed the pipe ends that
// were not duplicated onto them, and exec.  Only async-signal-safe calls
// between fork and exec; exits 127 when the wiring or the exec itself
// fails so the reaper observes a non-zero status.
fn exec_stage(
    image: &ExecImage,
    fd0: RawFd,
    fd1: RawFd,
    fd2: RawFd,
    prev: &Option<(File, File)>,
    next: &Option<(File, File)>,
) -> ! {
    let wired = (|| -> io::Result<()> {
        posix::dup2(fd0, 0)?;
        posix::dup2(fd1, 1)?;
        posix::dup2(fd2, 2)?;
        for (read, write) in prev.iter().chain(next.iter()) {
            let _ = posix::close(read.as_raw_fd());
            let _ = posix::close(write.as_raw_fd());
        }
        posix::reset_sigpipe()
    })();
    if wired.is_ok() {
        image.exec();
    }
    posix::_exit(127)
}
