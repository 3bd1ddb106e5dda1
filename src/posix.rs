use std::ffi::{CString, OsString};
use std::fs::File;
use std::io::{Error, Result};
use std::mem::MaybeUninit;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{FromRawFd, RawFd};
use std::ptr;

use crate::error::ExitStatus;

pub use libc::{EBADF, ECHILD, EINTR, PIPE_BUF};
pub use libc::{POLLERR, POLLHUP, POLLIN, POLLNVAL, POLLOUT, POLLPRI};

fn check_err<T: Ord + Default>(num: T) -> Result<T> {
    if num < T::default() {
        return Err(Error::last_os_error());
    }
    Ok(num)
}

/// Create a pipe with close-on-exec set on both ends in the creating
/// syscall, so a descriptor can never race into a child forked between
/// creation and a later fcntl.  Returns (read end, write end).
pub fn pipe() -> Result<(File, File)> {
    let mut fds = [0 as libc::c_int; 2];
    check_err(unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) })?;
    Ok(unsafe { (File::from_raw_fd(fds[0]), File::from_raw_fd(fds[1])) })
}

/// Open the null device read-write, close-on-exec.
pub fn open_null() -> Result<File> {
    const NULL_DEVICE: &[u8] = b"/dev/null\0";
    let fd = check_err(unsafe {
        libc::open(
            NULL_DEVICE.as_ptr() as *const libc::c_char,
            libc::O_RDWR | libc::O_CLOEXEC,
        )
    })?;
    Ok(unsafe { File::from_raw_fd(fd) })
}

/// Fork the process; returns 0 in the child and the child's pid in the
/// parent.
pub fn fork() -> Result<u32> {
    check_err(unsafe { libc::fork() }).map(|pid| pid as u32)
}

pub fn _exit(status: u8) -> ! {
    unsafe { libc::_exit(status as libc::c_int) }
}

pub fn dup2(oldfd: RawFd, newfd: RawFd) -> Result<()> {
    check_err(unsafe { libc::dup2(oldfd, newfd) })?;
    Ok(())
}

pub fn close(fd: RawFd) -> Result<()> {
    check_err(unsafe { libc::close(fd) })?;
    Ok(())
}

fn os_to_cstring(s: &OsString) -> Result<CString> {
    let bytes = s.as_bytes();
    if bytes.iter().any(|&b| b == 0) {
        return Err(Error::from_raw_os_error(libc::EINVAL));
    }
    Ok(CString::new(bytes)
        // not expected to fail on Unix, as Unix paths *are* C strings
        .expect("converting Unix path to C string"))
}

/// Pre-marshalled argv for an exec-family call.
///
/// All allocation and conversion happens at construction time, before any
/// fork, so that [`exec`](Self::exec) is async-signal-safe in the child.
pub struct ExecImage {
    path: CString,
    // argv holds pointers into `args`; the field keeps the storage alive.
    #[allow(dead_code)]
    args: Vec<CString>,
    argv: Vec<*const libc::c_char>,
}

impl ExecImage {
    pub fn new(command: &[OsString]) -> Result<ExecImage> {
        if command.is_empty() {
            return Err(Error::from_raw_os_error(libc::EINVAL));
        }
        let path = os_to_cstring(&command[0])?;
        let args: Vec<CString> = command.iter().map(os_to_cstring).collect::<Result<_>>()?;
        let mut argv: Vec<*const libc::c_char> = args.iter().map(|a| a.as_ptr()).collect();
        argv.push(ptr::null());
        Ok(ExecImage { path, args, argv })
    }

    /// Replace the process image via `execv`.  The path is taken verbatim,
    /// without a search-path lookup.  Only returns on failure.
    pub fn exec(&self) -> Error {
        unsafe { libc::execv(self.path.as_ptr(), self.argv.as_ptr()) };
        Error::last_os_error()
    }
}

pub fn waitpid(pid: u32, flags: i32) -> Result<(u32, ExitStatus)> {
    let mut status = 0 as libc::c_int;
    let pid = check_err(unsafe {
        libc::waitpid(
            pid as libc::pid_t,
            &mut status as *mut libc::c_int,
            flags as libc::c_int,
        )
    })?;
    Ok((pid as u32, decode_exit_status(status)))
}

fn decode_exit_status(status: i32) -> ExitStatus {
    if libc::WIFEXITED(status) {
        ExitStatus::Exited(libc::WEXITSTATUS(status) as u32)
    } else if libc::WIFSIGNALED(status) {
        ExitStatus::Signaled(libc::WTERMSIG(status) as u8)
    } else {
        ExitStatus::Other(status)
    }
}

pub fn reset_sigpipe() -> Result<()> {
    // Called in the child between fork and exec.  libstd ignores SIGPIPE
    // and signal-handling libraries often set a mask; children inherit
    // both, and most UNIX programs never reset them on their own.  A
    // pipeline stage that cannot die of EPIPE would spin when its reader
    // goes away.  Everything here is async-signal-safe.
    unsafe {
        let mut set = MaybeUninit::<libc::sigset_t>::uninit();
        check_err(libc::sigemptyset(set.as_mut_ptr()))?;
        check_err(libc::pthread_sigmask(
            libc::SIG_SETMASK,
            set.as_ptr(),
            ptr::null_mut(),
        ))?;
        if libc::signal(libc::SIGPIPE, libc::SIG_DFL) == libc::SIG_ERR {
            return Err(Error::last_os_error());
        }
    }
    Ok(())
}

#[repr(transparent)]
pub struct PollFd(libc::pollfd);

impl PollFd {
    pub fn new(fd: RawFd, events: i16) -> PollFd {
        PollFd(libc::pollfd {
            fd,
            events,
            revents: 0,
        })
    }

    pub fn test(&self, mask: i16) -> bool {
        self.0.revents & mask != 0
    }
}

/// Block until at least one registered descriptor reports an event.  No
/// timeout: a descriptor that never becomes ready blocks forever.
pub fn poll(fds: &mut [PollFd]) -> Result<usize> {
    let cnt = check_err(unsafe {
        libc::poll(
            fds.as_mut_ptr() as *mut libc::pollfd,
            fds.len() as libc::nfds_t,
            -1,
        )
    })?;
    Ok(cnt as usize)
}
