//! Stream specifications and the pipe/fd channels built from them.

use std::fs::File;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

use log::trace;

use crate::cleanup::{Cleanup, FdSlot};
use crate::posix;

/// What to connect to one of the child processes' standard streams.
#[derive(Debug)]
pub enum Stream {
    /// Route the stream to the null device.
    ///
    /// The device is opened at most once per call and shared between every
    /// `Null` stream.
    Null,

    /// Connect the stream to a caller-owned file descriptor.
    ///
    /// The descriptor is handed to the children as-is: it is neither closed
    /// nor duplicated into a pipe, and the caller retains ownership.  For
    /// stderr it is shared by every stage, so it may see interleaved output.
    Fd(RawFd),

    /// Connect the stream to a pipe held by the executor.
    ///
    /// For stdin the buffer supplies the bytes written to the first
    /// command.  For stdout and stderr the buffer is the initial content of
    /// the returned capture; received bytes are appended in arrival order.
    Data(Vec<u8>),
}

impl Stream {
    /// An empty [`Data`](Stream::Data) buffer, for capturing output.
    pub fn capture() -> Stream {
        Stream::Data(Vec::new())
    }
}

/// Stream specifications for the three standard streams of a pipeline.
///
/// The default routes stdin and stdout to the null device and captures
/// stderr, so failures carry the children's diagnostic output without the
/// caller opting in:
///
/// ```
/// use pipechain::{Stream, Streams};
///
/// let streams = Streams {
///     stdout: Stream::capture(),
///     ..Default::default()
/// };
/// ```
#[derive(Debug)]
pub struct Streams {
    /// Fed to the first command.
    pub stdin: Stream,
    /// Collected from the last command.
    pub stdout: Stream,
    /// Collected from every command.
    pub stderr: Stream,
}

impl Default for Streams {
    fn default() -> Streams {
        Streams {
            stdin: Stream::Null,
            stdout: Stream::Null,
            stderr: Stream::capture(),
        }
    }
}

impl Streams {
    /// The default wiring plus captured stdout.
    pub fn capture_stdout() -> Streams {
        Streams {
            stdout: Stream::capture(),
            ..Default::default()
        }
    }
}

/// A pipe connecting the executor to one standard stream of the pipeline.
/// Exists only for `Data` streams.
pub(crate) struct Channel {
    /// Parent-end descriptor, recorded for poll registration and error
    /// reports; remains valid only while `parent` is open.
    pub fd: RawFd,
    /// Parent-facing pipe end.  Closed early by the readiness loop on
    /// HUP/EOF, or by the outer cleanup stack after reap.
    pub parent: FdSlot,
    /// Bytes to write (stdin) or bytes received so far (stdout/stderr).
    pub buf: Vec<u8>,
    /// Write position within `buf`; unused for readers.
    pub pos: usize,
}

impl Channel {
    fn new(parent_end: File, buf: Vec<u8>) -> Channel {
        Channel {
            fd: parent_end.as_raw_fd(),
            parent: FdSlot::new(parent_end),
            buf,
            pos: 0,
        }
    }
}

/// The three channels of one pipeline run plus the descriptors its children
/// must receive.
pub(crate) struct ChannelSet {
    pub stdin: Option<Channel>,
    pub stdout: Option<Channel>,
    pub stderr: Option<Channel>,
    child_stdin: RawFd,
    child_stdout: RawFd,
    child_stderr: RawFd,
}

// The null device, opened on first use and released by the setup-scoped
// cleanup stack.
struct LazyNull(Option<RawFd>);

impl LazyNull {
    fn get(&mut self, here: &mut Cleanup) -> io::Result<RawFd> {
        if let Some(fd) = self.0 {
            return Ok(fd);
        }
        let file = posix::open_null()?;
        let fd = file.as_raw_fd();
        trace!("opened null device as fd {}", fd);
        here.defer(move || drop(file));
        self.0 = Some(fd);
        Ok(fd)
    }
}

impl ChannelSet {
    /// Translates the three stream specifications into channels.
    ///
    /// Child-facing pipe ends and the null device are registered on `here`
    /// (released right after the children are forked); parent-facing ends
    /// are registered on `later` (released after reap, unless the readiness
    /// loop closes them first).  `Fd` streams touch neither stack.
    pub fn prepare(streams: Streams, here: &mut Cleanup, later: &mut Cleanup) -> io::Result<ChannelSet> {
        let mut null = LazyNull(None);

        let (stdin, child_stdin) = match streams.stdin {
            Stream::Null => (None, null.get(here)?),
            Stream::Fd(fd) => (None, fd),
            Stream::Data(buf) => {
                let (child_end, parent_end) = posix::pipe()?;
                trace!(
                    "stdin pipe: parent writes fd {}, child reads fd {}",
                    parent_end.as_raw_fd(),
                    child_end.as_raw_fd()
                );
                let child_fd = child_end.as_raw_fd();
                here.defer(move || drop(child_end));
                let channel = Channel::new(parent_end, buf);
                later.defer({
                    let slot = channel.parent.clone();
                    move || slot.close()
                });
                (Some(channel), child_fd)
            }
        };

        let (stdout, child_stdout) = Self::prepare_output(streams.stdout, &mut null, here, later)?;
        let (stderr, child_stderr) = Self::prepare_output(streams.stderr, &mut null, here, later)?;

        Ok(ChannelSet {
            stdin,
            stdout,
            stderr,
            child_stdin,
            child_stdout,
            child_stderr,
        })
    }

    fn prepare_output(
        stream: Stream,
        null: &mut LazyNull,
        here: &mut Cleanup,
        later: &mut Cleanup,
    ) -> io::Result<(Option<Channel>, RawFd)> {
        match stream {
            Stream::Null => Ok((None, null.get(here)?)),
            Stream::Fd(fd) => Ok((None, fd)),
            Stream::Data(buf) => {
                let (parent_end, child_end) = posix::pipe()?;
                trace!(
                    "output pipe: child writes fd {}, parent reads fd {}",
                    child_end.as_raw_fd(),
                    parent_end.as_raw_fd()
                );
                let child_fd = child_end.as_raw_fd();
                here.defer(move || drop(child_end));
                let channel = Channel::new(parent_end, buf);
                later.defer({
                    let slot = channel.parent.clone();
                    move || slot.close()
                });
                Ok((Some(channel), child_fd))
            }
        }
    }

    /// The descriptors to install as the children's stdin, stdout, and
    /// stderr.  Valid until the setup-scoped cleanup stack runs.
    pub fn child_fds(&self) -> (RawFd, RawFd, RawFd) {
        (self.child_stdin, self.child_stdout, self.child_stderr)
    }

    /// Closes any parent-facing ends still open.  Called before reaping so
    /// a child blocked on one of our pipes can exit.
    pub fn close_parent_ends(&self) {
        for channel in [&self.stdin, &self.stdout, &self.stderr].into_iter().flatten() {
            channel.parent.close();
        }
    }
}
