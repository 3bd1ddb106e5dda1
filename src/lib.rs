//! Synchronous execution of UNIX process pipelines.
//!
//! The crate launches one or more external programs connected stdout-to-
//! stdin, feeds the first stage's stdin, and collects the last stage's
//! stdout plus the stderr of every stage.  Transfers are multiplexed
//! through a single-threaded `poll` loop, so the call stays deadlock-free
//! no matter how much data flows in either direction - a sequential
//! write-then-read design would stall as soon as a 64 KiB kernel pipe
//! buffer fills.  Every stage is reaped, and any non-zero exit in the
//! chain fails the call with the *earliest* failure and its captured
//! diagnostic output.
//!
//! Stream wiring is chosen per stream with [`Stream`]: the null device, a
//! caller-owned descriptor, or an in-memory buffer.  By default stderr is
//! captured, so error messages carry what the children had to say:
//!
//! ```no_run
//! use pipechain::{execute, find_command, Streams};
//!
//! let echo = find_command("echo")?.into_os_string();
//! let (out, _err) = execute(&[echo, "hello".into()], Streams::capture_stdout())?;
//! assert_eq!(out, b"hello\n");
//! # Ok::<(), pipechain::Error>(())
//! ```
//!
//! Commands are argument vectors, not shell strings; the first element
//! must be the path of an executable, typically obtained through
//! [`find_command`].  There is no globbing, no variable expansion, and no
//! timeout.

#![warn(missing_docs)]

mod channel;
mod cleanup;
mod communicate;
mod error;
mod find;
mod format;
mod posix;
mod run;
mod spawn;

pub use self::channel::{Stream, Streams};
pub use self::error::{ChildFailure, Error, ExitStatus, Result};
pub use self::find::find_command;
pub use self::format::{CommandTree, format_commands};
pub use self::run::{execute, pipeline};
