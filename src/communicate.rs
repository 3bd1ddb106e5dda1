//! The readiness loop moving bytes between channel buffers and the
//! parent-held pipe ends.

use std::cmp::min;

use log::trace;

use crate::channel::{Channel, ChannelSet};
use crate::error::{Error, Result};
use crate::posix;
use crate::posix::PollFd;

#[derive(Copy, Clone)]
enum Role {
    Writer,
    Reader,
}

impl Role {
    fn events(self) -> i16 {
        match self {
            Role::Writer => posix::POLLOUT | posix::POLLHUP | posix::POLLERR,
            Role::Reader => posix::POLLIN | posix::POLLPRI | posix::POLLHUP,
        }
    }
}

/// Transfers bytes until every channel has reached EOF, HUP, or an
/// exhausted outbound buffer.
///
/// Writes are bounded by `PIPE_BUF` (the POSIX atomic-write limit), reads
/// by 4096 bytes, so no single transfer blocks long enough to starve
/// another channel.  A channel's parent end is closed as soon as the
/// channel is done - for stdin this is what delivers EOF to the first
/// child.  There is no timeout: a child that neither consumes nor produces
/// hangs the call.
pub(crate) fn communicate(channels: &mut ChannelSet) -> Result<()> {
    loop {
        let mut live: Vec<(&mut Channel, Role)> = Vec::new();
        if let Some(ch) = channels.stdin.as_mut()
            && ch.parent.is_open()
        {
            live.push((ch, Role::Writer));
        }
        for ch in [channels.stdout.as_mut(), channels.stderr.as_mut()].into_iter().flatten() {
            if ch.parent.is_open() {
                live.push((ch, Role::Reader));
            }
        }
        if live.is_empty() {
            return Ok(());
        }

        let mut fds: Vec<PollFd> = live
            .iter()
            .map(|(ch, role)| PollFd::new(ch.fd, role.events()))
            .collect();
        posix::poll(&mut fds)?;

        for ((ch, role), pfd) in live.iter_mut().zip(fds.iter()) {
            if pfd.test(posix::POLLERR | posix::POLLNVAL) {
                ch.parent.close();
                return Err(Error::Channel {
                    fd: ch.fd,
                    events: event_names(pfd),
                });
            }
            match role {
                Role::Writer => service_writer(ch, pfd)?,
                Role::Reader => service_reader(ch, pfd)?,
            }
        }
    }
}

fn service_writer(ch: &mut Channel, pfd: &PollFd) -> Result<()> {
    let mut done = false;
    if pfd.test(posix::POLLOUT) {
        let end = min(ch.pos + posix::PIPE_BUF, ch.buf.len());
        let written = ch.parent.write(&ch.buf[ch.pos..end])?;
        ch.pos += written;
        done = ch.pos == ch.buf.len();
    }
    if done || pfd.test(posix::POLLHUP) {
        trace!("stdin done, {} of {} bytes written", ch.pos, ch.buf.len());
        ch.parent.close();
    }
    Ok(())
}

fn service_reader(ch: &mut Channel, pfd: &PollFd) -> Result<()> {
    let mut done = false;
    if pfd.test(posix::POLLIN | posix::POLLPRI) {
        if pfd.test(posix::POLLHUP) {
            // The peer is gone but the kernel may still hold a final burst;
            // treating HUP as immediate end-of-stream would lose it.
            while read_chunk(ch)? != 0 {}
            done = true;
        } else {
            done = read_chunk(ch)? == 0;
        }
    }
    if done || pfd.test(posix::POLLHUP) {
        trace!("fd {} done, {} bytes captured", ch.fd, ch.buf.len());
        ch.parent.close();
    }
    Ok(())
}

fn read_chunk(ch: &mut Channel) -> Result<usize> {
    let mut buf = [0u8; 4096];
    let n = ch.parent.read(&mut buf)?;
    ch.buf.extend_from_slice(&buf[..n]);
    Ok(n)
}

fn event_names(pfd: &PollFd) -> String {
    let mut names = Vec::new();
    if pfd.test(posix::POLLERR) {
        names.push("ERR");
    }
    if pfd.test(posix::POLLNVAL) {
        names.push("NVAL");
    }
    if pfd.test(posix::POLLHUP) {
        names.push("HUP");
    }
    names.join("|")
}
