// SPDX-License-Identifier: MIT OR Apache-2.0
//! Parent-side pipe endpoints.

use std::io;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::pin::Pin;
use std::task::{Context, Poll};

use procwire_spec::PipeDirection;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::UnixStream;

use crate::sys;

/// The parent's end of a pipe descriptor spec.
///
/// Backed by one half of a connected stream pair, registered nonblocking
/// with the tokio reactor and flagged close-on-exec so later spawns never
/// inherit it. Reads and writes are plain async byte I/O; dropping the
/// endpoint closes it independently of the process handle.
pub struct ProcPipe {
    index: i32,
    direction: PipeDirection,
    stream: UnixStream,
}

impl ProcPipe {
    /// Wrap a parent-end descriptor. Must run inside a tokio runtime.
    pub(crate) fn from_owned(
        index: i32,
        direction: PipeDirection,
        fd: OwnedFd,
    ) -> io::Result<Self> {
        sys::set_cloexec(fd.as_raw_fd())?;
        let stream = std::os::unix::net::UnixStream::from(fd);
        stream.set_nonblocking(true)?;
        let stream = UnixStream::from_std(stream)?;
        Ok(Self {
            index,
            direction,
            stream,
        })
    }

    /// The child descriptor number this endpoint corresponds to.
    pub fn index(&self) -> i32 {
        self.index
    }

    /// Data direction, from the child's point of view.
    pub fn direction(&self) -> PipeDirection {
        self.direction
    }

    /// Unwrap into the underlying stream.
    pub fn into_inner(self) -> UnixStream {
        self.stream
    }
}

impl std::fmt::Debug for ProcPipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcPipe")
            .field("index", &self.index)
            .field("direction", &self.direction)
            .finish_non_exhaustive()
    }
}

impl AsRawFd for ProcPipe {
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

impl AsyncRead for ProcPipe {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for ProcPipe {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}
