// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Async I/O over a raw descriptor.
//
// Terminal descriptors are shared with the rest of the process (and often
// with the parent shell), so switching them to O_NONBLOCK is not an option:
// the flag lives on the open file description and would leak to everyone
// else holding it. Instead each `FdStream` keeps the descriptor blocking
// and:
//
//   1. dup()s it, so registration and close never touch the original;
//   2. registers the dup with tokio's reactor on first use, from inside
//      the runtime that will drive it;
//   3. guards every read and write with `poll(fd, 0)`. Readiness from the
//      reactor can be stale (another reader took the bytes), and a blocking
//      read on stale readiness would stall the runtime. The zero-timeout
//      poll turns that into WouldBlock, and we wait for the next edge;
//   4. writes at most PIPE_BUF bytes per call. POLLOUT only promises that
//      much room, and a longer write(2) on a blocking descriptor would sit
//      in the kernel until the reader drains it. `write_all` loops over the
//      short writes, yielding whenever the descriptor is full.
//
// A registration belongs to one runtime. When that runtime shuts down,
// readiness polls fail; the stream then registers again with whichever
// runtime is polling it now.
//
// Descriptors the reactor refuses (regular files, /dev/null) never block
// anyway, so they fall back to plain read/write.

use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Largest write POLLOUT guarantees will not block.
const WRITE_CHUNK: usize = libc::PIPE_BUF;

/// Reactor registration state. Declared before the descriptor in
/// [`FdStream`] so it is dropped (deregistered) first.
enum Registration {
    /// Not yet seen by a runtime.
    Pending,
    Async(AsyncFd<RawFd>),
    /// The reactor refused the descriptor; plain blocking calls are safe.
    Direct,
}

/// A tokio `AsyncRead` + `AsyncWrite` over a duplicated descriptor.
pub struct FdStream {
    registration: Registration,
    fd: OwnedFd,
}

impl FdStream {
    /// Take ownership of `fd` as-is.
    #[must_use]
    pub const fn new(fd: OwnedFd) -> Self {
        Self {
            registration: Registration::Pending,
            fd,
        }
    }

    /// Duplicate `fd` and wrap the copy. The original stays untouched.
    ///
    /// # Errors
    ///
    /// Returns the OS error when `dup` fails.
    pub fn dup(fd: BorrowedFd<'_>) -> io::Result<Self> {
        Ok(Self::new(fd.try_clone_to_owned()?))
    }

    /// Duplicate a raw descriptor number such as 0, 1 or 2.
    ///
    /// # Errors
    ///
    /// Returns the OS error when `fd` is not open or `dup` fails.
    pub fn dup_raw(fd: RawFd) -> io::Result<Self> {
        if unsafe { libc::fcntl(fd, libc::F_GETFD) } == -1 {
            return Err(io::Error::last_os_error());
        }
        // Checked open above; the borrow ends before this call returns.
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        Self::dup(borrowed)
    }

    /// Whether the descriptor ended up on plain blocking calls.
    #[must_use]
    pub const fn is_direct(&self) -> bool {
        matches!(self.registration, Registration::Direct)
    }

    /// Register with the current runtime's reactor on first use.
    fn registration(&mut self) -> Option<&AsyncFd<RawFd>> {
        if matches!(self.registration, Registration::Pending) {
            self.registration = if tokio::runtime::Handle::try_current().is_err() {
                Registration::Direct
            } else {
                match AsyncFd::new(self.fd.as_raw_fd()) {
                    Ok(afd) => Registration::Async(afd),
                    Err(err) => {
                        tracing::trace!(
                            target: "tessera::session",
                            fd = self.fd.as_raw_fd(),
                            %err,
                            "descriptor not pollable, using direct I/O"
                        );
                        Registration::Direct
                    }
                }
            };
        }
        match &self.registration {
            Registration::Async(afd) => Some(afd),
            Registration::Pending | Registration::Direct => None,
        }
    }

    /// Drop a registration whose reactor refused a readiness poll, once per
    /// operation. Returns whether the caller should retry.
    fn forget_registration(&mut self, retried: &mut bool, err: &io::Error) -> bool {
        if *retried {
            return false;
        }
        *retried = true;
        tracing::debug!(
            target: "tessera::session",
            fd = self.fd.as_raw_fd(),
            %err,
            "reactor gone, registering again"
        );
        self.registration = Registration::Pending;
        true
    }
}

impl AsFd for FdStream {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl AsyncRead for FdStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }
        let this = self.get_mut();
        let fd = this.fd.as_raw_fd();
        let mut retried = false;

        loop {
            let Some(afd) = this.registration() else {
                let n = read_fd(fd, buf.initialize_unfilled())?;
                buf.advance(n);
                return Poll::Ready(Ok(()));
            };
            let mut guard = match ready!(afd.poll_read_ready(cx)) {
                Ok(guard) => guard,
                Err(err) => {
                    if this.forget_registration(&mut retried, &err) {
                        continue;
                    }
                    return Poll::Ready(Err(err));
                }
            };
            let unfilled = buf.initialize_unfilled();
            let attempt = guard.try_io(|inner| {
                if !ready_now(*inner.get_ref(), libc::POLLIN) {
                    return Err(io::ErrorKind::WouldBlock.into());
                }
                read_fd(fd, unfilled)
            });
            if let Ok(result) = attempt {
                let n = result?;
                buf.advance(n);
                return Poll::Ready(Ok(()));
            }
        }
    }
}

impl AsyncWrite for FdStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bytes: &[u8],
    ) -> Poll<io::Result<usize>> {
        if bytes.is_empty() {
            return Poll::Ready(Ok(0));
        }
        let this = self.get_mut();
        let fd = this.fd.as_raw_fd();
        let mut retried = false;

        loop {
            let Some(afd) = this.registration() else {
                return Poll::Ready(write_fd(fd, bytes));
            };
            let mut guard = match ready!(afd.poll_write_ready(cx)) {
                Ok(guard) => guard,
                Err(err) => {
                    if this.forget_registration(&mut retried, &err) {
                        continue;
                    }
                    return Poll::Ready(Err(err));
                }
            };
            let chunk = &bytes[..bytes.len().min(WRITE_CHUNK)];
            let attempt = guard.try_io(|inner| {
                if !ready_now(*inner.get_ref(), libc::POLLOUT) {
                    return Err(io::ErrorKind::WouldBlock.into());
                }
                write_fd(fd, chunk)
            });
            if let Ok(result) = attempt {
                return Poll::Ready(result);
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        // Nothing buffered: every write went straight to the descriptor.
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

// ─── Raw Calls ──────────────────────────────────────────────────────────────

/// Zero-timeout poll: would an operation on `fd` proceed right now?
/// Hang-ups and errors count as ready so the next call reports them.
fn ready_now(fd: RawFd, events: libc::c_short) -> bool {
    let mut pfd = libc::pollfd {
        fd,
        events,
        revents: 0,
    };
    unsafe { libc::poll(&raw mut pfd, 1, 0) > 0 }
}

fn read_fd(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast::<libc::c_void>(), buf.len()) };
        match usize::try_from(n) {
            Ok(n) => return Ok(n),
            Err(_) => {
                let err = io::Error::last_os_error();
                if err.kind() != io::ErrorKind::Interrupted {
                    return Err(err);
                }
            }
        }
    }
}

fn write_fd(fd: RawFd, bytes: &[u8]) -> io::Result<usize> {
    loop {
        let n = unsafe { libc::write(fd, bytes.as_ptr().cast::<libc::c_void>(), bytes.len()) };
        match usize::try_from(n) {
            Ok(n) => return Ok(n),
            Err(_) => {
                let err = io::Error::last_os_error();
                if err.kind() != io::ErrorKind::Interrupted {
                    return Err(err);
                }
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::FromRawFd;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn pipe() -> (OwnedFd, OwnedFd) {
        let mut fds = [0; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) }
    }

    #[tokio::test]
    async fn pipe_round_trip() {
        let (r, w) = pipe();
        let mut reader = FdStream::dup(r.as_fd()).unwrap();
        let mut writer = FdStream::new(w);

        writer.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 16];
        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello");
        assert!(!reader.is_direct());
    }

    #[tokio::test]
    async fn read_sees_eof_after_writer_closes() {
        let (r, w) = pipe();
        let mut reader = FdStream::new(r);
        drop(w);
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn dev_null_falls_back_to_direct_io() {
        let file = std::fs::OpenOptions::new()
            .write(true)
            .open("/dev/null")
            .unwrap();
        let mut stream = FdStream::new(OwnedFd::from(file));
        stream.write_all(b"discarded").await.unwrap();
        assert!(stream.is_direct());
    }

    /// Fill `w` until the kernel refuses more. Returns the bytes written.
    fn fill(w: &OwnedFd) -> usize {
        let fd = w.as_raw_fd();
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        assert_eq!(unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) }, 0);
        let chunk = [b'.'; 4096];
        let mut total = 0;
        while let Ok(n) = write_fd(fd, &chunk) {
            total += n;
        }
        assert_eq!(unsafe { libc::fcntl(fd, libc::F_SETFL, flags) }, 0);
        total
    }

    #[tokio::test]
    async fn large_write_into_a_nearly_full_pipe_yields() {
        let (r, w) = pipe();
        let filled = fill(&w);
        let mut reader = FdStream::new(r);
        let mut head = vec![0u8; 8 * 1024];
        reader.read_exact(&mut head).await.unwrap();

        let frame = vec![b'x'; 32 * 1024];
        let mut writer = FdStream::new(w);
        let write = tokio::spawn(async move { writer.write_all(&frame).await });

        // The runtime thread is free while the frame waits for room.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!write.is_finished());

        let mut rest = vec![0u8; filled - head.len() + 32 * 1024];
        reader.read_exact(&mut rest).await.unwrap();
        write.await.unwrap().unwrap();
        assert!(rest.ends_with(&[b'x'; 1024]));
    }

    #[test]
    fn survives_a_replaced_runtime() {
        let runtime = || {
            tokio::runtime::Builder::new_current_thread()
                .enable_io()
                .build()
                .unwrap()
        };
        let (r, w) = pipe();
        let mut reader = FdStream::new(r);
        let mut writer = FdStream::new(w);
        let mut buf = [0u8; 8];

        runtime().block_on(async {
            writer.write_all(b"first").await.unwrap();
            let n = reader.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"first");
        });
        runtime().block_on(async {
            writer.write_all(b"second").await.unwrap();
            let n = reader.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"second");
        });
        assert!(!reader.is_direct());
    }

    #[test]
    fn dup_raw_rejects_closed_descriptor() {
        assert!(FdStream::dup_raw(-1).is_err());
    }

    #[test]
    fn dup_leaves_original_open() {
        let (r, w) = pipe();
        let stream = FdStream::dup(r.as_fd()).unwrap();
        assert_ne!(stream.as_fd().as_raw_fd(), r.as_raw_fd());
        drop(stream);
        assert_ne!(unsafe { libc::fcntl(r.as_raw_fd(), libc::F_GETFD) }, -1);
        drop(w);
    }
}
