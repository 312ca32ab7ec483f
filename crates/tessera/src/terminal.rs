// SPDX-License-Identifier: MIT
//
// Platform backends: raw mode, window size, and emergency restore.
//
// Safety: the unix backend necessarily uses `unsafe` for termios
// (tcgetattr, tcsetattr), ioctl (TIOCGWINSZ, TIOCSWINSZ), isatty, and raw
// fd writes. These are the standard POSIX interfaces for terminal control;
// there is no safe alternative. Each unsafe block is minimal.
#![allow(unsafe_code)]
//
// A session never touches the OS directly. Everything platform-specific
// sits behind `Backend`, picked once when the session is built:
//
//   UnixBackend: termios raw mode and window-size ioctls on a pair of
//   descriptors. Non-tty descriptors degrade gracefully: raw mode becomes
//   a no-op and the size reads as 0×0.
//
//   Detached: no terminal at all (pipes, tests, platforms without a
//   native implementation). Its size is whatever was last set.
//
// The emergency path at the bottom writes a restore sequence straight to a
// descriptor with one `write(2)`, so it works from a panic hook or an
// `atexit` handler while the async writer is locked mid-frame.

use std::fmt;
use std::io;
use std::sync::Mutex;

use crate::codec::TextEncoding;
use crate::geom::Size;

// ─── RawSnapshot ────────────────────────────────────────────────────────────

/// Terminal attributes saved by [`Backend::enter_raw`], opaque to callers.
#[derive(Clone, Default)]
pub struct RawSnapshot {
    #[cfg(unix)]
    termios: Option<libc::termios>,
}

impl RawSnapshot {
    /// A snapshot that restores nothing. Returned when there is no
    /// terminal to put into raw mode.
    pub const EMPTY: Self = Self {
        #[cfg(unix)]
        termios: None,
    };

    /// Whether leaving raw mode with this snapshot would change anything.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        #[cfg(unix)]
        {
            self.termios.is_none()
        }
        #[cfg(not(unix))]
        {
            true
        }
    }
}

impl fmt::Debug for RawSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawSnapshot")
            .field("saved", &!self.is_empty())
            .finish()
    }
}

// ─── Backend ────────────────────────────────────────────────────────────────

/// Platform services a session needs from its descriptors.
///
/// Implementations must be cheap to call: the session queries the size on
/// every resize and toggles raw mode on every mode transition.
pub trait Backend: Send + Sync {
    /// Current window size. 0×0 when there is no window.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the query fails on a real terminal.
    fn query_size(&self) -> io::Result<Size>;

    /// Ask for a new window size.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the terminal refuses.
    fn set_size(&self, size: Size) -> io::Result<()>;

    /// Switch the input descriptor to raw mode and return what it was.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the attributes cannot be read or written.
    fn enter_raw(&self) -> io::Result<RawSnapshot>;

    /// Put back attributes saved by [`enter_raw`](Self::enter_raw).
    ///
    /// # Errors
    ///
    /// Returns the OS error when the attributes cannot be written.
    fn leave_raw(&self, snapshot: &RawSnapshot) -> io::Result<()>;

    /// The encoding the descriptors speak.
    fn codepage(&self) -> TextEncoding;

    /// Change the encoding the descriptors speak.
    ///
    /// # Errors
    ///
    /// Returns an error when the platform refuses the change.
    fn set_codepage(&self, encoding: TextEncoding) -> io::Result<()>;

    /// Whether the output descriptor is a terminal.
    fn is_tty(&self) -> bool;

    /// Whether the platform delivers window-size changes for this terminal.
    fn watches_resize(&self) -> bool;
}

// ─── Detached ───────────────────────────────────────────────────────────────

/// A backend with no terminal behind it.
///
/// Raw mode toggles do nothing and the size is whatever was last set
/// (0×0 initially).
#[derive(Debug, Default)]
pub struct Detached {
    size: Mutex<Size>,
    encoding: Mutex<TextEncoding>,
}

impl Detached {
    #[must_use]
    pub fn new(size: Size) -> Self {
        Self {
            size: Mutex::new(size),
            encoding: Mutex::new(TextEncoding::default()),
        }
    }
}

impl Backend for Detached {
    fn query_size(&self) -> io::Result<Size> {
        Ok(self.size.lock().map_or_else(|e| *e.into_inner(), |s| *s))
    }

    fn set_size(&self, size: Size) -> io::Result<()> {
        match self.size.lock() {
            Ok(mut s) => *s = size,
            Err(e) => *e.into_inner() = size,
        }
        Ok(())
    }

    fn enter_raw(&self) -> io::Result<RawSnapshot> {
        Ok(RawSnapshot::EMPTY)
    }

    fn leave_raw(&self, _snapshot: &RawSnapshot) -> io::Result<()> {
        Ok(())
    }

    fn codepage(&self) -> TextEncoding {
        self.encoding.lock().map_or_else(|e| *e.into_inner(), |enc| *enc)
    }

    fn set_codepage(&self, encoding: TextEncoding) -> io::Result<()> {
        match self.encoding.lock() {
            Ok(mut enc) => *enc = encoding,
            Err(e) => *e.into_inner() = encoding,
        }
        Ok(())
    }

    fn is_tty(&self) -> bool {
        false
    }

    fn watches_resize(&self) -> bool {
        false
    }
}

// ─── UnixBackend ────────────────────────────────────────────────────────────

#[cfg(unix)]
pub use self::unix::UnixBackend;

#[cfg(unix)]
mod unix {
    use std::io;
    use std::os::fd::RawFd;
    use std::sync::Mutex;

    use super::{Backend, RawSnapshot};
    use crate::codec::TextEncoding;
    use crate::geom::Size;

    /// termios and ioctl control of an input/output descriptor pair.
    ///
    /// The descriptors are borrowed: the backend never closes them.
    #[derive(Debug)]
    pub struct UnixBackend {
        input: RawFd,
        output: RawFd,
        encoding: Mutex<TextEncoding>,
    }

    impl UnixBackend {
        #[must_use]
        pub fn new(input: RawFd, output: RawFd) -> Self {
            Self {
                input,
                output,
                encoding: Mutex::new(TextEncoding::default()),
            }
        }

        #[must_use]
        pub const fn input_fd(&self) -> RawFd {
            self.input
        }

        #[must_use]
        pub const fn output_fd(&self) -> RawFd {
            self.output
        }
    }

    fn isatty(fd: RawFd) -> bool {
        unsafe { libc::isatty(fd) != 0 }
    }

    fn window_size(fd: RawFd) -> Option<Size> {
        let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
        let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &raw mut ws) };
        (result == 0).then(|| Size::new(ws.ws_col, ws.ws_row))
    }

    impl Backend for UnixBackend {
        fn query_size(&self) -> io::Result<Size> {
            if let Some(size) = window_size(self.output).or_else(|| window_size(self.input)) {
                return Ok(size);
            }
            if self.is_tty() {
                Err(io::Error::last_os_error())
            } else {
                Ok(Size::default())
            }
        }

        fn set_size(&self, size: Size) -> io::Result<()> {
            if !self.is_tty() {
                return Ok(());
            }
            let ws = libc::winsize {
                ws_row: size.rows,
                ws_col: size.cols,
                ws_xpixel: 0,
                ws_ypixel: 0,
            };
            if unsafe { libc::ioctl(self.output, libc::TIOCSWINSZ, &raw const ws) } != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }

        fn enter_raw(&self) -> io::Result<RawSnapshot> {
            if !isatty(self.input) {
                return Ok(RawSnapshot::EMPTY);
            }

            unsafe {
                let mut termios: libc::termios = std::mem::zeroed();
                if libc::tcgetattr(self.input, &raw mut termios) != 0 {
                    return Err(io::Error::last_os_error());
                }
                let original = termios;

                // cfmakeraw equivalent: disable all line processing.
                termios.c_iflag &= !(libc::IGNBRK
                    | libc::BRKINT
                    | libc::PARMRK
                    | libc::ISTRIP
                    | libc::INLCR
                    | libc::IGNCR
                    | libc::ICRNL
                    | libc::IXON);
                termios.c_oflag &= !libc::OPOST;
                termios.c_lflag &=
                    !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
                termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
                termios.c_cflag |= libc::CS8;

                // VMIN=1, VTIME=0: read() blocks until at least 1 byte available.
                termios.c_cc[libc::VMIN] = 1;
                termios.c_cc[libc::VTIME] = 0;

                if libc::tcsetattr(self.input, libc::TCSAFLUSH, &raw const termios) != 0 {
                    return Err(io::Error::last_os_error());
                }

                Ok(RawSnapshot {
                    termios: Some(original),
                })
            }
        }

        fn leave_raw(&self, snapshot: &RawSnapshot) -> io::Result<()> {
            let Some(original) = snapshot.termios.as_ref() else {
                return Ok(());
            };
            if unsafe { libc::tcsetattr(self.input, libc::TCSAFLUSH, original) } != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }

        fn codepage(&self) -> TextEncoding {
            self.encoding.lock().map_or_else(|e| *e.into_inner(), |enc| *enc)
        }

        fn set_codepage(&self, encoding: TextEncoding) -> io::Result<()> {
            // Unix terminals have no codepage switch; the choice is ours.
            match self.encoding.lock() {
                Ok(mut enc) => *enc = encoding,
                Err(e) => *e.into_inner() = encoding,
            }
            Ok(())
        }

        fn is_tty(&self) -> bool {
            isatty(self.output)
        }

        fn watches_resize(&self) -> bool {
            self.is_tty()
        }
    }
}

/// The native backend for a descriptor pair.
#[cfg(unix)]
#[must_use]
pub fn native(input: std::os::fd::RawFd, output: std::os::fd::RawFd) -> std::sync::Arc<dyn Backend> {
    std::sync::Arc::new(UnixBackend::new(input, output))
}

/// The native backend for a descriptor pair. Without a native
/// implementation this is [`Detached`].
#[cfg(not(unix))]
#[must_use]
pub fn native(_input: i32, _output: i32) -> std::sync::Arc<dyn Backend> {
    std::sync::Arc::new(Detached::default())
}

// ─── Emergency Restore ──────────────────────────────────────────────────────

/// Write `bytes` to `fd` with plain `write(2)` calls, bypassing every lock.
/// Best-effort: errors end the attempt silently.
#[cfg(unix)]
pub fn write_fd(fd: std::os::fd::RawFd, mut bytes: &[u8]) {
    while !bytes.is_empty() {
        let n = unsafe { libc::write(fd, bytes.as_ptr().cast::<libc::c_void>(), bytes.len()) };
        let Ok(n) = usize::try_from(n) else {
            if io::Error::last_os_error().kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return;
        };
        if n == 0 {
            return;
        }
        bytes = &bytes[n..];
    }
}

#[cfg(not(unix))]
pub fn write_fd(_fd: i32, bytes: &[u8]) {
    use std::io::Write;
    let mut out = io::stdout();
    out.write_all(bytes).ok();
    out.flush().ok();
}

// ─── Tests ──────────────────────────────────────────────────────────────────
