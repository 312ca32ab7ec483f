// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Process-wide sessions on the standard descriptors.
//
// `stdout()` and `stderr()` build their session on first use and hand out
// a `&'static` to it. The first of them also installs two hooks, once per
// process, so a panic or `exit()` in raw mode never leaves the user's
// shell without echo:
//
//   panic   restore, then chain to the previous hook so the message prints
//           to a working terminal
//   atexit  restore
//
// Both write with plain write(2) on the output descriptor and take no
// async lock: the panicking task may be holding the state mutex.

use std::sync::{Once, OnceLock};

use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::error::Result;
use crate::session::Session;
use crate::style::StyledText;

static STDOUT: OnceLock<Session> = OnceLock::new();
static STDERR: OnceLock<Session> = OnceLock::new();
static HOOKS_INSTALLED: Once = Once::new();

/// The session on (stdin, stdout), configured from the environment.
///
/// Descriptors that are not open give a session over empty streams with a
/// [`Detached`](crate::terminal::Detached) backend, so callers never have
/// to handle a missing terminal here.
///
/// The session outlives any one runtime. Its descriptors register with
/// whichever runtime polls them, and register again if that runtime has
/// shut down.
pub fn stdout() -> &'static Session {
    STDOUT.get_or_init(|| create(1, "stdout"))
}

/// The session on (stdin, stderr), configured from the environment.
pub fn stderr() -> &'static Session {
    STDERR.get_or_init(|| create(2, "stderr"))
}

/// Print to [`stdout()`].
///
/// # Errors
///
/// As [`Session::print`].
pub async fn print(text: impl Into<StyledText>) -> Result<()> {
    stdout().print(text).await
}

/// Print a line to [`stdout()`].
///
/// # Errors
///
/// As [`Session::println`].
pub async fn println(text: impl Into<StyledText>) -> Result<()> {
    stdout().println(text).await
}

/// Print to [`stderr()`].
///
/// # Errors
///
/// As [`Session::print`].
pub async fn eprint(text: impl Into<StyledText>) -> Result<()> {
    stderr().print(text).await
}

/// Print a line to [`stderr()`].
///
/// # Errors
///
/// As [`Session::println`].
pub async fn eprintln(text: impl Into<StyledText>) -> Result<()> {
    stderr().println(text).await
}

/// Restore every session created so far. Safe to call from any context,
/// including a panic hook.
///
/// Both sessions share stdin's attributes. stderr goes first: if it entered
/// raw mode after stdout, its snapshot holds stdout's raw attributes, and
/// stdout's snapshot holds the originals.
pub fn restore_all() {
    for session in [STDERR.get(), STDOUT.get()].into_iter().flatten() {
        session.emergency_restore();
    }
}

// ─── Construction ───────────────────────────────────────────────────────────

fn create(output: i32, name: &'static str) -> Session {
    install_hooks();
    let session = open(output, SessionConfig::from_env());
    debug!(target: "tessera::session", name, caps = ?session.capabilities(), "global session created");
    session
}

#[cfg(unix)]
fn open(output: i32, config: SessionConfig) -> Session {
    match Session::open(0, output, config.clone()) {
        Ok(session) => session,
        Err(err) => {
            warn!(target: "tessera::session", output, %err, "standard descriptors unavailable");
            detached(config)
        }
    }
}

#[cfg(not(unix))]
fn open(output: i32, config: SessionConfig) -> Session {
    let backend = crate::terminal::native(0, output);
    if output == 2 {
        Session::new(tokio::io::stdin(), tokio::io::stderr(), backend, config)
    } else {
        Session::new(tokio::io::stdin(), tokio::io::stdout(), backend, config)
    }
}

#[cfg(unix)]
fn detached(config: SessionConfig) -> Session {
    Session::new(
        tokio::io::empty(),
        tokio::io::sink(),
        std::sync::Arc::new(crate::terminal::Detached::default()),
        config,
    )
}

// ─── Hooks ──────────────────────────────────────────────────────────────────

fn install_hooks() {
    HOOKS_INSTALLED.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            restore_all();
            previous(info);
        }));

        #[cfg(unix)]
        if unsafe { libc::atexit(restore_at_exit) } != 0 {
            warn!(target: "tessera::session", "could not register exit hook");
        }
    });
}

#[cfg(unix)]
extern "C" fn restore_at_exit() {
    restore_all();
}
