// SPDX-License-Identifier: MIT
//
// Terminal session.
//
// A `Session` owns one input stream, one output stream and a `Backend` for
// the platform side (size, raw attributes). It tracks three independent
// axes of terminal state:
//
//   raw     cooked line discipline vs. raw keystrokes
//   mouse   mouse reporting off vs. on
//   saved   whether a display snapshot (alternate screen or DECSC) is held
//
// Every transition is idempotent, and each one is recorded so `Drop` (or
// the emergency hooks in `global`) can undo whatever is still active.
//
// Locking: output, rendering and mode changes serialize on the state
// mutex. `read_event` holds the input mutex, so a reader parked on the
// descriptor never blocks a render. Decoded events and partial sequences
// live in the input state, which makes `read_event` cancellation-safe: a
// dropped future loses nothing. The only nested acquisition is input then
// state (on resize).

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use futures_util::{FutureExt, Stream, stream};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, MutexGuard, Notify};
use tokio::task::AbortHandle;
use tracing::{debug, trace, warn};

use crate::ansi;
use crate::caps::{Capabilities, Features};
use crate::config::SessionConfig;
use crate::diff::{self, RenderStats};
use crate::encoder::Encoder;
use crate::error::{Error, Result};
use crate::geom::{Coord, Size};
use crate::input::{Decoder, Event};
use crate::matrix::Matrix;
use crate::output::{OutputBuffer, Pen};
use crate::style::{Style, StyledText};
use crate::terminal::{self, Backend, RawSnapshot};

const TARGET: &str = "tessera::session";

/// Bytes requested from the input stream per read.
const READ_BUF_SIZE: usize = 4096;

type Reader = Box<dyn AsyncRead + Send + Unpin>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

// ─── Shared State ───────────────────────────────────────────────────────────

/// Everything output touches. Guarded by the state mutex.
struct State {
    writer: Writer,
    out: OutputBuffer,
    pen: Pen,
    /// What the terminal is believed to show. `None` means unknown.
    baseline: Option<Matrix>,
    saved: Option<SavedDisplay>,
}

/// The display snapshot taken by `save_state`.
struct SavedDisplay {
    alt_screen: bool,
    cursor_hidden: bool,
    baseline: Option<Matrix>,
}

/// Everything `read_event` touches. Guarded by the input mutex.
struct Input {
    reader: Reader,
    decoder: Decoder,
    queue: VecDeque<Event>,
    scratch: Box<[u8]>,
    eof: bool,
}

/// A pending window-size change, raised from the signal task or by hand.
#[derive(Default)]
struct ResizeSignal {
    pending: AtomicBool,
    notify: Notify,
}

impl ResizeSignal {
    fn raise(&self) {
        self.pending.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }
}

/// What woke a waiting `read_event`.
enum Wake {
    Resize,
    Read(io::Result<usize>),
    /// The escape grace period ran out with a sequence still pending.
    Grace,
}

// ─── Session ────────────────────────────────────────────────────────────────

/// An interactive terminal: modes, output, rendering and input events.
///
/// All operations take `&self`, so a session can be shared between a task
/// that renders and a task that reads events.
pub struct Session {
    config: SessionConfig,
    caps: Capabilities,
    encoder: Encoder,
    backend: Arc<dyn Backend>,
    state: Mutex<State>,
    input: Mutex<Input>,
    raw_snapshot: StdMutex<Option<RawSnapshot>>,
    resize: Arc<ResizeSignal>,
    watcher: OnceLock<Option<AbortHandle>>,
    /// Output descriptor for lock-free restore writes. Only sessions opened
    /// on descriptors have one.
    restore_fd: Option<i32>,
    raw: AtomicBool,
    mouse: AtomicBool,
    saved: AtomicBool,
    cursor_hidden: AtomicBool,
    closed: AtomicBool,
    /// Set by a resize; the next state lock drops the baseline.
    stale_baseline: AtomicBool,
}

impl Session {
    /// A session over arbitrary streams.
    ///
    /// Capabilities come from `config`, with non-terminal output falling
    /// back to [`Capabilities::DUMB`].
    pub fn new(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
        backend: Arc<dyn Backend>,
        config: SessionConfig,
    ) -> Self {
        let caps = config.capabilities_for(backend.is_tty());
        let encoder = Encoder::new(caps, config.encoding);
        if backend.codepage() != config.encoding {
            if let Err(err) = backend.set_codepage(config.encoding) {
                warn!(target: TARGET, %err, encoding = config.encoding.label(), "could not switch codepage");
            }
        }
        debug!(
            target: TARGET,
            depth = ?caps.depth,
            features = ?caps.features,
            encoding = config.encoding.label(),
            "session created"
        );

        Self {
            state: Mutex::new(State {
                writer: Box::new(writer),
                out: OutputBuffer::new(),
                pen: Pen::new(encoder),
                baseline: None,
                saved: None,
            }),
            input: Mutex::new(Input {
                reader: Box::new(reader),
                decoder: Decoder::new(config.encoding),
                queue: VecDeque::new(),
                scratch: vec![0; READ_BUF_SIZE].into_boxed_slice(),
                eof: false,
            }),
            config,
            caps,
            encoder,
            backend,
            raw_snapshot: StdMutex::new(None),
            resize: Arc::new(ResizeSignal::default()),
            watcher: OnceLock::new(),
            restore_fd: None,
            raw: AtomicBool::new(false),
            mouse: AtomicBool::new(false),
            saved: AtomicBool::new(false),
            cursor_hidden: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            stale_baseline: AtomicBool::new(false),
        }
    }

    /// A session on a descriptor pair such as (0, 1), using the native
    /// backend. Both descriptors are duplicated; the originals are never
    /// closed or switched to non-blocking mode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when either descriptor is not open.
    #[cfg(unix)]
    pub fn open(input: std::os::fd::RawFd, output: std::os::fd::RawFd, config: SessionConfig) -> Result<Self> {
        use crate::fd::FdStream;

        let reader = FdStream::dup_raw(input)?;
        let writer = FdStream::dup_raw(output)?;
        let mut session = Self::new(reader, writer, terminal::native(input, output), config);
        session.restore_fd = Some(output);
        Ok(session)
    }

    // ─── Inspection ──────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub const fn capabilities(&self) -> Capabilities {
        self.caps
    }

    #[inline]
    #[must_use]
    pub const fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    #[must_use]
    pub fn is_raw(&self) -> bool {
        self.raw.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_mouse_enabled(&self) -> bool {
        self.mouse.load(Ordering::Acquire)
    }

    /// Whether `save_state` is holding a display snapshot.
    #[must_use]
    pub fn has_saved_state(&self) -> bool {
        self.saved.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_cursor_hidden(&self) -> bool {
        self.cursor_hidden.load(Ordering::Acquire)
    }

    /// Whether the terminal went away. Every later operation fails with
    /// [`Error::Closed`].
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    // ─── Modes ───────────────────────────────────────────────────────────

    /// Switch the input to raw mode. Does nothing if already raw.
    ///
    /// Bracketed paste and focus reporting come on with raw mode when
    /// configured and supported.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] after the terminal went away, [`Error::Io`] when
    /// the backend or the write fails.
    pub async fn enter_raw_mode(&self) -> Result<()> {
        let mut state = self.lock().await?;
        if self.is_raw() {
            return Ok(());
        }
        let snapshot = self.backend.enter_raw().map_err(|err| self.fail(err))?;
        *self.raw_snapshot() = Some(snapshot);
        if self.wants_paste() {
            ansi::enable_bracketed_paste(&mut state.out).ok();
        }
        if self.wants_focus() {
            ansi::enable_focus_reporting(&mut state.out).ok();
        }
        self.raw.store(true, Ordering::Release);
        debug!(target: TARGET, "entered raw mode");
        self.flush_out(&mut state).await
    }

    /// Return to cooked mode. Does nothing if already cooked.
    ///
    /// # Errors
    ///
    /// As [`enter_raw_mode`](Self::enter_raw_mode).
    pub async fn leave_raw_mode(&self) -> Result<()> {
        let mut state = self.lock().await?;
        if !self.is_raw() {
            return Ok(());
        }
        if self.wants_paste() {
            ansi::disable_bracketed_paste(&mut state.out).ok();
        }
        if self.wants_focus() {
            ansi::disable_focus_reporting(&mut state.out).ok();
        }
        let flushed = self.flush_out(&mut state).await;
        let snapshot = self.raw_snapshot().take();
        self.raw.store(false, Ordering::Release);
        debug!(target: TARGET, "left raw mode");
        if let Some(snapshot) = snapshot {
            self.backend.leave_raw(&snapshot).map_err(|err| self.fail(err))?;
        }
        flushed
    }

    /// Turn on mouse reporting with the configured tracking mode.
    ///
    /// The mode is recorded even when the terminal cannot report the mouse;
    /// nothing is written in that case.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] or [`Error::Io`].
    pub async fn enter_mouse_mode(&self) -> Result<()> {
        let mut state = self.lock().await?;
        if self.is_mouse_enabled() {
            return Ok(());
        }
        if self.caps.has(Features::MOUSE) {
            let sgr = self.caps.has(Features::SGR_MOUSE);
            ansi::enable_mouse(&mut state.out, self.config.mouse_mode, sgr).ok();
        }
        self.mouse.store(true, Ordering::Release);
        debug!(target: TARGET, mode = ?self.config.mouse_mode, "mouse reporting on");
        self.flush_out(&mut state).await
    }

    /// Turn off mouse reporting. Does nothing if it is off.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] or [`Error::Io`].
    pub async fn leave_mouse_mode(&self) -> Result<()> {
        let mut state = self.lock().await?;
        if !self.is_mouse_enabled() {
            return Ok(());
        }
        if self.caps.has(Features::MOUSE) {
            ansi::disable_mouse(&mut state.out).ok();
        }
        self.mouse.store(false, Ordering::Release);
        debug!(target: TARGET, "mouse reporting off");
        self.flush_out(&mut state).await
    }

    /// Snapshot the display: switch to the alternate screen, or save the
    /// cursor where there is none. A no-op while a snapshot is held.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] or [`Error::Io`].
    pub async fn save_state(&self) -> Result<()> {
        let mut state = self.lock().await?;
        if state.saved.is_some() {
            return Ok(());
        }
        let alt_screen = self.caps.has(Features::ALT_SCREEN);
        if alt_screen {
            ansi::enter_alt_screen(&mut state.out).ok();
        } else {
            ansi::save_cursor(&mut state.out).ok();
        }
        // The alternate screen starts out unknown; the primary one keeps
        // its contents under DECSC.
        let baseline = if alt_screen {
            state.baseline.take()
        } else {
            None
        };
        state.saved = Some(SavedDisplay {
            alt_screen,
            cursor_hidden: self.is_cursor_hidden(),
            baseline,
        });
        state.pen.reset_state();
        self.saved.store(true, Ordering::Release);
        debug!(target: TARGET, alt_screen, "display saved");
        self.flush_out(&mut state).await
    }

    /// Undo [`save_state`](Self::save_state), restoring cursor visibility
    /// and the render baseline. A no-op without a snapshot.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] or [`Error::Io`].
    pub async fn load_state(&self) -> Result<()> {
        let mut state = self.lock().await?;
        let Some(saved) = state.saved.take() else {
            return Ok(());
        };
        if saved.alt_screen {
            ansi::exit_alt_screen(&mut state.out).ok();
            state.baseline = saved.baseline;
        } else {
            ansi::restore_cursor(&mut state.out).ok();
        }
        self.show_cursor(&mut state.out, !saved.cursor_hidden);
        state.pen.reset_state();
        self.saved.store(false, Ordering::Release);
        debug!(target: TARGET, alt_screen = saved.alt_screen, "display restored");
        self.flush_out(&mut state).await
    }

    // ─── Output ──────────────────────────────────────────────────────────

    /// Write text at the cursor.
    ///
    /// `\n` becomes CR LF in raw mode. Plain text carries no escapes, and a
    /// styled run is reset before returning.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] or [`Error::Io`].
    pub async fn print(&self, text: impl Into<StyledText>) -> Result<()> {
        let text = text.into();
        let mut state = self.lock().await?;
        let newline: &[u8] = if self.is_raw() { b"\r\n" } else { b"\n" };
        let State {
            out, pen, baseline, ..
        } = &mut *state;
        pen.print(out, &text, newline);
        if !text.is_empty() {
            *baseline = None;
        }
        self.flush_out(&mut state).await
    }

    /// [`print`](Self::print) followed by a newline.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] or [`Error::Io`].
    pub async fn println(&self, text: impl Into<StyledText>) -> Result<()> {
        let mut text = text.into();
        text.push(Style::PLAIN, "\n");
        self.print(text).await
    }

    /// # Errors
    ///
    /// [`Error::Closed`] or [`Error::Io`].
    pub async fn bell(&self) -> Result<()> {
        let mut state = self.lock().await?;
        ansi::bell(&mut state.out).ok();
        self.flush_out(&mut state).await
    }

    /// Erase the whole screen in the default style. The cursor stays put.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] or [`Error::Io`].
    pub async fn clear_screen(&self) -> Result<()> {
        let mut state = self.lock().await?;
        let State {
            out, pen, baseline, ..
        } = &mut *state;
        pen.set_style(out, &Style::PLAIN);
        ansi::clear_screen(out).ok();
        if let Some(baseline) = baseline {
            baseline.clear();
        }
        self.flush_out(&mut state).await
    }

    /// # Errors
    ///
    /// [`Error::Closed`] or [`Error::Io`].
    pub async fn move_cursor(&self, to: Coord) -> Result<()> {
        let mut state = self.lock().await?;
        let State { out, pen, .. } = &mut *state;
        pen.move_to(out, to);
        self.flush_out(&mut state).await
    }

    /// Show or hide the cursor. Writes nothing when it already is.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] or [`Error::Io`].
    pub async fn set_cursor_visible(&self, visible: bool) -> Result<()> {
        let mut state = self.lock().await?;
        self.show_cursor(&mut state.out, visible);
        self.flush_out(&mut state).await
    }

    /// Scroll the screen contents up `lines` rows.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] or [`Error::Io`].
    pub async fn scroll_up(&self, lines: u16) -> Result<()> {
        self.scroll(lines, true).await
    }

    /// Scroll the screen contents down `lines` rows.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] or [`Error::Io`].
    pub async fn scroll_down(&self, lines: u16) -> Result<()> {
        self.scroll(lines, false).await
    }

    async fn scroll(&self, lines: u16, up: bool) -> Result<()> {
        if lines == 0 {
            return Ok(());
        }
        let mut state = self.lock().await?;
        let State {
            out, pen, baseline, ..
        } = &mut *state;
        // New lines take the current background; keep them default.
        pen.set_style(out, &Style::PLAIN);
        if up {
            ansi::scroll_up(out, lines).ok();
        } else {
            ansi::scroll_down(out, lines).ok();
        }
        *baseline = None;
        self.flush_out(&mut state).await
    }

    /// Push buffered output and flush the writer.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] or [`Error::Io`].
    pub async fn flush(&self) -> Result<()> {
        let mut state = self.lock().await?;
        self.flush_out(&mut state).await?;
        state.writer.flush().await.map_err(|err| self.fail(err))
    }

    // ─── Rendering ───────────────────────────────────────────────────────

    /// Draw `next`, diffing against what the session last drew.
    ///
    /// Without a baseline of the same size (first frame, resize, output
    /// written by other means) the screen is cleared and painted in full.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] or [`Error::Io`].
    pub async fn render(&self, next: &Matrix) -> Result<RenderStats> {
        let mut state = self.lock().await?;
        let State {
            out, pen, baseline, ..
        } = &mut *state;
        let start = out.len();
        let stats = diff::repaint(out, pen, baseline.as_ref(), next);
        keep_baseline(baseline, next);
        let stats = self.finish_frame(out, start, stats);
        self.flush_out(&mut state).await?;
        Ok(stats)
    }

    /// Draw the minimal change from `previous` to `next`, trusting that the
    /// screen shows `previous`.
    ///
    /// # Errors
    ///
    /// [`Error::DimensionMismatch`] when the sizes differ (nothing is
    /// written), [`Error::Closed`] or [`Error::Io`].
    pub async fn render_update(&self, previous: &Matrix, next: &Matrix) -> Result<RenderStats> {
        let mut state = self.lock().await?;
        let State {
            out, pen, baseline, ..
        } = &mut *state;
        let start = out.len();
        let stats = diff::update(out, pen, previous, next)?;
        keep_baseline(baseline, next);
        let stats = self.finish_frame(out, start, stats);
        self.flush_out(&mut state).await?;
        Ok(stats)
    }

    /// Forget the baseline so the next [`render`](Self::render) clears and
    /// repaints everything.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`].
    pub async fn force_redraw(&self) -> Result<()> {
        let mut state = self.lock().await?;
        state.baseline = None;
        state.pen.reset_state();
        Ok(())
    }

    /// Wrap the frame written since `start` in synchronized output, and
    /// account for the wrapper in the stats.
    fn finish_frame(&self, out: &mut OutputBuffer, start: usize, mut stats: RenderStats) -> RenderStats {
        let sync = self.config.sync_output && self.caps.has(Features::SYNC_OUTPUT);
        if sync && out.len() > start {
            let bytes = out.take();
            let (before, frame) = bytes.split_at(start);
            out.write_all(before).ok();
            ansi::begin_sync(out).ok();
            out.write_all(frame).ok();
            ansi::end_sync(out).ok();
        }
        stats.bytes_written = out.len() - start;
        debug!(
            target: "tessera::render",
            rendered = stats.cells_rendered,
            skipped = stats.cells_skipped,
            motions = stats.motions,
            bytes = stats.bytes_written,
            "frame"
        );
        stats
    }

    // ─── Size ────────────────────────────────────────────────────────────

    /// The window size as the backend reports it now.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] or [`Error::Io`].
    pub fn size(&self) -> Result<Size> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.backend.query_size().map_err(|err| self.fail(err))
    }

    /// Ask for a new window size. The baseline is dropped either way.
    ///
    /// Backends without a resize signal get a [`Event::Resize`] queued
    /// directly.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] or [`Error::Io`].
    pub async fn set_size(&self, size: Size) -> Result<()> {
        let mut state = self.lock().await?;
        self.backend.set_size(size).map_err(|err| self.fail(err))?;
        state.baseline = None;
        if !self.backend.watches_resize() {
            self.resize.raise();
        }
        Ok(())
    }

    /// Report a window-size change. The next [`read_event`](Self::read_event)
    /// returns [`Event::Resize`].
    pub fn notify_resize(&self) {
        self.resize.raise();
    }

    // ─── Events ──────────────────────────────────────────────────────────

    /// Wait for the next input event.
    ///
    /// A lone ESC (or any incomplete sequence) is resolved after the
    /// configured grace period. Cancellation-safe: dropping the future
    /// loses no bytes and no events.
    ///
    /// # Errors
    ///
    /// [`Error::Mode`] in cooked mode (nothing is read), [`Error::Closed`]
    /// once input has ended, [`Error::Io`] when reading fails.
    pub async fn read_event(&self) -> Result<Event> {
        if !self.is_raw() {
            return Err(Error::Mode {
                operation: "read_event",
            });
        }
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.watcher
            .get_or_init(|| spawn_resize_watcher(self.backend.as_ref(), &self.resize));

        let mut input = self.input.lock().await;
        loop {
            if let Some(event) = input.queue.pop_front() {
                return Ok(event);
            }
            if self.resize.take() {
                return self.resized();
            }
            if input.eof || self.is_closed() {
                self.closed.store(true, Ordering::Release);
                return Err(Error::Closed);
            }

            let grace = (input.decoder.has_pending() && !input.decoder.in_paste())
                .then_some(self.config.escape_grace);
            let Input {
                reader,
                decoder,
                queue,
                scratch,
                eof,
            } = &mut *input;

            let wake = tokio::select! {
                biased;
                () = self.resize.notify.notified() => Wake::Resize,
                wake = read_within(reader, scratch, grace) => wake,
            };
            match wake {
                Wake::Resize => {}
                Wake::Grace => queue.extend(decoder.flush()),
                Wake::Read(Ok(0)) => {
                    queue.extend(decoder.finish());
                    *eof = true;
                    debug!(target: TARGET, "end of input");
                }
                Wake::Read(Ok(n)) => queue.extend(decoder.advance(&scratch[..n])),
                Wake::Read(Err(err)) if err.kind() == io::ErrorKind::Interrupted => {}
                Wake::Read(Err(err)) => return Err(self.fail(err)),
            }
        }
    }

    /// Input events as a stream. Ends when the terminal closes; any other
    /// error is yielded once and ends it too.
    pub fn events(&self) -> impl Stream<Item = Result<Event>> + '_ {
        stream::unfold(Some(self), |session| async move {
            let session = session?;
            match session.read_event().await {
                Ok(event) => Some((Ok(event), Some(session))),
                Err(Error::Closed) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }

    /// Build the resize event without awaiting, so a cancelled read
    /// cannot consume the signal and lose the event.
    fn resized(&self) -> Result<Event> {
        let size = self.size()?;
        self.stale_baseline.store(true, Ordering::Release);
        trace!(target: TARGET, %size, "resize");
        Ok(Event::Resize(size))
    }

    // ─── Restore ─────────────────────────────────────────────────────────

    /// Bytes that undo every active output mode: mouse reporting, paste and
    /// focus reporting, the display snapshot, a hidden cursor, and SGR.
    #[must_use]
    pub fn restore_sequence(&self) -> Vec<u8> {
        let mut out = Vec::new();
        if self.is_mouse_enabled() && self.caps.has(Features::MOUSE) {
            ansi::disable_mouse(&mut out).ok();
        }
        if self.is_raw() {
            if self.wants_paste() {
                ansi::disable_bracketed_paste(&mut out).ok();
            }
            if self.wants_focus() {
                ansi::disable_focus_reporting(&mut out).ok();
            }
        }
        if self.has_saved_state() {
            if self.caps.has(Features::ALT_SCREEN) {
                ansi::exit_alt_screen(&mut out).ok();
            } else {
                ansi::restore_cursor(&mut out).ok();
            }
        }
        if self.is_cursor_hidden() {
            ansi::cursor_show(&mut out).ok();
        }
        if self.caps.has(Features::ATTRIBUTES) {
            ansi::reset(&mut out).ok();
        }
        out
    }

    /// Restore the terminal without taking any async lock. For panic and
    /// exit hooks, where the state mutex may be held by a frozen task.
    pub(crate) fn emergency_restore(&self) {
        if let Some(fd) = self.restore_fd {
            terminal::write_fd(fd, &self.restore_sequence());
        }
        self.release_raw();
        self.mouse.store(false, Ordering::Release);
        self.saved.store(false, Ordering::Release);
        self.cursor_hidden.store(false, Ordering::Release);
    }

    fn release_raw(&self) {
        let snapshot = self.raw_snapshot().take();
        self.raw.store(false, Ordering::Release);
        if let Some(snapshot) = snapshot {
            if let Err(err) = self.backend.leave_raw(&snapshot) {
                warn!(target: TARGET, %err, "could not restore terminal attributes");
            }
        }
    }

    // ─── Internals ───────────────────────────────────────────────────────

    async fn lock(&self) -> Result<MutexGuard<'_, State>> {
        let mut state = self.state.lock().await;
        if self.is_closed() {
            return Err(Error::Closed);
        }
        if self.stale_baseline.swap(false, Ordering::AcqRel) {
            state.baseline = None;
        }
        Ok(state)
    }

    fn raw_snapshot(&self) -> StdMutexGuard<'_, Option<RawSnapshot>> {
        self.raw_snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark the session closed and wrap the cause.
    fn fail(&self, err: io::Error) -> Error {
        self.closed.store(true, Ordering::Release);
        warn!(target: TARGET, %err, "terminal I/O failed, closing session");
        Error::Io(err)
    }

    /// Write out everything buffered. The buffer is emptied even on error.
    async fn flush_out(&self, state: &mut State) -> Result<()> {
        if state.out.is_empty() {
            return Ok(());
        }
        let State { writer, out, .. } = state;
        let written = async {
            writer.write_all(out.as_bytes()).await?;
            writer.flush().await
        }
        .await;
        out.clear();
        written.map_err(|err| self.fail(err))
    }

    fn show_cursor(&self, out: &mut OutputBuffer, visible: bool) {
        if self.is_cursor_hidden() != visible {
            return;
        }
        if visible {
            ansi::cursor_show(out).ok();
        } else {
            ansi::cursor_hide(out).ok();
        }
        self.cursor_hidden.store(!visible, Ordering::Release);
    }

    fn wants_paste(&self) -> bool {
        self.config.bracketed_paste && self.caps.has(Features::BRACKETED_PASTE)
    }

    fn wants_focus(&self) -> bool {
        self.config.focus_events && self.caps.has(Features::FOCUS_EVENTS)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("caps", &self.caps)
            .field("raw", &self.is_raw())
            .field("mouse", &self.is_mouse_enabled())
            .field("saved", &self.has_saved_state())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(Some(watcher)) = self.watcher.get() {
            watcher.abort();
        }
        if !self.is_closed() {
            let bytes = self.restore_sequence();
            if let Some(fd) = self.restore_fd {
                terminal::write_fd(fd, &bytes);
            } else {
                let writer = &mut self.state.get_mut().writer;
                let written = async {
                    writer.write_all(&bytes).await?;
                    writer.flush().await
                }
                .now_or_never();
                match written {
                    Some(Ok(())) => {}
                    Some(Err(err)) => warn!(target: TARGET, %err, "restore on drop failed"),
                    None => warn!(target: TARGET, "restore on drop would block, skipped"),
                }
            }
        }
        self.release_raw();
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Keep `next` as the baseline, reusing the allocation when possible.
fn keep_baseline(baseline: &mut Option<Matrix>, next: &Matrix) {
    match baseline {
        Some(previous) => previous.copy_from(next),
        None => *baseline = Some(next.clone()),
    }
}

/// One read, bounded by `grace` when given.
async fn read_within(reader: &mut Reader, buf: &mut [u8], grace: Option<Duration>) -> Wake {
    match grace {
        None => Wake::Read(reader.read(buf).await),
        Some(grace) => tokio::time::timeout(grace, reader.read(buf))
            .await
            .map_or(Wake::Grace, Wake::Read),
    }
}

/// Forward SIGWINCH to `resize` for as long as the session lives.
#[cfg(unix)]
fn spawn_resize_watcher(backend: &dyn Backend, resize: &Arc<ResizeSignal>) -> Option<AbortHandle> {
    use tokio::signal::unix::{SignalKind, signal};

    if !backend.watches_resize() {
        return None;
    }
    let mut winch = match signal(SignalKind::window_change()) {
        Ok(winch) => winch,
        Err(err) => {
            warn!(target: TARGET, %err, "cannot watch window size");
            return None;
        }
    };
    let resize = Arc::clone(resize);
    let task = tokio::spawn(async move {
        while winch.recv().await.is_some() {
            resize.raise();
        }
    });
    Some(task.abort_handle())
}

#[cfg(not(unix))]
fn spawn_resize_watcher(_backend: &dyn Backend, _resize: &Arc<ResizeSignal>) -> Option<AbortHandle> {
    None
}

// ─── Tests ──────────────────────────────────────────────────────────────────
