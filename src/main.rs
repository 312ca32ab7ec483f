// SPDX-License-Identifier: MIT
//
// tessera-view: a live input-event viewer.
//
// Takes over the terminal through the process-wide `tessera::stdout()`
// session and shows every decoded event as it arrives:
//
//   ┌──────────────────────────────────────────┐
//   │ title bar (REVERSE): size, caps, hints   │  ← row 0
//   ├──────────────────────────────────────────┤
//   │ newest event                             │
//   │ older events ...                         │  ← rows 1..h-1
//   ├──────────────────────────────────────────┤
//   │ last frame's render stats                │  ← row h-1
//   └──────────────────────────────────────────┘
//
// `q` or Ctrl+C quits. Set TESSERA_LOG to a file path to capture the
// library's tracing output (RUST_LOG picks the level).

use std::collections::VecDeque;
use std::path::Path;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tessera::{
    Attr, Color, Event, KeyCode, KeyEvent, Matrix, Modifiers, MouseAction, RenderStats, Session,
    Size, Style,
};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

/// Events kept for display. More than any terminal is tall.
const HISTORY: usize = 256;

const TITLE: Style = Style::PLAIN.attrs(Attr::REVERSE);
const FOOTER: Style = Style::PLAIN.fg(Color::CYAN);

// ─── Viewer state ───────────────────────────────────────────────────────────

struct Viewer {
    frame: Matrix,
    history: VecDeque<String>,
    last_stats: Option<RenderStats>,
    count: u64,
}

impl Viewer {
    fn new(size: Size) -> Self {
        Self {
            frame: Matrix::with_size(size),
            history: VecDeque::with_capacity(HISTORY),
            last_stats: None,
            count: 0,
        }
    }

    fn record(&mut self, event: &Event) {
        self.count += 1;
        if self.history.len() == HISTORY {
            self.history.pop_back();
        }
        self.history.push_front(format!("{:>5}  {}", self.count, describe(event)));
    }

    fn paint(&mut self, session: &Session) {
        let size = self.frame.size();
        self.frame.clear();
        if size.is_empty() {
            return;
        }

        let caps = session.capabilities();
        let title = format!(
            " tessera-view  {}x{}  {:?}  mouse:{}  ─  q or Ctrl+C quits",
            size.cols,
            size.rows,
            caps.depth,
            if session.is_mouse_enabled() { "on" } else { "off" },
        );
        let title_bar = format!("{title:<width$}", width = usize::from(size.cols));
        self.frame.put_str(0, 0, &title_bar, TITLE);

        let body_rows = size.rows.saturating_sub(2);
        for (row, line) in (1..=body_rows).zip(self.history.iter()) {
            let style = if row == 1 { Style::new().bold() } else { Style::PLAIN };
            self.frame.put_str(0, row, line, style);
        }

        if size.rows > 1 {
            let footer = self.last_stats.map_or_else(
                || String::from("no frame drawn yet"),
                |s| {
                    format!(
                        "last frame: {} cells drawn, {} skipped, {} motions, {} bytes",
                        s.cells_rendered, s.cells_skipped, s.motions, s.bytes_written
                    )
                },
            );
            self.frame.put_str(0, size.rows - 1, &footer, FOOTER);
        }
    }
}

/// One-line description of an event.
fn describe(event: &Event) -> String {
    match event {
        Event::Key(key) => format!("key    {}", describe_key(key)),
        Event::Mouse(mouse) => {
            let button = mouse
                .button
                .map_or_else(|| String::from("-"), |b| format!("{b:?}"));
            let action = match mouse.action {
                MouseAction::Press => "press",
                MouseAction::Release => "release",
                MouseAction::Drag => "drag",
                MouseAction::Move => "move",
            };
            format!(
                "mouse  {action} {button} at ({}, {}){}",
                mouse.position.col,
                mouse.position.row,
                modifier_suffix(mouse.modifiers)
            )
        }
        Event::Resize(size) => format!("resize {}x{}", size.cols, size.rows),
        Event::Paste(text) => format!("paste  {} chars: {:?}", text.chars().count(), text),
        Event::FocusGained => String::from("focus  gained"),
        Event::FocusLost => String::from("focus  lost"),
        Event::Unknown(bytes) => format!("?      {}", String::from_utf8_lossy(bytes).escape_debug()),
    }
}

fn describe_key(key: &KeyEvent) -> String {
    let code = match key.code {
        KeyCode::Char(' ') => String::from("Space"),
        KeyCode::Char(ch) => format!("'{ch}'"),
        KeyCode::F(n) => format!("F{n}"),
        other => format!("{other:?}"),
    };
    format!("{code}{}", modifier_suffix(key.modifiers))
}

fn modifier_suffix(modifiers: Modifiers) -> String {
    if modifiers.is_empty() {
        return String::new();
    }
    let names: Vec<&str> = [
        (Modifiers::CTRL, "Ctrl"),
        (Modifiers::ALT, "Alt"),
        (Modifiers::SHIFT, "Shift"),
        (Modifiers::META, "Meta"),
    ]
    .into_iter()
    .filter(|(flag, _)| modifiers.contains(*flag))
    .map(|(_, name)| name)
    .collect();
    format!(" +{}", names.join("+"))
}

fn is_quit(event: &Event) -> bool {
    match event {
        Event::Key(key) => {
            (key.code == KeyCode::Char('q') && key.modifiers.is_empty())
                || (key.code == KeyCode::Char('c') && key.modifiers == Modifiers::CTRL)
        }
        _ => false,
    }
}

// ─── Logging ────────────────────────────────────────────────────────────────

/// Route tracing to the file named by `TESSERA_LOG`. Without it, nothing is
/// installed: the terminal is the screen being drawn on.
fn configure_logging() -> Option<WorkerGuard> {
    let target = std::env::var_os("TESSERA_LOG")?;
    let path = Path::new(&target);
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let file = path.file_name()?;

    let appender = tracing_appender::rolling::never(dir, file);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()
        .map(|()| guard)
}

// ─── Entry point ────────────────────────────────────────────────────────────

async fn run(session: &Session) -> Result<()> {
    let mut viewer = Viewer::new(session.size()?);
    viewer.paint(session);
    viewer.last_stats = Some(session.render(&viewer.frame).await?);

    let mut events = std::pin::pin!(session.events());
    while let Some(event) = events.next().await {
        let event = event.context("reading terminal input")?;
        if is_quit(&event) {
            break;
        }
        if let Event::Resize(size) = event {
            viewer.frame.resize(size.cols, size.rows);
        }
        viewer.record(&event);
        viewer.paint(session);
        viewer.last_stats = Some(session.render(&viewer.frame).await?);
    }
    Ok(())
}

async fn restore(session: &Session) -> Result<()> {
    session.set_cursor_visible(true).await?;
    session.load_state().await?;
    session.leave_mouse_mode().await?;
    session.leave_raw_mode().await?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let _log_guard = configure_logging();
    info!(target: "tessera_view", "startup");

    let session = tessera::stdout();
    session.enter_raw_mode().await.context("entering raw mode")?;
    session.enter_mouse_mode().await?;
    session.save_state().await?;
    session.set_cursor_visible(false).await?;

    let outcome = run(session).await;
    let restored = restore(session).await;
    info!(target: "tessera_view", ok = outcome.is_ok(), "shutdown");
    outcome.and(restored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tessera::{Coord, MouseButton, MouseEvent};

    // ── Descriptions ────────────────────────────────────────────────────

    #[test]
    fn keys_show_code_and_modifiers() {
        let key = KeyEvent::new(KeyCode::Right, Modifiers::CTRL | Modifiers::SHIFT);
        assert_eq!(describe(&Event::Key(key)), "key    Right +Ctrl+Shift");
        assert_eq!(describe(&Event::Key(KeyCode::Char(' ').into())), "key    Space");
        assert_eq!(describe(&Event::Key(KeyCode::F(5).into())), "key    F5");
    }

    #[test]
    fn mouse_shows_action_and_position() {
        let mouse = MouseEvent {
            position: Coord::new(11, 4),
            button: Some(MouseButton::Left),
            action: MouseAction::Press,
            modifiers: Modifiers::empty(),
        };
        assert_eq!(describe(&Event::Mouse(mouse)), "mouse  press Left at (11, 4)");
    }

    #[test]
    fn unknown_bytes_are_escaped() {
        assert_eq!(describe(&Event::Unknown(b"\x1b[99z".to_vec())), "?      \\u{1b}[99z");
    }

    // ── Quitting ────────────────────────────────────────────────────────

    #[test]
    fn q_and_ctrl_c_quit() {
        assert!(is_quit(&Event::Key(KeyCode::Char('q').into())));
        assert!(is_quit(&Event::Key(KeyEvent::new(KeyCode::Char('c'), Modifiers::CTRL))));
        assert!(!is_quit(&Event::Key(KeyEvent::new(KeyCode::Char('q'), Modifiers::ALT))));
        assert!(!is_quit(&Event::Key(KeyCode::Char('c').into())));
    }

    // ── Frame layout ────────────────────────────────────────────────────

    #[test]
    fn history_is_newest_first_and_bounded() {
        let mut viewer = Viewer::new(Size::new(40, 5));
        for _ in 0..HISTORY + 10 {
            viewer.record(&Event::FocusGained);
        }
        assert_eq!(viewer.history.len(), HISTORY);
        assert!(viewer.history[0].starts_with(&format!("{:>5}", HISTORY + 10)));
    }
}
