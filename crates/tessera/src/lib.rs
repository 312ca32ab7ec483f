// SPDX-License-Identifier: MIT
//
// tessera: terminal sessions for line-oriented and full-screen programs.
//
// The layers, bottom up:
//
//   codec, caps, color   byte encodings, terminal capability lookup, color
//                        quantization
//   ansi, encoder        escape sequences, and the capability-aware choice
//                        between them
//   matrix, diff         the cell grid an application draws into, and the
//                        renderer that turns one grid into the next with
//                        the fewest bytes
//   input                streaming decoder from raw bytes to key, mouse,
//                        paste and focus events
//   terminal, fd         platform backends and async descriptor I/O
//   session, global      the async session tying it together, plus the
//                        process-wide stdout/stderr sessions
//
// Everything above `terminal` is pure and synchronous; only `session`
// performs I/O.

pub mod ansi;
pub mod caps;
pub mod cell;
pub mod codec;
pub mod color;
pub mod config;
pub mod diff;
pub mod encoder;
pub mod error;
#[cfg(unix)]
pub mod fd;
pub mod geom;
pub mod global;
pub mod input;
pub mod matrix;
pub mod output;
pub mod session;
pub mod style;
pub mod terminal;

pub use caps::{Capabilities, Features};
pub use cell::Cell;
pub use codec::TextEncoding;
pub use color::ColorDepth;
pub use config::SessionConfig;
pub use diff::{DiffRenderer, RenderStats};
pub use error::{Error, Result};
pub use geom::{Coord, Size};
pub use global::{eprint, eprintln, print, println, stderr, stdout};
pub use input::{Decoder, Event, KeyCode, KeyEvent, Modifiers, MouseAction, MouseButton, MouseEvent};
pub use matrix::Matrix;
pub use session::Session;
pub use style::{Attr, Color, Style, StyledText};
