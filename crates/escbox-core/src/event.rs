#![forbid(unsafe_code)]

//! Input event model.
//!
//! [`Event`] is a flat record: every event carries every field, and only the
//! ones meaningful for its [`EventKind`] are set. Everything else holds its
//! default. This mirrors what raw terminal backends hand out and keeps a
//! synthetic sequence event trivially distinguishable: its `seq` is set and
//! every other field is default.
//!
//! # Design Notes
//!
//! - Character keys set `ch` and leave `key` empty; all other keys set `key`.
//! - Mouse coordinates are 0-indexed.
//! - Source failures travel as [`EventKind::Error`] events, never as `Err`.
//! - All events derive `Clone`, `PartialEq`, and `Eq` for use in tests.

use std::fmt;
use std::io;

use bitflags::bitflags;
#[cfg(not(target_arch = "wasm32"))]
use crossterm::event as cte;

use crate::sequence::SeqId;

/// What kind of occurrence an [`Event`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EventKind {
    /// Nothing happened. Synthetic sequence events use this kind.
    #[default]
    None,
    /// A keyboard event; see `key`, `ch` and `modifiers`.
    Key,
    /// Terminal was resized; see `width` and `height`.
    Resize,
    /// A mouse event; see `mouse`, `mouse_x` and `mouse_y`.
    Mouse,
    /// The source failed; see `error`.
    Error,
    /// The source's blocking poll was cut short by its interrupt primitive.
    Interrupt,
}

/// Non-character key codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// Enter/Return key.
    Enter,

    /// Escape key.
    Escape,

    /// Backspace key.
    Backspace,

    /// Tab key.
    Tab,

    /// Shift+Tab (back-tab), when the backend decodes it itself.
    BackTab,

    /// Delete key.
    Delete,

    /// Insert key.
    Insert,

    /// Home key.
    Home,

    /// End key.
    End,

    /// Page Up key.
    PageUp,

    /// Page Down key.
    PageDown,

    /// Up arrow key.
    Up,

    /// Down arrow key.
    Down,

    /// Left arrow key.
    Left,

    /// Right arrow key.
    Right,

    /// Function key (F1-F24).
    F(u8),

    /// Null character (Ctrl+Space or Ctrl+@).
    Null,
}

bitflags! {
    /// Modifier keys that can be held during a key or mouse event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        /// No modifiers.
        const NONE  = 0b0000;
        /// Shift key.
        const SHIFT = 0b0001;
        /// Alt/Option key.
        const ALT   = 0b0010;
        /// Control key.
        const CTRL  = 0b0100;
        /// Super/Meta/Command key.
        const SUPER = 0b1000;
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Self::NONE
    }
}

/// The type of mouse event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseEventKind {
    /// Mouse button pressed down.
    Down(MouseButton),

    /// Mouse button released.
    Up(MouseButton),

    /// Mouse dragged while button held.
    Drag(MouseButton),

    /// Mouse moved (no button pressed).
    Moved,

    /// Mouse wheel scrolled up.
    ScrollUp,

    /// Mouse wheel scrolled down.
    ScrollDown,

    /// Mouse wheel scrolled left.
    ScrollLeft,

    /// Mouse wheel scrolled right.
    ScrollRight,
}

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Left mouse button.
    Left,

    /// Right mouse button.
    Right,

    /// Middle mouse button (scroll wheel click).
    Middle,
}

/// An error reported by the event source.
///
/// `io::Error` is neither `Clone` nor `Eq`, so the kind and message are kept
/// instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    /// The I/O error category.
    pub kind: io::ErrorKind,
    /// Human-readable description.
    pub message: String,
}

impl SourceError {
    /// Create a source error.
    #[must_use]
    pub fn new(kind: io::ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event source error ({:?}): {}", self.kind, self.message)
    }
}

impl std::error::Error for SourceError {}

impl From<io::Error> for SourceError {
    fn from(err: io::Error) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

/// A single input event, or a collapsed escape sequence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Event {
    /// What happened.
    pub kind: EventKind,
    /// Modifier keys held during a key or mouse event.
    pub modifiers: Modifiers,
    /// Non-character key, for key events.
    pub key: Option<KeyCode>,
    /// Character, for character key events.
    pub ch: Option<char>,
    /// New width in columns, for resize events.
    pub width: u16,
    /// New height in rows, for resize events.
    pub height: u16,
    /// Failure detail, for error events.
    pub error: Option<SourceError>,
    /// Mouse action, for mouse events.
    pub mouse: Option<MouseEventKind>,
    /// Mouse column (0-indexed).
    pub mouse_x: u16,
    /// Mouse row (0-indexed).
    pub mouse_y: u16,
    /// Auxiliary numeric payload supplied by the source.
    pub n: usize,
    /// Recognized escape sequence. `None` for ordinary events.
    pub seq: Option<SeqId>,
}

impl Event {
    /// A key event for a non-character key.
    #[must_use]
    pub fn key(code: KeyCode) -> Self {
        Self {
            kind: EventKind::Key,
            key: Some(code),
            ..Self::default()
        }
    }

    /// A key event for a character key.
    #[must_use]
    pub fn char(ch: char) -> Self {
        Self {
            kind: EventKind::Key,
            ch: Some(ch),
            ..Self::default()
        }
    }

    /// A resize event.
    #[must_use]
    pub fn resize(width: u16, height: u16) -> Self {
        Self {
            kind: EventKind::Resize,
            width,
            height,
            ..Self::default()
        }
    }

    /// A mouse event at the given 0-indexed cell.
    #[must_use]
    pub fn mouse(kind: MouseEventKind, x: u16, y: u16) -> Self {
        Self {
            kind: EventKind::Mouse,
            mouse: Some(kind),
            mouse_x: x,
            mouse_y: y,
            ..Self::default()
        }
    }

    /// An error event.
    #[must_use]
    pub fn error(err: impl Into<SourceError>) -> Self {
        Self {
            kind: EventKind::Error,
            error: Some(err.into()),
            ..Self::default()
        }
    }

    /// The event a source returns when its poll was interrupted.
    #[must_use]
    pub fn interrupt() -> Self {
        Self {
            kind: EventKind::Interrupt,
            ..Self::default()
        }
    }

    /// A synthetic event standing for a recognized escape sequence.
    #[must_use]
    pub fn sequence(seq: SeqId) -> Self {
        Self {
            seq: Some(seq),
            ..Self::default()
        }
    }

    /// Set the modifiers.
    #[must_use]
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Set the auxiliary payload.
    #[must_use]
    pub fn with_n(mut self, n: usize) -> Self {
        self.n = n;
        self
    }

    /// True for an Escape key press, whatever the modifiers.
    #[must_use]
    pub fn is_escape(&self) -> bool {
        self.kind == EventKind::Key && self.key == Some(KeyCode::Escape)
    }

    /// True if this event stands for a recognized escape sequence.
    #[must_use]
    pub fn is_sequence(&self) -> bool {
        self.seq.is_some()
    }

    /// Convert a Crossterm event.
    ///
    /// Paste and focus events, key releases, and keys with no counterpart
    /// (media, modifier-only) yield `None`.
    #[must_use]
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_crossterm(event: cte::Event) -> Option<Self> {
        match event {
            cte::Event::Key(key) => map_key_event(key),
            cte::Event::Mouse(mouse) => Some(map_mouse_event(mouse)),
            cte::Event::Resize(width, height) => Some(Self::resize(width, height)),
            cte::Event::Paste(_) | cte::Event::FocusGained | cte::Event::FocusLost => None,
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn map_key_event(event: cte::KeyEvent) -> Option<Event> {
    if event.kind == cte::KeyEventKind::Release {
        return None;
    }
    let modifiers = map_modifiers(event.modifiers);
    let event = match event.code {
        cte::KeyCode::Char(c) => Event::char(c),
        code => Event::key(map_key_code(code)?),
    };
    Some(event.with_modifiers(modifiers))
}

#[cfg(not(target_arch = "wasm32"))]
fn map_key_code(code: cte::KeyCode) -> Option<KeyCode> {
    match code {
        cte::KeyCode::Backspace => Some(KeyCode::Backspace),
        cte::KeyCode::Enter => Some(KeyCode::Enter),
        cte::KeyCode::Left => Some(KeyCode::Left),
        cte::KeyCode::Right => Some(KeyCode::Right),
        cte::KeyCode::Up => Some(KeyCode::Up),
        cte::KeyCode::Down => Some(KeyCode::Down),
        cte::KeyCode::Home => Some(KeyCode::Home),
        cte::KeyCode::End => Some(KeyCode::End),
        cte::KeyCode::PageUp => Some(KeyCode::PageUp),
        cte::KeyCode::PageDown => Some(KeyCode::PageDown),
        cte::KeyCode::Tab => Some(KeyCode::Tab),
        cte::KeyCode::BackTab => Some(KeyCode::BackTab),
        cte::KeyCode::Delete => Some(KeyCode::Delete),
        cte::KeyCode::Insert => Some(KeyCode::Insert),
        cte::KeyCode::F(n) => Some(KeyCode::F(n)),
        cte::KeyCode::Null => Some(KeyCode::Null),
        cte::KeyCode::Esc => Some(KeyCode::Escape),
        _ => None,
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn map_modifiers(modifiers: cte::KeyModifiers) -> Modifiers {
    let mut mapped = Modifiers::NONE;
    if modifiers.contains(cte::KeyModifiers::SHIFT) {
        mapped |= Modifiers::SHIFT;
    }
    if modifiers.contains(cte::KeyModifiers::ALT) {
        mapped |= Modifiers::ALT;
    }
    if modifiers.contains(cte::KeyModifiers::CONTROL) {
        mapped |= Modifiers::CTRL;
    }
    if modifiers.contains(cte::KeyModifiers::SUPER)
        || modifiers.contains(cte::KeyModifiers::HYPER)
        || modifiers.contains(cte::KeyModifiers::META)
    {
        mapped |= Modifiers::SUPER;
    }
    mapped
}

#[cfg(not(target_arch = "wasm32"))]
fn map_mouse_event(event: cte::MouseEvent) -> Event {
    let kind = match event.kind {
        cte::MouseEventKind::Down(button) => MouseEventKind::Down(map_mouse_button(button)),
        cte::MouseEventKind::Up(button) => MouseEventKind::Up(map_mouse_button(button)),
        cte::MouseEventKind::Drag(button) => MouseEventKind::Drag(map_mouse_button(button)),
        cte::MouseEventKind::Moved => MouseEventKind::Moved,
        cte::MouseEventKind::ScrollUp => MouseEventKind::ScrollUp,
        cte::MouseEventKind::ScrollDown => MouseEventKind::ScrollDown,
        cte::MouseEventKind::ScrollLeft => MouseEventKind::ScrollLeft,
        cte::MouseEventKind::ScrollRight => MouseEventKind::ScrollRight,
    };

    Event::mouse(kind, event.column, event.row).with_modifiers(map_modifiers(event.modifiers))
}

#[cfg(not(target_arch = "wasm32"))]
fn map_mouse_button(button: cte::MouseButton) -> MouseButton {
    match button {
        cte::MouseButton::Left => MouseButton::Left,
        cte::MouseButton::Right => MouseButton::Right,
        cte::MouseButton::Middle => MouseButton::Middle,
    }
}
