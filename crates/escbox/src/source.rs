#![forbid(unsafe_code)]

//! Raw event sources.
//!
//! An [`EventSource`] is the blocking, pull-style backend the pipeline
//! drains. Two implementations ship here:
//!
//! - [`CrosstermSource`] reads the real terminal through crossterm.
//! - [`ChannelSource`] replays events pushed through a [`ChannelFeeder`],
//!   for recordings and tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use escbox_core::Event;

/// A blocking source of raw events.
pub trait EventSource: Send + Sync {
    /// Block until the next event is available and return it.
    ///
    /// Failures are returned as [`EventKind::Error`](escbox_core::EventKind::Error)
    /// events. An interrupted poll returns [`Event::interrupt`].
    fn poll_event(&self) -> Event;

    /// Make a poll in progress, or the next one to start, return promptly.
    ///
    /// Callable from any thread. The interrupt must not be lost if it lands
    /// just before the poll begins.
    fn interrupt(&self);
}

// ---------------------------------------------------------------------------
// CrosstermSource
// ---------------------------------------------------------------------------

/// Default slice the crossterm poll blocks for between interrupt checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Terminal input via crossterm.
///
/// The caller is responsible for raw mode; this source only reads.
#[derive(Debug)]
pub struct CrosstermSource {
    interrupted: AtomicBool,
    poll_interval: Duration,
}

impl Default for CrosstermSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CrosstermSource {
    /// Create a source with the default poll interval.
    #[must_use]
    pub fn new() -> Self {
        Self::with_poll_interval(DEFAULT_POLL_INTERVAL)
    }

    /// Create a source that wakes every `interval` to check for interrupts.
    ///
    /// This bounds how long [`interrupt`](EventSource::interrupt) takes to
    /// land.
    #[must_use]
    pub fn with_poll_interval(interval: Duration) -> Self {
        Self {
            interrupted: AtomicBool::new(false),
            poll_interval: interval,
        }
    }

    /// The configured poll interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl EventSource for CrosstermSource {
    fn poll_event(&self) -> Event {
        loop {
            if self.interrupted.swap(false, Ordering::AcqRel) {
                return Event::interrupt();
            }
            match crossterm::event::poll(self.poll_interval) {
                Ok(true) => match crossterm::event::read() {
                    Ok(raw) => {
                        if let Some(event) = Event::from_crossterm(raw) {
                            return event;
                        }
                    }
                    Err(err) => return Event::error(err),
                },
                Ok(false) => {}
                Err(err) => return Event::error(err),
            }
        }
    }

    fn interrupt(&self) {
        self.interrupted.store(true, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// ChannelSource
// ---------------------------------------------------------------------------

/// A source that returns whatever its [`ChannelFeeder`] sends.
///
/// Once every feeder is dropped the source blocks until interrupted.
#[derive(Debug)]
pub struct ChannelSource {
    events: Receiver<Event>,
    interrupt_tx: Sender<()>,
    interrupt_rx: Receiver<()>,
}

/// Sending half of a [`ChannelSource`].
#[derive(Debug, Clone)]
pub struct ChannelFeeder {
    tx: Sender<Event>,
}

impl ChannelSource {
    /// Create a source and the feeder that drives it.
    #[must_use]
    pub fn new() -> (Self, ChannelFeeder) {
        let (tx, events) = channel::unbounded();
        // One pending interrupt is enough; extras are coalesced.
        let (interrupt_tx, interrupt_rx) = channel::bounded(1);
        let source = Self {
            events,
            interrupt_tx,
            interrupt_rx,
        };
        (source, ChannelFeeder { tx })
    }
}

impl EventSource for ChannelSource {
    fn poll_event(&self) -> Event {
        crossbeam::select! {
            recv(self.interrupt_rx) -> _ => Event::interrupt(),
            recv(self.events) -> event => match event {
                Ok(event) => event,
                Err(_) => {
                    let _ = self.interrupt_rx.recv();
                    Event::interrupt()
                }
            },
        }
    }

    fn interrupt(&self) {
        let _ = self.interrupt_tx.try_send(());
    }
}

impl ChannelFeeder {
    /// Queue one event. Returns `false` if the source is gone.
    pub fn send(&self, event: Event) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Queue several events in order.
    pub fn send_all(&self, events: impl IntoIterator<Item = Event>) -> bool {
        events.into_iter().all(|event| self.send(event))
    }
}
