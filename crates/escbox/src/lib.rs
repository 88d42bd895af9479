#![forbid(unsafe_code)]

//! Escape-sequence collapsing for terminal input.
//!
//! Some key combinations (Shift+Tab on many terminals) reach an application
//! as an Escape key followed by a quick burst of characters. [`EscapeBox`]
//! sits between a blocking [`EventSource`] and the application, recognizes
//! registered bursts, and hands out one synthetic [`Event`] per burst.
//! Everything else passes through unchanged and in order.
//!
//! # Pipeline
//!
//! ```text
//! EventSource ──poll──▶ channelizer thread ──▶ sequencer thread ──▶ poll_event()
//! ```
//!
//! - [`channelizer`] turns the blocking poll into a channel and owns the
//!   stop protocol.
//! - The sequencer thread runs [`escbox_core::Sequencer`] against a deadline
//!   timer.
//!
//! # Example
//!
//! ```no_run
//! use escbox::{CrosstermSource, EscapeBox, SeqId};
//!
//! const SHIFT_TAB: SeqId = match SeqId::new(1) {
//!     Some(id) => id,
//!     None => unreachable!(),
//! };
//!
//! # fn main() -> escbox::Result<()> {
//! let mut input = EscapeBox::init(CrosstermSource::new())?;
//! input.register(SHIFT_TAB, ['[', 'Z'])?;
//!
//! while let Some(event) = input.poll_event() {
//!     if event.seq == Some(SHIFT_TAB) {
//!         println!("Shift+Tab");
//!     } else if event.ch == Some('q') {
//!         break;
//!     }
//! }
//! input.close();
//! # Ok(())
//! # }
//! ```

pub mod channelizer;
mod pump;
pub mod source;

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError};
use tracing::{debug, info, warn};

use crate::channelizer::Channelizer;

// --- Core re-exports -------------------------------------------------------

pub use escbox_core::{
    Event, EventKind, KeyCode, MAX_BUFFERED_EVENTS, Modifiers, MouseButton, MouseEventKind,
    RegisterError, SeqId, SequenceMask, SequenceRegistry, Sequencer, SequencerConfig,
    SequencerState, SourceError,
};
pub use source::{ChannelFeeder, ChannelSource, CrosstermSource, EventSource};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for escbox.
#[derive(Debug)]
pub enum Error {
    /// A pipeline thread could not be started.
    Io(std::io::Error),
    /// A sequence could not be registered.
    Register(RegisterError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Register(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Register(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<RegisterError> for Error {
    fn from(err: RegisterError) -> Self {
        Self::Register(err)
    }
}

/// Standard result type for escbox APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- EscapeBox ------------------------------------------------------------

/// A running input pipeline.
///
/// Dropping an `EscapeBox` closes it.
pub struct EscapeBox {
    registry: Arc<RwLock<SequenceRegistry>>,
    /// Buffer capacity the sequencer thread runs with.
    capacity: usize,
    channelizer: Arc<Channelizer>,
    events: Receiver<Event>,
    threads: Vec<JoinHandle<()>>,
    closed: bool,
}

impl fmt::Debug for EscapeBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EscapeBox")
            .field("capacity", &self.capacity)
            .field("channelizer", &self.channelizer)
            .field("closed", &self.closed)
            .finish()
    }
}

impl EscapeBox {
    /// Start a pipeline over `source` with an empty registry and the
    /// configuration from [`SequencerConfig::from_env`].
    pub fn init(source: impl EventSource + 'static) -> Result<Self> {
        Self::init_with(source, SequencerConfig::from_env())
    }

    /// Start a pipeline over `source` with an empty registry.
    pub fn init_with(source: impl EventSource + 'static, config: SequencerConfig) -> Result<Self> {
        Self::start(Arc::new(source), SequenceRegistry::new(), config)
    }

    /// Start a pipeline with a prepared registry.
    ///
    /// Fails with [`RegisterError::TooLong`] if a prepared pattern cannot fit
    /// `config.buffer_capacity`.
    pub fn with_registry(
        source: impl EventSource + 'static,
        registry: SequenceRegistry,
        config: SequencerConfig,
    ) -> Result<Self> {
        Self::start(Arc::new(source), registry, config)
    }

    fn start(
        source: Arc<dyn EventSource>,
        registry: SequenceRegistry,
        config: SequencerConfig,
    ) -> Result<Self> {
        let capacity = config.buffer_capacity.clamp(1, MAX_BUFFERED_EVENTS);
        if let Some(longest) = registry.longest_pattern().filter(|&len| len > capacity) {
            return Err(RegisterError::TooLong {
                len: longest - 1,
                max: capacity - 1,
            }
            .into());
        }

        let registry = Arc::new(RwLock::new(registry));
        let (channelizer, raw, channelizer_thread) = Channelizer::spawn(source)?;
        let (events, sequencer_thread) =
            match pump::spawn(raw, Arc::clone(&registry), config.clone()) {
                Ok(spawned) => spawned,
                Err(err) => {
                    warn!(error = %err, "failed to start sequencer thread");
                    channelizer.request_stop();
                    let _ = channelizer_thread.join();
                    return Err(err.into());
                }
            };
        info!(
            timeout_us = config.sequence_timeout.as_micros() as u64,
            capacity,
            "escbox started"
        );
        Ok(Self {
            registry,
            capacity,
            channelizer,
            events,
            threads: vec![channelizer_thread, sequencer_thread],
            closed: false,
        })
    }

    /// Register an escape sequence: Escape followed by `chars` becomes one
    /// event carrying `seq`.
    ///
    /// Safe to call while the pipeline runs; the pattern applies from the
    /// next event on. Patterns longer than the running buffer capacity allows
    /// are rejected with [`RegisterError::TooLong`].
    pub fn register(&self, seq: SeqId, chars: impl IntoIterator<Item = char>) -> Result<()> {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register_within(self.capacity, seq, chars)?;
        Ok(())
    }

    /// Number of registered sequences.
    #[must_use]
    pub fn registered(&self) -> usize {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Block until the next event.
    ///
    /// Returns `None` once the pipeline has closed.
    pub fn poll_event(&self) -> Option<Event> {
        self.events.recv().ok()
    }

    /// Return the next event if one is ready.
    pub fn try_poll_event(&self) -> Option<Event> {
        self.events.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event.
    ///
    /// Returns `None` on timeout or once the pipeline has closed; use
    /// [`is_closed`](Self::is_closed) to tell them apart.
    pub fn poll_event_timeout(&self, timeout: Duration) -> Option<Event> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// A handle that stops the pipeline from another thread.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            channelizer: Arc::clone(&self.channelizer),
        }
    }

    /// True once [`close`](Self::close) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Stop the pipeline and wait for both threads to exit.
    ///
    /// Undelivered events are discarded. Calling it again does nothing.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        debug!("closing escbox");

        self.channelizer.request_stop();
        // The sequencer only finishes once its output has been taken.
        for _ in self.events.iter() {}
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!("escbox thread panicked");
            }
        }
        info!("escbox closed");
    }
}

impl Drop for EscapeBox {
    fn drop(&mut self) {
        self.close();
    }
}

/// Stops an [`EscapeBox`] from any thread.
///
/// After [`stop`](Self::stop), a `poll_event` blocked elsewhere returns the
/// events still in flight and then `None`. The owner should still call
/// [`EscapeBox::close`] (or drop it) to join the threads.
#[derive(Debug, Clone)]
pub struct StopHandle {
    channelizer: Arc<Channelizer>,
}

impl StopHandle {
    /// Request the pipeline to stop. Idempotent.
    pub fn stop(&self) {
        self.channelizer.request_stop();
    }

    /// True once a stop was requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.channelizer.is_terminating()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn error_display_and_source() {
        let err = Error::from(io::Error::other("no threads left"));
        assert!(err.to_string().contains("no threads left"));
        assert!(std::error::Error::source(&err).is_some());

        let err = Error::from(RegisterError::TooLong { len: 12, max: 9 });
        assert!(matches!(err, Error::Register(_)));
        assert!(err.to_string().contains("12"));
    }

    #[test]
    fn close_is_idempotent() {
        let (source, _feeder) = ChannelSource::new();
        let mut input = EscapeBox::init_with(source, SequencerConfig::default()).unwrap();
        assert!(!input.is_closed());
        input.close();
        assert!(input.is_closed());
        input.close();
        assert_eq!(input.poll_event(), None);
        assert_eq!(input.try_poll_event(), None);
    }

    #[test]
    fn register_rejects_overlong_pattern() {
        let (source, _feeder) = ChannelSource::new();
        let input = EscapeBox::init_with(source, SequencerConfig::default()).unwrap();
        let seq = SeqId::new(1).unwrap();

        let err = input
            .register(seq, vec!['x'; MAX_BUFFERED_EVENTS])
            .unwrap_err();
        assert!(matches!(err, Error::Register(RegisterError::TooLong { .. })));
        assert_eq!(input.registered(), 0);

        input.register(seq, ['[', 'Z']).unwrap();
        assert_eq!(input.registered(), 1);
    }

    #[test]
    fn register_rejects_pattern_beyond_running_capacity() {
        let (source, _feeder) = ChannelSource::new();
        let config = SequencerConfig::default().buffer_capacity(2);
        let input = EscapeBox::init_with(source, config).unwrap();
        let seq = SeqId::new(1).unwrap();

        let err = input.register(seq, ['[', 'Z']).unwrap_err();
        assert!(matches!(
            err,
            Error::Register(RegisterError::TooLong { len: 2, max: 1 })
        ));
        assert_eq!(input.registered(), 0);

        input.register(seq, ['[']).unwrap();
        assert_eq!(input.registered(), 1);
    }

    #[test]
    fn prepared_registry_must_fit_capacity() {
        let mut registry = SequenceRegistry::new();
        registry.register(SeqId::new(1).unwrap(), ['[', 'Z']).unwrap();
        let (source, _feeder) = ChannelSource::new();
        let config = SequencerConfig::default().buffer_capacity(2);

        let err = EscapeBox::with_registry(source, registry, config).unwrap_err();
        assert!(matches!(
            err,
            Error::Register(RegisterError::TooLong { len: 2, max: 1 })
        ));
    }

    #[test]
    fn debug_format() {
        let (source, _feeder) = ChannelSource::new();
        let input = EscapeBox::init_with(source, SequencerConfig::default()).unwrap();
        let dbg = format!("{input:?}");
        assert!(dbg.contains("EscapeBox"));
        assert!(dbg.contains("closed"));
    }
}
