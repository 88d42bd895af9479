#![forbid(unsafe_code)]

//! Escape-sequence state machine.
//!
//! The [`Sequencer`] watches an event stream for an Escape key, buffers what
//! follows, and either collapses the run into one synthetic event (when it
//! matches a registered mask) or releases it unchanged once the deadline
//! passes.
//!
//! # Design
//!
//! ## Invariants
//! 1. Events are never reordered: a flush emits the buffer oldest-first
//!    before any newer event.
//! 2. The deadline is measured from the most recent Escape key.
//! 3. The buffer never holds more than `buffer_capacity` events.
//! 4. The sequencer never reads the clock: every call takes `now`.
//!
//! ## Failure Modes
//! - A run that outgrows the buffer without matching is released as-is
//!   (nothing longer could match anyway).
//! - A sequence arriving slower than the timeout is released as individual
//!   events rather than recognized.
//!
//! # Example
//!
//! ```
//! use escbox_core::{Event, KeyCode, SeqId, SequenceRegistry, Sequencer, SequencerConfig};
//! use std::time::Instant;
//!
//! let shift_tab = SeqId::new(1).unwrap();
//! let mut registry = SequenceRegistry::new();
//! registry.register(shift_tab, ['[', 'Z']).unwrap();
//!
//! let mut sequencer = Sequencer::new(SequencerConfig::default());
//! let now = Instant::now();
//!
//! assert!(sequencer.feed(Event::key(KeyCode::Escape), &registry, now).is_empty());
//! assert!(sequencer.feed(Event::char('['), &registry, now).is_empty());
//! let out = sequencer.feed(Event::char('Z'), &registry, now);
//! assert_eq!(out, vec![Event::sequence(shift_tab)]);
//! ```

use std::time::{Duration, Instant};

use crate::event::Event;
use crate::sequence::{MAX_BUFFERED_EVENTS, SequenceRegistry};

/// Environment variable overriding the sequence timeout, in microseconds.
pub const TIMEOUT_ENV: &str = "ESCBOX_SEQUENCE_TIMEOUT_US";

/// Environment variable overriding the buffer capacity.
pub const CAPACITY_ENV: &str = "ESCBOX_BUFFER_CAPACITY";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for escape-sequence detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencerConfig {
    /// How long after an Escape key the follow-up events may take to arrive
    /// (default: 1ms).
    ///
    /// Terminal-generated sequences arrive in one burst; a human typing Escape
    /// and then another key is orders of magnitude slower.
    ///
    /// A timeout that overflows [`Instant`] disables the deadline: the run is
    /// then released only by a match, another Escape, overflow, or
    /// [`Sequencer::flush`].
    pub sequence_timeout: Duration,

    /// Maximum number of buffered events, Escape included (default: 10).
    pub buffer_capacity: usize,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            sequence_timeout: Duration::from_millis(1),
            buffer_capacity: MAX_BUFFERED_EVENTS,
        }
    }
}

impl SequencerConfig {
    /// Create a config with a custom timeout.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            sequence_timeout: timeout,
            ..Default::default()
        }
    }

    /// Set the buffer capacity, clamped to `1..=MAX_BUFFERED_EVENTS`.
    #[must_use]
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity.clamp(1, MAX_BUFFERED_EVENTS);
        self
    }

    /// Defaults, overridden by `ESCBOX_SEQUENCE_TIMEOUT_US` and
    /// `ESCBOX_BUFFER_CAPACITY` when they hold valid numbers.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(us) => config.sequence_timeout = Duration::from_micros(us),
                Err(_) => {
                    crate::warn!(value = %raw, "ignoring invalid {}", TIMEOUT_ENV);
                }
            }
        }
        if let Some(raw) = lookup(CAPACITY_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(capacity) => config = config.buffer_capacity(capacity),
                Err(_) => {
                    crate::warn!(value = %raw, "ignoring invalid {}", CAPACITY_ENV);
                }
            }
        }
        config
    }
}

// ---------------------------------------------------------------------------
// SequencerState
// ---------------------------------------------------------------------------

/// Whether a possible sequence is being collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequencerState {
    /// No Escape key pending; events pass straight through.
    Idle,
    /// An Escape key was seen and the deadline is running.
    Collecting,
}

// ---------------------------------------------------------------------------
// Sequencer
// ---------------------------------------------------------------------------

/// Stateful escape-sequence detector.
///
/// Feed events via [`feed`](Self::feed) and call
/// [`check_timeout`](Self::check_timeout) once [`deadline`](Self::deadline)
/// has passed. Both return the events to publish, in order.
pub struct Sequencer {
    config: SequencerConfig,

    /// Events since the most recent unmatched Escape, Escape first.
    buffer: Vec<Event>,

    /// When the current run is given up on.
    deadline: Option<Instant>,
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("state", &self.state())
            .field("buffer_len", &self.buffer.len())
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new(SequencerConfig::default())
    }
}

impl Sequencer {
    /// Create a sequencer with the given configuration.
    #[must_use]
    pub fn new(config: SequencerConfig) -> Self {
        let capacity = config.buffer_capacity.clamp(1, MAX_BUFFERED_EVENTS);
        Self {
            config: SequencerConfig {
                buffer_capacity: capacity,
                ..config
            },
            buffer: Vec::with_capacity(capacity),
            deadline: None,
        }
    }

    /// Feed one event.
    ///
    /// Returns the events to publish now, oldest first. An empty result means
    /// the event was buffered as part of a possible sequence.
    pub fn feed(&mut self, event: Event, registry: &SequenceRegistry, now: Instant) -> Vec<Event> {
        if event.is_escape() {
            // A new Escape abandons the run in progress.
            let mut out = self.take_buffer();
            self.buffer.push(event);
            // A timeout too large to represent never expires.
            self.deadline = now.checked_add(self.config.sequence_timeout);
            out.extend(self.resolve(registry));
            return out;
        }

        if self.buffer.is_empty() {
            return vec![event];
        }

        self.buffer.push(event);
        self.resolve(registry)
    }

    /// Release the buffered run if the deadline has passed.
    ///
    /// Returns nothing when idle or when the deadline is still ahead.
    pub fn check_timeout(&mut self, now: Instant) -> Vec<Event> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                crate::trace!(flushed = self.buffer.len(), "sequence deadline expired");
                self.take_buffer()
            }
            _ => Vec::new(),
        }
    }

    /// Release the buffered run immediately, whatever the deadline.
    pub fn flush(&mut self) -> Vec<Event> {
        self.take_buffer()
    }

    /// Discard the buffered run.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.deadline = None;
    }

    /// When the current run expires, if one is being collected.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time remaining until the current run expires.
    #[must_use]
    pub fn time_until_timeout(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SequencerState {
        if self.buffer.is_empty() {
            SequencerState::Idle
        } else {
            SequencerState::Collecting
        }
    }

    /// Number of buffered events.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Get a reference to the current configuration.
    #[must_use]
    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    /// Match the buffer; collapse it on a hit, release it on overflow.
    fn resolve(&mut self, registry: &SequenceRegistry) -> Vec<Event> {
        if let Some(seq) = registry.find_match(&self.buffer) {
            crate::debug!(seq = seq.get(), len = self.buffer.len(), "escape sequence matched");
            self.reset();
            return vec![Event::sequence(seq)];
        }
        if self.buffer.len() >= self.config.buffer_capacity {
            crate::debug!(len = self.buffer.len(), "sequence buffer full, flushing");
            return self.take_buffer();
        }
        Vec::new()
    }

    fn take_buffer(&mut self) -> Vec<Event> {
        self.deadline = None;
        std::mem::replace(
            &mut self.buffer,
            Vec::with_capacity(self.config.buffer_capacity),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
