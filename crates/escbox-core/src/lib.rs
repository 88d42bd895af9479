#![forbid(unsafe_code)]

//! Core: event model, sequence registry, and the escape-sequence state machine.
//!
//! Nothing in this crate spawns threads or touches the terminal. The
//! [`sequencer::Sequencer`] is driven by explicit [`std::time::Instant`]s so
//! the runtime in the `escbox` crate (or a test) decides when time passes.

pub mod event;
pub mod logging;
pub mod sequence;
pub mod sequencer;

pub use event::{Event, EventKind, KeyCode, Modifiers, MouseButton, MouseEventKind, SourceError};
pub use sequence::{MAX_BUFFERED_EVENTS, RegisterError, SeqId, SequenceMask, SequenceRegistry};
pub use sequencer::{Sequencer, SequencerConfig, SequencerState};

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{debug, error, info, trace, warn};
