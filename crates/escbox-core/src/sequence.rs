#![forbid(unsafe_code)]

//! Registered escape-sequence patterns and the matcher over them.
//!
//! A [`SequenceMask`] names the characters a terminal sends *after* the
//! initiating Escape key, e.g. `['[', 'Z']` for Shift+Tab on many terminals.
//! [`SequenceRegistry::find_match`] compares a buffered run (Escape at
//! position 0) against every mask in registration order.

use std::fmt;
use std::num::NonZeroU32;

use crate::event::Event;

/// Capacity of the sequencer's buffer, Escape key included.
///
/// A pattern needs `chars.len() + 1` slots, so the longest registrable
/// pattern has `MAX_BUFFERED_EVENTS - 1` characters.
pub const MAX_BUFFERED_EVENTS: usize = 10;

/// Caller-chosen identifier of an escape sequence.
///
/// Zero is reserved for "no sequence" and cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeqId(NonZeroU32);

impl SeqId {
    /// Wrap a raw identifier. Returns `None` for `0`.
    #[must_use]
    pub const fn new(id: u32) -> Option<Self> {
        match NonZeroU32::new(id) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    /// The raw identifier.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl From<NonZeroU32> for SeqId {
    fn from(id: NonZeroU32) -> Self {
        Self(id)
    }
}

impl fmt::Display for SeqId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered pattern: the characters expected after Escape, and the
/// sequence they signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceMask {
    /// Characters following the Escape key, in order.
    pub chars: Vec<char>,
    /// Identifier reported when the pattern matches.
    pub seq: SeqId,
}

impl SequenceMask {
    /// Number of buffered events (Escape included) this mask matches.
    #[must_use]
    pub fn event_len(&self) -> usize {
        self.chars.len() + 1
    }

    /// True if `events` is exactly Escape-plus-these-characters.
    ///
    /// Position 0 is assumed to be the Escape key and is not inspected.
    #[must_use]
    pub fn matches(&self, events: &[Event]) -> bool {
        events.len() == self.event_len()
            && self
                .chars
                .iter()
                .zip(&events[1..])
                .all(|(&c, event)| event.ch == Some(c))
    }
}

/// Registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterError {
    /// The pattern could never fit in the sequencer's buffer at the capacity
    /// it was checked against.
    TooLong {
        /// Characters in the rejected pattern.
        len: usize,
        /// Longest accepted pattern.
        max: usize,
    },
}

impl fmt::Display for RegisterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLong { len, max } => write!(
                f,
                "sequence pattern of {len} characters exceeds the maximum of {max}"
            ),
        }
    }
}

impl std::error::Error for RegisterError {}

/// Insertion-ordered set of [`SequenceMask`]s.
#[derive(Debug, Clone, Default)]
pub struct SequenceRegistry {
    masks: Vec<SequenceMask>,
}

impl SequenceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pattern that fits the largest sequencer buffer.
    ///
    /// Duplicate patterns are accepted; the first registered one wins.
    pub fn register(
        &mut self,
        seq: SeqId,
        chars: impl IntoIterator<Item = char>,
    ) -> Result<(), RegisterError> {
        self.register_within(MAX_BUFFERED_EVENTS, seq, chars)
    }

    /// Append a pattern that must fit a buffer of `capacity` events.
    ///
    /// A sequencer running with a smaller `buffer_capacity` releases the run
    /// before a longer pattern could complete, so such patterns are rejected.
    /// `capacity` is clamped to `1..=MAX_BUFFERED_EVENTS`.
    pub fn register_within(
        &mut self,
        capacity: usize,
        seq: SeqId,
        chars: impl IntoIterator<Item = char>,
    ) -> Result<(), RegisterError> {
        let chars: Vec<char> = chars.into_iter().collect();
        let max = capacity.clamp(1, MAX_BUFFERED_EVENTS) - 1;
        if chars.len() > max {
            return Err(RegisterError::TooLong {
                len: chars.len(),
                max,
            });
        }
        crate::debug!(seq = seq.get(), len = chars.len(), "sequence registered");
        self.masks.push(SequenceMask { chars, seq });
        Ok(())
    }

    /// Find the first mask matching the buffered run exactly.
    ///
    /// `None` is the ordinary "keep buffering" answer, including while the
    /// run is still shorter than every mask.
    #[must_use]
    pub fn find_match(&self, events: &[Event]) -> Option<SeqId> {
        self.masks
            .iter()
            .find(|mask| mask.matches(events))
            .map(|mask| mask.seq)
    }

    /// Number of registered masks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Remove every mask.
    pub fn clear(&mut self) {
        self.masks.clear();
    }

    /// Registered masks in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &SequenceMask> {
        self.masks.iter()
    }

    /// Event length of the longest registered mask, if any.
    #[must_use]
    pub fn longest_pattern(&self) -> Option<usize> {
        self.masks.iter().map(SequenceMask::event_len).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::KeyCode;

    fn id(n: u32) -> SeqId {
        SeqId::new(n).unwrap()
    }

    fn run(chars: &str) -> Vec<Event> {
        std::iter::once(Event::key(KeyCode::Escape))
            .chain(chars.chars().map(Event::char))
            .collect()
    }

    #[test]
    fn zero_id_is_unrepresentable() {
        assert!(SeqId::new(0).is_none());
        assert_eq!(SeqId::new(7).map(SeqId::get), Some(7));
    }

    #[test]
    fn shift_tab_matches() {
        let mut registry = SequenceRegistry::new();
        registry.register(id(1), ['[', 'Z']).unwrap();

        assert_eq!(registry.find_match(&run("[Z")), Some(id(1)));
    }

    #[test]
    fn shorter_run_keeps_buffering() {
        let mut registry = SequenceRegistry::new();
        registry.register(id(1), ['[', 'Z']).unwrap();

        assert_eq!(registry.find_match(&run("")), None);
        assert_eq!(registry.find_match(&run("[")), None);
    }

    #[test]
    fn longer_run_does_not_match() {
        let mut registry = SequenceRegistry::new();
        registry.register(id(1), ['[', 'Z']).unwrap();

        assert_eq!(registry.find_match(&run("[Zx")), None);
    }

    #[test]
    fn wrong_character_does_not_match() {
        let mut registry = SequenceRegistry::new();
        registry.register(id(1), ['[', 'Z']).unwrap();

        assert_eq!(registry.find_match(&run("[c")), None);
    }

    #[test]
    fn non_key_followers_do_not_match() {
        let mut registry = SequenceRegistry::new();
        registry.register(id(1), ['[']).unwrap();

        let events = vec![Event::key(KeyCode::Escape), Event::resize(80, 24)];
        assert_eq!(registry.find_match(&events), None);
    }

    #[test]
    fn first_registered_wins() {
        let mut registry = SequenceRegistry::new();
        registry.register(id(1), ['[', 'Z']).unwrap();
        registry.register(id(2), ['[', 'Z']).unwrap();

        assert_eq!(registry.find_match(&run("[Z")), Some(id(1)));
    }

    #[test]
    fn length_selects_between_prefixes() {
        let mut registry = SequenceRegistry::new();
        registry.register(id(1), ['[', 'A']).unwrap();
        registry.register(id(2), ['[', '1', ';', '2', 'A']).unwrap();

        assert_eq!(registry.find_match(&run("[A")), Some(id(1)));
        assert_eq!(registry.find_match(&run("[1;2")), None);
        assert_eq!(registry.find_match(&run("[1;2A")), Some(id(2)));
    }

    #[test]
    fn empty_pattern_matches_lone_escape() {
        let mut registry = SequenceRegistry::new();
        registry.register(id(9), []).unwrap();

        assert_eq!(registry.find_match(&run("")), Some(id(9)));
    }

    #[test]
    fn too_long_pattern_rejected() {
        let mut registry = SequenceRegistry::new();
        let chars = vec!['x'; MAX_BUFFERED_EVENTS];
        let err = registry.register(id(1), chars).unwrap_err();
        assert_eq!(
            err,
            RegisterError::TooLong {
                len: MAX_BUFFERED_EVENTS,
                max: MAX_BUFFERED_EVENTS - 1,
            }
        );
        assert!(registry.is_empty());

        registry
            .register(id(1), vec!['x'; MAX_BUFFERED_EVENTS - 1])
            .unwrap();
        assert_eq!(registry.longest_pattern(), Some(MAX_BUFFERED_EVENTS));
    }

    #[test]
    fn register_within_honours_smaller_capacity() {
        let mut registry = SequenceRegistry::new();
        let err = registry.register_within(2, id(1), ['[', 'Z']).unwrap_err();
        assert_eq!(err, RegisterError::TooLong { len: 2, max: 1 });
        assert!(registry.is_empty());

        registry.register_within(2, id(2), ['[']).unwrap();
        registry.register_within(1, id(3), []).unwrap();
        assert_eq!(registry.len(), 2);

        // Out-of-range capacities are clamped.
        assert!(registry.register_within(0, id(4), ['a']).is_err());
        registry
            .register_within(usize::MAX, id(5), vec!['x'; MAX_BUFFERED_EVENTS - 1])
            .unwrap();
    }

    #[test]
    fn clear_and_iter() {
        let mut registry = SequenceRegistry::new();
        registry.register(id(1), ['a']).unwrap();
        registry.register(id(2), ['b']).unwrap();
        let ids: Vec<u32> = registry.iter().map(|mask| mask.seq.get()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(registry.len(), 2);

        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.longest_pattern(), None);
    }

    #[test]
    fn error_display() {
        let err = RegisterError::TooLong { len: 12, max: 9 };
        assert!(err.to_string().contains("12"));
    }
}
