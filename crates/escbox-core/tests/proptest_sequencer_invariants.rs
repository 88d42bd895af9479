//! Property-based invariant tests for the escape-sequence state machine.
//!
//! 1. Without escapes, events pass through unchanged and in order.
//! 2. With no registered masks, nothing is lost or reordered: everything fed
//!    comes back out once the deadline passes.
//! 3. Escape followed by a registered pattern collapses to exactly one event.
//! 4. The buffer never exceeds its capacity.

use std::time::{Duration, Instant};

use escbox_core::{Event, KeyCode, MAX_BUFFERED_EVENTS, SeqId, SequenceRegistry, Sequencer};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

fn plain_event_strategy() -> impl Strategy<Value = Event> {
    prop_oneof![
        any::<char>().prop_map(Event::char),
        (1u16..=500, 1u16..=200).prop_map(|(w, h)| Event::resize(w, h)),
        Just(Event::key(KeyCode::Enter)),
        Just(Event::key(KeyCode::Tab)),
    ]
}

fn event_strategy() -> impl Strategy<Value = Event> {
    prop_oneof![
        4 => plain_event_strategy(),
        1 => Just(Event::key(KeyCode::Escape)),
    ]
}

fn feed_all(
    sequencer: &mut Sequencer,
    registry: &SequenceRegistry,
    events: &[Event],
    now: Instant,
) -> Vec<Event> {
    let mut out = Vec::new();
    for event in events {
        out.extend(sequencer.feed(event.clone(), registry, now));
    }
    out
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Pass-through
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn plain_events_pass_through(events in prop::collection::vec(plain_event_strategy(), 0..64)) {
        let mut registry = SequenceRegistry::new();
        registry.register(SeqId::new(1).unwrap(), ['[', 'Z']).unwrap();
        let mut sequencer = Sequencer::default();

        let out = feed_all(&mut sequencer, &registry, &events, Instant::now());
        prop_assert_eq!(out, events);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Conservation
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn nothing_lost_without_masks(events in prop::collection::vec(event_strategy(), 0..64)) {
        let registry = SequenceRegistry::new();
        let mut sequencer = Sequencer::default();
        let t = Instant::now();

        let mut out = feed_all(&mut sequencer, &registry, &events, t);
        out.extend(sequencer.check_timeout(t + Duration::from_secs(1)));
        prop_assert_eq!(out, events);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Registered pattern collapses
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn registered_pattern_collapses(
        id in 1u32..=u32::MAX,
        chars in prop::collection::vec(any::<char>(), 0..MAX_BUFFERED_EVENTS),
    ) {
        let seq = SeqId::new(id).unwrap();
        let mut registry = SequenceRegistry::new();
        registry.register(seq, chars.iter().copied()).unwrap();
        let mut sequencer = Sequencer::default();

        let mut run = vec![Event::key(KeyCode::Escape)];
        run.extend(chars.into_iter().map(Event::char));

        let t = Instant::now();
        let out = feed_all(&mut sequencer, &registry, &run, t);
        prop_assert_eq!(out, vec![Event::sequence(seq)]);
        prop_assert!(sequencer.check_timeout(t + Duration::from_secs(1)).is_empty());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Bounded buffer
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn buffer_stays_bounded(events in prop::collection::vec(event_strategy(), 0..128)) {
        let mut registry = SequenceRegistry::new();
        registry.register(SeqId::new(1).unwrap(), ['[', 'Z']).unwrap();
        let mut sequencer = Sequencer::default();
        let t = Instant::now();

        for event in events {
            let _ = sequencer.feed(event, &registry, t);
            prop_assert!(sequencer.pending_len() <= MAX_BUFFERED_EVENTS);
        }
    }
}
