#![forbid(unsafe_code)]

//! The sequencer thread.
//!
//! Waits on either the next raw event or the sequencer's deadline, whichever
//! comes first, and publishes what the [`Sequencer`] releases. The `select!`
//! is the single point where arrival order between input and timer is
//! decided; each wakeup runs exactly one transition.

use std::io;
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam::channel::{self, Receiver, Sender};
use escbox_core::{Event, SequenceRegistry, Sequencer, SequencerConfig};
use tracing::{debug, trace};

/// Start the sequencer thread.
///
/// The returned receiver disconnects once `raw` has disconnected and every
/// buffered event has been published.
pub(crate) fn spawn(
    raw: Receiver<Event>,
    registry: Arc<RwLock<SequenceRegistry>>,
    config: SequencerConfig,
) -> io::Result<(Receiver<Event>, JoinHandle<()>)> {
    let (tx, rx) = channel::bounded(0);
    let handle = thread::Builder::new()
        .name("escbox-sequencer".into())
        .spawn(move || run(raw, tx, &registry, Sequencer::new(config)))?;
    Ok((rx, handle))
}

fn run(
    raw: Receiver<Event>,
    out: Sender<Event>,
    registry: &RwLock<SequenceRegistry>,
    mut sequencer: Sequencer,
) {
    debug!(config = ?sequencer.config(), "sequencer started");
    loop {
        let timer = match sequencer.deadline() {
            Some(deadline) => channel::at(deadline),
            None => channel::never(),
        };

        let released = crossbeam::select! {
            recv(raw) -> event => event.ok().map(|event| {
                let registry = registry.read().unwrap_or_else(PoisonError::into_inner);
                sequencer.feed(event, &registry, Instant::now())
            }),
            recv(timer) -> fired => Some(match fired {
                Ok(at) => sequencer.check_timeout(at),
                Err(_) => Vec::new(),
            }),
        };
        let Some(released) = released else {
            break;
        };

        if !publish(&out, released) {
            debug!("sequencer output dropped");
            return;
        }
    }

    // Upstream closed: nothing more can complete a pending run.
    let rest = sequencer.flush();
    if !rest.is_empty() {
        trace!(count = rest.len(), "flushing pending run on shutdown");
        publish(&out, rest);
    }
    debug!("sequencer stopped");
}

fn publish(out: &Sender<Event>, events: Vec<Event>) -> bool {
    for event in events {
        trace!(kind = ?event.kind, seq = ?event.seq, "publishing event");
        if out.send(event).is_err() {
            return false;
        }
    }
    true
}
