#![forbid(unsafe_code)]

//! Blocking-poll to channel bridge.
//!
//! The channelizer thread calls [`EventSource::poll_event`] in a loop and
//! sends each result on a rendezvous channel. [`Channelizer::request_stop`]
//! ends the loop from any thread, whether the thread is blocked in the poll
//! or in the send.
//!
//! # Stop protocol
//!
//! The thread writes `polling`, the stopper writes `terminating`; both use
//! `SeqCst`. Before polling, the thread stores `polling = true` and then
//! re-reads `terminating`. The stopper stores `terminating = true` and then
//! reads `polling`. At least one side observes the other's store:
//!
//! - the thread sees `terminating` and never enters the poll, or
//! - the stopper sees `polling` and interrupts the source. Interrupts are
//!   sticky, so one landing just before the poll starts still ends it.
//!
//! When not polling, the stopper drains at most one pending send so the
//! thread cannot stay parked on a value nobody will read. A parked send also
//! rechecks `terminating` every few milliseconds, which covers a drain that
//! ran before the send started.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, SendTimeoutError, Sender};
use escbox_core::Event;
use tracing::{debug, trace};

use crate::source::EventSource;

/// How often a parked send rechecks the stop flag.
const SEND_RECHECK: Duration = Duration::from_millis(10);

/// Shared control block of the channelizer thread.
pub struct Channelizer {
    source: Arc<dyn EventSource>,
    /// Set by the thread while it is inside `poll_event`.
    polling: AtomicBool,
    /// Set once by `request_stop`.
    terminating: AtomicBool,
    /// Clone of the output receiver, used only to drain a pending send.
    pending: Receiver<Event>,
}

impl std::fmt::Debug for Channelizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channelizer")
            .field("polling", &self.polling.load(Ordering::Relaxed))
            .field("terminating", &self.terminating.load(Ordering::Relaxed))
            .finish()
    }
}

impl Channelizer {
    /// Start the channelizer thread.
    ///
    /// Returns the control block, the receiving end of the event channel, and
    /// the thread handle. The channel disconnects exactly once, when the
    /// thread exits.
    pub fn spawn(
        source: Arc<dyn EventSource>,
    ) -> io::Result<(Arc<Self>, Receiver<Event>, JoinHandle<()>)> {
        let (tx, rx) = channel::bounded(0);
        let channelizer = Arc::new(Self {
            source,
            polling: AtomicBool::new(false),
            terminating: AtomicBool::new(false),
            pending: rx.clone(),
        });
        let worker = Arc::clone(&channelizer);
        let handle = thread::Builder::new()
            .name("escbox-channelizer".into())
            .spawn(move || worker.run(tx))?;
        Ok((channelizer, rx, handle))
    }

    /// Ask the thread to exit. Safe to call repeatedly and from any thread.
    pub fn request_stop(&self) {
        if self.terminating.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.polling.load(Ordering::SeqCst) {
            debug!("channelizer stop requested while polling; interrupting source");
            self.source.interrupt();
        } else {
            debug!("channelizer stop requested while idle; draining pending send");
            let _ = self.pending.try_recv();
        }
    }

    /// True once a stop was requested.
    #[must_use]
    pub fn is_terminating(&self) -> bool {
        self.terminating.load(Ordering::SeqCst)
    }

    /// True while the thread is blocked inside the source's poll.
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.polling.load(Ordering::SeqCst)
    }

    fn run(&self, tx: Sender<Event>) {
        debug!("channelizer started");
        loop {
            self.polling.store(true, Ordering::SeqCst);
            if self.terminating.load(Ordering::SeqCst) {
                self.polling.store(false, Ordering::SeqCst);
                break;
            }

            let event = self.source.poll_event();
            self.polling.store(false, Ordering::SeqCst);

            if self.terminating.load(Ordering::SeqCst) {
                trace!(kind = ?event.kind, "discarding event polled during stop");
                break;
            }

            trace!(kind = ?event.kind, "raw event");
            if !self.publish(&tx, event) {
                break;
            }
        }
        debug!("channelizer stopped");
        // Dropping `tx` here closes the channel.
    }

    /// Hand one event to the consumer. Returns `false` if the loop should end.
    ///
    /// A stop whose drain raced ahead of this send is caught on the next
    /// recheck of `terminating`.
    fn publish(&self, tx: &Sender<Event>, mut event: Event) -> bool {
        loop {
            match tx.send_timeout(event, SEND_RECHECK) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(unsent)) => {
                    if self.terminating.load(Ordering::SeqCst) {
                        trace!("dropping unsent event after stop");
                        return false;
                    }
                    event = unsent;
                }
                Err(SendTimeoutError::Disconnected(_)) => {
                    debug!("channelizer output dropped");
                    return false;
                }
            }
        }
    }
}
