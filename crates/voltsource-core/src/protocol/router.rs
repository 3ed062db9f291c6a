//! Reply routing
//!
//! Delivers resolved responses to the sinks callers registered at wiring
//! time: a shared set of connection-status observers, one observer per
//! reading stream (channel x kind), and one-shot completion channels used by
//! the blocking send wrapper.
//!
//! All notifications run synchronously on the engine's worker thread.
//! Observer callbacks must not block, or they stall every other exchange.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Mutex;
use tracing::{debug, trace};

use super::commands::Channel;
use super::response::Response;

/// Which measurement stream a reading sink receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadingKind {
    /// Measured output voltage
    Voltage,
    /// Measured output current
    Current,
}

/// Identifies one reading stream: a channel and a measurement kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadingKey {
    /// Source channel
    pub channel: Channel,
    /// Measurement kind
    pub kind: ReadingKind,
}

impl ReadingKey {
    /// Voltage readings of a channel
    pub fn voltage(channel: Channel) -> Self {
        Self {
            channel,
            kind: ReadingKind::Voltage,
        }
    }

    /// Current readings of a channel
    pub fn current(channel: Channel) -> Self {
        Self {
            channel,
            kind: ReadingKind::Current,
        }
    }
}

/// Where a resolved response is delivered
#[derive(Debug, Clone)]
pub enum Sink {
    /// The shared connection-status observer set
    Status,
    /// The registered observer for one reading stream
    Reading(ReadingKey),
    /// A one-shot completion channel (used by `Engine::send_blocking`)
    OneShot(SyncSender<Response>),
}

/// Handle returned by `subscribe_status`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSubscription(usize);

type StatusCallback = Box<dyn Fn(bool) + Send>;
type ReadingCallback = Box<dyn Fn(Response) + Send>;

/// Fan-out of resolved responses and status changes to registered observers
pub struct ReplyRouter {
    status: Mutex<Vec<(usize, StatusCallback)>>,
    readings: Mutex<HashMap<ReadingKey, ReadingCallback>>,
    next_id: AtomicUsize,
}

impl ReplyRouter {
    /// Create an empty router
    pub fn new() -> Self {
        Self {
            status: Mutex::new(Vec::new()),
            readings: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(0),
        }
    }

    /// Register a connection-status observer
    ///
    /// The callback runs on the engine worker and must return quickly.
    pub fn subscribe_status<F>(&self, callback: F) -> StatusSubscription
    where
        F: Fn(bool) + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.status
            .lock()
            .expect("status observer lock poisoned")
            .push((id, Box::new(callback)));
        StatusSubscription(id)
    }

    /// Remove a previously registered status observer
    pub fn unsubscribe_status(&self, subscription: StatusSubscription) {
        self.status
            .lock()
            .expect("status observer lock poisoned")
            .retain(|(id, _)| *id != subscription.0);
    }

    /// Register the observer for one reading stream, replacing any previous
    /// observer for the same stream
    pub fn set_reading_sink<F>(&self, key: ReadingKey, callback: F)
    where
        F: Fn(Response) + Send + 'static,
    {
        self.readings
            .lock()
            .expect("reading sink lock poisoned")
            .insert(key, Box::new(callback));
    }

    /// Remove the observer for one reading stream
    pub fn clear_reading_sink(&self, key: ReadingKey) {
        self.readings
            .lock()
            .expect("reading sink lock poisoned")
            .remove(&key);
    }

    /// Notify every status observer of a connectivity change
    pub fn notify_status(&self, connected: bool) {
        let observers = self.status.lock().expect("status observer lock poisoned");
        trace!(connected, observers = observers.len(), "status fan-out");
        for (_, callback) in observers.iter() {
            callback(connected);
        }
    }

    /// Deliver a resolved response to a reading or one-shot sink
    ///
    /// Status-bound deliveries are handled by the engine itself, not here.
    pub fn deliver(&self, sink: &Sink, response: Response) {
        match sink {
            Sink::Status => {
                debug!(?response, "status-bound response reached deliver; dropping");
            }
            Sink::Reading(key) => {
                let sinks = self.readings.lock().expect("reading sink lock poisoned");
                match sinks.get(key) {
                    Some(callback) => callback(response),
                    None => debug!(?key, "no sink registered for reading; dropping"),
                }
            }
            Sink::OneShot(tx) => {
                // The waiter may have given up already; that is fine
                let _ = tx.try_send(response);
            }
        }
    }
}

impl Default for ReplyRouter {
    fn default() -> Self {
        Self::new()
    }
}
