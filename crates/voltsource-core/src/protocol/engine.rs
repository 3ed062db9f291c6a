//! Connection engine
//!
//! A single worker thread owns the open transport and drives every exchange
//! with the device: it pops queued calls in FIFO order, writes the encoded
//! frame, and runs a bounded receive/retry loop until a valid response
//! arrives or the per-call timeout expires. Resolved responses are fanned
//! out through the [`ReplyRouter`]; a terminal timeout flips connectivity to
//! disconnected and notifies every status observer.
//!
//! Callers interact with the engine only through prompt-returning calls:
//! enqueue, connect/disconnect, and observer registration. Calls enqueued
//! while disconnected (other than the handshake itself) are dropped, and
//! timed-out calls are abandoned without a per-call error; callers learn of
//! failure through the status observers.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use super::commands::Command;
use super::frame;
use super::response::Response;
use super::router::{ReadingKey, ReplyRouter, Sink, StatusSubscription};
use super::transport::Transport;
use super::{serial, ProtocolError, DEFAULT_TIMEOUT_MS};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Handshake in progress
    Connecting,
    /// Connected and ready
    Connected,
}

/// Connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Per-call response timeout in milliseconds, retries included
    pub timeout_ms: u64,
    /// Sleep between receive polls in milliseconds
    pub poll_interval_ms: u64,
    /// How long the worker waits on an empty queue before re-checking the
    /// stop flag, in milliseconds
    pub queue_wait_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: 10,
            queue_wait_ms: 500,
        }
    }
}

/// An enqueued command awaiting transmission and resolution
///
/// Owned exclusively by the engine from enqueue until the call resolves or
/// is abandoned.
struct PendingCall {
    command: Command,
    sink: Option<Sink>,
    sent: bool,
}

struct Shared {
    config: ConnectionConfig,
    queue: Mutex<VecDeque<PendingCall>>,
    queue_ready: Condvar,
    transport: Mutex<Option<Box<dyn Transport>>>,
    state: Mutex<ConnectionState>,
    router: ReplyRouter,
    stop: AtomicBool,
}

/// The device connection engine
///
/// Construct one per process and hand references to every collaborator that
/// needs it. Dropping the engine stops the worker thread.
pub struct Engine {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl Engine {
    /// Create the engine and start its worker thread
    pub fn new(config: ConnectionConfig) -> Self {
        let shared = Arc::new(Shared {
            config,
            queue: Mutex::new(VecDeque::new()),
            queue_ready: Condvar::new(),
            transport: Mutex::new(None),
            state: Mutex::new(ConnectionState::Disconnected),
            router: ReplyRouter::new(),
            stop: AtomicBool::new(false),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("voltsource-engine".into())
            .spawn(move || worker_loop(&worker_shared))
            .expect("failed to spawn engine worker thread");

        Self {
            shared,
            worker: Some(worker),
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.lock().expect("state lock poisoned")
    }

    /// True once the connection handshake has succeeded
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Enqueue a command for transmission
    ///
    /// Returns immediately. The response, if any, is delivered to `sink`
    /// once resolved. Calls enqueued while disconnected (other than
    /// [`Command::Connect`]) are dropped without notice.
    pub fn send(&self, command: Command, sink: Option<Sink>) {
        let mut queue = self.shared.queue.lock().expect("queue lock poisoned");
        queue.push_back(PendingCall {
            command,
            sink,
            sent: false,
        });
        self.shared.queue_ready.notify_one();
    }

    /// Send a command and block until it resolves
    ///
    /// A convenience wrapper over the asynchronous engine for sequential
    /// drivers. Returns `None` when the call times out or is dropped; the
    /// wait is bounded, so an abandoned call cannot hang the caller.
    pub fn send_blocking(&self, command: Command) -> Option<Response> {
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        self.send(command, Some(Sink::OneShot(tx)));

        // Margin past the engine's own timeout covers queue wait and fan-out
        let wait = Duration::from_millis(self.shared.config.timeout_ms + 500);
        rx.recv_timeout(wait).ok()
    }

    /// Connect to the device on a serial port
    ///
    /// Discards any stale queued calls, opens the port at the fixed baud
    /// rate, and enqueues the handshake. An open failure is reported
    /// immediately as a `false` status notification; nothing reaches the
    /// worker in that case.
    pub fn connect(&self, port_name: &str) {
        self.set_state(ConnectionState::Connecting);
        self.drain_queue();

        match serial::open_port(port_name) {
            Ok(transport) => self.install_transport(Box::new(transport)),
            Err(err) => {
                warn!(port_name, %err, "failed to open serial port");
                self.set_state(ConnectionState::Disconnected);
                self.shared.router.notify_status(false);
            }
        }
    }

    /// Connect over an already opened transport
    ///
    /// Same lifecycle as [`Engine::connect`] minus the port open; useful for
    /// links other than a local serial device.
    pub fn connect_transport(&self, transport: Box<dyn Transport>) {
        self.set_state(ConnectionState::Connecting);
        self.drain_queue();
        self.install_transport(transport);
    }

    /// Disconnect from the device
    ///
    /// Closes the transport locally; no teardown command is sent. The state
    /// flips to disconnected immediately. An exchange already in flight may
    /// still time out afterwards and emit its own `false` notification;
    /// ordering between the two is not guaranteed.
    pub fn disconnect(&self) {
        self.set_state(ConnectionState::Disconnected);
        {
            // Serialized behind the worker's send/receive cycle so the port
            // is never closed mid-write
            let mut transport = self.shared.transport.lock().expect("transport lock poisoned");
            *transport = None;
        }
        self.shared.router.notify_status(false);
    }

    /// Register a connection-status observer
    ///
    /// Runs synchronously on the worker thread; must not block.
    pub fn subscribe_status<F>(&self, callback: F) -> StatusSubscription
    where
        F: Fn(bool) + Send + 'static,
    {
        self.shared.router.subscribe_status(callback)
    }

    /// Remove a previously registered status observer
    pub fn unsubscribe_status(&self, subscription: StatusSubscription) {
        self.shared.router.unsubscribe_status(subscription);
    }

    /// Register the observer for one reading stream
    ///
    /// One observer per stream; registering again replaces the previous one.
    /// Issue at most one read per stream at a time — a second read before
    /// the first resolves has no defined delivery order.
    pub fn set_reading_sink<F>(&self, key: ReadingKey, callback: F)
    where
        F: Fn(Response) + Send + 'static,
    {
        self.shared.router.set_reading_sink(key, callback);
    }

    /// Remove the observer for one reading stream
    pub fn clear_reading_sink(&self, key: ReadingKey) {
        self.shared.router.clear_reading_sink(key);
    }

    /// Stop the worker thread and wait for it to exit
    ///
    /// The worker finishes or abandons the in-flight call first. Dropping
    /// the engine does the same.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn install_transport(&self, transport: Box<dyn Transport>) {
        {
            let mut guard = self.shared.transport.lock().expect("transport lock poisoned");
            *guard = Some(transport);
        }
        self.send(Command::Connect, Some(Sink::Status));
    }

    fn drain_queue(&self) {
        let mut queue = self.shared.queue.lock().expect("queue lock poisoned");
        if !queue.is_empty() {
            debug!(discarded = queue.len(), "discarding stale queued calls");
        }
        queue.clear();
    }

    fn set_state(&self, state: ConnectionState) {
        *self.shared.state.lock().expect("state lock poisoned") = state;
    }

    fn stop_and_join(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        self.shared.queue_ready.notify_all();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("engine worker thread panicked");
            }
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn worker_loop(shared: &Shared) {
    debug!("engine worker started");
    let queue_wait = Duration::from_millis(shared.config.queue_wait_ms);

    while !shared.stop.load(Ordering::Acquire) {
        let mut call = match pop_call(shared, queue_wait) {
            Some(call) => call,
            None => continue,
        };
        call.sent = true;

        let connected =
            *shared.state.lock().expect("state lock poisoned") == ConnectionState::Connected;
        if !connected && !call.command.is_connect() {
            // Non-connect traffic is only meaningful once connected; the
            // call is lost, not deferred
            debug!(command = ?call.command, "dropping call while disconnected");
            continue;
        }

        let outcome = {
            let mut transport = shared.transport.lock().expect("transport lock poisoned");
            match transport.as_mut() {
                Some(port) => exchange(&shared.config, port.as_mut(), &call.command),
                None => Err(ProtocolError::NotConnected),
            }
        };

        match outcome {
            Ok(response) => resolve(shared, &call, response),
            Err(err) => {
                debug!(command = ?call.command, %err, "call failed; marking disconnected");
                *shared.state.lock().expect("state lock poisoned") =
                    ConnectionState::Disconnected;
                shared.router.notify_status(false);
            }
        }
    }

    debug!("engine worker stopped");
}

/// Pop the next call, waiting briefly when the queue is empty
///
/// Returns `None` on a wake-up with nothing queued so the main loop
/// re-checks the stop flag.
fn pop_call(shared: &Shared, wait: Duration) -> Option<PendingCall> {
    let mut queue = shared.queue.lock().expect("queue lock poisoned");
    if let Some(call) = queue.pop_front() {
        return Some(call);
    }
    let (mut queue, _) = shared
        .queue_ready
        .wait_timeout(queue, wait)
        .expect("queue lock poisoned");
    queue.pop_front()
}

/// One full send/receive cycle for a single command
///
/// Writes the encoded frame, then polls for a response until the per-call
/// deadline. A wrong start byte flushes the input and retransmits; a frame
/// that parses but fails validation retransmits without flushing. Transport
/// errors abort the exchange and escalate like a timeout.
fn exchange(
    config: &ConnectionConfig,
    port: &mut dyn Transport,
    command: &Command,
) -> Result<Response, ProtocolError> {
    let request = frame::encode(command);
    let kind = command.response_kind();

    trace!(command = ?command, frame = ?request, "sending request");
    port.write_all(&request)?;

    let deadline = Instant::now() + Duration::from_millis(config.timeout_ms);
    let poll_interval = Duration::from_millis(config.poll_interval_ms);

    while Instant::now() < deadline {
        if port.bytes_available()? == 0 {
            thread::sleep(poll_interval);
            continue;
        }

        let start = port.read_exact(1)?;
        if start[0] != frame::RESPONSE_START_BYTE {
            // Framing desync: nothing downstream can be trusted, so drop
            // everything buffered and retransmit
            trace!(byte = start[0], "bad start byte; flushing and retransmitting");
            port.flush_input()?;
            port.write_all(&request)?;
            continue;
        }

        let length = port.read_exact(1)?;
        let payload = port.read_exact(length[0] as usize)?;

        let mut raw = Vec::with_capacity(2 + payload.len());
        raw.push(start[0]);
        raw.push(length[0]);
        raw.extend_from_slice(&payload);

        match frame::decode(&raw, kind) {
            Ok(response) => {
                trace!(response = ?response, "valid response");
                return Ok(response);
            }
            Err(err) => {
                trace!(%err, "invalid response; retransmitting");
                port.write_all(&request)?;
            }
        }
    }

    Err(ProtocolError::Timeout)
}

fn resolve(shared: &Shared, call: &PendingCall, response: Response) {
    debug_assert!(call.sent, "resolving a call that was never sent");
    match (&call.sink, &call.command) {
        (Some(Sink::Status), Command::Connect) => {
            *shared.state.lock().expect("state lock poisoned") = ConnectionState::Connected;
            debug!("handshake acknowledged; connected");
            shared.router.notify_status(true);
        }
        (Some(Sink::Status), command) => {
            // No wire-level teardown exists; nothing else belongs here
            debug!(command = ?command, "non-connect call bound to status sink; dropping");
        }
        (Some(sink), _) => shared.router.deliver(sink, response),
        (None, _) => trace!(command = ?call.command, "fire-and-forget call resolved"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_config_default() {
        let config = ConnectionConfig::default();
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(config.poll_interval_ms, 10);
    }

    #[test]
    fn test_engine_starts_disconnected() {
        let engine = Engine::new(ConnectionConfig::default());
        assert_eq!(engine.state(), ConnectionState::Disconnected);
        assert!(!engine.is_connected());
        engine.shutdown();
    }

    #[test]
    fn test_shutdown_joins_worker() {
        let engine = Engine::new(ConnectionConfig::default());
        // Must return promptly even with nothing queued
        engine.shutdown();
    }
}
