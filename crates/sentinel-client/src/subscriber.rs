//! Resilient alert subscription.
//!
//! One supervising task owns the connection for the lifetime of the
//! subscription:
//!
//! ```text
//!   Closed ──► Connecting ──► Open
//!     ▲            │           │
//!     └────────────┴───────────┘   (close, error, or failed connect)
//! ```
//!
//! Every close arms exactly one reconnection after a fixed delay. Since the
//! task only reconnects from its own close path, two live connections never
//! coexist. Inbound payloads are classified and forwarded in arrival order.
//! The UI consumes [`StreamEvent`]s from the handle; nothing here calls into
//! UI code.

use std::time::Duration;

use futures::StreamExt;
use sentinel_common::alerts::AlertMessage;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::error::StreamError;
use crate::ws::{FrameStream, StreamConnector};

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5000);

/// Status of the current connection lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Open,
    Closed,
}

impl ConnectionStatus {
    pub fn can_transition_to(self, next: ConnectionStatus) -> bool {
        use ConnectionStatus::*;
        matches!(
            (self, next),
            (Closed, Connecting) | (Connecting, Open) | (Connecting, Closed) | (Open, Closed)
        )
    }

    /// True while a connection attempt or connection is live.
    pub fn is_live(self) -> bool {
        !matches!(self, ConnectionStatus::Closed)
    }
}

/// Everything the subscription reports to its consumer, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A connection attempt started (1-based, counting every attempt).
    Connecting { attempt: u64 },
    /// The connection opened; any stale "disconnected" display can reset.
    Connected { attempt: u64 },
    Alert(AlertMessage),
    /// Transport problem. Always followed by `Disconnected`.
    Diagnostic(String),
    /// The connection closed; the next attempt starts after `retry_in`.
    Disconnected { retry_in: Duration },
    /// The subscription was torn down. Last event.
    Stopped,
}

pub struct StreamSubscriber<C> {
    connector: C,
    reconnect_delay: Duration,
}

impl<C: StreamConnector> StreamSubscriber<C> {
    pub fn new(connector: C, reconnect_delay: Duration) -> Self {
        Self {
            connector,
            reconnect_delay,
        }
    }

    /// Spawn the supervising task and open the first connection.
    ///
    /// Consumes the subscriber, so one subscriber can never run twice.
    pub fn start(self) -> SubscriptionHandle {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Closed);
        let cancel = CancellationToken::new();

        let supervisor = Supervisor {
            status: status_tx,
            events: events_tx,
            attempt: 0,
        };
        let task = tokio::spawn(supervise(
            self.connector,
            self.reconnect_delay,
            supervisor,
            cancel.clone(),
        ));

        SubscriptionHandle {
            events: events_rx,
            status: status_rx,
            _cancel_on_drop: cancel.clone().drop_guard(),
            cancel,
            task,
        }
    }
}

/// Owner side of a running subscription. Dropping it tears the
/// subscription down.
pub struct SubscriptionHandle {
    events: mpsc::UnboundedReceiver<StreamEvent>,
    status: watch::Receiver<ConnectionStatus>,
    cancel: CancellationToken,
    _cancel_on_drop: DropGuard,
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    /// Next event, or `None` once the subscription has stopped and every
    /// event has been consumed.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn status_watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Token that stops the subscription when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request teardown. Pending events stay readable; `Stopped` is last.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Tear down and wait for the supervising task to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "alert subscription task failed");
        }
    }
}

/// State machine side: owns the status cell and the event channel.
struct Supervisor {
    status: watch::Sender<ConnectionStatus>,
    events: mpsc::UnboundedSender<StreamEvent>,
    attempt: u64,
}

impl Supervisor {
    fn transition(&mut self, next: ConnectionStatus) {
        let current = *self.status.borrow();
        debug_assert!(
            current.can_transition_to(next),
            "invalid stream transition {current:?} -> {next:?}"
        );
        self.status.send_replace(next);
    }

    fn emit(&self, event: StreamEvent) {
        // The receiver lives in the handle; dropping the handle cancels.
        let _ = self.events.send(event);
    }

    fn connecting(&mut self) {
        self.attempt += 1;
        self.transition(ConnectionStatus::Connecting);
        tracing::debug!(attempt = self.attempt, "connecting to alert stream");
        self.emit(StreamEvent::Connecting {
            attempt: self.attempt,
        });
    }

    fn opened(&mut self) {
        self.transition(ConnectionStatus::Open);
        tracing::info!(attempt = self.attempt, "alert stream connected");
        self.emit(StreamEvent::Connected {
            attempt: self.attempt,
        });
    }

    fn deliver(&self, payload: String) {
        let alert = AlertMessage::classify(payload);
        tracing::trace!(severity = %alert.severity, "alert received");
        self.emit(StreamEvent::Alert(alert));
    }

    fn diagnostic(&self, error: &StreamError) {
        tracing::warn!(attempt = self.attempt, error = %error, "alert stream error");
        self.emit(StreamEvent::Diagnostic(error.to_string()));
    }

    fn closed(&mut self, retry_in: Duration) {
        self.transition(ConnectionStatus::Closed);
        tracing::warn!(
            attempt = self.attempt,
            retry_in_ms = retry_in.as_millis() as u64,
            "alert stream disconnected, reconnecting"
        );
        self.emit(StreamEvent::Disconnected { retry_in });
    }

    fn stopped(&mut self) {
        if self.status.borrow().is_live() {
            self.transition(ConnectionStatus::Closed);
        }
        tracing::info!("alert subscription stopped");
        self.emit(StreamEvent::Stopped);
    }
}

/// Connection loop. Returns only on teardown.
async fn supervise<C: StreamConnector>(
    connector: C,
    reconnect_delay: Duration,
    mut sup: Supervisor,
    cancel: CancellationToken,
) {
    loop {
        sup.connecting();

        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                sup.stopped();
                return;
            }
            result = connector.connect() => result,
        };

        match connected {
            Ok(frames) => {
                sup.opened();
                if let Pumped::Cancelled = pump(frames, &sup, &cancel).await {
                    sup.stopped();
                    return;
                }
            }
            Err(e) => sup.diagnostic(&e),
        }

        sup.closed(reconnect_delay);

        if cancel.is_cancelled() {
            sup.stopped();
            return;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                sup.stopped();
                return;
            }
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
    }
}

enum Pumped {
    Closed,
    Cancelled,
}

/// Forward frames until the connection ends or teardown is requested.
async fn pump(mut frames: FrameStream, sup: &Supervisor, cancel: &CancellationToken) -> Pumped {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Pumped::Cancelled,
            frame = frames.next() => match frame {
                Some(Ok(payload)) => sup.deliver(payload),
                Some(Err(e)) => {
                    sup.diagnostic(&e);
                    return Pumped::Closed;
                }
                None => return Pumped::Closed,
            },
        }
    }
}
