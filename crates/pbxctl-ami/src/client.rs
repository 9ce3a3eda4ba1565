//! Long-lived manager session with action correlation and event fan-out.
//!
//! [`ManagerClient`] is a cheaply cloneable handle. [`start`](ManagerClient::start)
//! spawns one background task that owns the transport: it dials, reads the
//! greeting, logs in, then multiplexes outgoing actions and incoming frames
//! until the stream drops. Responses are routed to the waiting caller by
//! `ActionID`; everything else is broadcast to subscribers in read order.
//!
//! When the session drops, every in-flight action fails with
//! [`Error::ConnectionLost`] and the task reconnects following its
//! [`ReconnectPolicy`]. Once the policy is exhausted the client stays
//! [`ConnectionState::Disconnected`] until started again.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pbxctl_ami::{Action, ManagerClient, ManagerConfig, TcpConnector};
//!
//! let client = ManagerClient::new(
//!     ManagerConfig::new("admin", "secret"),
//!     Arc::new(TcpConnector::new("localhost", 5038)),
//! );
//! client.start().await;
//! client.wait_connected(Duration::from_secs(5)).await?;
//! let status = client.execute(Action::new("CoreStatus")).await?;
//! client.stop().await;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::backoff::ReconnectPolicy;
use crate::codec::{AmiCodec, Frame};
use crate::connector::{BoxedStream, Connector};
use crate::error::Error;
use crate::message::{Action, ActionResponse, ManagerEvent, ManagerMessage};
use crate::sleep::{Sleeper, TokioSleeper};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

type Transport = Framed<BoxedStream, AmiCodec>;

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

// ── ManagerConfig ────────────────────────────────────────────────────

/// Session parameters for a [`ManagerClient`].
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub username: String,
    pub secret: SecretString,
    pub reconnect: ReconnectPolicy,

    /// Bound on greeting + login. Default: 10s.
    pub login_timeout: Duration,

    /// Per-action response deadline. `None` (the default) waits until the
    /// response arrives or the session drops.
    pub action_timeout: Option<Duration>,
}

impl ManagerConfig {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: SecretString::from(secret.into()),
            reconnect: ReconnectPolicy::default(),
            login_timeout: Duration::from_secs(10),
            action_timeout: None,
        }
    }
}

// ── EventListener ────────────────────────────────────────────────────

pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// A consumer of unsolicited events, run in its own task.
///
/// Errors are logged and do not stop delivery to this or any other listener.
pub trait EventListener: Send + 'static {
    fn name(&self) -> &str;

    fn on_event(
        &mut self,
        event: Arc<ManagerEvent>,
    ) -> impl Future<Output = Result<(), ListenerError>> + Send;
}

// ── Internal bookkeeping ─────────────────────────────────────────────

struct PendingAction {
    action: String,
    submitted: Instant,
    reply: oneshot::Sender<Result<ActionResponse, Error>>,
    /// Set once an `EventList: start` response has arrived.
    list_head: Option<ManagerMessage>,
    events: Vec<ManagerEvent>,
}

impl PendingAction {
    fn resolve(self, result: Result<ActionResponse, Error>) {
        trace!(
            action = %self.action,
            elapsed_ms = u64::try_from(self.submitted.elapsed().as_millis()).unwrap_or(u64::MAX),
            ok = result.is_ok(),
            "action resolved"
        );
        // Receiver gone means the caller stopped waiting; nothing to do.
        let _ = self.reply.send(result);
    }
}

/// Present only while logged in. Holding the lock while registering a
/// pending action and enqueuing its frame keeps teardown from missing it.
struct Session {
    outbound: mpsc::UnboundedSender<ManagerMessage>,
    pending: HashMap<String, PendingAction>,
}

struct Runner {
    cancel: CancellationToken,
    done: CancellationToken,
    handle: JoinHandle<()>,
}

enum SessionEnd {
    Stopped,
    Lost(Error),
}

// ── ManagerClient ────────────────────────────────────────────────────

/// Handle to a manager session. Clones share the same session.
#[derive(Clone)]
pub struct ManagerClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: ManagerConfig,
    connector: Arc<dyn Connector>,
    sleeper: Arc<dyn Sleeper>,
    state: watch::Sender<ConnectionState>,
    event_tx: broadcast::Sender<Arc<ManagerEvent>>,
    session: Mutex<Option<Session>>,
    runner: Mutex<Option<Runner>>,
    id_prefix: String,
    next_id: AtomicU64,
    attempts: AtomicU32,
}

impl ManagerClient {
    /// Create a client. Does NOT connect -- call [`start`](Self::start).
    pub fn new(config: ManagerConfig, connector: Arc<dyn Connector>) -> Self {
        Self::with_sleeper(config, connector, Arc::new(TokioSleeper))
    }

    /// Create a client with a custom reconnect sleeper.
    pub fn with_sleeper(
        config: ManagerConfig,
        connector: Arc<dyn Connector>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let id_prefix: String = uuid::Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(8)
            .collect();

        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                sleeper,
                state,
                event_tx,
                session: Mutex::new(None),
                runner: Mutex::new(None),
                id_prefix,
                next_id: AtomicU64::new(1),
                attempts: AtomicU32::new(0),
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the connection task. No-op if it is already running.
    pub async fn start(&self) {
        let mut runner = self.inner.runner.lock().await;
        if runner.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return;
        }

        let cancel = CancellationToken::new();
        let done = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let task_cancel = cancel.clone();
        let task_done = done.clone();
        let handle = tokio::spawn(async move {
            run(&inner, &task_cancel).await;
            task_done.cancel();
        });

        *runner = Some(Runner {
            cancel,
            done,
            handle,
        });
    }

    /// Log off, fail outstanding actions, and join the connection task.
    pub async fn stop(&self) {
        let runner = self.inner.runner.lock().await.take();
        if let Some(runner) = runner {
            runner.cancel.cancel();
            if let Err(e) = runner.handle.await {
                warn!(error = %e, "manager task ended abnormally");
            }
        }
        self.inner.teardown(|| Error::Shutdown).await;
        self.inner.set_state(ConnectionState::Disconnected);
        debug!("manager client stopped");
    }

    /// Wait until logged in, the task gives up, or `timeout` elapses.
    pub async fn wait_connected(&self, timeout: Duration) -> Result<(), Error> {
        let done = match self.inner.runner.lock().await.as_ref() {
            Some(runner) => runner.done.clone(),
            None => return Err(Error::NotConnected),
        };
        let mut state = self.inner.state.subscribe();

        tokio::select! {
            biased;
            reached = state.wait_for(|s| *s == ConnectionState::Connected) => {
                reached.map(|_| ()).map_err(|_| Error::Shutdown)
            }
            () = done.cancelled() => Err(Error::NotConnected),
            () = tokio::time::sleep(timeout) => Err(Error::NotConnected),
        }
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Watch connection state changes.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Failed reconnect attempts since the last successful login.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Subscribe to unsolicited events.
    ///
    /// A subscriber that falls behind receives
    /// [`broadcast::error::RecvError::Lagged`] and misses the overflowed events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ManagerEvent>> {
        self.inner.event_tx.subscribe()
    }

    /// Run `listener` in its own task until the client is dropped.
    pub fn spawn_listener<L: EventListener>(&self, mut listener: L) -> JoinHandle<()> {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Err(e) = listener.on_event(event).await {
                            warn!(listener = listener.name(), error = %e, "event listener failed");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(listener = listener.name(), skipped, "event listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!(listener = listener.name(), "event listener exiting");
        })
    }

    // ── Actions ──────────────────────────────────────────────────────

    /// Send `action` and wait for its correlated response.
    ///
    /// Fails immediately with [`Error::NotConnected`] when no session is
    /// live. A `Response: Error` reply becomes [`Error::ActionFailed`].
    pub async fn execute(&self, action: Action) -> Result<ActionResponse, Error> {
        let action_id = self.next_action_id();
        let (reply, rx) = oneshot::channel();

        {
            let mut session = self.inner.session.lock().await;
            let Some(session) = session.as_mut() else {
                return Err(Error::NotConnected);
            };
            let message = action.to_message(&action_id);
            session.pending.insert(
                action_id.clone(),
                PendingAction {
                    action: action.name().to_owned(),
                    submitted: Instant::now(),
                    reply,
                    list_head: None,
                    events: Vec::new(),
                },
            );
            if session.outbound.send(message).is_err() {
                session.pending.remove(&action_id);
                return Err(Error::ConnectionLost);
            }
        }
        debug!(action = action.name(), %action_id, "action sent");

        let received = match self.inner.config.action_timeout {
            None => rx.await,
            Some(limit) => {
                if let Ok(received) = tokio::time::timeout(limit, rx).await {
                    received
                } else {
                    if let Some(session) = self.inner.session.lock().await.as_mut() {
                        session.pending.remove(&action_id);
                    }
                    return Err(Error::ActionTimeout {
                        action: action.name().to_owned(),
                        timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    });
                }
            }
        };

        received.unwrap_or_else(|_| Err(Error::ConnectionLost))
    }

    fn next_action_id(&self) -> String {
        let n = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        format!("{}-{n}", self.inner.id_prefix)
    }
}

// ── Inner helpers ────────────────────────────────────────────────────

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        self.state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }

    /// Drop the session and fail every pending action exactly once.
    async fn teardown(&self, reason: impl Fn() -> Error) {
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            let count = session.pending.len();
            for (_, pending) in session.pending {
                pending.resolve(Err(reason()));
            }
            if count > 0 {
                debug!(count, "failed outstanding actions");
            }
        }
    }

    /// Route one inbound message to its pending action or to subscribers.
    async fn dispatch(&self, message: ManagerMessage) {
        let message = {
            let mut guard = self.session.lock().await;
            match guard.as_mut() {
                Some(session) => match route(session, message) {
                    Some(uncorrelated) => uncorrelated,
                    None => return,
                },
                None => message,
            }
        };

        trace!(event = message.event_name().unwrap_or("-"), "broadcasting");
        // Ignore send errors -- just means no active subscribers right now
        let _ = self.event_tx.send(Arc::new(message));
    }
}

/// Returns the message back if it is not part of any pending action.
fn route(session: &mut Session, message: ManagerMessage) -> Option<ManagerMessage> {
    let Some(action_id) = message.action_id().map(str::to_owned) else {
        return Some(message);
    };

    let collecting = match session.pending.get(&action_id) {
        None => return Some(message),
        Some(pending) => pending.list_head.is_some(),
    };

    if message.is_response() && !collecting {
        let pending = session.pending.remove(&action_id)?;
        if message.is_error() {
            let text = message.text().unwrap_or("unknown error").to_owned();
            let action = pending.action.clone();
            pending.resolve(Err(Error::ActionFailed {
                action,
                message: text,
            }));
        } else if message.starts_event_list() {
            let mut pending = pending;
            pending.list_head = Some(message);
            session.pending.insert(action_id, pending);
        } else {
            pending.resolve(Ok(ActionResponse {
                message,
                events: Vec::new(),
            }));
        }
        return None;
    }

    if collecting && message.is_event() {
        if message.completes_event_list() {
            let mut pending = session.pending.remove(&action_id)?;
            let head = pending.list_head.take().unwrap_or_default();
            let events = std::mem::take(&mut pending.events);
            pending.resolve(Ok(ActionResponse {
                message: head,
                events,
            }));
        } else if let Some(pending) = session.pending.get_mut(&action_id) {
            pending.events.push(message);
        }
        return None;
    }

    Some(message)
}

// ── Background connection loop ───────────────────────────────────────

/// Main loop: connect → serve → on drop, backoff → reconnect.
async fn run(inner: &Arc<Inner>, cancel: &CancellationToken) {
    let policy = inner.config.reconnect.clone();
    let target = inner.connector.describe();
    let mut attempt: u32 = 0;
    inner.attempts.store(0, Ordering::Relaxed);

    loop {
        inner.set_state(ConnectionState::Connecting);
        info!(remote = %target, attempt, "connecting to manager interface");

        let established = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = establish(inner) => result,
        };

        match established {
            Ok((transport, outbound_rx)) => {
                attempt = 0;
                inner.attempts.store(0, Ordering::Relaxed);
                inner.set_state(ConnectionState::Connected);
                info!(remote = %target, "manager session established");

                let end = serve(inner, transport, outbound_rx, cancel).await;
                inner.teardown(|| Error::ConnectionLost).await;
                inner.set_state(ConnectionState::Disconnected);

                match end {
                    SessionEnd::Stopped => break,
                    SessionEnd::Lost(e) => warn!(error = %e, "manager session lost"),
                }
            }
            Err(e) => {
                inner.teardown(|| Error::ConnectionLost).await;
                inner.set_state(ConnectionState::Disconnected);
                warn!(error = %e, attempt, "manager connection attempt failed");
            }
        }

        attempt = attempt.saturating_add(1);
        inner.attempts.store(attempt, Ordering::Relaxed);
        if policy.exhausted(attempt) {
            error!(
                max_attempts = policy.max_attempts.unwrap_or_default(),
                "manager reconnection limit reached, giving up"
            );
            break;
        }

        let delay = policy.delay(attempt);
        info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt, "waiting before reconnect"
        );
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = inner.sleeper.sleep(delay) => {}
        }
    }

    inner.set_state(ConnectionState::Disconnected);
    debug!("manager loop exiting");
}

/// Dial, read the greeting, log in, and open a session.
async fn establish(
    inner: &Inner,
) -> Result<(Transport, mpsc::UnboundedReceiver<ManagerMessage>), Error> {
    let stream = inner.connector.connect().await?;
    let mut transport = Framed::new(stream, AmiCodec::client());

    let login = tokio::time::timeout(inner.config.login_timeout, login(inner, &mut transport))
        .await
        .map_err(|_| {
            Error::Protocol(format!(
                "no login response within {}s",
                inner.config.login_timeout.as_secs()
            ))
        });
    login??;

    let (outbound, outbound_rx) = mpsc::unbounded_channel();
    *inner.session.lock().await = Some(Session {
        outbound,
        pending: HashMap::new(),
    });
    Ok((transport, outbound_rx))
}

async fn login(inner: &Inner, transport: &mut Transport) -> Result<(), Error> {
    match transport.next().await {
        Some(Ok(Frame::Greeting(greeting))) => debug!(%greeting, "manager greeting"),
        Some(Ok(Frame::Message(_))) => {
            return Err(Error::Protocol("expected greeting line".into()));
        }
        Some(Err(e)) => return Err(e),
        None => return Err(Error::ConnectionLost),
    }

    let login_id = format!("{}-login", inner.id_prefix);
    let action = Action::new("Login")
        .param("Username", inner.config.username.as_str())
        .param("Secret", inner.config.secret.expose_secret())
        .param("Events", "on");
    transport.send(action.to_message(&login_id)).await?;

    loop {
        match transport.next().await {
            Some(Ok(Frame::Message(msg))) if msg.action_id() == Some(login_id.as_str()) => {
                if msg.is_error() {
                    return Err(Error::Authentication {
                        message: msg.text().unwrap_or("rejected").to_owned(),
                    });
                }
                return Ok(());
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e),
            None => return Err(Error::ConnectionLost),
        }
    }
}

/// Pump frames in both directions until the stream drops or we are cancelled.
async fn serve(
    inner: &Inner,
    mut transport: Transport,
    mut outbound_rx: mpsc::UnboundedReceiver<ManagerMessage>,
    cancel: &CancellationToken,
) -> SessionEnd {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let logoff = Action::new("Logoff").to_message(&format!("{}-logoff", inner.id_prefix));
                if let Err(e) = transport.send(logoff).await {
                    debug!(error = %e, "logoff failed (non-fatal)");
                }
                return SessionEnd::Stopped;
            }
            Some(message) = outbound_rx.recv() => {
                if let Err(e) = transport.send(message).await {
                    return SessionEnd::Lost(e);
                }
            }
            frame = transport.next() => match frame {
                Some(Ok(Frame::Message(message))) => inner.dispatch(message).await,
                Some(Ok(Frame::Greeting(_))) => {}
                Some(Err(e)) => return SessionEnd::Lost(e),
                None => return SessionEnd::Lost(Error::ConnectionLost),
            },
        }
    }
}
