//! [`ChatSession`] over the WhatsApp Web sidecar.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    tokio::sync::{RwLock, mpsc, oneshot},
    tracing::{debug, error, info, trace, warn},
    wagpt_channels::{
        ChatSession, DEFAULT_INBOUND_CAPACITY, Error as SessionError, InboundMessage,
        InboundReceiver, InboundSender, Result as SessionResult, SessionState, StateObserver,
        StatePublisher, inbound_channel, state_channel,
    },
};

#[cfg(feature = "metrics")]
use wagpt_metrics::{counter, labels, whatsapp as wa_metrics};

use crate::{
    error::Error,
    process::{SidecarConfig, SidecarProcess, find_sidecar_dir, start_sidecar},
    qr::render_qr,
    sidecar::{
        DEFAULT_SIDECAR_PORT, EventReceiver, EventSender, SidecarEvent, SidecarHandle,
        connect_with_retry,
    },
    state::{next_state, transition_path},
    types::{GatewayMessage, SidecarMessage},
};

pub const CHANNEL_ID: &str = "whatsapp-web";

const DEFAULT_CONNECT_ATTEMPTS: u32 = 20;
const RECONNECT_DELAY: Duration = Duration::from_secs(2);
const LOG_PREVIEW_CHARS: usize = 50;

type Ack = Result<(), String>;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub account_id: String,
    /// Persisted login credentials; reused on the next start.
    pub auth_dir: PathBuf,
    pub sidecar_port: u16,
    pub sidecar_dir: Option<PathBuf>,
    /// Spawn the sidecar process; otherwise it is expected to be running.
    pub auto_start_sidecar: bool,
    pub connect_attempts: u32,
    pub inbound_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            account_id: "default".into(),
            auth_dir: PathBuf::from(".wwebjs_auth"),
            sidecar_port: DEFAULT_SIDECAR_PORT,
            sidecar_dir: None,
            auto_start_sidecar: true,
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
        }
    }
}

/// WhatsApp Web session. Cheap to clone; clones share the connection.
#[derive(Clone)]
pub struct WhatsAppSession {
    inner: Arc<Inner>,
}

struct Inner {
    config: SessionConfig,
    state: StatePublisher,
    inbound: InboundSender,
    events_tx: EventSender,
    /// Taken by the first `initialize`.
    events_rx: Mutex<Option<EventReceiver>>,
    sidecar: RwLock<Option<SidecarHandle>>,
    process: tokio::sync::Mutex<Option<SidecarProcess>>,
    pending: Mutex<HashMap<String, oneshot::Sender<Ack>>>,
    shutting_down: AtomicBool,
    /// Set while a reconnect loop is running.
    reconnecting: AtomicBool,
}

impl WhatsAppSession {
    /// Create the session together with the only receiver of its inbound
    /// messages.
    pub fn new(config: SessionConfig) -> (Self, InboundReceiver) {
        let (inbound, inbound_rx) = inbound_channel(config.inbound_capacity);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state, _) = state_channel();
        let inner = Inner {
            config,
            state,
            inbound,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            sidecar: RwLock::new(None),
            process: tokio::sync::Mutex::new(None),
            pending: Mutex::new(HashMap::new()),
            shutting_down: AtomicBool::new(false),
            reconnecting: AtomicBool::new(false),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            inbound_rx,
        )
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }
}

#[async_trait]
impl ChatSession for WhatsAppSession {
    fn id(&self) -> &str {
        CHANNEL_ID
    }

    async fn initialize(&self) -> SessionResult<()> {
        let events_rx = self
            .inner
            .events_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(events_rx) = events_rx {
            let (forward_tx, forward_rx) = mpsc::unbounded_channel();
            tokio::spawn(forward_inbound(self.inner.inbound.clone(), forward_rx));
            tokio::spawn(Arc::clone(&self.inner).run_events(events_rx, forward_tx));
        }
        info!(account_id = %self.inner.config.account_id, "starting whatsapp web session");
        self.inner.connect_and_login().await
    }

    fn state(&self) -> SessionState {
        self.inner.state.current()
    }

    fn observe(&self) -> StateObserver {
        self.inner.state.observer()
    }

    async fn send_message(&self, recipient_id: &str, text: &str) -> SessionResult<()> {
        let result = self.inner.send_text(recipient_id, text).await;
        #[cfg(feature = "metrics")]
        match &result {
            Ok(()) => counter!(wa_metrics::MESSAGES_SENT_TOTAL).increment(1),
            Err(e) => counter!(wa_metrics::SEND_ERRORS_TOTAL, labels::ERROR_TYPE => e.kind())
                .increment(1),
        }
        result
    }

    async fn shutdown(&self) -> SessionResult<()> {
        self.inner.shutting_down.store(true, Ordering::Release);
        if let Some(handle) = self.inner.sidecar.write().await.take() {
            handle.close();
        }
        self.inner.fail_pending("session shut down");
        if let Some(mut process) = self.inner.process.lock().await.take() {
            process.stop().await.map_err(|e| {
                SessionError::external(
                    "failed to stop whatsapp sidecar",
                    Error::process(format!("{e:#}")),
                )
            })?;
        }
        info!(account_id = %self.inner.config.account_id, "whatsapp web session stopped");
        Ok(())
    }
}

impl Inner {
    fn move_to(&self, target: SessionState) {
        for step in transition_path(self.state.current(), target) {
            let now = self.state.transition(step);
            if now != step {
                break;
            }
            #[cfg(feature = "metrics")]
            counter!(wa_metrics::STATE_CHANGES_TOTAL, labels::STATE => step.as_str()).increment(1);
        }
    }

    async fn connect_and_login(&self) -> SessionResult<()> {
        self.move_to(SessionState::Authenticating);
        match self.try_connect_and_login().await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(
                    account_id = %self.config.account_id,
                    error = %e,
                    "failed to reach whatsapp sidecar"
                );
                self.move_to(SessionState::Disconnected);
                Err(SessionError::external("whatsapp sidecar unavailable", e))
            },
        }
    }

    async fn try_connect_and_login(&self) -> crate::Result<()> {
        if self.config.auto_start_sidecar {
            self.ensure_process().await?;
        }
        let handle = connect_with_retry(
            self.config.sidecar_port,
            self.events_tx.clone(),
            self.config.connect_attempts,
        )
        .await?;
        handle
            .send(GatewayMessage::Login {
                account_id: self.config.account_id.clone(),
                auth_dir: self.config.auth_dir.clone(),
            })
            .await?;
        *self.sidecar.write().await = Some(handle);
        Ok(())
    }

    async fn ensure_process(&self) -> crate::Result<()> {
        let mut process = self.process.lock().await;
        if let Some(running) = process.as_mut() {
            if running.is_running() {
                return Ok(());
            }
            warn!("whatsapp sidecar process died, restarting");
        }
        let sidecar_dir = find_sidecar_dir(self.config.sidecar_dir.as_deref())
            .map_err(|e| Error::process(format!("{e:#}")))?;
        let started = start_sidecar(&SidecarConfig {
            sidecar_dir,
            port: self.config.sidecar_port,
            auth_dir: self.config.auth_dir.clone(),
        })
        .await
        .map_err(|e| Error::process(format!("{e:#}")))?;
        *process = Some(started);
        Ok(())
    }

    async fn send_text(&self, recipient_id: &str, text: &str) -> SessionResult<()> {
        let state = self.state.current();
        if !state.is_ready() {
            return Err(SessionError::NotReady { state });
        }
        let Some(handle) = self.sidecar.read().await.clone() else {
            return Err(SessionError::delivery(recipient_id, "sidecar not connected"));
        };

        let request_id = uuid::Uuid::new_v4().to_string();
        let (ack_tx, ack_rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(request_id.clone(), ack_tx);

        debug!(
            to = recipient_id,
            request_id,
            preview = %preview(text, LOG_PREVIEW_CHARS),
            "sending whatsapp message"
        );
        let frame = GatewayMessage::SendText {
            request_id: request_id.clone(),
            account_id: self.config.account_id.clone(),
            to: recipient_id.to_string(),
            text: text.to_string(),
        };
        if let Err(e) = handle.send(frame).await {
            self.pending
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&request_id);
            return Err(SessionError::delivery(recipient_id, e));
        }

        match ack_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(SessionError::delivery(recipient_id, reason)),
            Err(_) => Err(SessionError::delivery(
                recipient_id,
                "sidecar dropped the request before acknowledging",
            )),
        }
    }

    fn resolve_pending(&self, request_id: &str, ack: Ack) {
        let waiter = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(request_id);
        match waiter {
            Some(tx) => {
                let _ = tx.send(ack);
            },
            None => debug!(request_id, "send result for unknown request"),
        }
    }

    fn fail_pending(&self, reason: &str) {
        let pending: Vec<_> = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .collect();
        for (_, tx) in pending {
            let _ = tx.send(Err(reason.to_string()));
        }
    }

    async fn run_events(
        self: Arc<Self>,
        mut events: EventReceiver,
        forward: mpsc::UnboundedSender<InboundMessage>,
    ) {
        while let Some(event) = events.recv().await {
            match event {
                SidecarEvent::Message(msg) => self.handle_message(msg, &forward),
                SidecarEvent::ConnectionLost => self.handle_connection_lost().await,
            }
        }
        debug!("whatsapp event loop ended");
    }

    fn handle_message(&self, msg: SidecarMessage, forward: &mpsc::UnboundedSender<InboundMessage>) {
        let account_id = self.config.account_id.as_str();
        if let Some(other) = msg.account_id()
            && other != account_id
        {
            trace!(account_id = other, "ignoring frame for another account");
            return;
        }

        match &msg {
            SidecarMessage::Qr { qr, .. } => {
                info!(account_id, "scan the QR code below with WhatsApp to log in");
                match render_qr(qr) {
                    Ok(art) => println!("{art}"),
                    Err(e) => warn!(account_id, error = %e, "failed to render login QR code"),
                }
            },
            SidecarMessage::Authenticated { .. } => info!(account_id, "whatsapp web authenticated"),
            SidecarMessage::AuthFailure { reason, .. } => {
                error!(account_id, reason, "whatsapp web authentication failed");
            },
            SidecarMessage::Connected { phone_number, .. } => {
                info!(account_id, ?phone_number, "whatsapp web session ready");
            },
            SidecarMessage::Reconnecting { .. } => info!(account_id, "whatsapp web reconnecting"),
            SidecarMessage::Disconnected { reason, .. } => {
                warn!(account_id, reason, "whatsapp web disconnected");
            },
            SidecarMessage::LoggedOut { .. } => warn!(account_id, "whatsapp web logged out"),
            SidecarMessage::InboundMessage { .. } => {
                if let Some(inbound) = normalize_inbound(&msg) {
                    #[cfg(feature = "metrics")]
                    counter!(wa_metrics::MESSAGES_RECEIVED_TOTAL).increment(1);
                    trace!(
                        account_id,
                        sender_id = %inbound.sender_id,
                        is_group = inbound.is_group_chat,
                        "received whatsapp message"
                    );
                    if forward.send(inbound).is_err() {
                        warn!(account_id, "inbound forwarder stopped, dropping message");
                    }
                }
            },
            SidecarMessage::SendResult {
                request_id,
                success,
                error,
                ..
            } => {
                let ack = if *success {
                    Ok(())
                } else {
                    Err(error.clone().unwrap_or_else(|| "send failed".into()))
                };
                self.resolve_pending(request_id, ack);
            },
            SidecarMessage::StatusResponse { connected, .. } => {
                debug!(account_id, connected, "whatsapp status");
            },
            SidecarMessage::Error { error, .. } => warn!(account_id, error, "sidecar error"),
            SidecarMessage::Unknown => trace!("ignoring unknown sidecar frame"),
        }

        self.move_to(next_state(self.state.current(), &msg));
    }

    async fn handle_connection_lost(self: &Arc<Self>) {
        {
            let mut sidecar = self.sidecar.write().await;
            if sidecar.as_ref().is_some_and(|h| !h.is_connected()) {
                *sidecar = None;
            }
        }
        self.fail_pending("sidecar connection lost");

        if self.shutting_down.load(Ordering::Acquire) {
            return;
        }
        warn!(account_id = %self.config.account_id, "lost connection to whatsapp sidecar");
        self.move_to(SessionState::Disconnected);

        if self.reconnecting.swap(true, Ordering::AcqRel) {
            debug!("reconnect already in progress");
            return;
        }
        tokio::spawn(Arc::clone(self).reconnect_loop());
    }

    async fn reconnect_loop(self: Arc<Self>) {
        loop {
            tokio::time::sleep(RECONNECT_DELAY).await;
            if self.shutting_down.load(Ordering::Acquire) {
                break;
            }
            if self.connect_and_login().await.is_err() {
                continue;
            }
            self.reconnecting.store(false, Ordering::Release);
            // A loss reported before the flag was cleared was skipped.
            let connected = self
                .sidecar
                .read()
                .await
                .as_ref()
                .is_some_and(SidecarHandle::is_connected);
            if connected || self.reconnecting.swap(true, Ordering::AcqRel) {
                return;
            }
        }
        self.reconnecting.store(false, Ordering::Release);
    }
}

/// Keeps inbound order while never blocking the event loop on a slow
/// consumer.
async fn forward_inbound(
    inbound: InboundSender,
    mut queue: mpsc::UnboundedReceiver<InboundMessage>,
) {
    while let Some(msg) = queue.recv().await {
        if inbound.send(msg).await.is_err() {
            warn!("inbound consumer is gone, dropping whatsapp messages");
            return;
        }
    }
}

/// Turn a sidecar inbound frame into an [`InboundMessage`]. Messages this
/// account sent itself are dropped. Replies go to the chat, so the chat id
/// is the sender id.
fn normalize_inbound(msg: &SidecarMessage) -> Option<InboundMessage> {
    let SidecarMessage::InboundMessage {
        chat_jid,
        body,
        is_group,
        group_name,
        from_me,
        timestamp,
        ..
    } = msg
    else {
        return None;
    };
    if *from_me {
        trace!(chat_jid, "skipping own message");
        return None;
    }
    let received_at = timestamp
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .unwrap_or_else(Utc::now);
    let message =
        InboundMessage::direct(chat_jid.clone(), body.clone()).with_received_at(received_at);
    Some(if *is_group {
        message.in_group(group_name.clone())
    } else {
        message
    })
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().nth(max_chars).is_some() {
        out.push('…');
    }
    out
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        futures::{SinkExt, StreamExt},
        tokio::net::TcpListener,
        tokio_tungstenite::{WebSocketStream, accept_async, tungstenite::Message},
    };

    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    struct MockSidecar {
        ws: WebSocketStream<tokio::net::TcpStream>,
    }

    impl MockSidecar {
        async fn recv(&mut self) -> GatewayMessage {
            let frame = tokio::time::timeout(WAIT, self.ws.next())
                .await
                .expect("timed out waiting for a frame")
                .unwrap()
                .unwrap();
            serde_json::from_str(frame.to_text().unwrap()).unwrap()
        }

        async fn nothing_received(&mut self) -> bool {
            tokio::time::timeout(Duration::from_millis(150), self.ws.next())
                .await
                .is_err()
        }

        async fn emit(&mut self, msg: SidecarMessage) {
            let text = serde_json::to_string(&msg).unwrap();
            self.ws.send(Message::text(text)).await.unwrap();
        }
    }

    fn connected() -> SidecarMessage {
        SidecarMessage::Connected {
            account_id: "default".into(),
            phone_number: Some("15550001111".into()),
        }
    }

    fn inbound_frame(chat_jid: &str, body: &str) -> SidecarMessage {
        SidecarMessage::InboundMessage {
            account_id: "default".into(),
            message_id: "m1".into(),
            chat_jid: chat_jid.into(),
            sender_jid: chat_jid.into(),
            sender_name: None,
            is_group: false,
            group_name: None,
            body: body.into(),
            from_me: false,
            timestamp: Some(1_700_000_000),
        }
    }

    async fn start() -> (WhatsAppSession, InboundReceiver, MockSidecar) {
        let (session, inbound, mock, _listener) = start_keeping_listener().await;
        (session, inbound, mock)
    }

    async fn start_keeping_listener() -> (WhatsAppSession, InboundReceiver, MockSidecar, TcpListener)
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (session, inbound) = WhatsAppSession::new(SessionConfig {
            sidecar_port: port,
            auth_dir: PathBuf::from("/tmp/wagpt-test-auth"),
            auto_start_sidecar: false,
            connect_attempts: 3,
            ..SessionConfig::default()
        });

        let accept = tokio::spawn(async move {
            let mock = accept_sidecar(&listener).await;
            (mock, listener)
        });
        session.initialize().await.unwrap();
        let (mut mock, listener) = accept.await.unwrap();

        assert_eq!(mock.recv().await, login());
        assert_eq!(session.state(), SessionState::Authenticating);
        (session, inbound, mock, listener)
    }

    async fn accept_sidecar(listener: &TcpListener) -> MockSidecar {
        let (tcp, _) = tokio::time::timeout(WAIT, listener.accept())
            .await
            .expect("session never connected")
            .unwrap();
        MockSidecar {
            ws: accept_async(tcp).await.unwrap(),
        }
    }

    fn login() -> GatewayMessage {
        GatewayMessage::Login {
            account_id: "default".into(),
            auth_dir: PathBuf::from("/tmp/wagpt-test-auth"),
        }
    }

    async fn wait_for(session: &WhatsAppSession, target: SessionState) {
        let mut observer = session.observe();
        tokio::time::timeout(WAIT, async {
            while observer.current() != target {
                observer.changed().await.unwrap();
            }
        })
        .await
        .unwrap_or_else(|_| panic!("session never reached {target}"));
    }

    async fn ready() -> (WhatsAppSession, InboundReceiver, MockSidecar) {
        let (session, inbound, mut mock) = start().await;
        mock.emit(connected()).await;
        wait_for(&session, SessionState::Ready).await;
        (session, inbound, mock)
    }

    #[tokio::test]
    async fn send_before_initialize_is_not_ready() {
        let (session, _inbound) = WhatsAppSession::new(SessionConfig::default());
        let err = session.send_message("123@c.us", "hi").await.unwrap_err();
        assert!(matches!(err, SessionError::NotReady {
            state: SessionState::Uninitialized
        }));
    }

    #[tokio::test]
    async fn send_while_authenticating_writes_nothing() {
        let (session, _inbound, mut mock) = start().await;
        let err = session.send_message("123@c.us", "hi").await.unwrap_err();
        assert!(matches!(err, SessionError::NotReady {
            state: SessionState::Authenticating
        }));
        assert!(mock.nothing_received().await);
    }

    #[tokio::test]
    async fn qr_then_connected_reaches_ready() {
        let (session, _inbound, mut mock) = start().await;
        mock.emit(SidecarMessage::Qr {
            account_id: "default".into(),
            qr: "2@login-token".into(),
        })
        .await;
        mock.emit(SidecarMessage::Authenticated {
            account_id: "default".into(),
        })
        .await;
        mock.emit(connected()).await;
        wait_for(&session, SessionState::Ready).await;
    }

    #[tokio::test]
    async fn acknowledged_send_succeeds() {
        let (session, _inbound, mut mock) = ready().await;

        let sender = session.clone();
        let send = tokio::spawn(async move { sender.send_message("123@c.us", "4").await });

        let GatewayMessage::SendText {
            request_id, to, text, ..
        } = mock.recv().await
        else {
            panic!("expected send_text");
        };
        assert_eq!((to.as_str(), text.as_str()), ("123@c.us", "4"));

        mock.emit(SidecarMessage::SendResult {
            request_id,
            success: true,
            message_id: Some("wamid-1".into()),
            error: None,
        })
        .await;
        send.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn negative_ack_is_a_delivery_error() {
        let (session, _inbound, mut mock) = ready().await;

        let sender = session.clone();
        let send = tokio::spawn(async move { sender.send_message("123@c.us", "hi").await });
        let GatewayMessage::SendText { request_id, .. } = mock.recv().await else {
            panic!("expected send_text");
        };
        mock.emit(SidecarMessage::SendResult {
            request_id,
            success: false,
            message_id: None,
            error: Some("not on whatsapp".into()),
        })
        .await;

        let err = send.await.unwrap().unwrap_err();
        assert!(
            matches!(&err, SessionError::Delivery { recipient, reason }
                if recipient == "123@c.us" && reason == "not on whatsapp")
        );
    }

    #[tokio::test]
    async fn dropped_connection_fails_pending_send() {
        let (session, _inbound, mut mock) = ready().await;

        let sender = session.clone();
        let send = tokio::spawn(async move { sender.send_message("123@c.us", "hi").await });
        assert!(matches!(mock.recv().await, GatewayMessage::SendText { .. }));
        mock.ws.close(None).await.unwrap();

        let err = send.await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::Delivery { .. }));
        wait_for(&session, SessionState::Disconnected).await;
    }

    #[tokio::test]
    async fn reconnects_and_logs_in_again_after_socket_loss() {
        let (session, _inbound, mut mock, listener) = start_keeping_listener().await;
        mock.emit(connected()).await;
        wait_for(&session, SessionState::Ready).await;

        mock.ws.close(None).await.unwrap();
        drop(mock);
        wait_for(&session, SessionState::Disconnected).await;

        let mut mock = accept_sidecar(&listener).await;
        assert_eq!(mock.recv().await, login());
        assert_eq!(session.state(), SessionState::Authenticating);

        mock.emit(connected()).await;
        wait_for(&session, SessionState::Ready).await;
    }

    #[tokio::test]
    async fn repeated_loss_runs_a_single_reconnect() {
        let (session, _inbound, mut mock, listener) = start_keeping_listener().await;
        mock.emit(connected()).await;
        wait_for(&session, SessionState::Ready).await;

        mock.ws.close(None).await.unwrap();
        drop(mock);
        wait_for(&session, SessionState::Disconnected).await;
        // A second loss while the first reconnect is still waiting.
        session.inner.handle_connection_lost().await;

        let mut mock = accept_sidecar(&listener).await;
        assert_eq!(mock.recv().await, login());
        mock.emit(connected()).await;
        wait_for(&session, SessionState::Ready).await;

        assert!(
            tokio::time::timeout(RECONNECT_DELAY * 2, listener.accept())
                .await
                .is_err(),
            "a second reconnect loop dialed the sidecar"
        );
        assert!(!session.inner.reconnecting.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn inbound_messages_are_normalized_in_order() {
        let (_session, mut inbound, mut mock) = ready().await;

        let mut own = inbound_frame("123@c.us", "!chatgpt from my phone");
        if let SidecarMessage::InboundMessage { from_me, .. } = &mut own {
            *from_me = true;
        }
        mock.emit(own).await;
        mock.emit(inbound_frame("123@c.us", "!chatgpt hello")).await;
        let mut group = inbound_frame("999-111@g.us", "!ChatGPT tell a joke");
        if let SidecarMessage::InboundMessage {
            is_group,
            group_name,
            ..
        } = &mut group
        {
            *is_group = true;
            *group_name = Some("Family".into());
        }
        mock.emit(group).await;

        let first = tokio::time::timeout(WAIT, inbound.recv()).await.unwrap().unwrap();
        assert_eq!(first.sender_id, "123@c.us");
        assert_eq!(first.body, "!chatgpt hello");
        assert!(!first.is_group_chat);
        assert_eq!(first.received_at.timestamp(), 1_700_000_000);

        let second = tokio::time::timeout(WAIT, inbound.recv()).await.unwrap().unwrap();
        assert_eq!(second.sender_id, "999-111@g.us");
        assert!(second.is_group_chat);
        assert_eq!(second.group_name.as_deref(), Some("Family"));
    }

    #[tokio::test]
    async fn auth_failure_disconnects_without_retry() {
        let (session, _inbound, mut mock) = start().await;
        mock.emit(SidecarMessage::AuthFailure {
            account_id: "default".into(),
            reason: "credentials revoked".into(),
        })
        .await;
        wait_for(&session, SessionState::Disconnected).await;
        assert!(mock.nothing_received().await);
    }

    #[tokio::test]
    async fn frames_for_other_accounts_are_ignored() {
        let (session, _inbound, mut mock) = start().await;
        mock.emit(SidecarMessage::Connected {
            account_id: "someone-else".into(),
            phone_number: None,
        })
        .await;
        assert!(mock.nothing_received().await);
        assert_eq!(session.state(), SessionState::Authenticating);
    }

    #[test]
    fn preview_truncates_on_char_boundaries() {
        assert_eq!(preview("héllo", 2), "hé…");
        assert_eq!(preview("hi", 50), "hi");
    }
}
