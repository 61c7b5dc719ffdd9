use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use duel_common::protocol::{encode_command, ClientCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Closed,
    Connecting,
    Open,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Opened,
    Frame(String),
    Closed,
}

struct Inner {
    /// Bumped on every open and close so a superseded connection task can
    /// no longer touch state or listeners.
    generation: u64,
    next_listener: u64,
    listeners: HashMap<u64, mpsc::UnboundedSender<ChannelEvent>>,
}

struct Shared {
    state: watch::Sender<ChannelState>,
    inner: Mutex<Inner>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, generation: u64, state: ChannelState) -> bool {
        let inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        self.state.send_replace(state);
        true
    }

    fn broadcast(&self, generation: u64, event: ChannelEvent) {
        let mut inner = self.lock();
        if inner.generation != generation {
            return;
        }
        inner.listeners.retain(|_, tx| tx.send(event.clone()).is_ok());
    }

    fn finish(&self, generation: u64) {
        if self.set_state(generation, ChannelState::Closed) {
            self.broadcast(generation, ChannelEvent::Closed);
        }
    }
}

/// Listener handle. Dropping it deregisters the listener.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<ChannelEvent>,
    shared: Weak<Shared>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.lock().listeners.remove(&self.id);
        }
    }
}

/// Owns the single WebSocket to the coordination service.
pub struct ChannelManager {
    url: String,
    shared: Arc<Shared>,
    outbound: Option<mpsc::UnboundedSender<String>>,
    cancel: Option<CancellationToken>,
}

impl ChannelManager {
    pub fn new(url: impl Into<String>) -> Self {
        let (state, _) = watch::channel(ChannelState::Closed);
        Self {
            url: url.into(),
            shared: Arc::new(Shared {
                state,
                inner: Mutex::new(Inner {
                    generation: 0,
                    next_listener: 0,
                    listeners: HashMap::new(),
                }),
            }),
            outbound: None,
            cancel: None,
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.shared.state.borrow()
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.shared.lock();
        let id = inner.next_listener;
        inner.next_listener += 1;
        inner.listeners.insert(id, tx);
        Subscription {
            id,
            rx,
            shared: Arc::downgrade(&self.shared),
        }
    }

    #[cfg(test)]
    fn listener_count(&self) -> usize {
        self.shared.lock().listeners.len()
    }

    /// Connect unless already open or connecting. Must be called inside a
    /// tokio runtime.
    pub fn open(&mut self) {
        match self.state() {
            ChannelState::Open | ChannelState::Connecting => {
                tracing::debug!(state = ?self.state(), "open ignored");
                return;
            }
            ChannelState::Closed => {}
        }

        let generation = {
            let mut inner = self.shared.lock();
            inner.generation += 1;
            self.shared.state.send_replace(ChannelState::Connecting);
            inner.generation
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        tracing::info!(url = %self.url, "opening channel");
        tokio::spawn(run_connection(
            self.url.clone(),
            rx,
            self.shared.clone(),
            generation,
            token.clone(),
        ));
        self.outbound = Some(tx);
        self.cancel = Some(token);
    }

    /// Queue a command for the writer. Returns false (and logs) when the
    /// channel is not open; the command is dropped, never retried.
    pub fn send(&self, command: &ClientCommand) -> bool {
        if self.state() != ChannelState::Open {
            tracing::warn!("channel not open; dropping `{}` command", command.action());
            return false;
        }
        let Some(tx) = &self.outbound else {
            tracing::warn!("channel has no writer; dropping `{}` command", command.action());
            return false;
        };
        match encode_command(command) {
            Ok(text) => {
                tracing::debug!(action = command.action(), "sending command");
                tx.send(text).is_ok()
            }
            Err(e) => {
                tracing::error!("Failed to encode `{}` command: {}", command.action(), e);
                false
            }
        }
    }

    /// Release the connection. Listeners stay registered and receive no
    /// `Closed` event for a local close.
    pub fn close(&mut self) {
        let Some(token) = self.cancel.take() else {
            tracing::debug!("close on a channel that is not open");
            return;
        };
        token.cancel();
        self.outbound = None;
        let mut inner = self.shared.lock();
        inner.generation += 1;
        self.shared.state.send_replace(ChannelState::Closed);
        tracing::info!("channel closed");
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
    }
}

async fn run_connection(
    url: String,
    mut outbound: mpsc::UnboundedReceiver<String>,
    shared: Arc<Shared>,
    generation: u64,
    token: CancellationToken,
) {
    let connected = tokio::select! {
        _ = token.cancelled() => return,
        result = tokio_tungstenite::connect_async(url.as_str()) => result,
    };
    let ws = match connected {
        Ok((ws, _)) => ws,
        Err(e) => {
            tracing::warn!(url = %url, "channel connect failed: {}", e);
            shared.finish(generation);
            return;
        }
    };

    if !shared.set_state(generation, ChannelState::Open) {
        return;
    }
    tracing::info!(url = %url, "channel open");
    shared.broadcast(generation, ChannelEvent::Opened);

    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            Some(text) = outbound.recv() => {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    tracing::warn!("channel write failed: {}", e);
                    break;
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => shared.broadcast(generation, ChannelEvent::Frame(text)),
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!("channel closed by peer");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!("channel read failed: {}", e);
                    break;
                }
            },
        }
    }

    shared.finish(generation);
}
