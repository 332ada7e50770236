//! Per-client connection: a reader and a writer sharing one duplex channel.
//!
//! # Lifecycle
//!
//! 1. [`serve`] creates the [`Connection`] and its outbound queue
//! 2. The writer task drains the queue and sends liveness pings
//! 3. The reader runs in the caller's task, decoding envelopes and
//!    dispatching them to the play engine
//! 4. Whichever side fails first calls [`Connection::close`]; the other side
//!    sees the done signal and exits
//!
//! Every write to the channel, pings included, goes through one async mutex
//! with a bounded deadline, so the two tasks never interleave frames.

use axum::{body::Bytes, extract::ws::Message};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use spicy_dice::{ClientRequest, Envelope, GameError, GameResult, InboundEnvelope, MessageType, PlayEngine};
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::time::{Instant, interval_at, timeout, timeout_at};
use uuid::Uuid;

use crate::{config::ConnectionSettings, logging, metrics};

/// Why an envelope could not be queued for the writer
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("outbound channel full")]
    Full,

    #[error("outbound channel closed")]
    Closed,

    #[error("failed to encode envelope: {0}")]
    Encode(String),
}

impl EnqueueError {
    fn label(&self) -> &'static str {
        match self {
            EnqueueError::Full => "full",
            EnqueueError::Closed => "closed",
            EnqueueError::Encode(_) => "encode",
        }
    }
}

/// A failed or timed-out frame write
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("write failed: {0}")]
    Transport(String),

    #[error("write timed out after {0:?}")]
    Timeout(Duration),
}

/// One client's runtime state
///
/// Created when a channel is accepted; dropped once both the reader and the
/// writer have exited.
pub struct Connection<W> {
    id: Uuid,
    engine: Arc<PlayEngine>,
    settings: ConnectionSettings,
    sink: Mutex<W>,
    outbound: StdMutex<Option<mpsc::Sender<String>>>,
    done: watch::Sender<bool>,
    closed: AtomicBool,
}

impl<W> Connection<W>
where
    W: Sink<Message> + Unpin + Send + 'static,
    W::Error: Display,
{
    /// Create a connection around the write half of a channel
    ///
    /// Returns the receiving end of the outbound queue, which must be handed
    /// to [`write_pump`](Self::write_pump).
    pub fn new(
        engine: Arc<PlayEngine>,
        settings: ConnectionSettings,
        sink: W,
    ) -> (Arc<Self>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(settings.outbound_capacity.max(1));
        let (done, _) = watch::channel(false);
        let connection = Arc::new(Self {
            id: Uuid::new_v4(),
            engine,
            settings,
            sink: Mutex::new(sink),
            outbound: StdMutex::new(Some(tx)),
            done,
            closed: AtomicBool::new(false),
        });
        (connection, rx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Queue an envelope for the writer without waiting
    ///
    /// # Errors
    ///
    /// * `EnqueueError::Full` - The queue is at capacity; the envelope is dropped
    /// * `EnqueueError::Closed` - The connection is closing
    /// * `EnqueueError::Encode` - The envelope could not be serialized
    pub fn enqueue(&self, envelope: &Envelope) -> Result<(), EnqueueError> {
        let frame = envelope
            .to_json()
            .map_err(|e| EnqueueError::Encode(e.to_string()))?;

        let outbound = self.outbound.lock().map_err(|_| EnqueueError::Closed)?;
        let sender = outbound.as_ref().ok_or(EnqueueError::Closed)?;
        sender.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    /// Tear the connection down; only the first call does any work
    ///
    /// Signals both tasks to stop, closes the outbound queue and closes the
    /// channel. Returns `true` for the call that performed the teardown.
    pub async fn close(&self, reason: &'static str) -> bool {
        if self
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        self.done.send_replace(true);

        if let Ok(mut outbound) = self.outbound.lock() {
            outbound.take();
        }

        let mut sink = self.sink.lock().await;
        match timeout(self.settings.write_timeout, sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(connection_id = %self.id, "Close frame failed: {}", e),
            Err(_) => tracing::debug!(connection_id = %self.id, "Close frame timed out"),
        }
        drop(sink);

        metrics::websocket_connection_closed(reason);
        logging::log_connection_event(&self.id.to_string(), "closed", Some(reason));
        true
    }

    /// Write one frame under the write lock with the write deadline
    async fn write_frame(&self, frame: Message) -> Result<(), WriteError> {
        let mut sink = self.sink.lock().await;
        match timeout(self.settings.write_timeout, sink.send(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(WriteError::Transport(e.to_string())),
            Err(_) => Err(WriteError::Timeout(self.settings.write_timeout)),
        }
    }

    /// Writer task: outbound frames and liveness pings until the connection closes
    pub async fn write_pump(self: Arc<Self>, mut outbound: mpsc::Receiver<String>) {
        let closed = wait_closed(self.done.subscribe());
        tokio::pin!(closed);

        let period = self.settings.ping_interval;
        let mut ticker = interval_at(Instant::now() + period, period);

        let reason = loop {
            tokio::select! {
                biased;

                _ = &mut closed => break "closed",

                _ = ticker.tick() => {
                    if let Err(e) = self.write_frame(Message::Ping(Bytes::new())).await {
                        tracing::warn!(connection_id = %self.id, "Ping failed: {}", e);
                        break "ping_failed";
                    }
                }

                frame = outbound.recv() => match frame {
                    Some(text) => {
                        if let Err(e) = self.write_frame(Message::Text(text.into())).await {
                            tracing::warn!(connection_id = %self.id, "Write failed: {}", e);
                            break "write_failed";
                        }
                    }
                    None => break "outbound_closed",
                },
            }
        };

        self.close(reason).await;
    }

    /// Reader task: decode and dispatch inbound envelopes until the connection closes
    ///
    /// Every frame received, pongs included, slides the read deadline forward.
    /// Text and binary frames must hold a JSON envelope; anything else ends the
    /// read loop.
    pub async fn read_pump<S, E>(self: Arc<Self>, mut stream: S)
    where
        S: Stream<Item = Result<Message, E>> + Unpin + Send,
        E: Display,
    {
        let closed = wait_closed(self.done.subscribe());
        tokio::pin!(closed);

        let mut deadline = Instant::now() + self.settings.read_timeout;

        let reason = loop {
            let next = tokio::select! {
                biased;
                _ = &mut closed => break "closed",
                next = timeout_at(deadline, stream.next()) => next,
            };

            let message = match next {
                Err(_) => break "read_timeout",
                Ok(None) => break "eof",
                Ok(Some(Err(e))) => {
                    tracing::debug!(connection_id = %self.id, "Read failed: {}", e);
                    break "read_error";
                }
                Ok(Some(Ok(message))) => message,
            };
            deadline = Instant::now() + self.settings.read_timeout;

            let decoded = match message {
                Message::Text(text) => serde_json::from_str::<InboundEnvelope>(text.as_str()),
                Message::Binary(bytes) => serde_json::from_slice::<InboundEnvelope>(&bytes),
                Message::Pong(_) | Message::Ping(_) => continue,
                Message::Close(_) => break "client_close",
            };

            match decoded {
                Ok(envelope) => self.handle(envelope).await,
                Err(e) => {
                    tracing::warn!(connection_id = %self.id, "Undecodable frame: {}", e);
                    break "decode_error";
                }
            }
        };

        self.close(reason).await;
    }

    /// Dispatch one envelope and queue the reply
    async fn handle(&self, envelope: InboundEnvelope) {
        let connection_id = self.id.to_string();
        let kind = envelope
            .kind
            .parse::<MessageType>()
            .map(MessageType::as_str)
            .unwrap_or("unknown");
        metrics::websocket_message_received(kind);

        let (client_id, reply) = match envelope.into_request() {
            Ok(request) => (Some(request.client_id()), dispatch(&self.engine, request).await),
            Err(e) => (None, Err(e)),
        };

        let reply = match reply {
            Ok(reply) => {
                logging::log_request(&connection_id, kind, client_id, None);
                reply
            }
            Err(e) => {
                logging::log_request(&connection_id, kind, client_id, Some(&e.to_string()));
                metrics::request_failed(e.code());
                Envelope::error(&e)
            }
        };

        if let Err(e) = self.enqueue(&reply) {
            tracing::warn!(
                connection_id = %self.id,
                message_type = %reply.kind,
                "Dropped outbound envelope: {}",
                e
            );
            metrics::websocket_outbound_dropped(e.label());
        }
    }
}

/// Run a connection to completion
///
/// The writer is spawned; the reader runs in the current task. Returns once
/// both have exited.
pub async fn serve<W, S, E>(
    engine: Arc<PlayEngine>,
    settings: ConnectionSettings,
    sink: W,
    stream: S,
) where
    W: Sink<Message> + Unpin + Send + 'static,
    W::Error: Display,
    S: Stream<Item = Result<Message, E>> + Unpin + Send,
    E: Display,
{
    let (connection, outbound) = Connection::new(engine, settings, sink);
    let connection_id = connection.id().to_string();

    metrics::websocket_connection_opened();
    logging::log_connection_event(&connection_id, "opened", None);

    let writer = tokio::spawn(connection.clone().write_pump(outbound));
    connection.read_pump(stream).await;

    if let Err(e) = writer.await {
        tracing::error!(connection_id = %connection_id, "Writer task failed: {}", e);
    }
}

/// Route a decoded request to the play engine
pub async fn dispatch(engine: &PlayEngine, request: ClientRequest) -> GameResult<Envelope> {
    let kind = request.message_type();
    match request {
        ClientRequest::Wallet(request) => {
            let wallet = engine.get_balance(request.client_id).await?;
            encode(kind, &wallet)
        }
        ClientRequest::Play(request) => {
            let outcome = engine.resolve_bet(request).await?;
            metrics::bet_resolved(outcome.won);
            encode(kind, &outcome)
        }
        ClientRequest::EndPlay(request) => {
            let ended = engine.end_session(request.client_id).await?;
            encode(kind, &ended)
        }
    }
}

fn encode<T: serde::Serialize>(kind: MessageType, payload: &T) -> GameResult<Envelope> {
    Envelope::new(kind, payload).map_err(|e| GameError::Internal(format!("encode {kind}: {e}")))
}

async fn wait_closed(mut done: watch::Receiver<bool>) {
    // An error means the sender is gone, which only happens on drop
    let _ = done.wait_for(|closed| *closed).await;
}
