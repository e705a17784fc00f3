//! Gateway connection handler
//!
//! Each connection runs a read loop for requests and one writer task that
//! owns the socket's write half. Every subscription gets a forwarder task
//! that moves events into the connection's bounded outbound queue. A client
//! that stops reading fills that queue, which stalls its forwarders, which
//! lets the hub drop events for that client alone.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::hub::BroadcastHub;
use crate::server::config::ServerConfig;
use crate::server::protocol::{ProtocolError, Reply, Request};
use crate::subscriber::{Subscription, SubscriptionHandle};

/// A subscription owned by this connection
struct ActiveSubscription {
    handle: SubscriptionHandle,
    forwarder: JoinHandle<()>,
}

/// A single gateway client session
pub struct Connection<S> {
    id: u64,
    stream: S,
    config: ServerConfig,
    hub: Arc<BroadcastHub>,
    subscriptions: HashMap<String, ActiveSubscription>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Create a connection over any byte stream
    pub fn new(id: u64, stream: S, config: ServerConfig, hub: Arc<BroadcastHub>) -> Self {
        Self {
            id,
            stream,
            config,
            hub,
            subscriptions: HashMap::new(),
        }
    }

    /// Serve requests until the client quits or disconnects
    ///
    /// All of the connection's subscriptions are removed before returning.
    pub async fn run(self) -> Result<()> {
        let Connection {
            id,
            stream,
            config,
            hub,
            subscriptions,
        } = self;

        let (read_half, write_half) = tokio::io::split(stream);
        let (out_tx, out_rx) = mpsc::channel(config.outbound_queue);
        let writer = tokio::spawn(write_loop(write_half, out_rx));

        let mut session = Session {
            id,
            config,
            hub,
            subscriptions,
            out_tx,
        };

        let mut reader = BufReader::new(read_half);
        let result = session.read_loop(&mut reader).await;

        session.close().await;
        drop(session);

        match writer.await {
            Ok(Err(e)) => tracing::debug!(connection = id, error = %e, "Write failed"),
            Err(e) => tracing::debug!(connection = id, error = %e, "Writer task failed"),
            Ok(Ok(())) => {}
        }

        result
    }
}

/// Request-side state once the stream has been split
struct Session {
    id: u64,
    config: ServerConfig,
    hub: Arc<BroadcastHub>,
    subscriptions: HashMap<String, ActiveSubscription>,
    out_tx: mpsc::Sender<Reply>,
}

impl Session {
    async fn read_loop<R>(&mut self, reader: &mut R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let limit = self.config.max_line_length;

        loop {
            let line = if self.config.idle_timeout.is_zero() {
                read_line(reader, limit).await?
            } else {
                match tokio::time::timeout(self.config.idle_timeout, read_line(reader, limit)).await {
                    Ok(line) => line?,
                    Err(_) => {
                        tracing::debug!(connection = self.id, "Idle timeout");
                        return Ok(());
                    }
                }
            };

            let Some(line) = line else {
                return Ok(());
            };

            let reply = match line {
                InboundLine::TooLong { unterminated } => {
                    tracing::debug!(connection = self.id, limit, "Request line too long");
                    let reply = Reply::Err(ProtocolError::LineTooLong(limit).to_string());
                    if self.out_tx.send(reply).await.is_err() {
                        return Ok(());
                    }
                    if unterminated {
                        skip_line(reader).await?;
                    }
                    None
                }
                InboundLine::NotUtf8 => Some(Reply::Err(ProtocolError::InvalidUtf8.to_string())),
                InboundLine::Text(line) => match Request::parse(&line) {
                    Ok(Request::Quit) => {
                        let _ = self.out_tx.send(Reply::Bye).await;
                        return Ok(());
                    }
                    Ok(request) => self.handle_request(request).await,
                    Err(e) => Some(Reply::Err(e.to_string())),
                },
            };

            if let Some(reply) = reply {
                if self.out_tx.send(reply).await.is_err() {
                    // Writer is gone, nothing more can reach the client
                    return Ok(());
                }
            }
        }
    }

    /// Handle one request; `None` means the reply was already queued
    async fn handle_request(&mut self, request: Request) -> Option<Reply> {
        match request {
            Request::Publish { topic, payload } => {
                match self.hub.publish(&topic, payload).await {
                    Ok(seq) => Some(Reply::Ok(Some(seq.to_string()))),
                    Err(e) => Some(Reply::Err(e.to_string())),
                }
            }
            Request::Subscribe { topic } => self.subscribe(topic).await,
            Request::Unsubscribe { topic } => {
                if let Some(active) = self.subscriptions.remove(&topic) {
                    self.hub.unsubscribe(&active.handle).await;
                    tracing::debug!(connection = self.id, topic = %topic, "Unsubscribed");
                }
                Some(Reply::Ok(None))
            }
            Request::Ping => Some(Reply::Pong),
            Request::Quit => Some(Reply::Bye),
        }
    }

    async fn subscribe(&mut self, topic: String) -> Option<Reply> {
        if let Some(active) = self.subscriptions.get(&topic) {
            if !active.forwarder.is_finished() {
                return Some(Reply::Err(format!("already subscribed to {}", topic)));
            }
            // Topic was removed underneath us; allow a fresh subscription
            self.subscriptions.remove(&topic);
        }

        if self.config.max_subscriptions > 0
            && self.subscriptions.len() >= self.config.max_subscriptions
        {
            return Some(Reply::Err("subscription limit reached".into()));
        }

        let subscription = match self.hub.subscribe(&topic).await {
            Ok(subscription) => subscription,
            Err(e) => return Some(Reply::Err(e.to_string())),
        };
        let handle = subscription.handle().clone();

        // OK must precede the first EVENT line
        if self.out_tx.send(Reply::Ok(None)).await.is_err() {
            self.hub.unsubscribe(&handle).await;
            return None;
        }

        tracing::debug!(
            connection = self.id,
            topic = %topic,
            subscriber = %handle.id(),
            replay = subscription.pending_replay(),
            "Subscribed"
        );

        let forwarder = tokio::spawn(forward(subscription, self.out_tx.clone()));
        self.subscriptions
            .insert(topic, ActiveSubscription { handle, forwarder });

        None
    }

    /// Drop every subscription this connection holds
    async fn close(&mut self) {
        for (_, active) in self.subscriptions.drain() {
            self.hub.unsubscribe(&active.handle).await;
        }
    }
}

/// One request line as read off the wire
#[derive(Debug, PartialEq, Eq)]
enum InboundLine {
    Text(String),
    /// `unterminated` means the rest of the line is still unread
    TooLong { unterminated: bool },
    NotUtf8,
}

/// Read one newline-terminated line of at most `limit` bytes
///
/// Never buffers more than `limit + 2` bytes of a line. Returns `None` at
/// end of stream.
async fn read_line<R>(reader: &mut R, limit: usize) -> std::io::Result<Option<InboundLine>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    // Room for the line, a '\r' and the '\n'
    let cap = (limit as u64).saturating_add(2);
    let n = (&mut *reader).take(cap).read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(None);
    }

    let terminated = buf.last() == Some(&b'\n');
    if terminated {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }

    if buf.len() > limit {
        return Ok(Some(InboundLine::TooLong {
            unterminated: !terminated,
        }));
    }

    Ok(Some(match String::from_utf8(buf) {
        Ok(line) => InboundLine::Text(line),
        Err(_) => InboundLine::NotUtf8,
    }))
}

/// Discard input up to and including the next newline
async fn skip_line<R>(reader: &mut R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(());
        }

        match available.iter().position(|&b| b == b'\n') {
            Some(i) => {
                reader.consume(i + 1);
                return Ok(());
            }
            None => {
                let len = available.len();
                reader.consume(len);
            }
        }
    }
}

/// Copy events from a subscription into the outbound queue
async fn forward(mut subscription: Subscription, out_tx: mpsc::Sender<Reply>) {
    let topic = subscription.topic().to_string();

    while let Some(event) = subscription.recv().await {
        if out_tx.send(Reply::event(&topic, &event)).await.is_err() {
            break;
        }
    }
}

/// Write queued replies until every sender is gone
async fn write_loop<W>(mut writer: W, mut rx: mpsc::Receiver<Reply>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(reply) = rx.recv().await {
        writer.write_all(reply.encode().as_bytes()).await?;
        writer.flush().await?;
    }
    writer.shutdown().await
}
