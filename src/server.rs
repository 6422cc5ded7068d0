//! WebSocket endpoint: one streaming client at a time.
//!
//! [`serve`] owns the listener and the receiving end of the hand-off channel.
//! While no client is connected, readings are received and discarded so the
//! frame loop keeps running. Each accepted client gets a
//! [`StreamingSession`] that lives until the client goes away or the frame
//! source finishes.

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::hand::FrameReading;
use crate::protocol;

/// A send that takes longer than this ends the session.
const SEND_TIMEOUT: Duration = Duration::from_secs(5);
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Accepted,
    Streaming,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The hand-off channel closed; no more readings will come
    SourceFinished,
    ClientClosed,
    TransmitFailed(String),
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceFinished => write!(f, "frame source finished"),
            Self::ClientClosed => write!(f, "client closed the connection"),
            Self::TransmitFailed(e) => write!(f, "transmit failed: {}", e),
        }
    }
}

/// One accepted client connection.
pub struct StreamingSession<S> {
    peer: SocketAddr,
    ws: WebSocketStream<S>,
    state: SessionState,
    sent: u64,
}

impl<S> StreamingSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(ws: WebSocketStream<S>, peer: SocketAddr) -> Self {
        Self {
            peer,
            ws,
            state: SessionState::Accepted,
            sent: 0,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Frames sent so far
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Send every reading from `frames`, in order, until the client leaves,
    /// a send fails, or the channel closes. The connection is closed on return.
    pub async fn stream(&mut self, frames: &mut mpsc::Receiver<FrameReading>) -> SessionEnd {
        self.state = SessionState::Streaming;

        let end = loop {
            tokio::select! {
                frame = frames.recv() => {
                    let Some(reading) = frame else {
                        break SessionEnd::SourceFinished;
                    };
                    let text = match protocol::encode_frame(&reading) {
                        Ok(text) => text,
                        Err(e) => {
                            log::warn!("[session] {}: frame skipped: {:#}", self.peer, e);
                            continue;
                        }
                    };
                    match tokio::time::timeout(SEND_TIMEOUT, self.ws.send(Message::text(text))).await {
                        Ok(Ok(())) => self.sent += 1,
                        Ok(Err(e)) => break SessionEnd::TransmitFailed(e.to_string()),
                        Err(_) => break SessionEnd::TransmitFailed("send timed out".to_string()),
                    }
                }
                incoming = self.ws.next() => match incoming {
                    Some(Ok(Message::Close(_))) | None => break SessionEnd::ClientClosed,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break SessionEnd::TransmitFailed(e.to_string()),
                }
            }
        };

        self.close(&end).await;
        end
    }

    async fn close(&mut self, end: &SessionEnd) {
        if self.state == SessionState::Closed {
            return;
        }
        let ws = &mut self.ws;
        let peer_closed = *end == SessionEnd::ClientClosed;
        let _ = tokio::time::timeout(CLOSE_TIMEOUT, async {
            if peer_closed {
                // Our reply to the client's close frame is queued, not sent
                let _ = ws.flush().await;
            } else {
                let _ = ws.close(None).await;
            }
            // Reading drives the close handshake until the stream ends
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;
        self.state = SessionState::Closed;
    }
}

/// Accept clients one at a time and stream readings to them. Returns once
/// the hand-off channel is closed.
pub async fn serve(listener: TcpListener, mut frames: mpsc::Receiver<FrameReading>) -> Result<()> {
    log::info!("[tcp] listening on ws://{}", listener.local_addr()?);
    let mut idle_dropped: u64 = 0;

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (tcp, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        log::warn!("[tcp] accept failed: {}", e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        continue;
                    }
                };
                let _ = tcp.set_nodelay(true);

                // Keep discarding readings while the client upgrades
                let handshake = tokio::time::timeout(HANDSHAKE_TIMEOUT, tokio_tungstenite::accept_async(tcp));
                tokio::pin!(handshake);
                let upgraded = loop {
                    tokio::select! {
                        result = &mut handshake => break result,
                        frame = frames.recv() => {
                            if frame.is_none() {
                                log::info!("[tcp] frame source finished");
                                return Ok(());
                            }
                            idle_dropped += 1;
                        }
                    }
                };

                let ws = match upgraded {
                    Ok(Ok(ws)) => ws,
                    Ok(Err(e)) => {
                        log::warn!("[tcp] handshake with {} failed: {}", peer, e);
                        continue;
                    }
                    Err(_) => {
                        log::warn!("[tcp] handshake with {} timed out", peer);
                        continue;
                    }
                };

                if idle_dropped > 0 {
                    log::debug!("[tcp] {} frames dropped while idle", idle_dropped);
                    idle_dropped = 0;
                }
                log::info!("[session] {} connected", peer);

                let mut session = StreamingSession::new(ws, peer);
                let end = session.stream(&mut frames).await;
                log::info!("[session] {} closed after {} frames: {}", session.peer(), session.sent(), end);
                if end == SessionEnd::SourceFinished {
                    return Ok(());
                }
            }
            frame = frames.recv() => {
                if frame.is_none() {
                    log::info!("[tcp] frame source finished");
                    return Ok(());
                }
                idle_dropped += 1;
            }
        }
    }
}
