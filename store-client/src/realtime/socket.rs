// store-client/src/realtime/socket.rs
// WebSocket change feed against the hosted realtime service

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use shared::ChangeFilter;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::protocol::{EVENT_CLOSE, EVENT_ERROR, Frame, channel_topic};
use crate::service::{AuthService, ChangeFeed, ChangeStream};
use crate::{ClientConfig, ClientError, ClientResult};

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// How long the join reply may take
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);
const STREAM_BUFFER: usize = 64;

/// Change feed opening one socket per subscription
pub struct SocketChangeFeed {
    endpoint: String,
    heartbeat: Duration,
    auth: Arc<dyn AuthService>,
}

impl std::fmt::Debug for SocketChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketChangeFeed")
            .field("heartbeat", &self.heartbeat)
            .finish_non_exhaustive()
    }
}

impl SocketChangeFeed {
    pub fn new(config: &ClientConfig, auth: Arc<dyn AuthService>) -> ClientResult<Self> {
        Ok(Self {
            endpoint: config.realtime_endpoint()?,
            heartbeat: Duration::from_secs(config.heartbeat_interval.max(1)),
            auth,
        })
    }

    /// Connect and join the channel, waiting for the server to confirm
    async fn join(&self, filter: &ChangeFilter) -> ClientResult<WsStream> {
        let (mut ws, _response) = tokio_tungstenite::connect_async(self.endpoint.as_str())
            .await
            .map_err(|e| ClientError::Realtime(format!("connect failed: {e}")))?;

        let token = self.auth.session().map(|s| s.access_token);
        let join = Frame::join(filter, token.as_deref(), 1);
        send_frame(&mut ws, &join).await?;

        let reply = tokio::time::timeout(JOIN_TIMEOUT, async {
            while let Some(msg) = ws.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        let Ok(frame) = serde_json::from_str::<Frame>(&text) else {
                            continue;
                        };
                        if frame.is_reply_to(1) {
                            return frame.reply_status().map_err(ClientError::Realtime);
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => return Err(ClientError::Realtime(e.to_string())),
                }
            }
            Err(ClientError::Realtime("socket closed before join reply".into()))
        })
        .await
        .map_err(|_| ClientError::Realtime("join timed out".into()))?;

        reply?;
        Ok(ws)
    }
}

async fn send_frame<S>(sink: &mut S, frame: &Frame) -> ClientResult<()>
where
    S: futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let json = serde_json::to_string(frame)?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|e| ClientError::Realtime(e.to_string()))
}

#[async_trait]
impl ChangeFeed for SocketChangeFeed {
    async fn listen(&self, filter: ChangeFilter) -> ClientResult<ChangeStream> {
        let ws = self.join(&filter).await?;
        let topic = channel_topic(&filter);
        tracing::info!(topic = %topic, "Realtime channel joined");

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let heartbeat = self.heartbeat;

        tokio::spawn(async move {
            let (mut ws_sink, mut ws_stream) = ws.split();
            let mut reference: u64 = 1;
            let mut heartbeat_interval = tokio::time::interval(heartbeat);
            heartbeat_interval.tick().await; // skip immediate tick

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        reference += 1;
                        let _ = send_frame(&mut ws_sink, &Frame::leave(&topic, reference)).await;
                        let _ = ws_sink.close().await;
                        break;
                    }

                    _ = heartbeat_interval.tick() => {
                        reference += 1;
                        if let Err(e) = send_frame(&mut ws_sink, &Frame::heartbeat(reference)).await {
                            tracing::warn!(topic = %topic, "Heartbeat failed, closing feed: {e}");
                            break;
                        }
                    }

                    msg = ws_stream.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let frame = match serde_json::from_str::<Frame>(&text) {
                                    Ok(frame) => frame,
                                    Err(e) => {
                                        tracing::debug!(topic = %topic, "Ignoring unreadable frame: {e}");
                                        continue;
                                    }
                                };
                                if frame.topic == topic
                                    && (frame.event == EVENT_ERROR || frame.event == EVENT_CLOSE)
                                {
                                    tracing::warn!(topic = %topic, event = %frame.event, "Channel closed by server");
                                    break;
                                }
                                let Some(event) = frame.change_event() else {
                                    continue;
                                };
                                if filter.matches(&event) && tx.send(event).await.is_err() {
                                    break;
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                let _ = ws_sink.send(Message::Pong(data)).await;
                            }
                            Some(Ok(Message::Close(_))) => {
                                tracing::info!(topic = %topic, "WebSocket closed by server");
                                break;
                            }
                            Some(Err(e)) => {
                                tracing::warn!(topic = %topic, "WebSocket error: {e}");
                                break;
                            }
                            None => {
                                tracing::info!(topic = %topic, "WebSocket stream ended");
                                break;
                            }
                            _ => {} // Binary, Pong
                        }
                    }
                }
            }
            tracing::debug!(topic = %topic, "Realtime feed task finished");
        });

        Ok(ChangeStream::new(rx, cancel))
    }
}
