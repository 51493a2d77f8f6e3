//! WebSocket listener transport.
//!
//! The socket is split: the writer half goes to the pump, the reader half is
//! only watched for closure. Client frames carry no meaning.

use crate::errors::FeedError;
use crate::hub::{HubHandle, ListenerConnection, ListenerId};
use crate::ports::ListenerTransport;
use crate::pump::{write_pump, PumpConfig};
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

pub struct WebSocketTransport {
    sink: SplitSink<WebSocket, Message>,
}

impl WebSocketTransport {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink }
    }

    async fn write(&mut self, message: Message) -> Result<(), FeedError> {
        self.sink
            .send(message)
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))
    }
}

#[async_trait]
impl ListenerTransport for WebSocketTransport {
    async fn send_text(&mut self, payload: String) -> Result<(), FeedError> {
        self.write(Message::Text(payload)).await
    }

    async fn ping(&mut self) -> Result<(), FeedError> {
        self.write(Message::Ping(Vec::new())).await
    }

    async fn close(&mut self) -> Result<(), FeedError> {
        self.write(Message::Close(None)).await
    }
}

/// Serve one upgraded socket until either side goes away.
pub async fn serve_listener(socket: WebSocket, hub: HubHandle, buffer: usize, pump: PumpConfig) {
    let (sink, stream) = socket.split();
    let (listener, outbound) = ListenerConnection::new(buffer);
    let id = listener.id();
    if let Err(e) = hub.register(listener) {
        warn!(listener = %id, error = %e, "Listener rejected");
        return;
    }
    info!(listener = %id, buffer, "Listener connected");

    let mut writer = tokio::spawn(write_pump(
        id,
        WebSocketTransport::new(sink),
        outbound,
        hub.clone(),
        pump,
    ));

    tokio::select! {
        _ = read_until_closed(stream, id) => {
            hub.unregister(id);
            // The pump sees its buffer close and exits.
            let _ = writer.await;
        }
        exit = &mut writer => {
            // Evicted or write failure: nothing left to read for.
            debug!(listener = %id, exit = ?exit, "Writer stopped first");
            hub.unregister(id);
        }
    }
    info!(listener = %id, "Listener disconnected");
}

async fn read_until_closed(mut stream: SplitStream<WebSocket>, id: ListenerId) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(listener = %id, error = %e, "Listener read failed");
                break;
            }
        }
    }
}
