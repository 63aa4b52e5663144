//! STOMP-over-WebSocket connection

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::stomp::Frame;
use super::PushError;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

pub struct StompSocket {
    stream: WsStream,
}

impl StompSocket {
    /// Open the WebSocket. No STOMP traffic is sent yet.
    pub async fn connect(url: &str) -> Result<Self, PushError> {
        tracing::info!("Connecting WebSocket to {}", url);

        let (stream, response) = connect_async(url).await?;

        tracing::info!("WebSocket connected (status={})", response.status());

        Ok(Self { stream })
    }

    pub async fn send_frame(&mut self, frame: &Frame) -> Result<(), PushError> {
        tracing::debug!("STOMP send: {}", frame.command);
        self.stream.send(Message::Text(frame.encode())).await?;
        Ok(())
    }

    /// Send an EOL heart-beat.
    pub async fn send_heartbeat(&mut self) -> Result<(), PushError> {
        self.stream.send(Message::Text("\n".to_string())).await?;
        Ok(())
    }

    /// Receive the next STOMP frame, answering pings and skipping heart-beats.
    ///
    /// Returns `Ok(None)` when the server closes the connection.
    pub async fn recv_frame(&mut self) -> Result<Option<Frame>, PushError> {
        loop {
            let text = match self.stream.next().await {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                    Ok(text) => text,
                    Err(_) => {
                        tracing::debug!("Ignoring non-UTF-8 binary frame");
                        continue;
                    }
                },
                Some(Ok(Message::Ping(data))) => {
                    self.stream.send(Message::Pong(data)).await?;
                    continue;
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!("WebSocket closed: {:?}", frame);
                    return Ok(None);
                }
                Some(Ok(other)) => {
                    tracing::debug!("WS frame (ignored): {:?}", other);
                    continue;
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            };

            match Frame::decode(&text)? {
                Some(frame) => {
                    tracing::debug!("STOMP recv: {}", frame.command);
                    return Ok(Some(frame));
                }
                None => tracing::trace!("Heart-beat from server"),
            }
        }
    }

    /// Close the WebSocket. Errors are logged, not returned.
    pub async fn close(mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!("WebSocket close failed: {}", e);
        }
    }
}
