//! Stream transport.
//!
//! [`StreamConnector`] is the seam between the subscriber's state machine and
//! the actual socket. A connection is a stream of text payloads that ends
//! when the socket closes; a transport error is yielded once as an `Err`
//! before the end.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::error::StreamError;

/// Inbound payloads of one connection lifetime.
pub type FrameStream = BoxStream<'static, Result<String, StreamError>>;

#[async_trait]
pub trait StreamConnector: Send + Sync + 'static {
    /// Open one connection. Resolves once the connection is open.
    async fn connect(&self) -> Result<FrameStream, StreamError>;
}

/// WebSocket connector backed by tokio-tungstenite.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl StreamConnector for WsConnector {
    async fn connect(&self) -> Result<FrameStream, StreamError> {
        let (ws, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(connect_error)?;

        let frames = futures::stream::unfold(Some(ws), |state| async move {
            let mut ws = state?;
            loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => {
                        return Some((Ok(text.as_str().to_owned()), Some(ws)));
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        let text = String::from_utf8_lossy(&bytes).into_owned();
                        return Some((Ok(text), Some(ws)));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::debug!(?frame, "alert stream closed by server");
                        return None;
                    }
                    // Ping/Pong handled by tungstenite
                    Some(Ok(_)) => continue,
                    Some(Err(WsError::ConnectionClosed)) | None => return None,
                    Some(Err(e)) => {
                        // Yield the error once, then end the stream.
                        return Some((Err(StreamError::Transport(e.to_string())), None));
                    }
                }
            }
        });

        Ok(frames.boxed())
    }
}

fn connect_error(e: WsError) -> StreamError {
    match e {
        WsError::Http(response) => StreamError::Rejected {
            status: response.status().as_u16(),
        },
        other => StreamError::Connect(other.to_string()),
    }
}
