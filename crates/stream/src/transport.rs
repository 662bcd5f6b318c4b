use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,

    #[error("transport write failed: {0}")]
    Write(String),
}

impl TransportError {
    pub fn write(msg: impl ToString) -> Self {
        Self::Write(msg.to_string())
    }
}

/// Write half of a live client connection.
///
/// Implementations do not need their own deadlines; the session bounds every
/// call with its configured write timeout.
#[async_trait]
pub trait LiveTransport: Send {
    /// Send one structured text message.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Send an empty transport-level ping.
    async fn send_ping(&mut self) -> Result<(), TransportError>;
}
