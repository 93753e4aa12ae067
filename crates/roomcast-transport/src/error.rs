use crate::CloseKind;

/// Errors that can occur on a framed channel.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer has closed the connection. The close status tells the
    /// session whether this was an expected shutdown.
    #[error("connection closed ({0})")]
    Closed(CloseKind),

    /// Sending a frame failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving a frame failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),
}

impl TransportError {
    /// Classifies this error by the close status it implies.
    ///
    /// Only [`TransportError::Closed`] can carry an expected status; raw
    /// I/O failures are always [`CloseKind::Abnormal`].
    pub fn close_kind(&self) -> CloseKind {
        match self {
            Self::Closed(kind) => *kind,
            Self::SendFailed(_) | Self::ReceiveFailed(_) => CloseKind::Abnormal,
        }
    }
}
