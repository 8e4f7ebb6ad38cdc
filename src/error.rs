use thiserror::Error;

/// Errors produced by the session coordinator.
///
/// These are protocol-level kinds, not transport status codes: mapping
/// [`SessionError::PeerRejected`] to a SIP response code is the
/// signalling layer's job.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not available: {0}")]
    NotAvailable(String),

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("peer rejected the request: {0}")]
    PeerRejected(String),

    /// Recoverable; the caller observes the session move to `ReinvitePending`.
    #[error("glare detected, retry scheduled")]
    Glare,

    #[error("fatal session error: {0}")]
    Fatal(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
