use thiserror::Error;

/// Failure modes of the relay core.
///
/// These are structured values, not message strings: callers decide what to
/// do by matching on the variant, never by inspecting text.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Upstream rejected the connection or the configuration request.
    #[error("session negotiation failed: {0}")]
    Handshake(String),

    /// Upstream never acknowledged the session within the negotiation window.
    #[error("timed out waiting for session acknowledgment")]
    HandshakeTimeout,

    /// A send or receive failed on either connection mid-stream.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Normal (non-error) ways a relay direction can finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    /// The client closed its connection. Clean termination.
    ClientDisconnected,

    /// The upstream event stream ended. Clean termination.
    UpstreamEnded,

    /// The coordinator cancelled this relay because the other one finished.
    Cancelled,
}

/// Outcome of one relay direction: a normal end or a transport failure.
pub type RelayResult = Result<RelayEnd, RelayError>;
