//! Error types for the controller coordination layer.

use std::io;

use thiserror::Error;

/// Failure of the underlying socket transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport I/O failure: {0}")]
    Io(#[from] io::Error),
    #[error("ZeroMQ failure: {0}")]
    Zmq(zmq::Error),
    /// The socket's send or receive timeout elapsed.
    #[error("timed out waiting on the socket")]
    Timeout,
    #[error("socket closed")]
    Closed,
}

impl TransportError {
    /// Map a ZeroMQ error, folding `EAGAIN` (timeout elapsed) into `Timeout`
    /// and a terminated context or socket into `Closed`.
    pub fn from_zmq(err: zmq::Error) -> Self {
        match err {
            zmq::Error::EAGAIN => TransportError::Timeout,
            zmq::Error::ETERM | zmq::Error::ENOTSOCK => TransportError::Closed,
            other => TransportError::Zmq(other),
        }
    }
}

/// A message that arrived intact at the transport level but cannot be decoded.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed envelope: expected 3 frames, got {0}")]
    FrameCount(usize),
    #[error("malformed envelope: sequence frame is {0} bytes, expected 4")]
    SequenceWidth(usize),
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced by the controller proxy.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("cannot reach controller endpoint {endpoint}: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: TransportError,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("controller proxy is not connected")]
    NotConnected,
}

impl ControlError {
    /// Whether the error leaves the socket unusable.
    pub fn is_fatal(&self) -> bool {
        match self {
            ControlError::Transport(TransportError::Timeout) => false,
            ControlError::Transport(TransportError::Zmq(zmq::Error::EINTR)) => false,
            ControlError::Transport(_) | ControlError::Connection { .. } | ControlError::NotConnected => true,
            ControlError::Protocol(_) => false,
        }
    }
}
