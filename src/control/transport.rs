//! ZeroMQ sockets between the solution and the controller.
//!
//! Both controller connections are multipart ZeroMQ sockets:
//! - the request socket is a DEALER, used for registration and outbound reports
//! - the subscribe socket is a SUB subscribed to every topic, which only receives
//!
//! The rest of the control module only sees `FrameSocket`.

use std::net::ToSocketAddrs;
use std::time::Duration;

use super::error::{ControlError, TransportError};

/// A connection able to exchange whole multipart messages.
pub trait FrameSocket: Send {
    /// Write all frames of one message.
    fn send_message(&mut self, frames: &[&[u8]]) -> Result<(), TransportError>;

    /// Block until one complete message is available.
    ///
    /// Returns `TransportError::Timeout` when the read timeout elapses first.
    fn recv_message(&mut self) -> Result<Vec<Vec<u8>>, ControlError>;

    /// Bound how long `recv_message` may block. `None` blocks forever.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), TransportError>;
}

/// `tcp://address:port`, once `address` is known to resolve.
///
/// ZeroMQ connects lazily, so an unknown host would otherwise only show up
/// as a silent reconnect loop.
pub fn endpoint(address: &str, port: u16) -> Result<String, ControlError> {
    let endpoint = format!("tcp://{}:{}", address, port);
    let source = match (address, port).to_socket_addrs().map(|mut addrs| addrs.next()) {
        Ok(Some(_)) => return Ok(endpoint),
        Ok(None) => std::io::Error::new(std::io::ErrorKind::NotFound, "address resolved to nothing"),
        Err(err) => err,
    };
    Err(ControlError::Connection {
        endpoint,
        source: TransportError::Io(source),
    })
}

/// Timeout in the form the ZeroMQ socket options take (-1 = forever).
fn timeout_millis(timeout: Option<Duration>) -> i32 {
    match timeout {
        Some(timeout) => i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX),
        None => -1,
    }
}

pub struct ZmqFrameSocket {
    socket: zmq::Socket,
    endpoint: String,
}

impl ZmqFrameSocket {
    /// DEALER for the request connection. A send gives up after `send_timeout`.
    pub fn dealer(
        context: &zmq::Context,
        address: &str,
        port: u16,
        send_timeout: Duration,
    ) -> Result<Self, ControlError> {
        let dealer = Self::open(context, zmq::DEALER, address, port)?;
        dealer
            .socket
            .set_sndtimeo(timeout_millis(Some(send_timeout)))
            .map_err(TransportError::from_zmq)?;
        Ok(dealer)
    }

    /// SUB receiving everything published under `topic` (empty = all).
    pub fn subscriber(context: &zmq::Context, address: &str, port: u16, topic: &[u8]) -> Result<Self, ControlError> {
        let subscriber = Self::open(context, zmq::SUB, address, port)?;
        subscriber.socket.set_subscribe(topic).map_err(TransportError::from_zmq)?;
        Ok(subscriber)
    }

    fn open(context: &zmq::Context, kind: zmq::SocketType, address: &str, port: u16) -> Result<Self, ControlError> {
        let endpoint = endpoint(address, port)?;
        let socket = context.socket(kind).map_err(TransportError::from_zmq)?;
        socket.set_linger(0).map_err(TransportError::from_zmq)?;
        if let Err(err) = socket.connect(&endpoint) {
            return Err(ControlError::Connection {
                endpoint,
                source: TransportError::from_zmq(err),
            });
        }
        log::debug!("Connecting to {}", endpoint);
        Ok(Self { socket, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl FrameSocket for ZmqFrameSocket {
    fn send_message(&mut self, frames: &[&[u8]]) -> Result<(), TransportError> {
        self.socket
            .send_multipart(frames.iter().copied(), 0)
            .map_err(TransportError::from_zmq)
    }

    fn recv_message(&mut self) -> Result<Vec<Vec<u8>>, ControlError> {
        Ok(self.socket.recv_multipart(0).map_err(TransportError::from_zmq)?)
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), TransportError> {
        self.socket
            .set_rcvtimeo(timeout_millis(timeout))
            .map_err(TransportError::from_zmq)
    }
}
