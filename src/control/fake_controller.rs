//! In-process stand-in for the solution controller, used by tests.
//!
//! Binds a ROUTER (request side) and an XPUB (publish side) on loopback.
//! The XPUB reports the proxy's subscription, so tests can wait for it
//! before publishing instead of losing the first pushes.

use serde_json::Value;

use super::envelope::{Envelope, GENERIC_KEY};
use crate::common::config::ControllerConfig;

/// Bind `kind` on an ephemeral loopback port. Receives time out after 3 s.
pub(crate) fn bind_local(context: &zmq::Context, kind: zmq::SocketType) -> (zmq::Socket, u16) {
    let socket = context.socket(kind).unwrap();
    socket.set_linger(0).unwrap();
    socket.set_rcvtimeo(3000).unwrap();
    socket.bind("tcp://127.0.0.1:*").unwrap();
    let endpoint = socket.get_last_endpoint().unwrap().unwrap();
    let port = endpoint.rsplit(':').next().unwrap().parse().unwrap();
    (socket, port)
}

pub(crate) struct FakeController {
    _context: zmq::Context,
    router: zmq::Socket,
    publisher: zmq::Socket,
    request_port: u16,
    subscribe_port: u16,
    peer: Option<Vec<u8>>,
}

impl FakeController {
    pub(crate) fn bind() -> Self {
        let context = zmq::Context::new();
        let (router, request_port) = bind_local(&context, zmq::ROUTER);
        let (publisher, subscribe_port) = bind_local(&context, zmq::XPUB);
        Self {
            _context: context,
            router,
            publisher,
            request_port,
            subscribe_port,
            peer: None,
        }
    }

    pub(crate) fn config(&self, register_timeout_ms: u64) -> ControllerConfig {
        ControllerConfig {
            address: "127.0.0.1".to_string(),
            request_port: self.request_port,
            subscribe_port: self.subscribe_port,
            register_timeout_ms,
            listener_poll_ms: 20,
            send_timeout_ms: 1000,
        }
    }

    /// Block until a subscriber has announced the catch-all topic.
    pub(crate) fn wait_for_subscriber(&self) {
        assert_eq!(self.publisher.recv_bytes(0).unwrap(), vec![1u8]);
    }

    /// Next envelope on the request socket, remembering who sent it.
    pub(crate) fn next_envelope(&mut self) -> Envelope {
        let mut frames = self.router.recv_multipart(0).unwrap();
        assert_eq!(frames.len(), 4, "identity frame plus key, sequence and body");
        self.peer = Some(frames.remove(0));
        Envelope::from_frames(frames).unwrap()
    }

    pub(crate) fn next_request(&mut self) -> Value {
        self.next_envelope().body_json().unwrap()
    }

    /// Answer the last requester with a kvsimple envelope (4-byte sequence).
    pub(crate) fn reply(&self, sequence: i32, body: &[u8]) {
        let peer = self.peer.as_deref().unwrap();
        let sequence = sequence.to_be_bytes();
        self.router
            .send_multipart([peer, GENERIC_KEY, sequence.as_slice(), body], 0)
            .unwrap();
    }

    pub(crate) fn publish_frames(&self, frames: &[&[u8]]) {
        self.publisher.send_multipart(frames.iter().copied(), 0).unwrap();
    }

    pub(crate) fn push_command(&self, body: Value) {
        let body = serde_json::to_vec(&body).unwrap();
        self.publish_frames(&[GENERIC_KEY, &0i32.to_be_bytes(), &body]);
    }
}
