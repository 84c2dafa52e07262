//! Keyed envelope exchanged with the controller.
//!
//! An envelope travels as three frames: key, sequence (4 bytes, big-endian,
//! as in the kvsimple pattern) and the JSON body. The body is opaque at this
//! layer.

use serde::Serialize;

use super::error::{ControlError, ProtocolError};
use super::transport::FrameSocket;

/// Key used for every message this solution sends.
pub const GENERIC_KEY: &[u8] = b"generic";

const FRAME_COUNT: usize = 3;
const SEQUENCE_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Advisory only; never used for reordering or deduplication.
    pub sequence: u32,
    pub key: Vec<u8>,
    pub body: Vec<u8>,
}

impl Envelope {
    pub fn new(sequence: u32, key: impl Into<Vec<u8>>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            sequence,
            key: key.into(),
            body: body.into(),
        }
    }

    /// Build a `generic`-keyed envelope around a JSON-serialized body.
    pub fn json<T: Serialize>(sequence: u32, body: &T) -> Result<Self, ProtocolError> {
        Ok(Self::new(sequence, GENERIC_KEY, serde_json::to_vec(body)?))
    }

    /// Reassemble an envelope from received frames.
    pub fn from_frames(mut frames: Vec<Vec<u8>>) -> Result<Self, ProtocolError> {
        if frames.len() != FRAME_COUNT {
            return Err(ProtocolError::FrameCount(frames.len()));
        }
        let body = frames.pop().unwrap_or_default();
        let sequence_frame = frames.pop().unwrap_or_default();
        let key = frames.pop().unwrap_or_default();

        let sequence_bytes: [u8; SEQUENCE_LEN] = sequence_frame
            .as_slice()
            .try_into()
            .map_err(|_| ProtocolError::SequenceWidth(sequence_frame.len()))?;

        Ok(Self {
            sequence: u32::from_be_bytes(sequence_bytes),
            key,
            body,
        })
    }

    /// Parse the body as JSON.
    pub fn body_json(&self) -> Result<serde_json::Value, ProtocolError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Write one envelope onto the socket.
pub fn send(socket: &mut dyn FrameSocket, envelope: &Envelope) -> Result<(), ControlError> {
    let sequence = envelope.sequence.to_be_bytes();
    socket.send_message(&[&envelope.key, &sequence, &envelope.body])?;
    Ok(())
}

/// Block until one full envelope arrives.
pub fn receive(socket: &mut dyn FrameSocket) -> Result<Envelope, ControlError> {
    let frames = socket.recv_message()?;
    Ok(Envelope::from_frames(frames)?)
}
