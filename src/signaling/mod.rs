//! Signaling channel
//!
//! Typed envelope exchange between two call endpoints:
//! - Wire envelope types (offer/answer/ICE/hangup/reconnect/reject/error)
//! - `SignalingChannel` transport abstraction
//! - NATS-backed implementation (one subject per user)
//! - In-memory hub for tests and same-process endpoints

pub mod channel;
pub mod envelope;
pub mod memory;
pub mod nats;

pub use channel::SignalingChannel;
pub use envelope::{
    AnswerPayload, ErrorPayload, HangupPayload, IceCandidatePayload, OfferPayload,
    ReconnectPayload, RejectPayload, Signal, SignalingEnvelope,
};
pub use memory::{MemorySignaling, MemorySignalingHub};
pub use nats::NatsSignaling;
