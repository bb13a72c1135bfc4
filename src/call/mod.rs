//! Call session management
//!
//! A [`CallEndpoint`] owns one peer-to-peer call at a time and drives it
//! through the [`CallState`] machine, coordinating signaling, the media
//! transport, and the live transcription pipeline.

mod config;
mod events;
mod participant;
mod reconnect;
mod session;
mod state;
mod stats;

pub use config::{CallOptions, EndpointConfig};
pub use events::CallEvent;
pub use participant::CallParticipant;
pub use reconnect::{ReconnectPolicy, RetrySlot};
pub use session::CallEndpoint;
pub use state::CallState;
pub use stats::CallStats;
