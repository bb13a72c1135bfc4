//! Media transport abstraction
//!
//! The core call logic never touches platform media APIs directly. A
//! [`MediaConnector`] acquires capture tracks and builds peer transports;
//! a [`MediaTransport`] is one peer connection exchanging SDP/ICE and
//! reporting connectivity through an event channel.

use crate::signaling::IceCandidatePayload;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Requested capture tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl MediaConstraints {
    pub fn audio_only() -> Self {
        Self {
            audio: true,
            video: false,
        }
    }
}

/// Media track kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// Description of a local or remote media stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaStreamInfo {
    pub stream_id: String,
    pub audio: bool,
    pub video: bool,
}

/// Peer connection connectivity, as reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    New,
    Checking,
    Connected,
    Completed,
    Failed,
    Disconnected,
    Closed,
}

/// Event emitted by a peer transport
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Connectivity(ConnectivityState),
    LocalStream(MediaStreamInfo),
    RemoteStream(MediaStreamInfo),
    /// Locally discovered candidate, to be trickled to the peer
    IceCandidate(IceCandidatePayload),
}

/// One peer connection
#[async_trait::async_trait]
pub trait MediaTransport: Send + Sync {
    /// Produce a local SDP offer
    async fn create_offer(&self) -> Result<String>;

    /// Apply a remote offer and produce the matching SDP answer
    async fn create_answer(&self, remote_offer: &str) -> Result<String>;

    /// Apply the remote answer to an offer this transport produced
    async fn apply_answer(&self, remote_answer: &str) -> Result<()>;

    /// Add a candidate received from the peer
    async fn add_ice_candidate(&self, candidate: &IceCandidatePayload) -> Result<()>;

    /// Enable or disable an outgoing track without renegotiating
    async fn set_track_enabled(&self, kind: TrackKind, enabled: bool) -> Result<()>;

    /// Tear down the connection and release transport resources
    async fn close(&self) -> Result<()>;
}

/// Factory for capture tracks and peer transports
///
/// Backed by the platform media stack (browser, native WebRTC); the
/// crate itself ships no implementation.
#[async_trait::async_trait]
pub trait MediaConnector: Send + Sync {
    /// Acquire local capture tracks
    ///
    /// Fails if any requested track cannot be captured; the caller may
    /// retry with reduced constraints (audio-only fallback).
    async fn acquire(&self, constraints: MediaConstraints) -> Result<MediaStreamInfo>;

    /// Create a fresh peer transport
    ///
    /// Returns the transport and the receiver for its events.
    async fn connect(
        &self,
        constraints: MediaConstraints,
    ) -> Result<(Arc<dyn MediaTransport>, mpsc::Receiver<TransportEvent>)>;
}
