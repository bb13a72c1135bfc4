// Reconnection tests: bounded retries, the renegotiation handshake, and
// the failure path once the attempt budget is spent.
//
// The remote peer is simulated directly on the signaling hub so the
// tests can inspect and answer every envelope the endpoint sends.

mod common;

use anyhow::Result;
use common::{endpoint_on, fast_config, wait_for, wait_for_state, Harness, EVENT_TIMEOUT};
use counsel_calls::signaling::{
    AnswerPayload, OfferPayload, ReconnectPayload, Signal, SignalingChannel, SignalingEnvelope,
};
use counsel_calls::{
    CallEvent, CallOptions, CallState, ConnectivityState, MemorySignalingHub,
};
use tokio::sync::mpsc;

/// Simulated remote peer: a raw subscription on the hub
struct Peer {
    channel: counsel_calls::signaling::MemorySignaling,
    inbox: mpsc::Receiver<SignalingEnvelope>,
    user_id: String,
}

impl Peer {
    async fn join(hub: &MemorySignalingHub, user_id: &str) -> Result<Self> {
        let channel = hub.channel(user_id);
        let inbox = channel.subscribe().await?;
        Ok(Self {
            channel,
            inbox,
            user_id: user_id.to_string(),
        })
    }

    async fn recv(&mut self) -> SignalingEnvelope {
        tokio::time::timeout(EVENT_TIMEOUT, self.inbox.recv())
            .await
            .expect("timed out waiting for an envelope")
            .expect("peer inbox closed")
    }

    async fn answer(&self, call_id: &str, to: &str) -> Result<()> {
        let envelope = SignalingEnvelope::new(
            call_id,
            &self.user_id,
            Signal::Answer(AnswerPayload {
                sdp: "v=0 peer-answer".to_string(),
            }),
        );
        self.channel.send(to, envelope).await
    }
}

/// Call the peer and drive the endpoint to `Connected`.
async fn connect_to_peer(a: &mut Harness, peer: &mut Peer) -> Result<String> {
    let call_id = a
        .endpoint
        .start_call(&peer.user_id, CallOptions::default())
        .await?;

    let offer = peer.recv().await;
    assert_eq!(offer.kind(), "offer");
    assert_eq!(offer.call_id, call_id);
    peer.answer(&call_id, a.endpoint.user_id()).await?;

    a.media.set_connectivity(0, ConnectivityState::Connected).await;
    wait_for_state(&mut a.events, CallState::Connected).await;
    Ok(call_id)
}

#[tokio::test]
async fn test_connectivity_loss_triggers_renegotiation() -> Result<()> {
    let hub = MemorySignalingHub::new();
    let mut a = endpoint_on(&hub, fast_config("alice")).await?;
    let mut peer = Peer::join(&hub, "bob").await?;
    let call_id = connect_to_peer(&mut a, &mut peer).await?;

    a.media.set_connectivity(0, ConnectivityState::Failed).await;
    wait_for_state(&mut a.events, CallState::Reconnecting).await;

    // After the retry interval the endpoint announces the attempt and
    // renegotiates with a fresh offer
    let notice = peer.recv().await;
    match notice.signal {
        Signal::Reconnect(ReconnectPayload { attempt }) => assert_eq!(attempt, 1),
        other => panic!("expected a reconnect notice, got {other:?}"),
    }
    let offer = peer.recv().await;
    assert_eq!(offer.call_id, call_id);
    match offer.signal {
        Signal::Offer(OfferPayload { is_reconnect, .. }) => assert!(is_reconnect),
        other => panic!("expected a reconnect offer, got {other:?}"),
    }

    peer.answer(&call_id, "alice").await?;
    a.media
        .set_latest_connectivity(ConnectivityState::Connected)
        .await;
    wait_for_state(&mut a.events, CallState::Connected).await;

    // Reconnecting successfully restores the attempt budget
    let stats = a.endpoint.stats().await.unwrap();
    assert_eq!(stats.reconnect_attempts, 0);
    Ok(())
}

#[tokio::test]
async fn test_retry_budget_allows_exactly_three_attempts() -> Result<()> {
    let hub = MemorySignalingHub::new();
    let mut a = endpoint_on(&hub, fast_config("alice")).await?;
    let mut peer = Peer::join(&hub, "bob").await?;
    connect_to_peer(&mut a, &mut peer).await?;

    a.media.set_connectivity(0, ConnectivityState::Failed).await;
    wait_for_state(&mut a.events, CallState::Reconnecting).await;

    // Every attempt fails: fail each fresh transport as soon as its
    // offer goes out
    let mut reconnect_notices = 0u32;
    loop {
        let envelope = peer.recv().await;
        match envelope.signal {
            Signal::Reconnect(ReconnectPayload { attempt }) => {
                reconnect_notices += 1;
                assert_eq!(attempt, reconnect_notices);
            }
            Signal::Offer(OfferPayload { is_reconnect, .. }) => {
                assert!(is_reconnect);
                a.media
                    .set_latest_connectivity(ConnectivityState::Failed)
                    .await;
            }
            Signal::Error(err) => {
                assert_eq!(err.message, "reconnection failed");
                break;
            }
            other => panic!("unexpected envelope during reconnection: {other:?}"),
        }
    }
    assert_eq!(reconnect_notices, 3);

    // The session fails terminally and cleans up to idle
    wait_for(&mut a.events, |e| matches!(e, CallEvent::Error { .. })).await;
    wait_for_state(&mut a.events, CallState::Error).await;
    wait_for(&mut a.events, |e| matches!(e, CallEvent::CallEnded { .. })).await;
    wait_for_state(&mut a.events, CallState::Idle).await;
    assert!(a.endpoint.stats().await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_peer_reconnect_offer_is_answered() -> Result<()> {
    let hub = MemorySignalingHub::new();
    let mut a = endpoint_on(&hub, fast_config("alice")).await?;
    let mut peer = Peer::join(&hub, "bob").await?;
    let call_id = connect_to_peer(&mut a, &mut peer).await?;

    // The peer lost connectivity first and renegotiates towards us
    peer.channel
        .send(
            "alice",
            SignalingEnvelope::new(
                &call_id,
                "bob",
                Signal::Reconnect(ReconnectPayload { attempt: 1 }),
            ),
        )
        .await?;
    wait_for_state(&mut a.events, CallState::Reconnecting).await;

    peer.channel
        .send(
            "alice",
            SignalingEnvelope::new(
                &call_id,
                "bob",
                Signal::Offer(OfferPayload {
                    sdp: "v=0 peer-reoffer".to_string(),
                    is_reconnect: true,
                }),
            ),
        )
        .await?;

    let answer = peer.recv().await;
    assert_eq!(answer.kind(), "answer");
    assert_eq!(answer.call_id, call_id);

    a.media
        .set_latest_connectivity(ConnectivityState::Connected)
        .await;
    wait_for_state(&mut a.events, CallState::Connected).await;
    Ok(())
}

#[tokio::test]
async fn test_peer_error_envelope_ends_the_call() -> Result<()> {
    let hub = MemorySignalingHub::new();
    let mut a = endpoint_on(&hub, fast_config("alice")).await?;
    let mut peer = Peer::join(&hub, "bob").await?;
    let call_id = connect_to_peer(&mut a, &mut peer).await?;

    peer.channel
        .send(
            "alice",
            SignalingEnvelope::new(
                &call_id,
                "bob",
                Signal::Error(counsel_calls::signaling::ErrorPayload {
                    message: "reconnection failed".to_string(),
                }),
            ),
        )
        .await?;

    wait_for(&mut a.events, |e| matches!(e, CallEvent::Error { .. })).await;
    wait_for_state(&mut a.events, CallState::Disconnected).await;
    wait_for_state(&mut a.events, CallState::Idle).await;
    Ok(())
}
