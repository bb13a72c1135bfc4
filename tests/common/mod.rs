// Shared test doubles for the call endpoint integration tests
//
// The mock media stack hands the test a sender for each transport it
// creates, so tests can inject connectivity changes and remote streams.
// The mock transcription provider does the same for recognition results.

#![allow(dead_code)]

use anyhow::{bail, Result};
use counsel_calls::{
    AnalyzeClient, CallEndpoint, CallEvent, ConnectivityState, EndpointConfig, LexiconScorer,
    MediaConnector, MediaConstraints, MediaStreamInfo, MediaTransport, MemorySignalingHub,
    TrackKind, TranscriptionProvider, TranscriptionResult, TransportEvent,
};
use counsel_calls::signaling::IceCandidatePayload;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex};

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// Media connector whose transports are driven by the test
#[derive(Default)]
pub struct MockMedia {
    /// Fail `acquire` whenever video is requested
    pub fail_video: bool,
    /// Fail `acquire` unconditionally
    pub fail_all: bool,
    counter: AtomicU64,
    transports: Mutex<Vec<mpsc::Sender<TransportEvent>>>,
}

impl MockMedia {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn without_video() -> Arc<Self> {
        Arc::new(Self {
            fail_video: true,
            ..Self::default()
        })
    }

    pub fn without_devices() -> Arc<Self> {
        Arc::new(Self {
            fail_all: true,
            ..Self::default()
        })
    }

    /// Sender for the transport created by the n-th `connect` call
    pub async fn transport(&self, index: usize) -> mpsc::Sender<TransportEvent> {
        self.transports.lock().await[index].clone()
    }

    /// Sender for the most recently created transport
    pub async fn latest_transport(&self) -> mpsc::Sender<TransportEvent> {
        self.transports
            .lock()
            .await
            .last()
            .cloned()
            .unwrap_or_else(|| panic!("no transport created yet"))
    }

    pub async fn transport_count(&self) -> usize {
        self.transports.lock().await.len()
    }

    pub async fn set_connectivity(&self, index: usize, state: ConnectivityState) {
        self.transport(index)
            .await
            .send(TransportEvent::Connectivity(state))
            .await
            .ok();
    }

    pub async fn set_latest_connectivity(&self, state: ConnectivityState) {
        self.latest_transport()
            .await
            .send(TransportEvent::Connectivity(state))
            .await
            .ok();
    }
}

#[async_trait::async_trait]
impl MediaConnector for MockMedia {
    async fn acquire(&self, constraints: MediaConstraints) -> Result<MediaStreamInfo> {
        if self.fail_all {
            bail!("no capture devices available");
        }
        if self.fail_video && constraints.video {
            bail!("camera unavailable");
        }
        Ok(MediaStreamInfo {
            stream_id: format!("stream-{}", self.counter.fetch_add(1, Ordering::SeqCst)),
            audio: constraints.audio,
            video: constraints.video,
        })
    }

    async fn connect(
        &self,
        _constraints: MediaConstraints,
    ) -> Result<(Arc<dyn MediaTransport>, mpsc::Receiver<TransportEvent>)> {
        let (tx, rx) = mpsc::channel(32);
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        self.transports.lock().await.push(tx);
        Ok((Arc::new(MockTransport { id }), rx))
    }
}

pub struct MockTransport {
    id: u64,
}

#[async_trait::async_trait]
impl MediaTransport for MockTransport {
    async fn create_offer(&self) -> Result<String> {
        Ok(format!("offer-sdp-{}", self.id))
    }

    async fn create_answer(&self, _remote_offer: &str) -> Result<String> {
        Ok(format!("answer-sdp-{}", self.id))
    }

    async fn apply_answer(&self, _remote_answer: &str) -> Result<()> {
        Ok(())
    }

    async fn add_ice_candidate(&self, _candidate: &IceCandidatePayload) -> Result<()> {
        Ok(())
    }

    async fn set_track_enabled(&self, _kind: TrackKind, _enabled: bool) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Transcription provider fed by the test
#[derive(Default)]
pub struct MockTranscription {
    sender: Mutex<Option<mpsc::Sender<TranscriptionResult>>>,
}

impl MockTranscription {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Sender for recognition results; available once the pipeline started
    pub async fn sender(&self) -> mpsc::Sender<TranscriptionResult> {
        self.sender
            .lock()
            .await
            .clone()
            .unwrap_or_else(|| panic!("transcription not started"))
    }

    pub async fn push(&self, user_id: &str, text: &str, is_final: bool) {
        self.sender()
            .await
            .send(TranscriptionResult {
                user_id: user_id.to_string(),
                text: text.to_string(),
                is_final,
            })
            .await
            .ok();
    }
}

#[async_trait::async_trait]
impl TranscriptionProvider for MockTranscription {
    async fn start(&self, _user_id: &str) -> Result<mpsc::Receiver<TranscriptionResult>> {
        let (tx, rx) = mpsc::channel(32);
        *self.sender.lock().await = Some(tx);
        Ok(rx)
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}

/// One fully wired test endpoint
pub struct Harness {
    pub endpoint: Arc<CallEndpoint>,
    pub media: Arc<MockMedia>,
    pub transcription: Arc<MockTranscription>,
    pub events: broadcast::Receiver<CallEvent>,
}

/// Endpoint config with timers short enough for tests
pub fn fast_config(user_id: &str) -> EndpointConfig {
    let mut config = EndpointConfig::new(user_id, user_id);
    config.reconnect_interval = Duration::from_millis(30);
    config.suggestion_period = Duration::from_millis(50);
    config
}

pub async fn endpoint_on(hub: &MemorySignalingHub, config: EndpointConfig) -> Result<Harness> {
    endpoint_with_media(hub, config, MockMedia::new()).await
}

pub async fn endpoint_with_media(
    hub: &MemorySignalingHub,
    config: EndpointConfig,
    media: Arc<MockMedia>,
) -> Result<Harness> {
    let transcription = MockTranscription::new();
    let signaling = Arc::new(hub.channel(config.user_id.clone()));
    let analyze: Option<Arc<AnalyzeClient>> = None;
    let endpoint = CallEndpoint::new(
        config,
        signaling,
        media.clone(),
        transcription.clone(),
        Arc::new(LexiconScorer::new()),
        analyze,
    );
    endpoint.start().await?;
    let events = endpoint.subscribe();
    Ok(Harness {
        endpoint,
        media,
        transcription,
        events,
    })
}

/// Next event, or panic after the timeout
pub async fn next_event(rx: &mut broadcast::Receiver<CallEvent>) -> CallEvent {
    tokio::time::timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

/// Skip events until one matches the predicate
pub async fn wait_for<F>(rx: &mut broadcast::Receiver<CallEvent>, mut pred: F) -> CallEvent
where
    F: FnMut(&CallEvent) -> bool,
{
    loop {
        let event = next_event(rx).await;
        if pred(&event) {
            return event;
        }
    }
}

/// Assert that no event matching the predicate arrives within `window`
pub async fn assert_no_event<F>(
    rx: &mut broadcast::Receiver<CallEvent>,
    window: Duration,
    mut pred: F,
) where
    F: FnMut(&CallEvent) -> bool,
{
    let deadline = tokio::time::Instant::now() + window;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return;
        }
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Ok(event)) => assert!(!pred(&event), "unexpected event: {event:?}"),
            _ => return,
        }
    }
}

/// Wait until the endpoint reports the given state
pub async fn wait_for_state(
    rx: &mut broadcast::Receiver<CallEvent>,
    target: counsel_calls::CallState,
) {
    wait_for(rx, |e| {
        matches!(e, CallEvent::StateChanged { current, .. } if *current == target)
    })
    .await;
}
