use super::config::{CallOptions, EndpointConfig};
use super::events::CallEvent;
use super::participant::CallParticipant;
use super::reconnect::{ReconnectPolicy, RetrySlot};
use super::state::CallState;
use super::stats::CallStats;
use crate::analysis::{
    AnalyzeClient, SentimentSample, SentimentScorer, SuggestionEngine, SummaryGenerator,
};
use crate::media::{
    ConnectivityState, MediaConnector, MediaConstraints, MediaStreamInfo, MediaTransport,
    TrackKind, TransportEvent,
};
use crate::signaling::{
    AnswerPayload, ErrorPayload, HangupPayload, IceCandidatePayload, OfferPayload,
    ReconnectPayload, RejectPayload, Signal, SignalingChannel, SignalingEnvelope,
};
use crate::transcription::{
    TranscriptSegment, TranscriptStore, TranscriptionProvider, TranscriptionResult,
};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const EVENT_BUFFER: usize = 128;

/// One call endpoint: owns at most one non-terminal call session
///
/// Drives the session state machine from three event sources (signaling
/// envelopes, transport connectivity, timers), all serialized through a
/// single `Mutex<Inner>` critical section. Collaborators (media stack,
/// speech engine, analysis service) are injected as trait objects, so
/// endpoints carry no global state and any number can coexist.
pub struct CallEndpoint {
    config: EndpointConfig,
    policy: ReconnectPolicy,
    signaling: Arc<dyn SignalingChannel>,
    media: Arc<dyn MediaConnector>,
    transcription: Arc<dyn TranscriptionProvider>,
    scorer: Arc<dyn SentimentScorer>,
    suggestions: Arc<SuggestionEngine>,
    summarizer: Arc<SummaryGenerator>,
    inner: Arc<Mutex<Inner>>,
    events: broadcast::Sender<CallEvent>,
    signaling_task: Mutex<Option<JoinHandle<()>>>,
}

/// The single critical section: every mutation of session state goes
/// through this lock.
struct Inner {
    state: CallState,
    call: Option<ActiveCall>,
}

struct ActiveCall {
    id: String,
    local: CallParticipant,
    remote: CallParticipant,
    options: CallOptions,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,

    transport: Arc<dyn MediaTransport>,
    /// Bumped on every transport replacement; events from an older
    /// transport are ignored
    transport_epoch: u64,
    transport_task: Option<JoinHandle<()>>,

    transcript: TranscriptStore,
    sentiment: Vec<SentimentSample>,

    reconnect_attempts: u32,
    retry: RetrySlot,

    suggestion_task: Option<JoinHandle<()>>,
    transcription_task: Option<JoinHandle<()>>,
    pipeline_running: bool,
}

impl CallEndpoint {
    pub fn new(
        config: EndpointConfig,
        signaling: Arc<dyn SignalingChannel>,
        media: Arc<dyn MediaConnector>,
        transcription: Arc<dyn TranscriptionProvider>,
        scorer: Arc<dyn SentimentScorer>,
        analyze: Option<Arc<AnalyzeClient>>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let policy = ReconnectPolicy {
            interval: config.reconnect_interval,
            max_attempts: config.max_reconnect_attempts,
        };

        Arc::new(Self {
            suggestions: Arc::new(SuggestionEngine::new(analyze.clone())),
            summarizer: Arc::new(SummaryGenerator::new(analyze)),
            config,
            policy,
            signaling,
            media,
            transcription,
            scorer,
            inner: Arc::new(Mutex::new(Inner {
                state: CallState::Idle,
                call: None,
            })),
            events,
            signaling_task: Mutex::new(None),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.config.user_id
    }

    /// Subscribe to the endpoint's event stream
    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.events.subscribe()
    }

    pub async fn state(&self) -> CallState {
        self.inner.lock().await.state
    }

    /// Snapshot of the active call, `None` while idle
    pub async fn stats(&self) -> Option<CallStats> {
        let inner = self.inner.lock().await;
        inner.call.as_ref().map(|c| Self::snapshot(c, inner.state))
    }

    /// Final transcript segments collected so far in the active call
    pub async fn transcript(&self) -> Vec<TranscriptSegment> {
        let inner = self.inner.lock().await;
        inner
            .call
            .as_ref()
            .map(|c| c.transcript.segments().to_vec())
            .unwrap_or_default()
    }

    /// Begin receiving signaling envelopes
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let rx = self
            .signaling
            .subscribe()
            .await
            .context("Failed to subscribe to signaling")?;

        let endpoint = Arc::clone(self);
        let task = tokio::spawn(async move { endpoint.signaling_loop(rx).await });

        let mut guard = self.signaling_task.lock().await;
        if let Some(old) = guard.take() {
            old.abort();
        }
        *guard = Some(task);

        info!(
            "Call endpoint {} listening for signaling",
            self.config.user_id
        );
        Ok(())
    }

    /// Hang up any active call and stop receiving signaling
    pub async fn close(self: &Arc<Self>) {
        let active = { self.inner.lock().await.call.is_some() };
        if active {
            if let Err(e) = self.hang_up().await {
                warn!("Hangup during close failed: {:#}", e);
            }
        }
        if let Some(task) = self.signaling_task.lock().await.take() {
            task.abort();
        }
        info!("Call endpoint {} closed", self.config.user_id);
    }

    // ------------------------------------------------------------------
    // Call lifecycle operations
    // ------------------------------------------------------------------

    /// Place an outgoing call; legal only while idle
    ///
    /// Returns the generated call id.
    pub async fn start_call(
        self: &Arc<Self>,
        remote_user_id: &str,
        options: CallOptions,
    ) -> Result<String> {
        let mut inner = self.inner.lock().await;
        if inner.state != CallState::Idle {
            bail!("Cannot start a call while {}", inner.state);
        }

        let call_id = uuid::Uuid::new_v4().to_string();
        info!("Starting call {} to {}", call_id, remote_user_id);

        let (constraints, local_stream) = self.acquire_media(&options).await?;
        let (transport, transport_rx) = self
            .media
            .connect(constraints)
            .await
            .context("Failed to create peer transport")?;
        let sdp = transport
            .create_offer()
            .await
            .context("Failed to create offer")?;

        let mut call =
            self.new_active_call(call_id.clone(), remote_user_id, options, constraints, transport);
        call.transport_task =
            Some(self.spawn_transport_task(call_id.clone(), call.transport_epoch, transport_rx));
        inner.call = Some(call);
        self.transition(&mut inner, CallState::Connecting);
        self.emit(CallEvent::LocalStreamAdded {
            stream: local_stream,
        });

        let envelope = SignalingEnvelope::new(
            &call_id,
            &self.config.user_id,
            Signal::Offer(OfferPayload {
                sdp,
                is_reconnect: false,
            }),
        );
        if let Err(e) = self.signaling.send(remote_user_id, envelope).await {
            error!("Failed to send offer: {:#}", e);
            self.fail(&mut inner, format!("Failed to send offer: {e:#}"))
                .await;
            return Err(e);
        }

        Ok(call_id)
    }

    /// Accept an incoming offer; legal only while idle
    pub async fn answer_call(
        self: &Arc<Self>,
        call_id: &str,
        remote_user_id: &str,
        offer: OfferPayload,
        options: CallOptions,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state != CallState::Idle {
            bail!("Cannot answer a call while {}", inner.state);
        }

        info!("Answering call {} from {}", call_id, remote_user_id);

        let (constraints, local_stream) = self.acquire_media(&options).await?;
        let (transport, transport_rx) = self
            .media
            .connect(constraints)
            .await
            .context("Failed to create peer transport")?;
        let sdp = transport
            .create_answer(&offer.sdp)
            .await
            .context("Failed to create answer")?;

        let mut call = self.new_active_call(
            call_id.to_string(),
            remote_user_id,
            options,
            constraints,
            transport,
        );
        call.transport_task = Some(self.spawn_transport_task(
            call_id.to_string(),
            call.transport_epoch,
            transport_rx,
        ));
        inner.call = Some(call);
        self.transition(&mut inner, CallState::Connecting);
        self.emit(CallEvent::LocalStreamAdded {
            stream: local_stream,
        });

        let envelope = SignalingEnvelope::new(
            call_id,
            &self.config.user_id,
            Signal::Answer(AnswerPayload { sdp }),
        );
        if let Err(e) = self.signaling.send(remote_user_id, envelope).await {
            error!("Failed to send answer: {:#}", e);
            self.fail(&mut inner, format!("Failed to send answer: {e:#}"))
                .await;
            return Err(e);
        }

        Ok(())
    }

    /// End the active call
    pub async fn hang_up(self: &Arc<Self>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let Some(call) = inner.call.as_ref() else {
            bail!("No active call to hang up");
        };

        info!("Hanging up call {}", call.id);
        let envelope = SignalingEnvelope::new(
            &call.id,
            &self.config.user_id,
            Signal::Hangup(HangupPayload::default()),
        );
        let remote_id = call.remote.id.clone();
        if let Err(e) = self.signaling.send(&remote_id, envelope).await {
            warn!("Failed to send hangup: {:#}", e);
        }

        self.terminate(&mut inner, CallState::Ended).await;
        Ok(())
    }

    /// Mute/unmute the local audio track; returns the new enabled state
    pub async fn toggle_audio(&self) -> Result<bool> {
        self.toggle_track(TrackKind::Audio).await
    }

    /// Enable/disable the local video track; returns the new enabled state
    pub async fn toggle_video(&self) -> Result<bool> {
        self.toggle_track(TrackKind::Video).await
    }

    async fn toggle_track(&self, kind: TrackKind) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let Some(call) = inner.call.as_mut() else {
            bail!("No active call");
        };

        let enabled = match kind {
            TrackKind::Audio => {
                call.local.audio_enabled = !call.local.audio_enabled;
                call.local.audio_enabled
            }
            TrackKind::Video => {
                call.local.video_enabled = !call.local.video_enabled;
                call.local.video_enabled
            }
        };

        call.transport
            .set_track_enabled(kind, enabled)
            .await
            .context("Failed to update track state")?;

        let participant = call.local.clone();
        self.emit(CallEvent::ParticipantUpdated { participant });
        Ok(enabled)
    }

    // ------------------------------------------------------------------
    // Signaling
    // ------------------------------------------------------------------

    async fn signaling_loop(self: Arc<Self>, mut rx: mpsc::Receiver<SignalingEnvelope>) {
        info!("Signaling loop started for {}", self.config.user_id);
        while let Some(envelope) = rx.recv().await {
            self.handle_envelope(envelope).await;
        }
        info!("Signaling loop stopped for {}", self.config.user_id);
    }

    async fn handle_envelope(self: &Arc<Self>, envelope: SignalingEnvelope) {
        debug!(
            "Received {} envelope for call {} from {}",
            envelope.kind(),
            envelope.call_id,
            envelope.from_user_id
        );

        let mut inner = self.inner.lock().await;
        match envelope.signal.clone() {
            Signal::Offer(offer) => self.handle_offer(&mut inner, &envelope, offer).await,
            Signal::Answer(answer) => self.handle_answer(&mut inner, &envelope, answer).await,
            Signal::IceCandidate(candidate) => {
                self.handle_candidate(&mut inner, &envelope, candidate).await
            }
            Signal::Hangup(_) => self.handle_hangup(&mut inner, &envelope).await,
            Signal::Reconnect(notice) => {
                self.handle_reconnect_notice(&mut inner, &envelope, notice)
            }
            Signal::Reject(reject) => self.handle_reject(&mut inner, &envelope, reject).await,
            Signal::Error(err) => self.handle_peer_error(&mut inner, &envelope, err).await,
        }
    }

    /// Envelope belongs to the active call and comes from its tracked remote
    fn matches_active(inner: &Inner, envelope: &SignalingEnvelope) -> bool {
        inner
            .call
            .as_ref()
            .is_some_and(|c| c.id == envelope.call_id && c.remote.id == envelope.from_user_id)
    }

    async fn handle_offer(
        self: &Arc<Self>,
        inner: &mut Inner,
        envelope: &SignalingEnvelope,
        offer: OfferPayload,
    ) {
        if inner.state == CallState::Idle {
            if offer.is_reconnect {
                // A reconnect offer can only renegotiate a live call; the
                // call it refers to has already been torn down here.
                debug!(
                    "Reconnect offer for unknown call {}, dropped",
                    envelope.call_id
                );
                return;
            }
            self.emit(CallEvent::IncomingCall {
                call_id: envelope.call_id.clone(),
                from_user_id: envelope.from_user_id.clone(),
                offer,
            });
            return;
        }

        if Self::matches_active(inner, envelope) {
            if offer.is_reconnect {
                self.accept_reconnect_offer(inner, offer).await;
            } else {
                // Late retransmission of the original offer
                debug!(
                    "Duplicate offer for active call {}, ignored",
                    envelope.call_id
                );
            }
            return;
        }

        // Busy: refuse without touching the current session
        info!(
            "Rejecting offer for call {} from {}: busy",
            envelope.call_id, envelope.from_user_id
        );
        let reject = SignalingEnvelope::new(
            &envelope.call_id,
            &self.config.user_id,
            Signal::Reject(RejectPayload {
                reason: "busy".to_string(),
            }),
        );
        if let Err(e) = self.signaling.send(&envelope.from_user_id, reject).await {
            warn!("Failed to send reject: {:#}", e);
        }
    }

    /// Peer lost connectivity and sent a fresh offer for the active call
    async fn accept_reconnect_offer(self: &Arc<Self>, inner: &mut Inner, offer: OfferPayload) {
        info!("Peer is renegotiating, answering reconnect offer");

        let Some(call) = inner.call.as_mut() else {
            return;
        };
        // Yield to the peer's attempt; both sides retrying at once is
        // disallowed.
        call.retry.cancel();

        let constraints = MediaConstraints {
            audio: call.options.audio,
            video: call.options.video,
        };
        let call_id = call.id.clone();
        let remote_id = call.remote.id.clone();

        let result: Result<String> = async {
            let (transport, rx) = self
                .media
                .connect(constraints)
                .await
                .context("Failed to create peer transport")?;
            call.transport_epoch += 1;
            if let Some(old) = call.transport_task.take() {
                old.abort();
            }
            let old_transport = std::mem::replace(&mut call.transport, transport);
            tokio::spawn(async move {
                let _ = old_transport.close().await;
            });
            call.transport_task =
                Some(self.spawn_transport_task(call_id.clone(), call.transport_epoch, rx));
            call.transport
                .create_answer(&offer.sdp)
                .await
                .context("Failed to answer reconnect offer")
        }
        .await;

        match result {
            Ok(sdp) => {
                if inner.state == CallState::Connected {
                    self.transition(inner, CallState::Reconnecting);
                }
                let envelope = SignalingEnvelope::new(
                    &call_id,
                    &self.config.user_id,
                    Signal::Answer(AnswerPayload { sdp }),
                );
                if let Err(e) = self.signaling.send(&remote_id, envelope).await {
                    warn!("Failed to send reconnect answer: {:#}", e);
                }
            }
            Err(e) => {
                error!("Renegotiation failed: {:#}", e);
                self.fail(inner, format!("Renegotiation failed: {e:#}")).await;
            }
        }
    }

    async fn handle_answer(
        self: &Arc<Self>,
        inner: &mut Inner,
        envelope: &SignalingEnvelope,
        answer: AnswerPayload,
    ) {
        if !Self::matches_active(inner, envelope) {
            debug!("Stale answer for call {}, dropped", envelope.call_id);
            return;
        }

        match inner.state {
            CallState::Connecting | CallState::Reconnecting => {
                let Some(call) = inner.call.as_ref() else {
                    return;
                };
                let transport = Arc::clone(&call.transport);
                if let Err(e) = transport.apply_answer(&answer.sdp).await {
                    error!("Failed to apply answer: {:#}", e);
                    if inner.state == CallState::Connecting {
                        self.fail(inner, format!("Failed to apply answer: {e:#}"))
                            .await;
                    }
                }
            }
            CallState::Connected => {
                debug!("Duplicate answer for connected call, ignored");
            }
            _ => {}
        }
    }

    async fn handle_candidate(
        self: &Arc<Self>,
        inner: &mut Inner,
        envelope: &SignalingEnvelope,
        candidate: IceCandidatePayload,
    ) {
        if !Self::matches_active(inner, envelope) {
            debug!("Stale ICE candidate for call {}, dropped", envelope.call_id);
            return;
        }
        let Some(call) = inner.call.as_ref() else {
            return;
        };
        let transport = Arc::clone(&call.transport);
        if let Err(e) = transport.add_ice_candidate(&candidate).await {
            // Bad candidates are routine during renegotiation
            warn!("Failed to add ICE candidate: {:#}", e);
        }
    }

    async fn handle_hangup(self: &Arc<Self>, inner: &mut Inner, envelope: &SignalingEnvelope) {
        if !Self::matches_active(inner, envelope) {
            debug!("Stale hangup for call {}, dropped", envelope.call_id);
            return;
        }
        info!("Peer hung up call {}", envelope.call_id);
        self.terminate(inner, CallState::Disconnected).await;
    }

    fn handle_reconnect_notice(
        &self,
        inner: &mut Inner,
        envelope: &SignalingEnvelope,
        notice: ReconnectPayload,
    ) {
        if !Self::matches_active(inner, envelope) {
            debug!(
                "Stale reconnect notice for call {}, dropped",
                envelope.call_id
            );
            return;
        }
        if inner.state == CallState::Connected {
            info!(
                "Peer lost connectivity (attempt {}), awaiting renegotiation",
                notice.attempt
            );
            self.transition(inner, CallState::Reconnecting);
        }
    }

    async fn handle_reject(
        self: &Arc<Self>,
        inner: &mut Inner,
        envelope: &SignalingEnvelope,
        reject: RejectPayload,
    ) {
        if !Self::matches_active(inner, envelope) {
            debug!("Stale reject for call {}, dropped", envelope.call_id);
            return;
        }
        if inner.state == CallState::Connecting {
            info!(
                "Call {} rejected by peer: {}",
                envelope.call_id, reject.reason
            );
            self.emit(CallEvent::Error {
                message: format!("Call rejected: {}", reject.reason),
                cause: None,
            });
            self.terminate(inner, CallState::Ended).await;
        }
    }

    async fn handle_peer_error(
        self: &Arc<Self>,
        inner: &mut Inner,
        envelope: &SignalingEnvelope,
        err: ErrorPayload,
    ) {
        if !Self::matches_active(inner, envelope) {
            debug!("Stale error envelope for call {}, dropped", envelope.call_id);
            return;
        }
        warn!("Peer reported a fatal error: {}", err.message);
        self.emit(CallEvent::Error {
            message: "Peer ended the call after a fatal error".to_string(),
            cause: Some(err.message),
        });
        self.terminate(inner, CallState::Disconnected).await;
    }

    // ------------------------------------------------------------------
    // Transport events
    // ------------------------------------------------------------------

    fn spawn_transport_task(
        self: &Arc<Self>,
        call_id: String,
        epoch: u64,
        mut rx: mpsc::Receiver<TransportEvent>,
    ) -> JoinHandle<()> {
        let endpoint = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                endpoint.on_transport_event(&call_id, epoch, event).await;
            }
        })
    }

    async fn on_transport_event(
        self: &Arc<Self>,
        call_id: &str,
        epoch: u64,
        event: TransportEvent,
    ) {
        let mut inner = self.inner.lock().await;

        let is_current = inner
            .call
            .as_ref()
            .is_some_and(|c| c.id == call_id && c.transport_epoch == epoch);
        if !is_current {
            debug!("Event from a stale transport, ignored");
            return;
        }

        match event {
            TransportEvent::Connectivity(state) => self.on_connectivity(&mut inner, state).await,
            TransportEvent::LocalStream(stream) => {
                self.emit(CallEvent::LocalStreamAdded { stream });
            }
            TransportEvent::RemoteStream(stream) => {
                if let Some(call) = inner.call.as_mut() {
                    call.remote.audio_enabled = stream.audio;
                    call.remote.video_enabled = stream.video;
                    let participant = call.remote.clone();
                    self.emit(CallEvent::RemoteStreamAdded { stream });
                    self.emit(CallEvent::ParticipantUpdated { participant });
                }
            }
            TransportEvent::IceCandidate(candidate) => {
                if let Some(call) = inner.call.as_ref() {
                    let envelope = SignalingEnvelope::new(
                        &call.id,
                        &self.config.user_id,
                        Signal::IceCandidate(candidate),
                    );
                    let remote_id = call.remote.id.clone();
                    if let Err(e) = self.signaling.send(&remote_id, envelope).await {
                        warn!("Failed to trickle ICE candidate: {:#}", e);
                    }
                }
            }
        }
    }

    async fn on_connectivity(self: &Arc<Self>, inner: &mut Inner, state: ConnectivityState) {
        match state {
            ConnectivityState::Connected | ConnectivityState::Completed => {
                if matches!(
                    inner.state,
                    CallState::Connecting | CallState::Reconnecting
                ) {
                    self.enter_connected(inner).await;
                }
            }
            ConnectivityState::Failed | ConnectivityState::Disconnected => match inner.state {
                CallState::Connected => {
                    info!("Transport connectivity lost");
                    self.transition(inner, CallState::Reconnecting);
                    self.schedule_reconnect(inner).await;
                }
                CallState::Reconnecting => {
                    // The attempt's fresh transport failed as well
                    self.schedule_reconnect(inner).await;
                }
                CallState::Connecting => {
                    self.fail(inner, "Transport failed during call setup".to_string())
                        .await;
                }
                _ => {}
            },
            ConnectivityState::Closed => {
                if inner.state.is_active() {
                    info!("Transport closed");
                    self.terminate(inner, CallState::Disconnected).await;
                }
            }
            ConnectivityState::New | ConnectivityState::Checking => {}
        }
    }

    async fn enter_connected(self: &Arc<Self>, inner: &mut Inner) {
        if let Some(call) = inner.call.as_mut() {
            call.retry.cancel();
            // The attempt budget covers the whole call lifetime; it
            // resets here and nowhere else.
            call.reconnect_attempts = 0;
        }
        self.transition(inner, CallState::Connected);
        self.start_pipeline(inner).await;
    }

    // ------------------------------------------------------------------
    // Reconnection
    // ------------------------------------------------------------------

    // Boxed: the retry timer task awaits `attempt_reconnect`, which in
    // turn awaits this on failure, so the recursive edge must be
    // type-erased.
    fn schedule_reconnect<'a>(
        self: &'a Arc<Self>,
        inner: &'a mut Inner,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let Some(call) = inner.call.as_mut() else {
                return;
            };

            if self.policy.exhausted(call.reconnect_attempts) {
                error!(
                    "Reconnection budget exhausted after {} attempts",
                    call.reconnect_attempts
                );
                let envelope = SignalingEnvelope::new(
                    &call.id,
                    &self.config.user_id,
                    Signal::Error(ErrorPayload {
                        message: "reconnection failed".to_string(),
                    }),
                );
                let remote_id = call.remote.id.clone();
                if let Err(e) = self.signaling.send(&remote_id, envelope).await {
                    debug!("Failed to notify peer of reconnection failure: {:#}", e);
                }
                self.fail(
                    inner,
                    format!(
                        "Reconnection failed after {} attempts",
                        self.policy.max_attempts
                    ),
                )
                .await;
                return;
            }

            let call_id = call.id.clone();
            let delay = self.policy.interval;
            let endpoint = Arc::clone(self);
            // Arming cancels any pending timer, so attempts never overlap
            call.retry.arm(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                endpoint.attempt_reconnect(call_id).await;
            }));
            info!("Reconnection attempt scheduled in {:?}", delay);
        })
    }

    async fn attempt_reconnect(self: &Arc<Self>, call_id: String) {
        let mut inner = self.inner.lock().await;
        if inner.state != CallState::Reconnecting {
            return;
        }
        let Some(call) = inner.call.as_mut() else {
            return;
        };
        if call.id != call_id {
            return;
        }

        call.reconnect_attempts += 1;
        let attempt = call.reconnect_attempts;
        let remote_id = call.remote.id.clone();
        info!(
            "Reconnection attempt {}/{}",
            attempt, self.policy.max_attempts
        );

        let notice = SignalingEnvelope::new(
            &call_id,
            &self.config.user_id,
            Signal::Reconnect(ReconnectPayload { attempt }),
        );
        if let Err(e) = self.signaling.send(&remote_id, notice).await {
            warn!("Failed to send reconnect notice: {:#}", e);
        }

        let constraints = MediaConstraints {
            audio: call.options.audio,
            video: call.options.video,
        };
        let result: Result<String> = async {
            let (transport, rx) = self
                .media
                .connect(constraints)
                .await
                .context("Failed to create peer transport")?;
            call.transport_epoch += 1;
            if let Some(old) = call.transport_task.take() {
                old.abort();
            }
            let old_transport = std::mem::replace(&mut call.transport, transport);
            tokio::spawn(async move {
                let _ = old_transport.close().await;
            });
            call.transport_task =
                Some(self.spawn_transport_task(call_id.clone(), call.transport_epoch, rx));
            call.transport
                .create_offer()
                .await
                .context("Failed to create reconnect offer")
        }
        .await;

        match result {
            Ok(sdp) => {
                let envelope = SignalingEnvelope::new(
                    &call_id,
                    &self.config.user_id,
                    Signal::Offer(OfferPayload {
                        sdp,
                        is_reconnect: true,
                    }),
                );
                if let Err(e) = self.signaling.send(&remote_id, envelope).await {
                    warn!("Failed to send reconnect offer: {:#}", e);
                    self.schedule_reconnect(&mut inner).await;
                }
            }
            Err(e) => {
                warn!("Reconnection attempt {} failed: {:#}", attempt, e);
                self.schedule_reconnect(&mut inner).await;
            }
        }
    }

    // ------------------------------------------------------------------
    // Transcription & analysis pipeline
    // ------------------------------------------------------------------

    async fn start_pipeline(self: &Arc<Self>, inner: &mut Inner) {
        let Some(call) = inner.call.as_mut() else {
            return;
        };
        if call.pipeline_running || !call.options.transcription {
            return;
        }
        call.pipeline_running = true;
        let call_id = call.id.clone();

        match self.transcription.start(&call.local.id).await {
            Ok(rx) => {
                call.transcription_task = Some(self.spawn_transcription_task(
                    call_id.clone(),
                    rx,
                    call.options.sentiment,
                ));
            }
            Err(e) => {
                // Degraded call: no transcripts, but the call goes on
                warn!("Failed to start transcription: {:#}", e);
            }
        }

        call.suggestion_task = Some(self.spawn_suggestion_task(call_id));
        info!("Transcription pipeline started");
    }

    async fn stop_pipeline(&self, call: &mut ActiveCall) {
        if let Some(task) = call.suggestion_task.take() {
            task.abort();
        }
        if let Some(task) = call.transcription_task.take() {
            task.abort();
        }
        if call.pipeline_running {
            if let Err(e) = self.transcription.stop().await {
                warn!("Failed to stop transcription provider: {:#}", e);
            }
            call.pipeline_running = false;
            info!("Transcription pipeline stopped");
        }
    }

    fn spawn_transcription_task(
        self: &Arc<Self>,
        call_id: String,
        mut rx: mpsc::Receiver<TranscriptionResult>,
        sentiment: bool,
    ) -> JoinHandle<()> {
        let endpoint = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(result) = rx.recv().await {
                endpoint
                    .on_transcription_result(&call_id, result, sentiment)
                    .await;
            }
        })
    }

    async fn on_transcription_result(
        self: &Arc<Self>,
        call_id: &str,
        result: TranscriptionResult,
        sentiment: bool,
    ) {
        self.emit(CallEvent::TranscriptionResult {
            user_id: result.user_id.clone(),
            text: result.text.clone(),
            is_final: result.is_final,
        });

        // Interim results are surfaced but never stored
        if !result.is_final {
            return;
        }

        // Score before taking the session lock; a remote scorer must not
        // block envelope handling.
        let sample = if sentiment {
            match self.scorer.score(&result.text).await {
                Ok(sample) => Some(sample),
                Err(e) => {
                    warn!("Sentiment scoring failed: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        let mut inner = self.inner.lock().await;
        let Some(call) = inner.call.as_mut() else {
            return;
        };
        if call.id != call_id {
            return;
        }

        call.transcript
            .append(TranscriptSegment::finalized(result.user_id, result.text));
        if let Some(sample) = sample {
            self.emit(CallEvent::SentimentResult {
                score: sample.score,
                magnitude: sample.magnitude,
                text: sample.text.clone(),
            });
            call.sentiment.push(sample);
        }
    }

    fn spawn_suggestion_task(self: &Arc<Self>, call_id: String) -> JoinHandle<()> {
        let endpoint = Arc::clone(self);
        let period = self.config.suggestion_period;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await; // the first tick completes immediately
            loop {
                ticker.tick().await;
                endpoint.suggestion_tick(&call_id).await;
            }
        })
    }

    async fn suggestion_tick(self: &Arc<Self>, call_id: &str) {
        let context = {
            let inner = self.inner.lock().await;
            if inner.state != CallState::Connected {
                return;
            }
            match inner.call.as_ref() {
                Some(call) if call.id == call_id && !call.transcript.is_empty() => call
                    .transcript
                    .recent(self.config.suggestion_context_segments),
                _ => return,
            }
        };

        let suggestion = match self.suggestions.generate(&context).await {
            Ok(Some(suggestion)) => suggestion,
            Ok(None) => return,
            Err(e) => {
                warn!("Suggestion generation failed: {:#}", e);
                return;
            }
        };

        if suggestion.confidence <= self.config.suggestion_confidence_threshold {
            debug!(
                "Suggestion below confidence threshold ({:.2}), discarded",
                suggestion.confidence
            );
            return;
        }

        // The call may have ended while we were generating
        let inner = self.inner.lock().await;
        if inner.state != CallState::Connected {
            return;
        }
        if !inner.call.as_ref().is_some_and(|c| c.id == call_id) {
            return;
        }
        self.emit(CallEvent::Suggestion {
            text: suggestion.text,
            kind: suggestion.kind,
            confidence: suggestion.confidence,
        });
    }

    // ------------------------------------------------------------------
    // State machine internals
    // ------------------------------------------------------------------

    fn emit(&self, event: CallEvent) {
        // A send error just means no subscriber is listening right now
        let _ = self.events.send(event);
    }

    fn transition(&self, inner: &mut Inner, next: CallState) {
        let previous = inner.state;
        if previous == next {
            return;
        }
        if !previous.can_transition_to(next) {
            warn!(
                "Illegal call state transition {} -> {}, ignored",
                previous, next
            );
            return;
        }
        inner.state = next;
        info!("Call state changed: {} -> {}", previous, next);
        self.emit(CallEvent::StateChanged {
            previous,
            current: next,
        });
    }

    /// Unrecoverable failure: surface it, then force-terminate
    async fn fail(self: &Arc<Self>, inner: &mut Inner, message: String) {
        error!("Fatal call error: {}", message);
        self.emit(CallEvent::Error {
            message,
            cause: None,
        });
        self.terminate(inner, CallState::Error).await;
    }

    /// Drive the session to a terminal state and clean up to idle
    ///
    /// Timers and the transcription stream are cancelled first, then the
    /// terminal transition happens. Summary generation may call the
    /// remote analysis service, so the rest of the teardown moves to a
    /// separate task that runs once the session lock is released: it
    /// closes the transport, emits `Summary` (when there is one), then
    /// `CallEnded`, then completes the cleanup transition to `Idle`.
    async fn terminate(self: &Arc<Self>, inner: &mut Inner, terminal: CallState) {
        let Some(mut call) = inner.call.take() else {
            return;
        };
        call.ended_at = Some(Utc::now());

        call.retry.cancel();
        self.stop_pipeline(&mut call).await;

        self.transition(inner, terminal);

        if let Some(task) = call.transport_task.take() {
            task.abort();
        }

        let stats = Self::snapshot(&call, terminal);
        let endpoint = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = call.transport.close().await {
                warn!("Failed to close media transport: {:#}", e);
            }

            if call.options.transcription && !call.transcript.is_empty() {
                let ended_at = call.ended_at.unwrap_or_else(Utc::now);
                match endpoint
                    .summarizer
                    .generate(
                        call.transcript.segments(),
                        &call.sentiment,
                        call.started_at,
                        ended_at,
                    )
                    .await
                {
                    Ok(Some(summary)) => endpoint.emit(CallEvent::Summary { summary }),
                    Ok(None) => {}
                    Err(e) => warn!("Summary generation failed: {:#}", e),
                }
            }

            endpoint.emit(CallEvent::CallEnded { stats });

            let mut inner = endpoint.inner.lock().await;
            endpoint.transition(&mut inner, CallState::Idle);
            info!("Call {} cleaned up", call.id);
        });
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Acquire capture tracks, falling back to audio-only when video fails
    async fn acquire_media(
        &self,
        options: &CallOptions,
    ) -> Result<(MediaConstraints, MediaStreamInfo)> {
        let wanted = MediaConstraints {
            audio: options.audio,
            video: options.video,
        };
        match self.media.acquire(wanted).await {
            Ok(stream) => Ok((wanted, stream)),
            Err(e) if wanted.video => {
                warn!(
                    "Media acquisition with video failed ({}), retrying audio only",
                    e
                );
                let fallback = MediaConstraints::audio_only();
                let stream = self
                    .media
                    .acquire(fallback)
                    .await
                    .context("Audio capture failed")?;
                Ok((fallback, stream))
            }
            Err(e) => Err(e.context("Audio capture failed")),
        }
    }

    fn new_active_call(
        &self,
        id: String,
        remote_user_id: &str,
        options: CallOptions,
        constraints: MediaConstraints,
        transport: Arc<dyn MediaTransport>,
    ) -> ActiveCall {
        ActiveCall {
            id,
            local: CallParticipant {
                id: self.config.user_id.clone(),
                name: self.config.display_name.clone(),
                avatar: self.config.avatar.clone(),
                audio_enabled: constraints.audio,
                video_enabled: constraints.video,
            },
            remote: CallParticipant::unknown(remote_user_id),
            options,
            started_at: Utc::now(),
            ended_at: None,
            transport,
            transport_epoch: 0,
            transport_task: None,
            transcript: TranscriptStore::new(),
            sentiment: Vec::new(),
            reconnect_attempts: 0,
            retry: RetrySlot::new(),
            suggestion_task: None,
            transcription_task: None,
            pipeline_running: false,
        }
    }

    fn snapshot(call: &ActiveCall, state: CallState) -> CallStats {
        let end = call.ended_at.unwrap_or_else(Utc::now);
        CallStats {
            call_id: call.id.clone(),
            state,
            started_at: call.started_at,
            ended_at: call.ended_at,
            duration_secs: (end - call.started_at).num_milliseconds() as f64 / 1000.0,
            transcript_segments: call.transcript.len(),
            sentiment_samples: call.sentiment.len(),
            reconnect_attempts: call.reconnect_attempts,
        }
    }
}
