//! Call controller
//!
//! [`CallController`] is a single actor owning all negotiation state. It
//! consumes three inputs (presence-channel events, connection events and
//! results of its own asynchronous steps), runs each through the
//! [`transition`] table and executes the resulting effects. Nothing here is
//! shared across tasks; handlers take `&mut self`.

use crate::config::DuoConfig;
use crate::media::{LocalMedia, MediaDevices, MediaKind, RemoteTrack};
use crate::membership::{MemberRemoval, MembershipTracker, Role};
use crate::negotiation::{
    transition, Effect, NegotiationContext, NegotiationEvent, NegotiationSession,
    NegotiationState, SessionIntent, SessionOp, StepCompletion, StepOutcome,
};
use crate::peer::{
    ConnectionEvent, ConnectionEvents, PeerConnectionFactory, PeerConnectionState,
    TaggedConnectionEvent,
};
use crate::signaling::{
    IceCandidate, SdpKind, SessionDescription, SignalingMessage, SignalingTransport,
    TransportEvent,
};
use crate::{Error, ErrorCode, Result};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, error, info, warn};

/// Notification for UI observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    /// Local role assigned or changed
    RoleAssigned(Role),
    /// Negotiation state changed
    StateChanged {
        /// Previous state
        from: NegotiationState,
        /// New state
        to: NegotiationState,
    },
    /// Local capture is available
    LocalMediaReady,
    /// Local capture arrived after the live session was opened without it;
    /// the remote side receives no local media until the next negotiation
    LocalMediaNotSent,
    /// Remote media arrived and should be rendered
    RemoteTrackAdded(RemoteTrack),
    /// The session carrying remote media was torn down
    RemoteTracksEnded,
    /// Transport state of the live connection changed
    ConnectionStateChanged(PeerConnectionState),
    /// Joining was refused because the session is full
    SessionRejected {
        /// Members present when joining
        count: usize,
        /// Session capacity
        capacity: usize,
    },
    /// Something failed; the call may or may not continue
    Error {
        /// Error category
        code: ErrorCode,
        /// Human-readable detail
        message: String,
        /// Whether the failed operation may be attempted again
        retryable: bool,
    },
    /// The local user left; the controller is closed
    Left,
}

/// Read-only view of the controller for the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallSnapshot {
    /// Local role
    pub role: Role,
    /// Negotiation state
    pub state: NegotiationState,
    /// Members present, including the local one
    pub member_count: usize,
    /// Whether local capture is held
    pub has_local_media: bool,
    /// Local audio is muted
    pub local_audio_muted: bool,
    /// Local video is muted
    pub local_video_muted: bool,
    /// Remote tracks on the live session
    pub remote_tracks: usize,
    /// Generation of the live session, if any
    pub generation: Option<u64>,
}

enum Inbound {
    Transport(Option<TransportEvent>),
    Step(StepCompletion),
    Connection(TaggedConnectionEvent),
    Media(Result<LocalMedia>),
}

/// Two-party call controller
pub struct CallController {
    config: DuoConfig,
    transport: Arc<dyn SignalingTransport>,
    media: Arc<dyn MediaDevices>,
    factory: Arc<dyn PeerConnectionFactory>,

    membership: MembershipTracker,
    state: NegotiationState,
    session: Option<NegotiationSession>,
    generation: u64,
    local_media: Option<LocalMedia>,
    early_candidates: Vec<IceCandidate>,
    audio_enabled: bool,
    video_enabled: bool,

    joined: bool,
    transport_rx: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    completions_tx: mpsc::UnboundedSender<StepCompletion>,
    completions_rx: mpsc::UnboundedReceiver<StepCompletion>,
    connection_tx: mpsc::UnboundedSender<TaggedConnectionEvent>,
    connection_rx: mpsc::UnboundedReceiver<TaggedConnectionEvent>,
    media_tx: mpsc::UnboundedSender<Result<LocalMedia>>,
    media_rx: mpsc::UnboundedReceiver<Result<LocalMedia>>,
    in_flight: usize,

    observers: Vec<mpsc::UnboundedSender<CallEvent>>,
}

impl CallController {
    /// Create a controller
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when `config` does not validate.
    pub fn new(
        config: DuoConfig,
        transport: Arc<dyn SignalingTransport>,
        media: Arc<dyn MediaDevices>,
        factory: Arc<dyn PeerConnectionFactory>,
    ) -> Result<Self> {
        config.validate()?;

        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (connection_tx, connection_rx) = mpsc::unbounded_channel();
        let (media_tx, media_rx) = mpsc::unbounded_channel();

        Ok(Self {
            config,
            transport,
            media,
            factory,
            membership: MembershipTracker::new(),
            state: NegotiationState::Idle,
            session: None,
            generation: 0,
            local_media: None,
            early_candidates: Vec::new(),
            audio_enabled: true,
            video_enabled: true,
            joined: false,
            transport_rx: None,
            completions_tx,
            completions_rx,
            connection_tx,
            connection_rx,
            media_tx,
            media_rx,
            in_flight: 0,
            observers: Vec::new(),
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &DuoConfig {
        &self.config
    }

    /// Current negotiation state
    pub fn state(&self) -> NegotiationState {
        self.state
    }

    /// Current role
    pub fn role(&self) -> Role {
        self.membership.role()
    }

    /// Register an observer for [`CallEvent`]s
    pub fn subscribe_events(&mut self) -> mpsc::UnboundedReceiver<CallEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.push(tx);
        rx
    }

    /// Read-only view for rendering
    pub fn snapshot(&self) -> CallSnapshot {
        CallSnapshot {
            role: self.membership.role(),
            state: self.state,
            member_count: self.membership.member_count(),
            has_local_media: self.local_media.is_some(),
            local_audio_muted: !self.audio_enabled,
            local_video_muted: !self.video_enabled,
            remote_tracks: self
                .session
                .as_ref()
                .map(|s| s.remote_tracks().len())
                .unwrap_or(0),
            generation: self.session.as_ref().map(|s| s.generation()),
        }
    }

    /// Join the presence channel `session_name`
    ///
    /// Role assignment and media acquisition follow once the transport
    /// confirms the subscription.
    pub async fn join(&mut self, session_name: &str) -> Result<()> {
        if self.state.is_closed() {
            return Err(Error::invalid_state("controller is closed"));
        }
        if self.joined {
            return Err(Error::invalid_state("already joined"));
        }

        info!("Joining session {}", session_name);
        let rx = self.transport.subscribe(session_name).await?;
        self.transport_rx = Some(rx);
        self.joined = true;
        Ok(())
    }

    /// Join the configured default session
    pub async fn join_default(&mut self) -> Result<()> {
        let name = self.config.session_name.clone();
        self.join(&name).await
    }

    /// Leave the call
    ///
    /// Closes any live session, releases local capture and leaves the
    /// presence channel. Calling it again is a no-op.
    pub async fn leave(&mut self) -> Result<()> {
        if self.state.is_closed() {
            debug!("Leave called on closed controller");
            return Ok(());
        }
        info!("Leaving call");
        self.dispatch(NegotiationEvent::LocalLeave).await;
        Ok(())
    }

    /// Flip the local audio flag; returns whether audio is now enabled
    ///
    /// Local only: nothing is signaled to the other side.
    pub fn toggle_local_audio(&mut self) -> bool {
        if self.state.is_closed() {
            return self.audio_enabled;
        }
        self.audio_enabled = !self.audio_enabled;
        self.media
            .set_local_enabled(MediaKind::Audio, self.audio_enabled);
        debug!("Local audio enabled: {}", self.audio_enabled);
        self.audio_enabled
    }

    /// Flip the local video flag; returns whether video is now enabled
    pub fn toggle_local_video(&mut self) -> bool {
        if self.state.is_closed() {
            return self.video_enabled;
        }
        self.video_enabled = !self.video_enabled;
        self.media
            .set_local_enabled(MediaKind::Video, self.video_enabled);
        debug!("Local video enabled: {}", self.video_enabled);
        self.video_enabled
    }

    /// Start acquiring local capture
    ///
    /// The result is handled by [`process_pending`](Self::process_pending)
    /// or [`run`](Self::run). Called automatically once a role is assigned;
    /// call again to retry after a failure.
    pub fn acquire_local_media(&mut self) -> Result<()> {
        if self.state.is_closed() {
            return Err(Error::invalid_state("controller is closed"));
        }
        if self.local_media.is_some() {
            debug!("Local media already held");
            return Ok(());
        }

        let media = Arc::clone(&self.media);
        let constraints = self.config.media.clone();
        let tx = self.media_tx.clone();
        self.in_flight += 1;

        tokio::spawn(async move {
            let result = media.acquire_local_media(&constraints).await;
            let _ = tx.send(result);
        });
        Ok(())
    }

    /// Handle one presence-channel event
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityExceeded`] when the session was full; the
    /// controller has already left and closed by then.
    pub async fn handle_transport_event(&mut self, event: TransportEvent) -> Result<()> {
        if self.state.is_closed() {
            debug!("Ignoring transport event on closed controller: {:?}", event);
            return Ok(());
        }

        match event {
            TransportEvent::Subscribed { count } => match self.membership.on_subscribed(count) {
                Ok(role) => {
                    self.emit(CallEvent::RoleAssigned(role));
                    self.acquire_local_media()?;
                }
                Err(e) => {
                    if let Error::CapacityExceeded { count, capacity } = e {
                        self.emit(CallEvent::SessionRejected { count, capacity });
                    }
                    self.report(&e);
                    self.dispatch(NegotiationEvent::LocalLeave).await;
                    return Err(e);
                }
            },
            TransportEvent::MemberAdded { member } => self.membership.on_member_added(&member),
            TransportEvent::MemberRemoved { member } => {
                match self.membership.on_member_removed(&member) {
                    MemberRemoval::Counterpart => {
                        self.dispatch(NegotiationEvent::PeerDeparted).await;
                        let was_host = self.membership.role().is_host();
                        self.membership.promote();
                        if !was_host {
                            self.emit(CallEvent::RoleAssigned(self.membership.role()));
                        }
                    }
                    MemberRemoval::Overflow => {
                        debug!("Over-capacity member {} left; call unaffected", member);
                    }
                }
            }
            TransportEvent::Message(message) => {
                debug!("Received {}", message.name());
                let event = match message {
                    SignalingMessage::Ready => NegotiationEvent::ReadyReceived,
                    SignalingMessage::Offer(offer) => NegotiationEvent::OfferReceived(offer),
                    SignalingMessage::Answer(answer) => NegotiationEvent::AnswerReceived(answer),
                    SignalingMessage::IceCandidate(candidate) => {
                        NegotiationEvent::CandidateReceived(candidate)
                    }
                };
                self.dispatch(event).await;
            }
        }

        Ok(())
    }

    /// Handle everything that is ready, then wait for in-flight steps
    ///
    /// Returns once no input is queued and no step or acquisition is
    /// outstanding. Connection events raised later by a real backend are
    /// handled by the next call.
    pub async fn process_pending(&mut self) -> Result<()> {
        loop {
            let mut progressed = false;

            while let Ok(completion) = self.completions_rx.try_recv() {
                self.handle_inbound(Inbound::Step(completion)).await?;
                progressed = true;
            }
            while let Ok(event) = self.connection_rx.try_recv() {
                self.handle_inbound(Inbound::Connection(event)).await?;
                progressed = true;
            }
            while let Ok(result) = self.media_rx.try_recv() {
                self.handle_inbound(Inbound::Media(result)).await?;
                progressed = true;
            }
            loop {
                let next = match self.transport_rx.as_mut() {
                    Some(rx) => rx.try_recv(),
                    None => break,
                };
                match next {
                    Ok(event) => self.handle_inbound(Inbound::Transport(Some(event))).await?,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        self.handle_inbound(Inbound::Transport(None)).await?;
                    }
                }
                progressed = true;
            }

            if progressed {
                continue;
            }
            if self.in_flight == 0 {
                return Ok(());
            }

            let inbound = tokio::select! {
                Some(completion) = self.completions_rx.recv() => Inbound::Step(completion),
                Some(result) = self.media_rx.recv() => Inbound::Media(result),
                else => return Ok(()),
            };
            self.handle_inbound(inbound).await?;
        }
    }

    /// Drive the controller until it closes
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] when called before [`join`](Self::join)
    /// and [`Error::CapacityExceeded`] when the session was full.
    pub async fn run(&mut self) -> Result<()> {
        if !self.joined {
            return Err(Error::invalid_state("run called before join"));
        }

        while !self.state.is_closed() {
            let inbound = tokio::select! {
                event = next_transport_event(&mut self.transport_rx) => Inbound::Transport(event),
                Some(completion) = self.completions_rx.recv() => Inbound::Step(completion),
                Some(event) = self.connection_rx.recv() => Inbound::Connection(event),
                Some(result) = self.media_rx.recv() => Inbound::Media(result),
            };
            self.handle_inbound(inbound).await?;
        }

        info!("Call controller closed");
        Ok(())
    }

    async fn handle_inbound(&mut self, inbound: Inbound) -> Result<()> {
        match inbound {
            Inbound::Transport(Some(event)) => self.handle_transport_event(event).await?,
            Inbound::Transport(None) => {
                warn!("Presence channel closed");
                self.transport_rx = None;
                self.report(&Error::signaling("presence channel closed"));
                self.dispatch(NegotiationEvent::LocalLeave).await;
            }
            Inbound::Step(completion) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.handle_step_completion(completion).await;
            }
            Inbound::Connection(event) => self.handle_connection_event(event).await,
            Inbound::Media(result) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.handle_media_result(result).await;
            }
        }
        Ok(())
    }

    fn live_generation(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.generation())
    }

    fn check_generation(&self, generation: u64) -> Result<()> {
        match self.live_generation() {
            Some(current) if current == generation => Ok(()),
            current => Err(Error::StaleCompletion {
                generation,
                current: current.unwrap_or(0),
            }),
        }
    }

    async fn handle_step_completion(&mut self, completion: StepCompletion) {
        if let Err(e) = self.check_generation(completion.generation) {
            debug!("Discarding step result: {}", e);
            return;
        }

        let event = match completion.outcome {
            Ok(StepOutcome::OfferCreated(offer)) => NegotiationEvent::OfferCreated(offer),
            Ok(StepOutcome::AnswerCreated(answer)) => NegotiationEvent::AnswerCreated(answer),
            Ok(StepOutcome::RemoteAnswerApplied) => NegotiationEvent::RemoteAnswerApplied,
            Ok(StepOutcome::CandidateApplied) => return,
            Ok(StepOutcome::CandidateRejected(reason)) => {
                debug!("Candidate rejected on live session: {}", reason);
                return;
            }
            Err(e) => {
                error!(
                    "Negotiation step failed (generation {}): {}",
                    completion.generation, e
                );
                NegotiationEvent::StepFailed(e.to_string())
            }
        };

        self.dispatch(event).await;
    }

    async fn handle_connection_event(&mut self, tagged: TaggedConnectionEvent) {
        if let Err(e) = self.check_generation(tagged.generation) {
            debug!("Discarding connection event: {}", e);
            return;
        }

        match tagged.event {
            ConnectionEvent::LocalCandidate(candidate) => {
                self.publish(SignalingMessage::IceCandidate(candidate)).await;
            }
            ConnectionEvent::RemoteTrack(track) => {
                self.dispatch(NegotiationEvent::RemoteTrackAdded(track))
                    .await;
            }
            ConnectionEvent::StateChanged(state) => {
                if state == PeerConnectionState::Failed {
                    warn!("Peer connection {} failed", tagged.generation);
                } else {
                    debug!("Peer connection {} state: {:?}", tagged.generation, state);
                }
                self.emit(CallEvent::ConnectionStateChanged(state));
            }
        }
    }

    async fn handle_media_result(&mut self, result: Result<LocalMedia>) {
        match result {
            Ok(media) => {
                if self.state.is_closed() {
                    debug!("Local media arrived after leave; releasing it");
                    self.media.release_local_media().await;
                    return;
                }

                media.set_enabled(MediaKind::Audio, self.audio_enabled);
                media.set_enabled(MediaKind::Video, self.video_enabled);
                info!("Local media ready ({} track(s))", media.len());

                self.local_media = Some(media);
                self.emit(CallEvent::LocalMediaReady);
                if let Some(session) = self.session.as_ref() {
                    warn!(
                        "Local media arrived after session {} opened; not sent until renegotiation",
                        session.generation()
                    );
                    self.emit(CallEvent::LocalMediaNotSent);
                }
                self.dispatch(NegotiationEvent::LocalMediaReady).await;
            }
            Err(e) => {
                error!("Local media acquisition failed: {}", e);
                self.report(&e);
            }
        }
    }

    /// Run one event through the table and execute its effects
    async fn dispatch(&mut self, event: NegotiationEvent) {
        let context = NegotiationContext {
            role: self.membership.role(),
            has_local_media: self.local_media.is_some(),
        };
        let result = transition(self.state, &context, &event);

        if let Some(reason) = result.ignored {
            debug!(
                "Ignoring {} in state {}: {}",
                event.name(),
                self.state,
                reason
            );
            return;
        }

        self.set_state(result.next);

        for effect in result.effects {
            self.apply(effect).await;
        }
    }

    fn set_state(&mut self, next: NegotiationState) {
        let previous = self.state;
        if previous != next {
            info!("Negotiation state: {} -> {}", previous, next);
            self.state = next;
            self.emit(CallEvent::StateChanged {
                from: previous,
                to: next,
            });
        }
    }

    async fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::PublishReady => {
                self.publish(SignalingMessage::Ready).await;
            }
            Effect::OpenSession(intent) => self.open_session(intent).await,
            Effect::ApplyRemoteAnswer(answer) => {
                if let Some(session) = self.session.as_mut() {
                    session.set_remote_description(answer.clone());
                }
                self.submit(SessionOp::ApplyAnswer(answer));
            }
            Effect::AcceptCandidate(candidate) => {
                let ready = match self.session.as_mut() {
                    Some(session) => session.accept_candidate(candidate),
                    None => {
                        debug!("Holding remote candidate until a session opens");
                        self.early_candidates.push(candidate);
                        None
                    }
                };
                if let Some(candidate) = ready {
                    self.submit(SessionOp::AddCandidate(candidate));
                }
            }
            Effect::FlushCandidates => {
                let released = self
                    .session
                    .as_mut()
                    .map(|s| s.mark_remote_ready())
                    .unwrap_or_default();
                if !released.is_empty() {
                    debug!("Releasing {} buffered candidate(s)", released.len());
                }
                for candidate in released {
                    self.submit(SessionOp::AddCandidate(candidate));
                }
            }
            Effect::PublishLocalDescription(description) => {
                if let Some(session) = self.session.as_mut() {
                    session.set_local_description(description.clone());
                }
                self.publish(local_description_message(description)).await;
            }
            Effect::RecordRemoteTrack(track) => {
                info!("Remote {} track {} added", track.kind, track.id);
                if let Some(session) = self.session.as_mut() {
                    session.record_remote_track(track.clone());
                }
                self.emit(CallEvent::RemoteTrackAdded(track));
            }
            Effect::Teardown {
                release_local_media,
            } => {
                self.teardown_session().await;
                self.early_candidates.clear();
                if release_local_media && self.local_media.take().is_some() {
                    self.media.release_local_media().await;
                    info!("Local media released");
                }
            }
            Effect::NotifyDeparture => {
                if self.joined {
                    if let Err(e) = self.transport.unsubscribe().await {
                        warn!("Failed to leave presence channel: {}", e);
                        self.report(&e);
                    }
                    self.joined = false;
                    self.transport_rx = None;
                }
                self.emit(CallEvent::Left);
            }
            Effect::Report(reason) => {
                self.report(&Error::negotiation(reason));
            }
        }
    }

    async fn open_session(&mut self, intent: SessionIntent) {
        if self.session.is_some() {
            warn!("Replacing a live session");
            self.teardown_session().await;
        }

        self.generation += 1;
        let generation = self.generation;
        let events = ConnectionEvents::new(generation, self.connection_tx.clone());

        let connection = match self.factory.create(&self.config.ice_servers, events).await {
            Ok(connection) => connection,
            Err(e) => {
                error!("Failed to create peer connection: {}", e);
                let rest = NegotiationContext {
                    role: self.membership.role(),
                    has_local_media: self.local_media.is_some(),
                }
                .rest_state();
                self.set_state(rest);
                self.report(&Error::negotiation(format!(
                    "failed to create peer connection: {}",
                    e
                )));
                return;
            }
        };

        let mut session =
            NegotiationSession::open(generation, connection, self.completions_tx.clone());
        for candidate in self.early_candidates.drain(..) {
            let _ = session.accept_candidate(candidate);
        }

        let tracks = self
            .local_media
            .as_ref()
            .map(|m| m.tracks().to_vec())
            .unwrap_or_default();

        let op = match intent {
            SessionIntent::Offering => SessionOp::Offer { tracks },
            SessionIntent::Answering(offer) => {
                session.set_remote_description(offer.clone());
                SessionOp::Answer { tracks, offer }
            }
        };

        debug!(
            "Session {} starts with {} local track(s)",
            session.connection_id(),
            op_tracks(&op)
        );
        self.session = Some(session);
        self.submit(op);
    }

    async fn teardown_session(&mut self) {
        if let Some(session) = self.session.take() {
            let had_remote = !session.remote_tracks().is_empty();
            if let Err(e) = session.close().await {
                warn!("Error closing peer connection: {}", e);
            }
            if had_remote {
                self.emit(CallEvent::RemoteTracksEnded);
            }
        }
    }

    fn submit(&mut self, op: SessionOp) {
        let Some(session) = self.session.as_ref() else {
            debug!("No live session; step dropped");
            return;
        };
        if session.submit(op) {
            self.in_flight += 1;
        } else {
            warn!("Session worker gone; step dropped");
        }
    }

    async fn publish(&mut self, message: SignalingMessage) {
        if !self.joined {
            debug!("Not joined; {} not published", message.name());
            return;
        }
        let name = message.name();
        match self.transport.publish(message).await {
            Ok(()) => debug!("Published {}", name),
            Err(e) => {
                warn!("Failed to publish {}: {}", name, e);
                self.report(&e);
            }
        }
    }

    fn report(&mut self, err: &Error) {
        self.emit(CallEvent::Error {
            code: err.code(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        });
    }

    fn emit(&mut self, event: CallEvent) {
        self.observers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl std::fmt::Debug for CallController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallController")
            .field("role", &self.membership.role())
            .field("state", &self.state)
            .field("session", &self.session)
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

fn op_tracks(op: &SessionOp) -> usize {
    match op {
        SessionOp::Offer { tracks } | SessionOp::Answer { tracks, .. } => tracks.len(),
        SessionOp::ApplyAnswer(_) | SessionOp::AddCandidate(_) => 0,
    }
}

fn local_description_message(description: SessionDescription) -> SignalingMessage {
    match description.kind {
        SdpKind::Offer => SignalingMessage::Offer(description),
        SdpKind::Answer => SignalingMessage::Answer(description),
    }
}

async fn next_transport_event(
    rx: &mut Option<mpsc::UnboundedReceiver<TransportEvent>>,
) -> Option<TransportEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
