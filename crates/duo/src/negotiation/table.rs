//! State × event transition table
//!
//! [`transition`] has no side effects: it decides the next state and which
//! [`Effect`]s the controller must run. Events that do not apply in the
//! current state are ignored with a reason, which is how role filtering and
//! glare avoidance are expressed.

use super::state::{NegotiationPhase, NegotiationState};
use crate::media::RemoteTrack;
use crate::membership::Role;
use crate::signaling::{IceCandidate, SessionDescription};

/// Facts about the controller the table needs besides the state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiationContext {
    /// Local role
    pub role: Role,
    /// Whether local media is held
    pub has_local_media: bool,
}

impl NegotiationContext {
    /// State to fall back to after a failed or abandoned session
    pub fn rest_state(&self) -> NegotiationState {
        if self.has_local_media {
            NegotiationState::LocalMediaReady
        } else {
            NegotiationState::Idle
        }
    }
}

/// Input to the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationEvent {
    /// Local capture finished
    LocalMediaReady,
    /// `client-ready` from the other side
    ReadyReceived,
    /// `client-offer` from the other side
    OfferReceived(SessionDescription),
    /// `client-answer` from the other side
    AnswerReceived(SessionDescription),
    /// `client-ice-candidate` from the other side
    CandidateReceived(IceCandidate),
    /// Worker produced and applied the local offer
    OfferCreated(SessionDescription),
    /// Worker applied the remote offer, produced and applied the answer
    AnswerCreated(SessionDescription),
    /// Worker applied the remote answer
    RemoteAnswerApplied,
    /// Remote media attached to the connection
    RemoteTrackAdded(RemoteTrack),
    /// A worker step failed
    StepFailed(String),
    /// The counterpart left the presence channel
    PeerDeparted,
    /// The local user leaves
    LocalLeave,
}

impl NegotiationEvent {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            NegotiationEvent::LocalMediaReady => "local-media-ready",
            NegotiationEvent::ReadyReceived => "ready-received",
            NegotiationEvent::OfferReceived(_) => "offer-received",
            NegotiationEvent::AnswerReceived(_) => "answer-received",
            NegotiationEvent::CandidateReceived(_) => "candidate-received",
            NegotiationEvent::OfferCreated(_) => "offer-created",
            NegotiationEvent::AnswerCreated(_) => "answer-created",
            NegotiationEvent::RemoteAnswerApplied => "remote-answer-applied",
            NegotiationEvent::RemoteTrackAdded(_) => "remote-track-added",
            NegotiationEvent::StepFailed(_) => "step-failed",
            NegotiationEvent::PeerDeparted => "peer-departed",
            NegotiationEvent::LocalLeave => "local-leave",
        }
    }
}

/// How a new session starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionIntent {
    /// Attach local tracks, create and apply an offer
    Offering,
    /// Attach local tracks, apply `offer`, create and apply an answer
    Answering(SessionDescription),
}

/// Side effect requested by the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Publish `client-ready`
    PublishReady,
    /// Bump the generation, create a connection and start the first step
    OpenSession(SessionIntent),
    /// Queue applying the remote answer
    ApplyRemoteAnswer(SessionDescription),
    /// Apply a remote candidate, or buffer it until the remote description is set
    AcceptCandidate(IceCandidate),
    /// Remote description is applied; release buffered candidates in order
    FlushCandidates,
    /// Remember the local description and publish it as offer or answer
    PublishLocalDescription(SessionDescription),
    /// Remember a remote track and surface it to the UI
    RecordRemoteTrack(RemoteTrack),
    /// Close the session's connection and drop it
    Teardown {
        /// Also stop and release local capture
        release_local_media: bool,
    },
    /// Leave the presence channel
    NotifyDeparture,
    /// Surface a negotiation failure to observers
    Report(String),
}

/// Result of one table lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// State after the event
    pub next: NegotiationState,
    /// Effects to run, in order
    pub effects: Vec<Effect>,
    /// Set when the event does not apply in the current state
    pub ignored: Option<&'static str>,
}

impl Transition {
    fn to(next: NegotiationState, effects: Vec<Effect>) -> Self {
        Self {
            next,
            effects,
            ignored: None,
        }
    }

    fn ignore(state: NegotiationState, reason: &'static str) -> Self {
        Self {
            next: state,
            effects: Vec::new(),
            ignored: Some(reason),
        }
    }

    /// Whether the event was ignored
    pub fn is_ignored(&self) -> bool {
        self.ignored.is_some()
    }
}

/// Look up the transition for `event` in `state`
pub fn transition(
    state: NegotiationState,
    context: &NegotiationContext,
    event: &NegotiationEvent,
) -> Transition {
    use NegotiationEvent as Ev;
    use NegotiationPhase::{Answering, Offering};
    use NegotiationState as St;

    if state == St::Closed {
        return Transition::ignore(state, "controller is closed");
    }

    let host = context.role.is_host();

    match event {
        Ev::LocalLeave => Transition::to(
            St::Closed,
            vec![
                Effect::Teardown {
                    release_local_media: true,
                },
                Effect::NotifyDeparture,
            ],
        ),

        Ev::PeerDeparted => match state {
            St::Idle => Transition::ignore(state, "no counterpart state to drop"),
            _ => Transition::to(
                St::Idle,
                vec![Effect::Teardown {
                    release_local_media: false,
                }],
            ),
        },

        Ev::LocalMediaReady => match state {
            St::Idle if host => Transition::to(St::LocalMediaReady, Vec::new()),
            St::Idle => Transition::to(St::LocalMediaReady, vec![Effect::PublishReady]),
            _ => Transition::ignore(state, "local media arrived after negotiation started"),
        },

        Ev::ReadyReceived => match state {
            _ if !host => Transition::ignore(state, "ready is only handled by the host"),
            St::Idle | St::LocalMediaReady => Transition::to(
                St::Negotiating(Offering),
                vec![Effect::OpenSession(SessionIntent::Offering)],
            ),
            _ => Transition::ignore(state, "negotiation already in progress"),
        },

        Ev::OfferReceived(offer) => match state {
            _ if host => Transition::ignore(state, "offers are only handled by the peer"),
            St::LocalMediaReady => Transition::to(
                St::Negotiating(Answering),
                vec![Effect::OpenSession(SessionIntent::Answering(offer.clone()))],
            ),
            St::Idle => Transition::ignore(state, "offer received before local media is ready"),
            _ => Transition::ignore(state, "negotiation already in progress"),
        },

        Ev::AnswerReceived(answer) => match state {
            St::Negotiating(Offering) if host => Transition::to(
                St::Connected,
                vec![Effect::ApplyRemoteAnswer(answer.clone())],
            ),
            _ => Transition::ignore(state, "no outstanding offer"),
        },

        Ev::CandidateReceived(candidate) => {
            if state.accepts_candidates() {
                Transition::to(state, vec![Effect::AcceptCandidate(candidate.clone())])
            } else {
                Transition::ignore(state, "no negotiation to attach the candidate to")
            }
        }

        Ev::OfferCreated(offer) => match state {
            St::Negotiating(Offering) => Transition::to(
                state,
                vec![Effect::PublishLocalDescription(offer.clone())],
            ),
            _ => Transition::ignore(state, "offer no longer wanted"),
        },

        Ev::AnswerCreated(answer) => match state {
            St::Negotiating(Answering) | St::Connected if !host => Transition::to(
                state,
                vec![
                    Effect::FlushCandidates,
                    Effect::PublishLocalDescription(answer.clone()),
                ],
            ),
            _ => Transition::ignore(state, "answer no longer wanted"),
        },

        Ev::RemoteAnswerApplied => match state {
            St::Connected | St::Negotiating(Offering) => {
                Transition::to(state, vec![Effect::FlushCandidates])
            }
            _ => Transition::ignore(state, "no answer was being applied"),
        },

        Ev::RemoteTrackAdded(track) => match state {
            St::Negotiating(_) | St::Connected => Transition::to(
                St::Connected,
                vec![Effect::RecordRemoteTrack(track.clone())],
            ),
            _ => Transition::ignore(state, "remote track without a session"),
        },

        Ev::StepFailed(reason) => match state {
            St::Negotiating(_) | St::Connected => Transition::to(
                context.rest_state(),
                vec![
                    Effect::Teardown {
                        release_local_media: false,
                    },
                    Effect::Report(reason.clone()),
                ],
            ),
            _ => Transition::ignore(state, "step failure without a session"),
        },
    }
}
