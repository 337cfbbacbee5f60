//! Negotiation session
//!
//! One [`NegotiationSession`] exists per negotiation attempt. It owns the
//! peer connection and a worker task that runs connection steps strictly in
//! submission order. Every step reports exactly one [`StepCompletion`]
//! tagged with the session's generation.

use crate::media::{LocalTrack, RemoteTrack};
use crate::peer::{CandidateBuffer, PeerConnection};
use crate::signaling::{IceCandidate, SessionDescription};
use crate::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Connection step run by the session worker
#[derive(Debug, Clone)]
pub enum SessionOp {
    /// Attach `tracks`, create an offer and apply it locally
    Offer {
        /// Local tracks to attach
        tracks: Vec<LocalTrack>,
    },
    /// Attach `tracks`, apply `offer`, create an answer and apply it locally
    Answer {
        /// Local tracks to attach
        tracks: Vec<LocalTrack>,
        /// Remote offer
        offer: SessionDescription,
    },
    /// Apply the remote answer
    ApplyAnswer(SessionDescription),
    /// Add a remote ICE candidate
    AddCandidate(IceCandidate),
}

impl SessionOp {
    fn name(&self) -> &'static str {
        match self {
            SessionOp::Offer { .. } => "offer",
            SessionOp::Answer { .. } => "answer",
            SessionOp::ApplyAnswer(_) => "apply-answer",
            SessionOp::AddCandidate(_) => "add-candidate",
        }
    }
}

/// Successful result of a [`SessionOp`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Offer created and set as local description
    OfferCreated(SessionDescription),
    /// Remote offer applied, answer created and set as local description
    AnswerCreated(SessionDescription),
    /// Remote answer applied
    RemoteAnswerApplied,
    /// Remote candidate added
    CandidateApplied,
    /// Remote candidate refused by the connection; not fatal
    CandidateRejected(String),
}

/// Completion of one step, tagged with its session generation
#[derive(Debug)]
pub struct StepCompletion {
    /// Generation of the session that ran the step
    pub generation: u64,
    /// What happened
    pub outcome: Result<StepOutcome>,
}

/// A single negotiation attempt
pub struct NegotiationSession {
    generation: u64,
    connection_id: String,
    connection: Arc<dyn PeerConnection>,
    ops: mpsc::UnboundedSender<SessionOp>,
    worker: JoinHandle<()>,
    candidates: CandidateBuffer,
    remote_tracks: Vec<RemoteTrack>,
    local_description: Option<SessionDescription>,
    remote_description: Option<SessionDescription>,
}

impl NegotiationSession {
    /// Start a session around `connection`
    ///
    /// Step completions are sent to `completions`.
    pub fn open(
        generation: u64,
        connection: Arc<dyn PeerConnection>,
        completions: mpsc::UnboundedSender<StepCompletion>,
    ) -> Self {
        let connection_id = uuid::Uuid::new_v4().to_string();
        let (ops, ops_rx) = mpsc::unbounded_channel();

        info!(
            "Opening negotiation session {} (generation {})",
            connection_id, generation
        );

        let worker = tokio::spawn(run_worker(
            generation,
            Arc::clone(&connection),
            ops_rx,
            completions,
        ));

        Self {
            generation,
            connection_id,
            connection,
            ops,
            worker,
            candidates: CandidateBuffer::new(),
            remote_tracks: Vec::new(),
            local_description: None,
            remote_description: None,
        }
    }

    /// Generation of this session
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Unique ID of the underlying connection
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Queue a step; returns false when the worker is gone
    pub fn submit(&self, op: SessionOp) -> bool {
        debug!(
            "Session {} queueing {} step",
            self.generation,
            op.name()
        );
        self.ops.send(op).is_ok()
    }

    /// Offer a remote candidate; returned when it can be applied now
    pub fn accept_candidate(&mut self, candidate: IceCandidate) -> Option<IceCandidate> {
        self.candidates.accept(candidate)
    }

    /// Record that the remote description is applied; returns held candidates
    pub fn mark_remote_ready(&mut self) -> Vec<IceCandidate> {
        self.candidates.mark_remote_ready()
    }

    /// Number of remote candidates waiting for the remote description
    pub fn pending_candidates(&self) -> usize {
        self.candidates.pending()
    }

    /// Remember a remote track
    pub fn record_remote_track(&mut self, track: RemoteTrack) {
        if !self.remote_tracks.iter().any(|t| t.id == track.id) {
            self.remote_tracks.push(track);
        }
    }

    /// Remote tracks received so far
    pub fn remote_tracks(&self) -> &[RemoteTrack] {
        &self.remote_tracks
    }

    /// Remember the local description that was applied and published
    pub fn set_local_description(&mut self, description: SessionDescription) {
        self.local_description = Some(description);
    }

    /// Last applied local description
    pub fn local_description(&self) -> Option<&SessionDescription> {
        self.local_description.as_ref()
    }

    /// Remember the remote description being applied
    pub fn set_remote_description(&mut self, description: SessionDescription) {
        self.remote_description = Some(description);
    }

    /// Remote description being applied or applied
    pub fn remote_description(&self) -> Option<&SessionDescription> {
        self.remote_description.as_ref()
    }

    /// Stop accepting steps and close the connection
    ///
    /// Steps already queued still run and report, so their completions
    /// arrive tagged with this (now stale) generation.
    pub async fn close(self) -> Result<()> {
        info!(
            "Closing negotiation session {} (generation {})",
            self.connection_id, self.generation
        );

        let NegotiationSession {
            ops,
            worker,
            connection,
            ..
        } = self;
        drop(ops);
        drop(worker);

        connection.close().await
    }
}

impl std::fmt::Debug for NegotiationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NegotiationSession")
            .field("generation", &self.generation)
            .field("connection_id", &self.connection_id)
            .field("pending_candidates", &self.candidates.pending())
            .field("remote_tracks", &self.remote_tracks.len())
            .finish()
    }
}

async fn run_worker(
    generation: u64,
    connection: Arc<dyn PeerConnection>,
    mut ops: mpsc::UnboundedReceiver<SessionOp>,
    completions: mpsc::UnboundedSender<StepCompletion>,
) {
    while let Some(op) = ops.recv().await {
        let name = op.name();
        let outcome = execute(connection.as_ref(), op).await;

        if let Err(e) = &outcome {
            debug!("Generation {} {} step failed: {}", generation, name, e);
        }

        if completions
            .send(StepCompletion {
                generation,
                outcome,
            })
            .is_err()
        {
            break;
        }
    }

    debug!("Session worker for generation {} finished", generation);
}

async fn execute(connection: &dyn PeerConnection, op: SessionOp) -> Result<StepOutcome> {
    match op {
        SessionOp::Offer { tracks } => {
            for track in &tracks {
                connection.add_track(track).await?;
            }
            let offer = connection.create_offer().await?;
            connection.set_local_description(offer.clone()).await?;
            Ok(StepOutcome::OfferCreated(offer))
        }
        SessionOp::Answer { tracks, offer } => {
            for track in &tracks {
                connection.add_track(track).await?;
            }
            connection.set_remote_description(offer).await?;
            let answer = connection.create_answer().await?;
            connection.set_local_description(answer.clone()).await?;
            Ok(StepOutcome::AnswerCreated(answer))
        }
        SessionOp::ApplyAnswer(answer) => {
            connection.set_remote_description(answer).await?;
            Ok(StepOutcome::RemoteAnswerApplied)
        }
        SessionOp::AddCandidate(candidate) => {
            match connection.add_ice_candidate(candidate).await {
                Ok(()) => Ok(StepOutcome::CandidateApplied),
                Err(e) => {
                    warn!("Remote ICE candidate rejected: {}", e);
                    Ok(StepOutcome::CandidateRejected(e.to_string()))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;
    use crate::Error;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingConnection {
        calls: Mutex<Vec<String>>,
        fail_remote: bool,
    }

    impl RecordingConnection {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().push(call.into());
        }
    }

    #[async_trait]
    impl PeerConnection for RecordingConnection {
        async fn add_track(&self, track: &LocalTrack) -> Result<()> {
            self.record(format!("add_track:{}", track.kind()));
            Ok(())
        }

        async fn create_offer(&self) -> Result<SessionDescription> {
            self.record("create_offer");
            Ok(SessionDescription::offer("v=0 offer"))
        }

        async fn create_answer(&self) -> Result<SessionDescription> {
            self.record("create_answer");
            Ok(SessionDescription::answer("v=0 answer"))
        }

        async fn set_local_description(&self, _description: SessionDescription) -> Result<()> {
            self.record("set_local");
            Ok(())
        }

        async fn set_remote_description(&self, _description: SessionDescription) -> Result<()> {
            self.record("set_remote");
            if self.fail_remote {
                return Err(Error::WebRtc("bad sdp".to_string()));
            }
            Ok(())
        }

        async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
            self.record(format!("candidate:{}", candidate.candidate));
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            self.record("close");
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_offer_step_attaches_tracks_first() {
        let connection = Arc::new(RecordingConnection::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = NegotiationSession::open(3, connection.clone(), tx);

        let tracks = vec![
            LocalTrack::new(MediaKind::Audio, "local"),
            LocalTrack::new(MediaKind::Video, "local"),
        ];
        assert!(session.submit(SessionOp::Offer { tracks }));

        let completion = rx.recv().await.unwrap();
        assert_eq!(completion.generation, 3);
        assert!(matches!(
            completion.outcome,
            Ok(StepOutcome::OfferCreated(_))
        ));
        assert_eq!(
            connection.calls(),
            vec![
                "add_track:audio",
                "add_track:video",
                "create_offer",
                "set_local"
            ]
        );
    }

    #[tokio::test]
    async fn test_steps_run_in_submission_order() {
        let connection = Arc::new(RecordingConnection::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = NegotiationSession::open(1, connection.clone(), tx);

        session.submit(SessionOp::ApplyAnswer(SessionDescription::answer("a")));
        session.submit(SessionOp::AddCandidate(IceCandidate::new("c1")));
        session.submit(SessionOp::AddCandidate(IceCandidate::new("c2")));

        for _ in 0..3 {
            rx.recv().await.unwrap();
        }
        assert_eq!(
            connection.calls(),
            vec!["set_remote", "candidate:c1", "candidate:c2"]
        );
    }

    #[tokio::test]
    async fn test_failed_step_reports_error() {
        let connection = Arc::new(RecordingConnection {
            fail_remote: true,
            ..Default::default()
        });
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = NegotiationSession::open(2, connection.clone(), tx);

        session.submit(SessionOp::Answer {
            tracks: Vec::new(),
            offer: SessionDescription::offer("o"),
        });

        let completion = rx.recv().await.unwrap();
        assert_eq!(completion.generation, 2);
        assert!(completion.outcome.is_err());
        assert_eq!(connection.calls(), vec!["set_remote"]);
    }

    #[tokio::test]
    async fn test_close_lets_queued_steps_settle() {
        let connection = Arc::new(RecordingConnection::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = NegotiationSession::open(7, connection.clone(), tx);

        session.submit(SessionOp::AddCandidate(IceCandidate::new("late")));
        session.close().await.unwrap();

        let completion = rx.recv().await.unwrap();
        assert_eq!(completion.generation, 7);
        assert!(connection.calls().contains(&"close".to_string()));
    }

    #[tokio::test]
    async fn test_descriptions_and_candidates_tracked() {
        let connection = Arc::new(RecordingConnection::default());
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut session = NegotiationSession::open(4, connection, tx);

        assert_eq!(session.generation(), 4);
        assert!(!session.connection_id().is_empty());
        assert!(session.local_description().is_none());

        session.set_remote_description(SessionDescription::offer("o"));
        session.set_local_description(SessionDescription::answer("a"));
        assert_eq!(session.remote_description().map(|d| d.sdp.as_str()), Some("o"));
        assert_eq!(session.local_description().map(|d| d.sdp.as_str()), Some("a"));

        assert!(session.accept_candidate(IceCandidate::new("c1")).is_none());
        assert_eq!(session.pending_candidates(), 1);
        assert_eq!(session.mark_remote_ready().len(), 1);
        assert!(session.accept_candidate(IceCandidate::new("c2")).is_some());
    }

    #[tokio::test]
    async fn test_remote_tracks_deduplicated() {
        let connection = Arc::new(RecordingConnection::default());
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut session = NegotiationSession::open(1, connection, tx);

        let track = RemoteTrack {
            id: "t".to_string(),
            stream_id: "s".to_string(),
            kind: MediaKind::Audio,
        };
        session.record_remote_track(track.clone());
        session.record_remote_track(track);
        assert_eq!(session.remote_tracks().len(), 1);
    }
}
