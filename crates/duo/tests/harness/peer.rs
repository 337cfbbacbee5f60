//! Peer connection doubles

use async_trait::async_trait;
use parking_lot::Mutex;
use remotemedia_duo::peer::{ConnectionEvent, ConnectionEvents};
use remotemedia_duo::signaling::SdpKind;
use remotemedia_duo::{
    Error, IceCandidate, IceServerConfig, LocalTrack, MediaKind, PeerConnection,
    PeerConnectionFactory, RemoteTrack, Result, SessionDescription,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Connection that logs its calls
///
/// Setting a local description gathers one local candidate; setting a
/// remote description attaches one remote video track. Remote candidates
/// are refused until a remote description is set.
pub struct MockConnection {
    id: usize,
    events: ConnectionEvents,
    log: Mutex<Vec<String>>,
    remote_set: AtomicBool,
    closed: AtomicBool,
    fail_remote: bool,
    live: Arc<AtomicUsize>,
}

impl MockConnection {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn generation(&self) -> u64 {
        self.events.generation()
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn record(&self, entry: impl Into<String>) {
        self.log.lock().push(entry.into());
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::WebRtc("connection closed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PeerConnection for MockConnection {
    async fn add_track(&self, track: &LocalTrack) -> Result<()> {
        self.ensure_open()?;
        self.record(format!("add_track:{}", track.kind()));
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        self.ensure_open()?;
        self.record("create_offer");
        Ok(SessionDescription::offer(format!("v=0 mock-offer-{}", self.id)))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.ensure_open()?;
        if !self.remote_set.load(Ordering::SeqCst) {
            return Err(Error::WebRtc("no remote offer".to_string()));
        }
        self.record("create_answer");
        Ok(SessionDescription::answer(format!("v=0 mock-answer-{}", self.id)))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        self.ensure_open()?;
        self.record(format!("set_local:{}", kind_name(description.kind)));
        let mut candidate = IceCandidate::new(format!(
            "candidate:{} 1 udp 2122260223 10.0.0.{} 5000{} typ host",
            self.id, self.id, self.id
        ));
        candidate.sdp_mid = Some("0".to_string());
        candidate.sdp_mline_index = Some(0);
        self.events.emit(ConnectionEvent::LocalCandidate(candidate));
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        self.ensure_open()?;
        self.record(format!("set_remote:{}", kind_name(description.kind)));
        if self.fail_remote {
            return Err(Error::WebRtc("failed to parse remote description".to_string()));
        }
        self.remote_set.store(true, Ordering::SeqCst);
        self.events.emit(ConnectionEvent::RemoteTrack(RemoteTrack {
            id: format!("remote-video-{}", self.id),
            stream_id: "remote".to_string(),
            kind: MediaKind::Video,
        }));
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.ensure_open()?;
        if !self.remote_set.load(Ordering::SeqCst) {
            self.record("early_candidate");
            return Err(Error::WebRtc("remote description not set".to_string()));
        }
        self.record(format!("candidate:{}", candidate.candidate));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.live.fetch_sub(1, Ordering::SeqCst);
            self.record("close");
        }
        Ok(())
    }
}

fn kind_name(kind: SdpKind) -> &'static str {
    match kind {
        SdpKind::Offer => "offer",
        SdpKind::Answer => "answer",
    }
}

/// Factory counting created and live connections
#[derive(Default)]
pub struct MockConnectionFactory {
    connections: Mutex<Vec<Arc<MockConnection>>>,
    live: Arc<AtomicUsize>,
    fail_create: AtomicBool,
    fail_remote: AtomicBool,
}

impl MockConnectionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse to create connections
    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Make new connections reject remote descriptions
    pub fn fail_remote(&self, fail: bool) {
        self.fail_remote.store(fail, Ordering::SeqCst);
    }

    /// Connections created so far
    pub fn created(&self) -> usize {
        self.connections.lock().len()
    }

    /// Connections created and not closed
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Most recently created connection
    pub fn last(&self) -> Option<Arc<MockConnection>> {
        self.connections.lock().last().cloned()
    }

    /// All connections in creation order
    pub fn connections(&self) -> Vec<Arc<MockConnection>> {
        self.connections.lock().clone()
    }
}

#[async_trait]
impl PeerConnectionFactory for MockConnectionFactory {
    async fn create(
        &self,
        _ice_servers: &[IceServerConfig],
        events: ConnectionEvents,
    ) -> Result<Arc<dyn PeerConnection>> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Error::WebRtc("connection construction refused".to_string()));
        }

        let mut connections = self.connections.lock();
        let connection = Arc::new(MockConnection {
            id: connections.len() + 1,
            events,
            log: Mutex::new(Vec::new()),
            remote_set: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            fail_remote: self.fail_remote.load(Ordering::SeqCst),
            live: Arc::clone(&self.live),
        });
        connections.push(Arc::clone(&connection));
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(connection)
    }
}
