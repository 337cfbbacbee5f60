//! Local and remote track handles

use super::MediaKind;
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Local capture track shared with the peer connection
///
/// Cloning is cheap; all clones observe the same enabled/stopped flags.
/// A disabled track stays attached to the connection but drops samples,
/// so muting never requires a new offer/answer exchange.
#[derive(Clone)]
pub struct LocalTrack {
    /// Track identifier (also the RTP track id)
    id: String,

    /// Audio or video
    kind: MediaKind,

    /// Media stream the track belongs to
    stream_id: String,

    /// Whether samples are forwarded
    enabled: Arc<AtomicBool>,

    /// Set once the track has been released
    stopped: Arc<AtomicBool>,

    /// Underlying WebRTC track
    track: Arc<TrackLocalStaticSample>,
}

impl LocalTrack {
    /// Create a new enabled track of `kind` in `stream_id`
    pub fn new(kind: MediaKind, stream_id: impl Into<String>) -> Self {
        let id = format!("{}-{}", kind, uuid::Uuid::new_v4());
        let stream_id = stream_id.into();
        let capability = match kind {
            MediaKind::Audio => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
            MediaKind::Video => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                clock_rate: 90000,
                ..Default::default()
            },
        };
        let track = Arc::new(TrackLocalStaticSample::new(
            capability,
            id.clone(),
            stream_id.clone(),
        ));

        Self {
            id,
            kind,
            stream_id,
            enabled: Arc::new(AtomicBool::new(true)),
            stopped: Arc::new(AtomicBool::new(false)),
            track,
        }
    }

    /// Get the track ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the track kind
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Get the media stream ID
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Whether samples are currently forwarded
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Enable or disable the track
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Whether the track has been stopped
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Stop the track permanently
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            debug!("Stopped local {} track {}", self.kind, self.id);
        }
    }

    /// Get the underlying WebRTC track
    pub fn rtc_track(&self) -> Arc<TrackLocalStaticSample> {
        Arc::clone(&self.track)
    }

    /// Send one encoded media sample
    ///
    /// Samples written while the track is disabled are silently dropped.
    pub async fn write_sample(&self, sample: &Sample) -> Result<()> {
        if self.is_stopped() {
            return Err(Error::invalid_state(format!(
                "local track {} is stopped",
                self.id
            )));
        }
        if !self.is_enabled() {
            return Ok(());
        }

        self.track
            .write_sample(sample)
            .await
            .map_err(|e| Error::WebRtc(format!("Failed to write sample: {}", e)))
    }
}

impl std::fmt::Debug for LocalTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("stream_id", &self.stream_id)
            .field("enabled", &self.is_enabled())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Set of local tracks returned by the media collaborator
#[derive(Debug, Clone, Default)]
pub struct LocalMedia {
    tracks: Vec<LocalTrack>,
}

impl LocalMedia {
    /// Wrap a list of tracks
    pub fn new(tracks: Vec<LocalTrack>) -> Self {
        Self { tracks }
    }

    /// All tracks
    pub fn tracks(&self) -> &[LocalTrack] {
        &self.tracks
    }

    /// First track of `kind`, if any
    pub fn track(&self, kind: MediaKind) -> Option<&LocalTrack> {
        self.tracks.iter().find(|t| t.kind() == kind)
    }

    /// Enable or disable every track of `kind`
    pub fn set_enabled(&self, kind: MediaKind, enabled: bool) {
        for track in self.tracks.iter().filter(|t| t.kind() == kind) {
            track.set_enabled(enabled);
        }
    }

    /// Stop every track
    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    /// Number of tracks
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Whether there are no tracks
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Track received from the remote participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    /// Remote track ID
    pub id: String,
    /// Remote media stream ID
    pub stream_id: String,
    /// Audio or video
    pub kind: MediaKind,
}
