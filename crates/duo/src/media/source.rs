//! Sample-fed media source
//!
//! Hands out WebRTC sample tracks that the application feeds with encoded
//! frames (Opus audio, VP8 video) through [`LocalTrack::write_sample`].

use super::{LocalMedia, LocalTrack, MediaConstraints, MediaDevices, MediaErrorKind, MediaKind};
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

/// Stream ID used for locally produced tracks
pub const LOCAL_STREAM_ID: &str = "duo-local";

/// [`MediaDevices`] implementation backed by sample tracks
///
/// Acquisition is idempotent: while media is held, repeated calls return
/// the same tracks.
#[derive(Default)]
pub struct SampleMediaSource {
    /// Currently held tracks
    media: Mutex<Option<LocalMedia>>,
}

impl SampleMediaSource {
    /// Create a new source with no tracks acquired
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently held tracks, if any
    pub fn current(&self) -> Option<LocalMedia> {
        self.media.lock().clone()
    }
}

#[async_trait]
impl MediaDevices for SampleMediaSource {
    async fn acquire_local_media(&self, constraints: &MediaConstraints) -> Result<LocalMedia> {
        let mut media = self.media.lock();
        if let Some(existing) = media.as_ref() {
            return Ok(existing.clone());
        }

        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(LocalTrack::new(MediaKind::Audio, LOCAL_STREAM_ID));
        }
        if let Some(video) = constraints.video {
            debug!(
                "Creating local video track ({}x{})",
                video.width, video.height
            );
            tracks.push(LocalTrack::new(MediaKind::Video, LOCAL_STREAM_ID));
        }
        if tracks.is_empty() {
            return Err(Error::media(
                MediaErrorKind::DeviceNotFound,
                "constraints requested neither audio nor video",
            ));
        }

        info!("Acquired {} local track(s)", tracks.len());
        let acquired = LocalMedia::new(tracks);
        *media = Some(acquired.clone());
        Ok(acquired)
    }

    fn set_local_enabled(&self, kind: MediaKind, enabled: bool) {
        if let Some(media) = self.media.lock().as_ref() {
            media.set_enabled(kind, enabled);
        }
    }

    async fn release_local_media(&self) {
        if let Some(media) = self.media.lock().take() {
            info!("Releasing {} local track(s)", media.len());
            media.stop();
        }
    }
}
