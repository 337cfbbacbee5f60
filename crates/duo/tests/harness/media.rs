//! Media devices double

use async_trait::async_trait;
use parking_lot::Mutex;
use remotemedia_duo::{
    Error, LocalMedia, LocalTrack, MediaConstraints, MediaDevices, MediaErrorKind, MediaKind,
    Result,
};

/// Media devices that hand out sample tracks or fail on request
#[derive(Default)]
pub struct FakeMedia {
    failure: Mutex<Option<MediaErrorKind>>,
    held: Mutex<Option<LocalMedia>>,
    acquisitions: Mutex<usize>,
    releases: Mutex<usize>,
    enabled_calls: Mutex<Vec<(MediaKind, bool)>>,
}

impl FakeMedia {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next acquisitions fail with `kind` (None to succeed again)
    pub fn fail_with(&self, kind: Option<MediaErrorKind>) {
        *self.failure.lock() = kind;
    }

    pub fn acquisitions(&self) -> usize {
        *self.acquisitions.lock()
    }

    pub fn releases(&self) -> usize {
        *self.releases.lock()
    }

    /// Tracks currently held
    pub fn held(&self) -> Option<LocalMedia> {
        self.held.lock().clone()
    }

    /// `set_local_enabled` calls so far
    pub fn enabled_calls(&self) -> Vec<(MediaKind, bool)> {
        self.enabled_calls.lock().clone()
    }
}

#[async_trait]
impl MediaDevices for FakeMedia {
    async fn acquire_local_media(&self, constraints: &MediaConstraints) -> Result<LocalMedia> {
        *self.acquisitions.lock() += 1;

        if let Some(kind) = *self.failure.lock() {
            return Err(Error::media(kind, kind.user_message()));
        }

        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(LocalTrack::new(MediaKind::Audio, "fake"));
        }
        if constraints.video.is_some() {
            tracks.push(LocalTrack::new(MediaKind::Video, "fake"));
        }
        let media = LocalMedia::new(tracks);
        *self.held.lock() = Some(media.clone());
        Ok(media)
    }

    fn set_local_enabled(&self, kind: MediaKind, enabled: bool) {
        self.enabled_calls.lock().push((kind, enabled));
        if let Some(media) = self.held.lock().as_ref() {
            media.set_enabled(kind, enabled);
        }
    }

    async fn release_local_media(&self) {
        *self.releases.lock() += 1;
        if let Some(media) = self.held.lock().take() {
            media.stop();
        }
    }
}
