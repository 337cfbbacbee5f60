//! Local and remote media handles
//!
//! Capturing and rendering audio/video is the job of a media collaborator
//! implementing [`MediaDevices`]. The negotiation core only references the
//! tracks it gets back and toggles them on and off.

pub mod source;
pub mod tracks;

pub use source::SampleMediaSource;
pub use tracks::{LocalMedia, LocalTrack, RemoteTrack};

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a media track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Microphone / audio
    Audio,
    /// Camera / video
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// Video capture constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoConstraints {
    /// Requested frame width in pixels
    pub width: u32,
    /// Requested frame height in pixels
    pub height: u32,
}

/// Constraints passed to [`MediaDevices::acquire_local_media`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConstraints {
    /// Capture audio (default: true)
    pub audio: bool,

    /// Capture video with these constraints (default: 1280x720)
    pub video: Option<VideoConstraints>,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: Some(VideoConstraints {
                width: 1280,
                height: 720,
            }),
        }
    }
}

/// Why local media could not be acquired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaErrorKind {
    /// The user or platform refused camera/microphone access
    PermissionDenied,
    /// No camera or microphone present
    DeviceNotFound,
    /// Device already in use by another application
    DeviceBusy,
    /// Any other failure
    Unknown,
}

impl MediaErrorKind {
    /// Classify a platform media error name (`NotAllowedError`, `NotFoundError`, ...)
    pub fn from_error_name(name: &str) -> Self {
        match name {
            "NotAllowedError" | "PermissionDeniedError" | "SecurityError" => {
                MediaErrorKind::PermissionDenied
            }
            "NotFoundError" | "DevicesNotFoundError" | "OverconstrainedError" => {
                MediaErrorKind::DeviceNotFound
            }
            "NotReadableError" | "TrackStartError" | "AbortError" => MediaErrorKind::DeviceBusy,
            _ => MediaErrorKind::Unknown,
        }
    }

    /// Message suitable for showing to the user
    pub fn user_message(&self) -> &'static str {
        match self {
            MediaErrorKind::PermissionDenied => {
                "Permission to access camera and microphone was denied. Please allow access."
            }
            MediaErrorKind::DeviceNotFound => {
                "No camera or microphone found. Please connect a camera and microphone."
            }
            MediaErrorKind::DeviceBusy => {
                "Camera or microphone is already in use by another application."
            }
            MediaErrorKind::Unknown => {
                "An error occurred while accessing media devices. Please check your settings and try again."
            }
        }
    }
}

impl fmt::Display for MediaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MediaErrorKind::PermissionDenied => "permission denied",
            MediaErrorKind::DeviceNotFound => "device not found",
            MediaErrorKind::DeviceBusy => "device busy",
            MediaErrorKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Media collaborator contract
///
/// Implementations own the capture devices. The tracks handed out by
/// `acquire_local_media` are shared by reference with the peer connection.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Open camera/microphone according to `constraints`
    ///
    /// Fails with [`Error::MediaAcquisition`](crate::Error::MediaAcquisition).
    async fn acquire_local_media(&self, constraints: &MediaConstraints) -> Result<LocalMedia>;

    /// Enable or disable every local track of `kind` without renegotiation
    fn set_local_enabled(&self, kind: MediaKind, enabled: bool);

    /// Stop all local tracks and release the devices
    async fn release_local_media(&self);
}
