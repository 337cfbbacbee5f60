//! Configuration types for two-party calls

use crate::media::MediaConstraints;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default presence channel shared by both participants
pub const DEFAULT_SESSION_NAME: &str = "presence-room";

/// Main configuration for a [`CallController`](crate::CallController)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DuoConfig {
    /// Presence channel name used when `join` is called without a name
    pub session_name: String,

    /// STUN/TURN servers handed to every peer connection
    pub ice_servers: Vec<IceServerConfig>,

    /// Constraints passed to the media collaborator on acquisition
    pub media: MediaConstraints,
}

/// ICE server configuration (STUN or TURN)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    /// Server URLs (stun:, stuns:, turn: or turns:)
    pub urls: Vec<String>,

    /// Username for TURN authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Credential for TURN authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServerConfig {
    /// Create a STUN server entry
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }

    /// Create a TURN server entry with credentials
    pub fn turn(
        url: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            urls: vec![url.into()],
            username: Some(username.into()),
            credential: Some(credential.into()),
        }
    }

    fn is_turn(&self) -> bool {
        self.urls
            .iter()
            .any(|url| url.starts_with("turn:") || url.starts_with("turns:"))
    }
}

impl Default for DuoConfig {
    fn default() -> Self {
        Self {
            session_name: DEFAULT_SESSION_NAME.to_string(),
            ice_servers: vec![
                IceServerConfig::stun("stun:openrelay.metered.ca:80"),
                IceServerConfig::stun("stun:stun.l.google.com:19302"),
                IceServerConfig::stun("stun:stun2.l.google.com:19302"),
            ],
            media: MediaConstraints::default(),
        }
    }
}

impl DuoConfig {
    /// Parse a configuration from JSON, filling missing fields with defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `session_name` is empty
    /// - an ICE server has no URLs or an unknown URL scheme
    /// - a TURN server lacks username or credential
    /// - media constraints request neither audio nor video
    pub fn validate(&self) -> Result<()> {
        if self.session_name.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "session_name must not be empty".to_string(),
            ));
        }

        for server in &self.ice_servers {
            if server.urls.is_empty() {
                return Err(Error::InvalidConfig(
                    "ICE server entry has no URLs".to_string(),
                ));
            }

            for url in &server.urls {
                let known = ["stun:", "stuns:", "turn:", "turns:"]
                    .iter()
                    .any(|scheme| url.starts_with(scheme));
                if !known {
                    return Err(Error::InvalidConfig(format!(
                        "ICE server URL must start with stun:, stuns:, turn: or turns:, got {}",
                        url
                    )));
                }
            }

            if server.is_turn() && (server.username.is_none() || server.credential.is_none()) {
                return Err(Error::InvalidConfig(format!(
                    "TURN server {:?} requires username and credential",
                    server.urls
                )));
            }
        }

        if !self.media.audio && self.media.video.is_none() {
            return Err(Error::InvalidConfig(
                "media constraints must request audio, video or both".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DuoConfig::default();
        tokio_test::assert_ok!(config.validate());
        assert_eq!(config.session_name, "presence-room");
        assert_eq!(config.ice_servers.len(), 3);
    }

    #[test]
    fn test_empty_session_name_fails() {
        let mut config = DuoConfig::default();
        config.session_name = "  ".to_string();
        tokio_test::assert_err!(config.validate());
    }

    #[test]
    fn test_unknown_ice_scheme_fails() {
        let mut config = DuoConfig::default();
        config
            .ice_servers
            .push(IceServerConfig::stun("http://stun.example.com"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_turn_requires_credentials() {
        let mut config = DuoConfig::default();
        config.ice_servers.push(IceServerConfig {
            urls: vec!["turn:turn.example.com:3478".to_string()],
            username: Some("user".to_string()),
            credential: None,
        });
        assert!(config.validate().is_err());

        config.ice_servers.pop();
        config.ice_servers.push(IceServerConfig::turn(
            "turn:turn.example.com:3478",
            "user",
            "secret",
        ));
        tokio_test::assert_ok!(config.validate());
    }

    #[test]
    fn test_no_audio_no_video_fails() {
        let mut config = DuoConfig::default();
        config.media.audio = false;
        config.media.video = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            DuoConfig::from_json(r#"{"ice_servers": [{"urls": ["stun:stun.example.org:3478"]}]}"#)
                .unwrap();
        assert_eq!(config.session_name, DEFAULT_SESSION_NAME);
        assert_eq!(config.ice_servers.len(), 1);
        assert!(config.media.audio);
    }
}
