use crate::{PlayerError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default output width in characters
pub const DEFAULT_WIDTH: u32 = 80;

/// Frame rate used when the source does not report one
pub const DEFAULT_FALLBACK_FPS: u32 = 30;

/// Time given to the audio device to reach a steady playing state
pub const DEFAULT_AUDIO_GRACE: Duration = Duration::from_millis(500);

/// How often the audio worker checks for completion or cancellation
pub const DEFAULT_AUDIO_POLL: Duration = Duration::from_millis(100);

/// Settings for one playback session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Video file to play
    pub video_path: PathBuf,
    /// Output width in characters
    pub width: u32,
    /// Frame rate used when the source reports none
    pub fallback_fps: u32,
    /// Skip audio extraction and play silently
    pub audio_enabled: bool,
    /// Delay between launching audio and emitting the first frame
    #[serde(with = "millis")]
    pub audio_grace: Duration,
    /// Audio worker polling interval
    #[serde(with = "millis")]
    pub audio_poll: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            video_path: PathBuf::new(),
            width: DEFAULT_WIDTH,
            fallback_fps: DEFAULT_FALLBACK_FPS,
            audio_enabled: true,
            audio_grace: DEFAULT_AUDIO_GRACE,
            audio_poll: DEFAULT_AUDIO_POLL,
        }
    }
}

impl PlaybackConfig {
    /// Create a configuration for `video_path` with default settings
    pub fn new(video_path: impl Into<PathBuf>) -> Self {
        Self {
            video_path: video_path.into(),
            ..Default::default()
        }
    }

    /// Apply a requested fallback frame rate; zero keeps the default
    pub fn with_fallback_fps(mut self, fps: u32) -> Self {
        self.fallback_fps = if fps == 0 { DEFAULT_FALLBACK_FPS } else { fps };
        self
    }

    /// Check the values the scheduler relies on
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 {
            return Err(PlayerError::InvalidConfig(
                "Width must be greater than 0".to_string(),
            ));
        }
        if self.fallback_fps == 0 {
            return Err(PlayerError::InvalidConfig(
                "Fallback FPS must be greater than 0".to_string(),
            ));
        }
        if self.audio_poll.is_zero() {
            return Err(PlayerError::InvalidConfig(
                "Audio poll interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlaybackConfig::new("clip.mp4");
        assert_eq!(config.width, 80);
        assert_eq!(config.fallback_fps, 30);
        assert_eq!(config.audio_grace, Duration::from_millis(500));
        assert_eq!(config.audio_poll, Duration::from_millis(100));
        assert!(config.audio_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_fallback_keeps_default() {
        let config = PlaybackConfig::new("clip.mp4").with_fallback_fps(0);
        assert_eq!(config.fallback_fps, DEFAULT_FALLBACK_FPS);

        let config = PlaybackConfig::new("clip.mp4").with_fallback_fps(12);
        assert_eq!(config.fallback_fps, 12);
    }

    #[test]
    fn test_zero_width_rejected() {
        let config = PlaybackConfig {
            width: 0,
            ..PlaybackConfig::new("clip.mp4")
        };
        assert!(matches!(config.validate(), Err(PlayerError::InvalidConfig(_))));
    }

    #[test]
    fn test_serde_durations_as_millis() {
        let config = PlaybackConfig::new("clip.mp4");
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["audio_grace"], 500);

        let back: PlaybackConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }
}
