use crate::config::{PlaybackConfig, DEFAULT_WIDTH};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Video to play: a path, or a filename inside the assets folder.
    /// Prompts interactively when omitted.
    pub video: Option<String>,

    /// Output width in characters
    #[arg(short, long, default_value_t = DEFAULT_WIDTH)]
    pub width: u32,

    /// Frame rate to use when the video does not report one (0 = default)
    #[arg(short, long)]
    pub fps: Option<u32>,

    /// Folder searched for bare filenames
    #[arg(long, value_name = "DIR", default_value = "assets")]
    pub assets: PathBuf,

    /// ffmpeg binary used to extract the audio track
    #[arg(long, value_name = "BIN", default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// Play without audio
    #[arg(long)]
    pub no_audio: bool,

    /// Show video information as JSON only (don't play)
    #[arg(long)]
    pub info: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Validate command line arguments against a resolved video path
    pub fn validate(&self, video_path: &std::path::Path) -> Result<(), String> {
        if !video_path.exists() {
            return Err(format!("Video file does not exist: {}", video_path.display()));
        }

        if self.width == 0 {
            return Err("Width must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Build the playback configuration for `video_path`
    pub fn playback_config(&self, video_path: PathBuf) -> PlaybackConfig {
        PlaybackConfig {
            width: self.width,
            audio_enabled: !self.no_audio,
            ..PlaybackConfig::new(video_path)
        }
        .with_fallback_fps(self.fps.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["termreel", "clip.mp4"]);
        assert_eq!(cli.video.as_deref(), Some("clip.mp4"));
        assert_eq!(cli.width, 80);
        assert_eq!(cli.fps, None);
        assert_eq!(cli.assets, PathBuf::from("assets"));
        assert!(!cli.no_audio);
    }

    #[test]
    fn test_playback_config() {
        let cli = Cli::parse_from(["termreel", "clip.mp4", "-w", "120", "-f", "0", "--no-audio"]);
        let config = cli.playback_config(PathBuf::from("assets/clip.mp4"));
        assert_eq!(config.width, 120);
        assert_eq!(config.fallback_fps, 30);
        assert!(!config.audio_enabled);

        let cli = Cli::parse_from(["termreel", "clip.mp4", "--fps", "24"]);
        assert_eq!(cli.playback_config(PathBuf::from("clip.mp4")).fallback_fps, 24);
    }

    #[test]
    fn test_validate() {
        let file = tempfile::NamedTempFile::new().unwrap();

        let cli = Cli::parse_from(["termreel", "x", "--width", "0"]);
        assert!(cli.validate(file.path()).unwrap_err().contains("Width"));

        let cli = Cli::parse_from(["termreel", "x"]);
        assert!(cli.validate(file.path()).is_ok());
        assert!(cli
            .validate(std::path::Path::new("missing.mp4"))
            .unwrap_err()
            .contains("does not exist"));
    }
}
