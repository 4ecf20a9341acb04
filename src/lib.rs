//! termreel - an ASCII video player for the terminal
//!
//! This crate decodes a video file, converts every frame into a grid of ASCII
//! glyphs and paints it in the terminal at the video's frame rate, while the
//! audio track is extracted to a temporary file and played on a background
//! worker.

pub mod audio;
pub mod cli;
pub mod config;
pub mod converter;
pub mod decoder;
pub mod extractor;
pub mod library;
pub mod renderer;
pub mod scheduler;

pub use audio::{AudioControl, AudioDevice, AudioPlayer, AudioSink, LoadedAudio, RodioDevice};
pub use cli::Cli;
pub use config::PlaybackConfig;
pub use converter::{frame_to_glyphs, grid_dimensions, palette_index, GlyphGrid};
pub use decoder::{open_video, Frame, FrameSource, VideoDecoder, VideoInfo};
pub use extractor::{AudioAsset, AudioExtractor, FfmpegExtractor};
pub use library::AssetLibrary;
pub use renderer::{FrameSink, Renderer};
pub use scheduler::{frame_delay, FramePacer, PlaybackOutcome, PlaybackReport, PlaybackState, Player};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Glyph palette ordered from darkest to brightest
pub const PALETTE: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Error types used throughout the application
#[derive(thiserror::Error, Debug)]
pub enum PlayerError {
    #[error("Failed to open video '{path}': {reason}")]
    VideoOpen { path: String, reason: String },

    #[error("Video decoding error: {0}")]
    Decode(#[from] ffmpeg_next::Error),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Audio extraction failed: {0}")]
    AudioExtraction(String),

    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Utility functions
pub mod utils {
    /// Format duration in a human-readable way
    pub fn format_duration(seconds: f64) -> String {
        let total_seconds = seconds.max(0.0) as u64;
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let secs = total_seconds % 60;

        if hours > 0 {
            format!("{}:{:02}:{:02}", hours, minutes, secs)
        } else {
            format!("{}:{:02}", minutes, secs)
        }
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        frame_delay, frame_to_glyphs, grid_dimensions, open_video, palette_index,
        AssetLibrary, AudioAsset, AudioControl, AudioDevice, AudioExtractor, AudioPlayer,
        AudioSink, Cli, FfmpegExtractor, Frame, FramePacer, FrameSink, FrameSource, GlyphGrid,
        LoadedAudio, PlaybackConfig, PlaybackOutcome, PlaybackReport, PlaybackState, Player,
        PlayerError, Renderer, Result, RodioDevice, VideoDecoder, VideoInfo, PALETTE,
        utils::*,
    };
}
