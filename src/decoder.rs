use crate::{PlayerError, Result};
use ffmpeg_next as ffmpeg;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A decoded video frame, samples packed row-major
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw 8-bit samples
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Samples per pixel (1 luma, 2 luma+alpha, 3 RGB, 4 RGBA)
    pub channels: u8,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Self {
        Self {
            data,
            width,
            height,
            channels,
        }
    }
}

/// Metadata reported by the decoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Average frame rate, absent when the container does not report one
    pub frame_rate: Option<f64>,
    /// Duration in seconds, zero when unknown
    pub duration: f64,
}

/// Sequential producer of video frames.
///
/// The sequence is finite and cannot be restarted; `Ok(None)` marks the end
/// of the stream.
pub trait FrameSource {
    /// Average frame rate, `None` when unknown
    fn frame_rate(&self) -> Option<f64>;

    /// Decode the next frame in presentation order
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the underlying handle. Calling it again is a no-op.
    fn close(&mut self);
}

/// Video decoder that extracts frames from video files
pub struct VideoDecoder {
    input_context: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: Option<ffmpeg::software::scaling::Context>,
    info: VideoInfo,
    frame_count: u64,
    eof_sent: bool,
    closed: bool,
}

impl VideoDecoder {
    /// Open `path` and prepare a decoder for its best video stream
    pub fn open(path: &Path) -> Result<Self> {
        let open_error = |reason: String| PlayerError::VideoOpen {
            path: path.display().to_string(),
            reason,
        };

        if let Err(e) = ffmpeg::init() {
            // Not fatal on its own; opening the input reports the real problem
            debug!("FFmpeg init error: {:?}", e);
        }

        debug!("Attempting to open video file: {}", path.display());
        let input_context = ffmpeg::format::input(&path).map_err(|e| {
            info!("FFmpeg error details: {:?}", e);
            open_error(e.to_string())
        })?;

        let stream = input_context
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| open_error("no video stream found".to_string()))?;
        let stream_index = stream.index();
        info!("Found video stream {} in file '{}'", stream_index, path.display());

        let context_decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| open_error(format!("failed to create codec context: {}", e)))?;
        let decoder = context_decoder
            .decoder()
            .video()
            .map_err(|e| open_error(format!("failed to create video decoder: {}", e)))?;

        let rate = stream.avg_frame_rate();
        let frame_rate = if rate.numerator() > 0 && rate.denominator() > 0 {
            Some(rate.numerator() as f64 / rate.denominator() as f64)
        } else {
            None
        };

        let duration = if stream.duration() != ffmpeg::ffi::AV_NOPTS_VALUE {
            stream.duration() as f64 * f64::from(stream.time_base())
        } else {
            0.0
        };

        let info = VideoInfo {
            path: path.to_path_buf(),
            width: decoder.width(),
            height: decoder.height(),
            frame_rate,
            duration,
        };
        debug!(
            "Video info: {}x{}, {:?} FPS, {:.2}s duration",
            info.width, info.height, info.frame_rate, info.duration
        );

        Ok(Self {
            input_context,
            stream_index,
            decoder,
            scaler: None,
            info,
            frame_count: 0,
            eof_sent: false,
            closed: false,
        })
    }

    /// Metadata of the opened file
    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    /// Feed the decoder one packet of our stream, or signal end of input
    fn feed(&mut self) -> Result<()> {
        let stream_index = self.stream_index;
        let packet = self
            .input_context
            .packets()
            .find(|(stream, _)| stream.index() == stream_index)
            .map(|(_, packet)| packet);

        match packet {
            Some(packet) => self.decoder.send_packet(&packet)?,
            None => {
                debug!("End of input after {} frames, draining decoder", self.frame_count);
                self.decoder.send_eof()?;
                self.eof_sent = true;
            }
        }
        Ok(())
    }

    /// Convert a decoded frame to packed RGB24
    fn convert_frame(&mut self, frame: &ffmpeg::frame::Video) -> Result<Frame> {
        let width = frame.width();
        let height = frame.height();

        if self.scaler.is_none() {
            self.scaler = Some(ffmpeg::software::scaling::Context::get(
                frame.format(),
                width,
                height,
                ffmpeg::format::Pixel::RGB24,
                width,
                height,
                ffmpeg::software::scaling::Flags::BILINEAR,
            )?);
        }

        let mut rgb_frame = ffmpeg::frame::Video::empty();
        if let Some(ref mut scaler) = self.scaler {
            scaler.run(frame, &mut rgb_frame)?;
        }

        // Rows may be padded; copy only the visible samples
        let row_len = width as usize * 3;
        let stride = rgb_frame.stride(0);
        let plane = rgb_frame.data(0);
        let mut data = Vec::with_capacity(row_len * height as usize);
        for row in plane.chunks(stride).take(height as usize) {
            data.extend_from_slice(&row[..row_len]);
        }

        debug!("Decoded frame {}: {}x{}", self.frame_count, width, height);
        Ok(Frame::new(data, width, height, 3))
    }
}

impl FrameSource for VideoDecoder {
    fn frame_rate(&self) -> Option<f64> {
        self.info.frame_rate
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.closed {
            return Ok(None);
        }

        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => {
                    self.frame_count += 1;
                    return self.convert_frame(&decoded).map(Some);
                }
                Err(ffmpeg::Error::Eof) => return Ok(None),
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::ffi::EAGAIN => {
                    if self.eof_sent {
                        return Ok(None);
                    }
                    self.feed()?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.scaler = None;
            self.decoder.flush();
            debug!("Video decoder closed after {} frames", self.frame_count);
        }
    }
}

/// Open a video file as a frame source
pub fn open_video(path: &Path) -> Result<VideoDecoder> {
    VideoDecoder::open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_creation() {
        // Requires a sample video file
        let test_video = PathBuf::from("tests/assets/sample.mp4");
        if test_video.exists() {
            let result = VideoDecoder::open(&test_video);
            assert!(result.is_ok(), "Failed to create decoder: {:?}", result.err());
        }
    }

    #[test]
    fn test_invalid_file() {
        let result = VideoDecoder::open(Path::new("nonexistent.mp4"));
        assert!(matches!(result, Err(PlayerError::VideoOpen { .. })));
    }

    #[test]
    fn test_video_info_serializes() {
        let info = VideoInfo {
            path: PathBuf::from("clip.mp4"),
            width: 640,
            height: 360,
            frame_rate: None,
            duration: 0.0,
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"frame_rate\":null"));
    }
}
