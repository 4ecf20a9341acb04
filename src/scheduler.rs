use crate::audio::{AudioDevice, AudioPlayer};
use crate::config::PlaybackConfig;
use crate::converter::frame_to_glyphs;
use crate::decoder::FrameSource;
use crate::extractor::{AudioAsset, AudioExtractor};
use crate::renderer::FrameSink;
use crate::{PlayerError, Result};
use log::{debug, error, info, warn};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Lifecycle of a playback run. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Initializing,
    ExtractingAudio,
    Playing,
    Cleanup,
    Terminated,
}

/// Why the render loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// The video ran out of frames
    Completed,
    /// An external interrupt arrived
    Interrupted,
}

/// Summary returned after cleanup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackReport {
    pub outcome: PlaybackOutcome,
    pub frames_rendered: u64,
    /// Whether an audio worker was launched
    pub audio_played: bool,
}

/// Time between frames for a source reporting `reported_fps`
pub fn frame_delay(reported_fps: Option<f64>, fallback_fps: u32) -> Duration {
    match reported_fps {
        Some(fps) if fps.is_finite() && fps > 0.0 => Duration::from_secs_f64(1.0 / fps),
        _ => Duration::from_secs_f64(1.0 / fallback_fps.max(1) as f64),
    }
}

/// Emission schedule anchored at the loop's start time.
///
/// Frame `n` is due at `origin + (n + 1) * frame_delay` regardless of how
/// long earlier frames took.
#[derive(Debug, Clone, Copy)]
pub struct FramePacer {
    origin: Instant,
    frame_delay: Duration,
}

impl FramePacer {
    pub fn new(origin: Instant, frame_delay: Duration) -> Self {
        Self {
            origin,
            frame_delay,
        }
    }

    /// Anchor the schedule at the current instant
    pub fn start(frame_delay: Duration) -> Self {
        Self::new(Instant::now(), frame_delay)
    }

    pub fn origin(&self) -> Instant {
        self.origin
    }

    /// Instant by which frame `frame_index` should have finished displaying
    pub fn deadline(&self, frame_index: u64) -> Instant {
        let frames = u32::try_from(frame_index.saturating_add(1)).unwrap_or(u32::MAX);
        self.origin + self.frame_delay.saturating_mul(frames)
    }
}

/// Runtime state of one run; torn down by `cleanup`
struct PlaybackSession<S: FrameSource> {
    source: Option<S>,
    frame_delay: Duration,
    width: u32,
    frames_rendered: u64,
    started_at: Option<Instant>,
    audio_asset: Option<AudioAsset>,
    audio: Option<AudioPlayer>,
    audio_launched: bool,
    cancel: Arc<AtomicBool>,
}

impl<S: FrameSource> PlaybackSession<S> {
    fn new(source: S, frame_delay: Duration, width: u32) -> Self {
        Self {
            source: Some(source),
            frame_delay,
            width,
            frames_rendered: 0,
            started_at: None,
            audio_asset: None,
            audio: None,
            audio_launched: false,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Release everything the session holds. Safe to call more than once.
    async fn cleanup(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);

        if let Some(mut source) = self.source.take() {
            source.close();
            debug!("Frame source released");
        }

        if let Some(audio) = self.audio.take() {
            audio.stop();
            audio.join().await;
            debug!("Audio worker joined");
        }

        // Only after the worker is gone, so the file is no longer open
        if let Some(asset) = self.audio_asset.take() {
            asset.remove();
        }
    }
}

impl<S: FrameSource> Drop for PlaybackSession<S> {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);
        if let Some(audio) = &self.audio {
            audio.stop();
        }
    }
}

/// How the audio start-up phase ended
enum AudioStart {
    Skipped,
    Launched,
    Interrupted,
}

/// Drives one playback: audio start-up, the paced render loop and teardown
pub struct Player<E, K> {
    config: PlaybackConfig,
    extractor: Arc<E>,
    device: Arc<dyn AudioDevice>,
    sink: K,
    state: PlaybackState,
}

impl<E: AudioExtractor + 'static, K: FrameSink> Player<E, K> {
    pub fn new(config: PlaybackConfig, extractor: E, device: Arc<dyn AudioDevice>, sink: K) -> Self {
        Self {
            config,
            extractor: Arc::new(extractor),
            device,
            sink,
            state: PlaybackState::Initializing,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Play `source` until it runs out of frames or `interrupt` completes.
    ///
    /// Cleanup always runs before this returns. Only configuration problems
    /// and errors while decoding or drawing frames are reported as `Err`.
    pub async fn play<S, I>(&mut self, source: S, interrupt: I) -> Result<PlaybackReport>
    where
        S: FrameSource,
        I: Future<Output = ()>,
    {
        if self.state != PlaybackState::Initializing {
            return Err(PlayerError::InvalidConfig(
                "a player can only be used for one playback".to_string(),
            ));
        }

        let reported_fps = source.frame_rate();
        let delay = frame_delay(reported_fps, self.config.fallback_fps);
        let mut session = PlaybackSession::new(source, delay, self.config.width);

        if let Err(e) = self.config.validate() {
            self.finish(&mut session).await;
            return Err(e);
        }

        info!(
            "Frame delay {:.2}ms ({})",
            delay.as_secs_f64() * 1000.0,
            match reported_fps {
                Some(fps) if fps.is_finite() && fps > 0.0 => "source frame rate",
                _ => "fallback frame rate",
            }
        );

        tokio::pin!(interrupt);

        self.transition(PlaybackState::ExtractingAudio);
        let interrupted_early = match self.start_audio(&mut session, &mut interrupt).await {
            AudioStart::Interrupted => true,
            AudioStart::Skipped => false,
            // Let the device reach a steady playing state before the first frame
            AudioStart::Launched => tokio::select! {
                biased;
                _ = interrupt.as_mut() => {
                    info!("Video playback interrupted before the first frame");
                    true
                }
                _ = tokio::time::sleep(self.config.audio_grace) => false,
            },
        };

        let result = if interrupted_early {
            Ok(PlaybackOutcome::Interrupted)
        } else {
            self.transition(PlaybackState::Playing);
            self.run_loop(&mut session, &mut interrupt).await
        };

        if let Err(e) = &result {
            error!("Playback stopped: {}", e);
        }

        self.finish(&mut session).await;

        let outcome = result?;
        info!(
            "Playback finished ({:?}). Total frames: {}",
            outcome, session.frames_rendered
        );
        Ok(PlaybackReport {
            outcome,
            frames_rendered: session.frames_rendered,
            audio_played: session.audio_launched,
        })
    }

    fn transition(&mut self, next: PlaybackState) {
        debug!("Playback state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Extract the audio track off the runtime and launch the worker.
    ///
    /// An interrupt during extraction still waits for the extractor to
    /// return, so the asset it produced is handed to cleanup.
    async fn start_audio<S, I>(
        &mut self,
        session: &mut PlaybackSession<S>,
        interrupt: &mut Pin<&mut I>,
    ) -> AudioStart
    where
        S: FrameSource,
        I: Future<Output = ()>,
    {
        if !self.config.audio_enabled {
            info!("Audio disabled, playing video without audio");
            return AudioStart::Skipped;
        }

        info!("Extracting audio... (this may take a moment)");
        let extractor = Arc::clone(&self.extractor);
        let video = self.config.video_path.clone();
        let mut extraction = tokio::task::spawn_blocking(move || extractor.extract(&video));

        let finished = tokio::select! {
            biased;
            _ = interrupt.as_mut() => None,
            joined = &mut extraction => Some(joined),
        };

        let Some(joined) = finished else {
            info!("Video playback interrupted while extracting audio");
            if let Ok(Ok(asset)) = extraction.await {
                session.audio_asset = Some(asset);
            }
            return AudioStart::Interrupted;
        };

        let asset = match joined {
            Ok(Ok(asset)) => asset,
            Ok(Err(e)) => {
                warn!("Could not extract audio: {}", e);
                info!("Playing video without audio");
                return AudioStart::Skipped;
            }
            Err(e) => {
                warn!("Audio extraction task ended abnormally: {}", e);
                info!("Playing video without audio");
                return AudioStart::Skipped;
            }
        };

        info!("Starting playback with audio");
        let player = AudioPlayer::spawn(
            Arc::clone(&self.device),
            asset.path().to_path_buf(),
            Arc::clone(&session.cancel),
            self.config.audio_poll,
        );
        session.audio_asset = Some(asset);
        session.audio = Some(player);
        session.audio_launched = true;
        AudioStart::Launched
    }

    async fn run_loop<S, I>(
        &mut self,
        session: &mut PlaybackSession<S>,
        interrupt: &mut Pin<&mut I>,
    ) -> Result<PlaybackOutcome>
    where
        S: FrameSource,
        I: Future<Output = ()>,
    {
        self.sink.init()?;

        let pacer = FramePacer::start(session.frame_delay);
        session.started_at = Some(pacer.origin());

        loop {
            let Some(source) = session.source.as_mut() else {
                return Ok(PlaybackOutcome::Completed);
            };
            let Some(frame) = source.next_frame()? else {
                info!("Video playback completed");
                return Ok(PlaybackOutcome::Completed);
            };

            let grid = frame_to_glyphs(&frame, session.width)?;
            self.sink.present(&grid)?;

            let deadline = pacer.deadline(session.frames_rendered);
            session.frames_rendered += 1;

            let now = Instant::now();
            if now > deadline {
                debug!(
                    "Frame {} late by {:.1}ms",
                    session.frames_rendered - 1,
                    (now - deadline).as_secs_f64() * 1000.0
                );
            }

            tokio::select! {
                biased;
                _ = interrupt.as_mut() => {
                    info!("Video playback interrupted");
                    return Ok(PlaybackOutcome::Interrupted);
                }
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }
    }

    async fn finish<S: FrameSource>(&mut self, session: &mut PlaybackSession<S>) {
        self.transition(PlaybackState::Cleanup);
        if let Err(e) = self.sink.cleanup() {
            warn!("Could not restore terminal: {}", e);
        }
        session.cleanup().await;
        if let Some(started) = session.started_at {
            debug!("Session ran for {:.2}s", started.elapsed().as_secs_f64());
        }
        self.transition(PlaybackState::Terminated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_delay_uses_source_rate() {
        assert_eq!(frame_delay(Some(25.0), 30), Duration::from_millis(40));
        assert_eq!(frame_delay(Some(50.0), 30), Duration::from_millis(20));
    }

    #[test]
    fn test_frame_delay_falls_back() {
        let fallback = Duration::from_secs_f64(1.0 / 30.0);
        assert_eq!(frame_delay(None, 30), fallback);
        assert_eq!(frame_delay(Some(0.0), 30), fallback);
        assert_eq!(frame_delay(Some(-5.0), 30), fallback);
        assert_eq!(frame_delay(Some(f64::NAN), 30), fallback);
        assert_eq!(frame_delay(None, 10), Duration::from_millis(100));
    }

    #[test]
    fn test_pacer_deadlines_are_anchored() {
        let origin = Instant::now();
        let pacer = FramePacer::new(origin, Duration::from_millis(40));

        assert_eq!(pacer.deadline(0), origin + Duration::from_millis(40));
        assert_eq!(pacer.deadline(1), origin + Duration::from_millis(80));
        assert_eq!(pacer.deadline(24), origin + Duration::from_secs(1));
        for n in 0..1000u64 {
            assert_eq!(
                pacer.deadline(n + 1) - pacer.deadline(n),
                Duration::from_millis(40)
            );
        }
    }
}
