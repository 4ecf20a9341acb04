use crate::{PlayerError, Result};
use log::{debug, info, warn};
use rodio::{Decoder, OutputStream, Sink};
use std::any::Any;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Playback control over a loaded audio asset
pub trait AudioSink: Send + Sync {
    fn play(&self);
    /// False once playback has finished or been stopped
    fn is_playing(&self) -> bool;
    fn stop(&self);
}

/// An asset loaded into an output device
pub struct LoadedAudio {
    pub sink: Arc<dyn AudioSink>,
    /// Keeps the output device open; must stay on the thread that opened it
    pub device_guard: Box<dyn Any>,
}

/// Audio output capability
pub trait AudioDevice: Send + Sync {
    /// Open an output device on the calling thread and load `asset` into it
    fn load(&self, asset: &Path) -> Result<LoadedAudio>;
}

/// Default system output through rodio
#[derive(Debug, Default, Clone, Copy)]
pub struct RodioDevice;

struct RodioSink(Sink);

impl AudioSink for RodioSink {
    fn play(&self) {
        self.0.play();
    }

    fn is_playing(&self) -> bool {
        !self.0.empty()
    }

    fn stop(&self) {
        self.0.stop();
    }
}

impl AudioDevice for RodioDevice {
    fn load(&self, asset: &Path) -> Result<LoadedAudio> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| PlayerError::AudioDevice(e.to_string()))?;
        let sink = Sink::try_new(&handle).map_err(|e| PlayerError::AudioDevice(e.to_string()))?;

        let file = File::open(asset).map_err(|e| {
            PlayerError::AudioDevice(format!("cannot open {}: {}", asset.display(), e))
        })?;
        let source = Decoder::new(BufReader::new(file))
            .map_err(|e| PlayerError::AudioDevice(format!("cannot decode {}: {}", asset.display(), e)))?;

        // Queue paused; the worker decides when to start
        sink.pause();
        sink.append(source);

        Ok(LoadedAudio {
            sink: Arc::new(RodioSink(sink)),
            device_guard: Box::new(stream),
        })
    }
}

#[derive(Default)]
struct ControlState {
    sink: Option<Arc<dyn AudioSink>>,
    stopped: bool,
}

/// Stop switch shared between the render loop and the audio worker.
///
/// A stop requested before the worker has published its sink is applied as
/// soon as the sink arrives.
#[derive(Clone, Default)]
pub struct AudioControl {
    inner: Arc<Mutex<ControlState>>,
}

impl AudioControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand the active sink to the controller
    pub fn publish(&self, sink: Arc<dyn AudioSink>) {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if state.stopped {
            sink.stop();
        }
        state.sink = Some(sink);
    }

    /// Stop audio output now, or as soon as a sink is published
    pub fn stop(&self) {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.stopped = true;
        if let Some(sink) = &state.sink {
            sink.stop();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stopped
    }
}

/// Audio playback running on a blocking worker
pub struct AudioPlayer {
    control: AudioControl,
    worker: JoinHandle<()>,
}

impl AudioPlayer {
    /// Start playing `asset` on a background worker.
    ///
    /// The worker polls every `poll` until playback ends or `cancel` is set.
    pub fn spawn(
        device: Arc<dyn AudioDevice>,
        asset: PathBuf,
        cancel: Arc<AtomicBool>,
        poll: Duration,
    ) -> Self {
        let control = AudioControl::new();
        let worker_control = control.clone();
        let worker = tokio::task::spawn_blocking(move || {
            run_audio(device.as_ref(), &asset, &cancel, &worker_control, poll);
        });

        Self { control, worker }
    }

    /// Stop audio output; the worker notices on its next poll
    pub fn stop(&self) {
        self.control.stop();
    }

    /// Wait for the worker to exit
    pub async fn join(self) {
        if let Err(e) = self.worker.await {
            warn!("Audio worker ended abnormally: {}", e);
        }
    }
}

fn run_audio(
    device: &dyn AudioDevice,
    asset: &Path,
    cancel: &AtomicBool,
    control: &AudioControl,
    poll: Duration,
) {
    let LoadedAudio { sink, device_guard } = match device.load(asset) {
        Ok(loaded) => loaded,
        Err(e) => {
            warn!("Could not play audio: {}", e);
            return;
        }
    };
    let _device = device_guard;

    control.publish(Arc::clone(&sink));
    if cancel.load(Ordering::SeqCst) || control.is_stopped() {
        debug!("Audio cancelled before playback started");
        return;
    }

    sink.play();
    info!("Audio playback started");

    while sink.is_playing() && !cancel.load(Ordering::SeqCst) {
        std::thread::sleep(poll);
    }

    debug!(
        "Audio worker exiting ({})",
        if cancel.load(Ordering::SeqCst) {
            "cancelled"
        } else {
            "finished"
        }
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    const POLL: Duration = Duration::from_millis(5);

    /// Plays for a fixed number of polls
    #[derive(Default)]
    struct CountdownSink {
        remaining: AtomicUsize,
        started: AtomicBool,
        stops: AtomicUsize,
    }

    impl AudioSink for CountdownSink {
        fn play(&self) {
            self.started.store(true, Ordering::SeqCst);
        }

        fn is_playing(&self) -> bool {
            if self.stops.load(Ordering::SeqCst) > 0 {
                return false;
            }
            self.remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FakeDevice {
        sink: Arc<CountdownSink>,
        fail: bool,
    }

    impl AudioDevice for FakeDevice {
        fn load(&self, _asset: &Path) -> Result<LoadedAudio> {
            if self.fail {
                return Err(PlayerError::AudioDevice("no output device".to_string()));
            }
            Ok(LoadedAudio {
                sink: self.sink.clone(),
                device_guard: Box::new(()),
            })
        }
    }

    fn device(polls: usize, fail: bool) -> (Arc<FakeDevice>, Arc<CountdownSink>) {
        let sink = Arc::new(CountdownSink {
            remaining: AtomicUsize::new(polls),
            ..Default::default()
        });
        (Arc::new(FakeDevice { sink: sink.clone(), fail }), sink)
    }

    #[tokio::test]
    async fn test_plays_until_finished() {
        let (device, sink) = device(3, false);
        let cancel = Arc::new(AtomicBool::new(false));

        let player = AudioPlayer::spawn(device, PathBuf::from("a.mp3"), cancel, POLL);
        player.join().await;

        assert!(sink.started.load(Ordering::SeqCst));
        assert_eq!(sink.remaining.load(Ordering::SeqCst), 0);
        assert_eq!(sink.stops.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_ends_worker() {
        let (device, sink) = device(usize::MAX, false);
        let cancel = Arc::new(AtomicBool::new(false));

        let player = AudioPlayer::spawn(device, PathBuf::from("a.mp3"), cancel.clone(), POLL);
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.store(true, Ordering::SeqCst);
        player.stop();
        player.join().await;

        assert_eq!(sink.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_device_failure_exits_quietly() {
        let (device, sink) = device(usize::MAX, true);
        let cancel = Arc::new(AtomicBool::new(false));

        let player = AudioPlayer::spawn(device, PathBuf::from("a.mp3"), cancel, POLL);
        player.join().await;

        assert!(!sink.started.load(Ordering::SeqCst));
    }

    #[test]
    fn test_stop_before_publish_is_applied() {
        let control = AudioControl::new();
        control.stop();
        assert!(control.is_stopped());

        let sink = Arc::new(CountdownSink::default());
        control.publish(sink.clone());
        assert_eq!(sink.stops.load(Ordering::SeqCst), 1);
    }
}
