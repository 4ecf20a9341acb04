use crate::{PlayerError, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempPath;

/// Temporary file holding the audio track of the video being played.
///
/// The file is removed by [`AudioAsset::remove`], or on drop if nobody
/// removed it explicitly.
#[derive(Debug)]
pub struct AudioAsset {
    path: TempPath,
}

impl AudioAsset {
    pub fn new(path: TempPath) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file. Failure is logged and otherwise ignored.
    pub fn remove(self) {
        let display = self.path.display().to_string();
        match self.path.close() {
            Ok(()) => debug!("Removed audio asset {}", display),
            Err(e) => debug!("Could not remove audio asset {}: {}", display, e),
        }
    }
}

/// Produces a standalone audio asset from a video file.
///
/// Extraction blocks, so it runs on a blocking worker.
pub trait AudioExtractor: Send + Sync {
    fn extract(&self, video: &Path) -> Result<AudioAsset>;
}

/// Extracts audio by running the `ffmpeg` command line tool
#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    program: PathBuf,
}

impl FfmpegExtractor {
    /// Use a specific ffmpeg binary
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl AudioExtractor for FfmpegExtractor {
    fn extract(&self, video: &Path) -> Result<AudioAsset> {
        let temp = tempfile::Builder::new()
            .prefix("termreel-")
            .suffix(".mp3")
            .tempfile()?
            .into_temp_path();

        info!("Extracting audio from '{}'", video.display());
        debug!(
            "Running {} to write audio into {}",
            self.program.display(),
            temp.display()
        );

        let status = Command::new(&self.program)
            .arg("-i")
            .arg(video)
            .args(["-vn", "-acodec", "mp3", "-y"])
            .arg(&*temp)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| {
                PlayerError::AudioExtraction(format!(
                    "failed to run '{}': {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !status.success() {
            return Err(PlayerError::AudioExtraction(format!(
                "'{}' exited with {}",
                self.program.display(),
                status
            )));
        }

        if std::fs::metadata(&temp)?.len() == 0 {
            return Err(PlayerError::AudioExtraction(
                "no audio track in output".to_string(),
            ));
        }

        Ok(AudioAsset::new(temp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_program_is_extraction_error() {
        let extractor = FfmpegExtractor::with_program("termreel-no-such-ffmpeg");
        let result = extractor.extract(Path::new("clip.mp4"));
        assert!(matches!(result, Err(PlayerError::AudioExtraction(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_program_is_extraction_error() {
        let extractor = FfmpegExtractor::with_program("false");
        let result = extractor.extract(Path::new("clip.mp4"));
        assert!(matches!(result, Err(PlayerError::AudioExtraction(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_empty_output_is_extraction_error() {
        let extractor = FfmpegExtractor::with_program("true");
        let result = extractor.extract(Path::new("clip.mp4"));
        assert!(matches!(result, Err(PlayerError::AudioExtraction(_))));
    }

    #[test]
    fn test_asset_remove_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = tempfile::Builder::new()
            .suffix(".mp3")
            .tempfile_in(dir.path())
            .unwrap();
        file.write_all(b"ID3").unwrap();

        let asset = AudioAsset::new(file.into_temp_path());
        let path = asset.path().to_path_buf();
        assert!(path.exists());

        asset.remove();
        assert!(!path.exists());
    }

    #[test]
    fn test_asset_remove_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = tempfile::Builder::new().tempfile_in(dir.path()).unwrap();
        let asset = AudioAsset::new(file.into_temp_path());

        std::fs::remove_file(asset.path()).unwrap();
        asset.remove();
    }
}
