use log::info;
use std::io;
use std::path::{Path, PathBuf};

/// File extensions recognised as videos
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "flv", "wmv", "webm"];

/// Folder of videos that can be referred to by bare filename
#[derive(Debug, Clone)]
pub struct AssetLibrary {
    root: PathBuf,
}

impl AssetLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the folder if it does not exist yet
    pub fn ensure_exists(&self) -> io::Result<()> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root)?;
            info!("Created assets folder at: {}", self.root.display());
        }
        Ok(())
    }

    /// Resolve user input to a video path.
    ///
    /// A bare filename is looked up in the library; anything containing a
    /// path separator is used as given.
    pub fn resolve(&self, input: &str) -> PathBuf {
        let is_bare = !input.contains('/') && !input.contains(std::path::MAIN_SEPARATOR);
        if is_bare {
            self.root.join(input)
        } else {
            PathBuf::from(input)
        }
    }

    /// Sorted names of the videos in the library
    pub fn list_videos(&self) -> io::Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut videos = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_video_name(&name) {
                videos.push(name);
            }
        }

        videos.sort();
        Ok(videos)
    }
}

/// Whether `name` carries one of the known video extensions
pub fn is_video_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}
