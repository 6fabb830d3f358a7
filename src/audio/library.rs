use std::fs;
use std::path::{Path, PathBuf};

use crate::{log_debug, log_info};

const ENABLE_LOGS: bool = true;

pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "flac", "m4a"];

/// Substitute audio on disk: `<root>/voice` for announcements and
/// `<root>/music` for the ambient queue.
#[derive(Debug, Clone, Default)]
pub struct AudioLibrary {
    root: Option<PathBuf>,
}

impl AudioLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// A library that never yields files.
    pub fn empty() -> Self {
        Self::default()
    }

    /// First existing directory of: `configured`, `audio/` next to the
    /// executable, `audio/` in the working directory.
    pub fn locate(configured: Option<&Path>) -> Self {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(path) = configured {
            candidates.push(path.to_path_buf());
        }
        if let Some(dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            candidates.push(dir.join("audio"));
        }
        if let Ok(cwd) = std::env::current_dir() {
            candidates.push(cwd.join("audio"));
        }

        match candidates.into_iter().find(|candidate| candidate.is_dir()) {
            Some(root) => {
                log_info!("Using substitute audio from {}", root.display());
                Self::new(root)
            }
            None => {
                log_info!("No audio directory found; ads will be muted without substitute audio");
                Self::empty()
            }
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn voice_files(&self) -> Vec<PathBuf> {
        self.files_in("voice")
    }

    pub fn music_files(&self) -> Vec<PathBuf> {
        self.files_in("music")
    }

    fn files_in(&self, subdir: &str) -> Vec<PathBuf> {
        match &self.root {
            Some(root) => audio_files_in(&root.join(subdir)),
            None => Vec::new(),
        }
    }
}

pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

/// Supported files directly inside `dir`, sorted. Missing or unreadable
/// directories give an empty list.
fn audio_files_in(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            log_debug!("cannot read {}: {}", dir.display(), err);
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_supported(path))
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::create_dir_all(dir).expect("mkdir");
        fs::write(dir.join(name), b"").expect("write");
    }

    #[test]
    fn lists_supported_files_per_directory() {
        let tmp = TempDir::new().expect("tempdir");
        touch(&tmp.path().join("voice"), "intro.MP3");
        touch(&tmp.path().join("voice"), "notes.txt");
        touch(&tmp.path().join("music"), "b.ogg");
        touch(&tmp.path().join("music"), "a.flac");
        touch(&tmp.path().join("music"), "c.m4a");

        let library = AudioLibrary::new(tmp.path());
        assert_eq!(library.voice_files().len(), 1);

        let names: Vec<_> = library
            .music_files()
            .iter()
            .filter_map(|path| path.file_name().and_then(|n| n.to_str()).map(String::from))
            .collect();
        assert_eq!(names, vec!["a.flac", "b.ogg", "c.m4a"]);
    }

    #[test]
    fn missing_directories_are_empty() {
        let tmp = TempDir::new().expect("tempdir");
        let library = AudioLibrary::new(tmp.path().join("nope"));
        assert!(library.voice_files().is_empty());
        assert!(library.music_files().is_empty());
        assert!(AudioLibrary::empty().music_files().is_empty());
    }

    #[test]
    fn configured_directory_wins() {
        let tmp = TempDir::new().expect("tempdir");
        let library = AudioLibrary::locate(Some(tmp.path()));
        assert_eq!(library.root(), Some(tmp.path()));
    }
}
