//! Background music from a local directory.
//!
//! Layout: `<root>/<category>/<track>.mp3`. Track ids are file stems and are
//! unique across categories.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{CapabilityError, CapabilityResult, MusicLibrary, MusicTrack};

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "aac", "wav", "ogg", "flac"];

/// [`MusicLibrary`] over a directory tree.
#[derive(Debug, Clone)]
pub struct LocalMusicLibrary {
    root: PathBuf,
}

impl LocalMusicLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Audio files directly under `dir`, sorted by name.
    async fn tracks_in(dir: &Path) -> CapabilityResult<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut tracks = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if is_audio_file(&path) {
                tracks.push(path);
            }
        }
        tracks.sort();
        Ok(tracks)
    }

    async fn category_dirs(&self) -> CapabilityResult<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut dirs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn track(path: PathBuf) -> Option<MusicTrack> {
    let id = path.file_stem()?.to_str()?.to_string();
    Some(MusicTrack { id, path })
}

/// Directory name for a category ("Second Chance" -> "second-chance").
pub fn category_slug(category: &str) -> String {
    category
        .trim()
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[async_trait]
impl MusicLibrary for LocalMusicLibrary {
    async fn for_category(&self, category: &str) -> CapabilityResult<Option<MusicTrack>> {
        let slug = category_slug(category);
        if slug.is_empty() {
            return Ok(None);
        }
        let tracks = Self::tracks_in(&self.root.join(slug)).await?;
        Ok(tracks.into_iter().next().and_then(track))
    }

    async fn by_id(&self, id: &str) -> CapabilityResult<Option<MusicTrack>> {
        for dir in self.category_dirs().await? {
            let found = Self::tracks_in(&dir)
                .await?
                .into_iter()
                .find(|p| p.file_stem().and_then(|s| s.to_str()) == Some(id));
            if let Some(path) = found {
                return Ok(track(path));
            }
        }
        Ok(None)
    }

    async fn check_health(&self) -> CapabilityResult<()> {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(CapabilityError::unavailable(format!(
                "music root is not a directory: {}",
                self.root.display()
            ))),
            Err(_) => Err(CapabilityError::unavailable(format!(
                "music root missing: {}",
                self.root.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> (tempfile::TempDir, LocalMusicLibrary) {
        let dir = tempfile::tempdir().unwrap();
        let billionaire = dir.path().join("billionaire");
        std::fs::create_dir_all(&billionaire).unwrap();
        std::fs::write(billionaire.join("velvet-night.mp3"), b"ID3").unwrap();
        std::fs::write(billionaire.join("city-lights.mp3"), b"ID3").unwrap();
        std::fs::write(billionaire.join("notes.txt"), b"not audio").unwrap();
        let library = LocalMusicLibrary::new(dir.path());
        (dir, library)
    }

    #[tokio::test]
    async fn test_for_category_picks_first_sorted_track() {
        let (_dir, library) = library();
        let track = library.for_category("Billionaire").await.unwrap().unwrap();
        assert_eq!(track.id, "city-lights");
    }

    #[tokio::test]
    async fn test_unknown_category_has_no_track() {
        let (_dir, library) = library();
        assert!(library.for_category("Contemporary").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_by_id() {
        let (_dir, library) = library();
        let track = library.by_id("velvet-night").await.unwrap().unwrap();
        assert!(track.path.ends_with("billionaire/velvet-night.mp3"));
        assert!(library.by_id("notes").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_health() {
        let (_dir, library) = library();
        assert!(library.check_health().await.is_ok());
        assert!(LocalMusicLibrary::new("/nonexistent/music")
            .check_health()
            .await
            .is_err());
    }

    #[test]
    fn test_category_slug() {
        assert_eq!(category_slug("Second Chance"), "second-chance");
        assert_eq!(category_slug("  "), "");
    }
}
