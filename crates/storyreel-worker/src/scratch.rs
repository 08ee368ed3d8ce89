//! Request-scoped scratch directories.

use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use storyreel_models::PostId;

/// Non-durable working directory for one generation attempt.
///
/// Named `<post>-<timestamp>-<nonce>` so concurrent and repeated attempts
/// never share files. Dropping the area without [`ScratchArea::cleanup`]
/// (a panic or a cancelled task) still removes the directory.
#[derive(Debug)]
pub struct ScratchArea {
    dir: PathBuf,
    keep: bool,
    removed: bool,
}

impl ScratchArea {
    pub async fn create(root: &Path, post_id: &PostId, keep: bool) -> std::io::Result<Self> {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let name = format!(
            "{}-{}-{}",
            sanitize(post_id.as_str()),
            Utc::now().format("%Y%m%dT%H%M%S%3f"),
            &nonce[..8]
        );
        let dir = root.join(name);
        tokio::fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "Created scratch area");
        Ok(Self {
            dir,
            keep,
            removed: false,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a file inside the scratch area.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Remove the directory unless it is kept for debugging.
    pub async fn cleanup(mut self) {
        if self.keep {
            debug!(dir = %self.dir.display(), "Keeping scratch area");
            return;
        }
        let result = tokio::fs::remove_dir_all(&self.dir).await;
        self.removed = true;
        log_removal(&self.dir, result);
    }
}

impl Drop for ScratchArea {
    fn drop(&mut self) {
        if self.keep || self.removed {
            return;
        }
        debug!(dir = %self.dir.display(), "Removing abandoned scratch area");
        log_removal(&self.dir, std::fs::remove_dir_all(&self.dir));
    }
}

fn log_removal(dir: &Path, result: std::io::Result<()>) {
    if let Err(e) = result {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(dir = %dir.display(), "Failed to remove scratch area: {}", e);
        }
    }
}

/// File-name-safe form of an identifier.
pub fn sanitize(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "post".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_areas_are_distinct_and_removed() {
        let root = tempfile::tempdir().unwrap();
        let post = PostId::from("post-1");

        let a = ScratchArea::create(root.path(), &post, false).await.unwrap();
        let b = ScratchArea::create(root.path(), &post, false).await.unwrap();
        assert_ne!(a.dir(), b.dir());
        assert!(a.dir().starts_with(root.path()));

        tokio::fs::write(a.path("image.png"), b"png").await.unwrap();
        let dir = a.dir().to_path_buf();
        a.cleanup().await;
        assert!(!dir.exists());
        assert!(b.dir().exists());
    }

    #[tokio::test]
    async fn test_keep_leaves_directory() {
        let root = tempfile::tempdir().unwrap();
        let area = ScratchArea::create(root.path(), &PostId::from("p"), true)
            .await
            .unwrap();
        let dir = area.dir().to_path_buf();
        area.cleanup().await;
        assert!(dir.exists());
    }

    #[tokio::test]
    async fn test_dropped_area_is_removed() {
        let root = tempfile::tempdir().unwrap();
        let area = ScratchArea::create(root.path(), &PostId::from("p"), false)
            .await
            .unwrap();
        tokio::fs::write(area.path("image.png"), b"png").await.unwrap();
        let dir = area.dir().to_path_buf();

        drop(area);
        assert!(!dir.exists());

        let kept = ScratchArea::create(root.path(), &PostId::from("p"), true)
            .await
            .unwrap();
        let dir = kept.dir().to_path_buf();
        drop(kept);
        assert!(dir.exists());
    }

    #[tokio::test]
    async fn test_panicking_task_removes_area() {
        let root = tempfile::tempdir().unwrap();
        let scratch_root = root.path().to_path_buf();

        let handle = tokio::spawn(async move {
            let area = ScratchArea::create(&scratch_root, &PostId::from("p"), false)
                .await
                .unwrap();
            tokio::fs::write(area.path("narration.mp3"), b"mp3").await.unwrap();
            tokio::task::yield_now().await;
            panic!("adapter failure while {} is open", area.dir().display());
        });

        assert!(handle.await.unwrap_err().is_panic());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("posts/../x"), "posts____x");
        assert_eq!(sanitize(""), "post");
    }
}
