//! Directory-backed photo library.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use shutter_common::clock::file_timestamp;
use shutter_common::error::{ShutterError, ShutterResult};
use shutter_platform_core::{LibraryAsset, LibraryItem, PhotoLibrary};

/// Photo library that stores assets as files in one directory.
///
/// Photos are written as `IMG_<timestamp>_<n>.<ext>`; movies are moved in
/// as `MOV_<timestamp>_<n>.<ext>`.
pub struct DirectoryLibrary {
    root: PathBuf,
    counter: AtomicU64,
}

impl DirectoryLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            counter: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn next_name(&self, prefix: &str, extension: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{prefix}_{}_{n:04}.{extension}", file_timestamp())
    }

    async fn write_photo(&self, data: &[u8], extension: &str) -> std::io::Result<PathBuf> {
        let target = self.root.join(self.next_name("IMG", extension));
        tokio::fs::write(&target, data).await?;
        Ok(target)
    }

    async fn move_movie(&self, source: &Path) -> std::io::Result<PathBuf> {
        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mov");
        let target = self.root.join(self.next_name("MOV", extension));
        if tokio::fs::rename(source, &target).await.is_err() {
            // Rename fails across filesystems.
            tokio::fs::copy(source, &target).await?;
            tokio::fs::remove_file(source).await?;
        }
        Ok(target)
    }
}

#[async_trait::async_trait]
impl PhotoLibrary for DirectoryLibrary {
    async fn save(&self, item: LibraryItem<'_>) -> ShutterResult<LibraryAsset> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| ShutterError::library_write(format!("{}: {e}", self.root.display())))?;

        let path = match item {
            LibraryItem::Photo { data, extension } => self.write_photo(data, extension).await,
            LibraryItem::Movie { path } => {
                if !path.exists() {
                    return Err(ShutterError::FileNotFound {
                        path: path.to_path_buf(),
                    });
                }
                self.move_movie(path).await
            }
        }
        .map_err(|e| ShutterError::library_write(e.to_string()))?;

        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::info!(asset = %id, "Saved asset to library");
        Ok(LibraryAsset {
            id,
            path: Some(path),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_photo_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let library = DirectoryLibrary::new(dir.path().join("library"));

        let asset = library
            .save(LibraryItem::Photo {
                data: b"photo",
                extension: "ppm",
            })
            .await
            .unwrap();

        let path = asset.path.unwrap();
        assert!(asset.id.starts_with("IMG_"));
        assert!(asset.id.ends_with("_0001.ppm"));
        assert_eq!(std::fs::read(path).unwrap(), b"photo");
    }

    #[tokio::test]
    async fn moves_movie_file_into_library() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("tmp.mov");
        std::fs::write(&source, b"movie").unwrap();
        let library = DirectoryLibrary::new(dir.path().join("library"));

        let asset = library
            .save(LibraryItem::Movie { path: &source })
            .await
            .unwrap();

        assert!(!source.exists());
        assert!(asset.id.starts_with("MOV_"));
        assert_eq!(std::fs::read(asset.path.unwrap()).unwrap(), b"movie");
    }

    #[tokio::test]
    async fn missing_movie_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let library = DirectoryLibrary::new(dir.path());
        let missing = dir.path().join("gone.mov");

        let err = library
            .save(LibraryItem::Movie { path: &missing })
            .await
            .unwrap_err();
        assert!(matches!(err, ShutterError::FileNotFound { .. }));
    }
}
