//! Photo library contract.

use std::path::{Path, PathBuf};

use shutter_common::error::ShutterResult;

/// A captured resource handed to the library.
#[derive(Debug, Clone, Copy)]
pub enum LibraryItem<'a> {
    /// Encoded photo bytes.
    Photo { data: &'a [u8], extension: &'a str },
    /// A finished movie file. The library takes ownership of the file.
    Movie { path: &'a Path },
}

/// Reference to an asset written to the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryAsset {
    pub id: String,
    pub path: Option<PathBuf>,
}

/// Host photo library: one transactional write per item.
#[async_trait::async_trait]
pub trait PhotoLibrary: Send + Sync {
    async fn save(&self, item: LibraryItem<'_>) -> ShutterResult<LibraryAsset>;
}
