//! Dashboard asset sources.
//!
//! The asset is the single page served over HTTP. It can live on disk
//! (re-read on every request, so edits show up on reload), be embedded
//! as bytes, or be embedded as base64.
//!
//! # Example
//!
//! ```
//! use dashwire::DashboardAsset;
//!
//! let on_disk = DashboardAsset::file("./dashboard.html");
//! let embedded = DashboardAsset::inline("<html>...</html>");
//! let encoded = DashboardAsset::base64("PGh0bWw+PC9odG1sPg==");
//! # let _ = (on_disk, embedded, encoded);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Content type used unless overridden.
pub const DEFAULT_CONTENT_TYPE: &str = "text/html; charset=utf-8";

// ============================================================================
// AssetSource
// ============================================================================

/// Where the asset bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    /// File on disk.
    File(PathBuf),
    /// Bytes held in memory.
    Inline(Arc<[u8]>),
    /// Base64-encoded bytes.
    Base64(String),
}

// ============================================================================
// DashboardAsset
// ============================================================================

/// The page served at `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardAsset {
    source: AssetSource,
    content_type: Cow<'static, str>,
}

impl DashboardAsset {
    /// Serves the file at `path`.
    #[inline]
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::from_source(AssetSource::File(path.into()))
    }

    /// Serves the given bytes.
    #[inline]
    #[must_use]
    pub fn inline(bytes: impl AsRef<[u8]>) -> Self {
        Self::from_source(AssetSource::Inline(Arc::from(bytes.as_ref())))
    }

    /// Serves base64-decoded content.
    #[inline]
    #[must_use]
    pub fn base64(data: impl Into<String>) -> Self {
        Self::from_source(AssetSource::Base64(data.into()))
    }

    fn from_source(source: AssetSource) -> Self {
        Self {
            source,
            content_type: Cow::Borrowed(DEFAULT_CONTENT_TYPE),
        }
    }

    /// Overrides the `Content-Type` header.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Cow::Owned(content_type.into());
        self
    }

    /// Returns the source.
    #[inline]
    #[must_use]
    pub fn source(&self) -> &AssetSource {
        &self.source
    }

    /// Returns the path if this is a file-based asset.
    #[inline]
    #[must_use]
    pub fn path(&self) -> Option<&PathBuf> {
        match &self.source {
            AssetSource::File(path) => Some(path),
            AssetSource::Inline(_) | AssetSource::Base64(_) => None,
        }
    }

    /// Returns the `Content-Type` header value.
    #[inline]
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Loads the asset bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Asset`] if the file cannot be read or the base64
    /// payload is malformed.
    pub async fn load(&self) -> Result<Cow<'_, [u8]>> {
        match &self.source {
            AssetSource::File(path) => tokio::fs::read(path)
                .await
                .map(Cow::Owned)
                .map_err(|e| Error::asset(format!("{}: {e}", path.display()))),
            AssetSource::Inline(bytes) => Ok(Cow::Borrowed(&**bytes)),
            AssetSource::Base64(data) => STANDARD
                .decode(data)
                .map(Cow::Owned)
                .map_err(|e| Error::asset(format!("invalid base64 asset: {e}"))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    #[tokio::test]
    async fn test_inline_load() {
        let asset = DashboardAsset::inline("<p>hi</p>");
        assert_eq!(asset.load().await.unwrap().as_ref(), b"<p>hi</p>");
        assert_eq!(asset.content_type(), DEFAULT_CONTENT_TYPE);
        assert!(asset.path().is_none());
    }

    #[tokio::test]
    async fn test_base64_load() {
        let asset = DashboardAsset::base64("PGh0bWw+PC9odG1sPg==");
        assert_eq!(asset.load().await.unwrap().as_ref(), b"<html></html>");

        let broken = DashboardAsset::base64("!!not base64!!");
        assert!(matches!(broken.load().await, Err(Error::Asset { .. })));
    }

    #[tokio::test]
    async fn test_file_is_reread() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "v1").unwrap();
        let asset = DashboardAsset::file(file.path());
        assert_eq!(asset.load().await.unwrap().as_ref(), b"v1");

        write!(file, "-v2").unwrap();
        file.flush().unwrap();
        assert_eq!(asset.load().await.unwrap().as_ref(), b"v1-v2");
    }

    #[test]
    fn test_content_type_override() {
        let asset = DashboardAsset::inline("{}").with_content_type("application/json");
        assert_eq!(asset.content_type(), "application/json");
    }
}
