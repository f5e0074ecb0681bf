//! Source abstraction for playlist downloads

use async_trait::async_trait;

use crate::errors::AppResult;

/// Retrieves the raw text of a playlist.
///
/// Implementations report network failures as [`SourceError`] and never
/// inspect the content they return.
///
/// [`SourceError`]: crate::errors::SourceError
#[async_trait]
pub trait PlaylistFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> AppResult<String>;
}
