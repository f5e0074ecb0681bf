//! Playlist sources
//!
//! The synchronizer only depends on [`PlaylistFetcher`], so tests and
//! embedders can swap the network for scripted content.

pub mod http;
pub mod traits;

pub use http::HttpPlaylistFetcher;
pub use traits::PlaylistFetcher;
