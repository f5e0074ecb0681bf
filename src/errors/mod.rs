//! Centralized error handling for the M3U sync core
//!
//! # Error Categories
//!
//! - **Format Errors**: unrecognized playlist URLs and unresolvable metadata lines
//! - **Source Errors**: transport failures while fetching a playlist
//! - **Repository Errors**: SQLite operations and migrations
//!
//! # Usage
//!
//! ```rust
//! use m3u_sync::errors::{AppError, AppResult};
//!
//! async fn example_function() -> AppResult<String> {
//!     // Function can return any error type that converts to AppError
//!     Ok("success".to_string())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;
