//! Repository abstraction over channel storage
//!
//! The synchronizer talks to storage only through [`ChannelStore`], which
//! keeps it testable against in-memory or failing stores. The SQLite
//! implementation lives in [`sqlite`] on top of [`Database`](crate::database::Database).

pub mod sqlite;
pub mod traits;

pub use traits::ChannelStore;
