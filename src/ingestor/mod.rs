//! Playlist ingestion: parsing, format detection and subscription sync

pub mod attributes;
pub mod entry;
pub mod format;
pub mod interceptor;
pub mod m3u_parser;
pub mod scheduler;
pub mod state_manager;
pub mod subscription_sync;

pub use attributes::AttributeSet;
pub use entry::{EntryBuilder, PendingEntry};
pub use format::{FormatDetector, ParserKind};
pub use interceptor::{DiscardReason, ParseInterceptor, TracingInterceptor};
pub use m3u_parser::{M3uParser, ParseOutcome, ParseStats};
pub use scheduler::{SyncSchedule, SyncScheduler};
pub use state_manager::{StartRejection, SyncOutcome, SyncStateManager, SyncTrigger};
pub use subscription_sync::SubscriptionSynchronizer;
