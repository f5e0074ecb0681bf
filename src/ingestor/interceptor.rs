//! Side-channel observers for the M3U parser
//!
//! Interceptors see every line and every parser decision but only through
//! shared references, so they cannot alter the records a parse produces.

use std::fmt;

use tracing::{debug, trace};

use super::m3u_parser::ParseStats;
use crate::errors::FormatError;
use crate::models::ChannelRecord;

/// Why the parser dropped a line or a pending entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    /// A new metadata line arrived before the pending entry got its URL
    Superseded,
    /// Input ended while an entry was waiting for its URL
    EndOfInput,
    /// URL line without a preceding metadata line
    OrphanUrl,
    /// The entry resolved to an empty title
    MissingTitle,
    /// The metadata line could not be parsed
    Malformed(FormatError),
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscardReason::Superseded => write!(f, "metadata line without stream url"),
            DiscardReason::EndOfInput => write!(f, "playlist ended before stream url"),
            DiscardReason::OrphanUrl => write!(f, "stream url without metadata line"),
            DiscardReason::MissingTitle => write!(f, "entry has no title"),
            DiscardReason::Malformed(e) => write!(f, "{e}"),
        }
    }
}

/// Observer hooks invoked by [`M3uParser`](super::M3uParser) while parsing.
///
/// All hooks default to no-ops.
pub trait ParseInterceptor {
    /// Every non-empty line, before it is interpreted
    fn on_line(&self, _line_number: usize, _line: &str) {}

    /// A record was appended to the output
    fn on_record(&self, _record: &ChannelRecord) {}

    fn on_discard(&self, _line_number: usize, _reason: &DiscardReason) {}

    /// A `#EXTM3U` header dropped `discarded` records parsed before it
    fn on_reset(&self, _line_number: usize, _discarded: usize) {}

    fn on_finish(&self, _stats: &ParseStats) {}
}

/// Logs parser activity through `tracing`
pub struct TracingInterceptor {
    label: String,
}

impl TracingInterceptor {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl ParseInterceptor for TracingInterceptor {
    fn on_line(&self, line_number: usize, line: &str) {
        trace!("[{}] line {}: {}", self.label, line_number, line);
    }

    fn on_discard(&self, line_number: usize, reason: &DiscardReason) {
        debug!(
            "[{}] discarded entry at line {}: {}",
            self.label, line_number, reason
        );
    }

    fn on_reset(&self, line_number: usize, discarded: usize) {
        debug!(
            "[{}] playlist header at line {} reset output, {} records dropped",
            self.label, line_number, discarded
        );
    }

    fn on_finish(&self, stats: &ParseStats) {
        debug!(
            "[{}] parsed {} lines: {} records, {} discarded, {} resets",
            self.label, stats.lines, stats.records, stats.discarded, stats.resets
        );
    }
}
