//! Line-oriented M3U parser
//!
//! The parser is a two-state machine: `Idle`, or `AwaitingUrl` holding the
//! entry built from the last `#EXTINF:` line. Each call starts from fresh
//! state, so a parser never carries records from one playlist into another.

use serde::Serialize;

use super::attributes::EXTINF_MARK;
use super::entry::{EntryBuilder, PendingEntry};
use super::interceptor::{DiscardReason, ParseInterceptor};
use crate::models::ChannelRecord;

pub(crate) const M3U_HEADER_MARK: &str = "#EXTM3U";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseStats {
    /// Non-empty lines seen
    pub lines: usize,
    /// Records in the final output
    pub records: usize,
    /// Entries and lines dropped as incomplete or malformed
    pub discarded: usize,
    /// `#EXTM3U` headers that restarted the output
    pub resets: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutcome {
    pub records: Vec<ChannelRecord>,
    pub stats: ParseStats,
}

enum ParserState {
    Idle,
    AwaitingUrl(PendingEntry),
}

pub struct M3uParser;

impl M3uParser {
    /// Parse playlist text.
    pub fn parse_str(content: &str, interceptors: &[&dyn ParseInterceptor]) -> ParseOutcome {
        Self::parse(playlist_lines(content), interceptors)
    }

    /// Parse an ordered sequence of lines into channel records.
    pub fn parse<I, S>(lines: I, interceptors: &[&dyn ParseInterceptor]) -> ParseOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut records = Vec::new();
        let mut stats = ParseStats::default();
        let mut state = ParserState::Idle;

        let notify_discard = |stats: &mut ParseStats, line_number: usize, reason: DiscardReason| {
            stats.discarded += 1;
            for interceptor in interceptors {
                interceptor.on_discard(line_number, &reason);
            }
        };

        let mut last_line = 0;
        for (index, raw) in lines.into_iter().enumerate() {
            let line_number = index + 1;
            last_line = line_number;
            let line = raw.as_ref().trim();
            if line.is_empty() {
                continue;
            }

            stats.lines += 1;
            for interceptor in interceptors {
                interceptor.on_line(line_number, line);
            }

            if line.starts_with(M3U_HEADER_MARK) {
                let dropped = records.len();
                records.clear();
                state = ParserState::Idle;
                stats.resets += 1;
                for interceptor in interceptors {
                    interceptor.on_reset(line_number, dropped);
                }
            } else if line.starts_with(EXTINF_MARK) {
                if let ParserState::AwaitingUrl(_) = state {
                    notify_discard(&mut stats, line_number, DiscardReason::Superseded);
                }
                state = match EntryBuilder::from_metadata(line) {
                    Ok(entry) => ParserState::AwaitingUrl(entry),
                    Err(e) => {
                        notify_discard(&mut stats, line_number, DiscardReason::Malformed(e));
                        ParserState::Idle
                    }
                };
            } else if line.starts_with('#') {
                continue;
            } else {
                match std::mem::replace(&mut state, ParserState::Idle) {
                    ParserState::AwaitingUrl(entry) => match entry.finish(line) {
                        Some(record) => {
                            for interceptor in interceptors {
                                interceptor.on_record(&record);
                            }
                            records.push(record);
                        }
                        None => {
                            notify_discard(&mut stats, line_number, DiscardReason::MissingTitle)
                        }
                    },
                    ParserState::Idle => {
                        notify_discard(&mut stats, line_number, DiscardReason::OrphanUrl)
                    }
                }
            }
        }

        if let ParserState::AwaitingUrl(_) = state {
            notify_discard(&mut stats, last_line, DiscardReason::EndOfInput);
        }

        stats.records = records.len();
        for interceptor in interceptors {
            interceptor.on_finish(&stats);
        }

        ParseOutcome { records, stats }
    }
}

/// Split playlist text into lines, ignoring a leading byte order mark.
pub fn playlist_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .strip_prefix('\u{feff}')
        .unwrap_or(content)
        .split('\n')
}
