//! Conversion of one metadata line plus one URL line into a [`ChannelRecord`]

use super::attributes::{self, AttributeSet, EXTINF_MARK};
use crate::errors::FormatError;
use crate::models::ChannelRecord;

/// A channel built from a metadata line, waiting for its stream URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    record: ChannelRecord,
}

impl PendingEntry {
    pub fn title(&self) -> &str {
        &self.record.title
    }

    /// Attach the stream URL. Returns `None` when the entry cannot form a
    /// valid record (no title, or a blank URL).
    pub fn finish(self, stream_url: &str) -> Option<ChannelRecord> {
        let stream_url = stream_url.trim();
        if stream_url.is_empty() || self.record.title.is_empty() {
            return None;
        }
        Some(ChannelRecord {
            stream_url: stream_url.to_string(),
            ..self.record
        })
    }
}

pub struct EntryBuilder;

impl EntryBuilder {
    /// Build a pending entry from a full `#EXTINF:` line.
    pub fn from_metadata(line: &str) -> Result<PendingEntry, FormatError> {
        let attributes = attributes::extract(line)?;

        let record = if attributes.is_empty() {
            ChannelRecord {
                title: fallback_title(line),
                ..ChannelRecord::default()
            }
        } else {
            Self::from_attributes(line, attributes)
        };

        Ok(PendingEntry { record })
    }

    fn from_attributes(line: &str, attributes: AttributeSet) -> ChannelRecord {
        let AttributeSet {
            tvg_id,
            tvg_name,
            tvg_logo,
            group_title,
            trailing_title,
        } = attributes;

        let (group, mut title) =
            resolve_group_and_title(group_title.as_deref(), trailing_title.as_deref());
        if title.is_empty() {
            title = trailing_title
                .filter(|text| !text.trim().is_empty())
                .map(|text| text.trim().to_string())
                .or_else(|| title_after_last_comma(line))
                .unwrap_or_default();
        }

        ChannelRecord {
            id: tvg_id.unwrap_or_default(),
            name: tvg_name.unwrap_or_default(),
            group,
            title,
            cover: tvg_logo.unwrap_or_default(),
            ..ChannelRecord::default()
        }
    }
}

/// Split `group-title` into (group, title).
///
/// `News,CNN` carries both; a single segment is a group when display text
/// follows the quoted value and a title otherwise.
fn resolve_group_and_title(
    group_title: Option<&str>,
    trailing: Option<&str>,
) -> (String, String) {
    let Some(group_title) = group_title else {
        return (String::new(), String::new());
    };

    let segments: Vec<&str> = group_title.split(',').map(str::trim).collect();
    match (segments.as_slice(), trailing) {
        ([group, title], _) => (group.to_string(), title.to_string()),
        ([group], Some(title)) if !group.is_empty() => {
            (group.to_string(), title.trim().to_string())
        }
        _ => (String::new(), segments.first().copied().unwrap_or_default().to_string()),
    }
}

fn title_after_last_comma(line: &str) -> Option<String> {
    line.rsplit_once(',')
        .map(|(_, title)| title.trim().to_string())
}

/// Text after the final comma, or after the duration when there is no comma.
fn fallback_title(line: &str) -> String {
    if let Some(title) = title_after_last_comma(line) {
        return title;
    }
    let rest = line.strip_prefix(EXTINF_MARK).unwrap_or(line).trim_start();
    match rest.split_once(char::is_whitespace) {
        Some((_duration, title)) => title.trim().to_string(),
        None => String::new(),
    }
}
