//! Attribute extraction for `#EXTINF` metadata lines
//!
//! Playlist feeds in the wild do not quote values consistently, so a value
//! may contain spaces without any quoting at all (`tvg-name=Das Erste HD`).
//! The line is therefore split on single spaces and the tokens are walked
//! from right to left: fragments that do not start with an attribute key are
//! carried left until they can be glued onto the token that owns them.

use crate::errors::FormatError;

pub(crate) const EXTINF_MARK: &str = "#EXTINF:";

pub const TVG_ID: &str = "tvg-id";
pub const TVG_NAME: &str = "tvg-name";
pub const TVG_LOGO: &str = "tvg-logo";
pub const GROUP_TITLE: &str = "group-title";

const RECOGNIZED_KEYS: [&str; 4] = [TVG_ID, TVG_LOGO, TVG_NAME, GROUP_TITLE];

/// Wrapper pairs stripped from unquoted values, one layer at most
const WRAPPERS: [(char, char); 6] = [
    ('"', '"'),
    ('\'', '\''),
    ('(', ')'),
    ('[', ']'),
    ('{', '}'),
    ('<', '>'),
];

/// Attributes recognized on a single metadata line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSet {
    pub tvg_id: Option<String>,
    pub tvg_name: Option<String>,
    pub tvg_logo: Option<String>,
    pub group_title: Option<String>,
    /// Text following a closing quote, e.g. `CNN` in `group-title="News",CNN`
    pub trailing_title: Option<String>,
}

impl AttributeSet {
    /// True when none of the four recognized attributes is present
    pub fn is_empty(&self) -> bool {
        self.tvg_id.is_none()
            && self.tvg_name.is_none()
            && self.tvg_logo.is_none()
            && self.group_title.is_none()
    }

    fn slot_mut(&mut self, key: &str) -> Option<&mut Option<String>> {
        match key {
            TVG_ID => Some(&mut self.tvg_id),
            TVG_NAME => Some(&mut self.tvg_name),
            TVG_LOGO => Some(&mut self.tvg_logo),
            GROUP_TITLE => Some(&mut self.group_title),
            _ => None,
        }
    }

    /// Store one `key=value` entry. Keys outside the recognized set only
    /// contribute their trailing display text.
    fn load(&mut self, entry: &str) {
        let (key, raw_value) = match entry.split_once('=') {
            Some((key, value)) => (key.trim(), value),
            None => (entry.trim(), ""),
        };
        let (value, trailing) = split_value(raw_value, key != GROUP_TITLE);

        if self.trailing_title.is_none() {
            self.trailing_title = trailing;
        }
        if let Some(slot) = self.slot_mut(key) {
            *slot = Some(value);
        }
    }
}

/// Extract the recognized attributes from a full `#EXTINF:` line.
///
/// Returns an empty set when no recognized attribute is present; the caller
/// then falls back to the text after the last comma. A left-over fragment
/// that cannot be turned into a title is a [`FormatError`].
pub fn extract(line: &str) -> Result<AttributeSet, FormatError> {
    let mut attributes = AttributeSet::default();
    let mut recognized = false;
    let mut illegal: Option<String> = None;
    let title_start = title_start(line);

    for (start, token) in tokens(line).into_iter().rev() {
        if token.starts_with(EXTINF_MARK) {
            continue;
        }
        let merged = match illegal.take() {
            Some(fragment) => format!("{token} {fragment}"),
            // Empty tokens only matter between two fragments
            None if token.is_empty() => continue,
            None => token.to_string(),
        };

        if has_legal_mark(&merged) {
            attributes.load(&merged);
            recognized = true;
        } else if start < title_start && is_foreign_attribute(&merged) {
            // tvg-chno, catchup and friends: consumed, never reported
            attributes.load(&merged);
        } else {
            illegal = Some(merged);
        }
    }

    if !recognized {
        return Ok(AttributeSet::default());
    }

    if let Some(fragment) = illegal {
        let pieces: Vec<&str> = fragment.split(',').collect();
        let piece = if pieces.len() > 1 { pieces[1] } else { pieces[0] };
        let piece = piece.trim();
        if piece.is_empty() {
            return Err(FormatError::UnresolvableTitle {
                line: line.to_string(),
            });
        }
        attributes.group_title = Some(piece.to_string());
    }

    Ok(attributes)
}

/// Space-separated tokens with their byte offsets. Runs of spaces yield
/// empty tokens so that rejoining restores the original spacing.
fn tokens(line: &str) -> Vec<(usize, &str)> {
    let mut offset = 0;
    line.split(' ')
        .map(|token| {
            let start = offset;
            offset += token.len() + 1;
            (start, token)
        })
        .collect()
}

/// Byte offset of the display title: just past the last comma that is not
/// inside a quoted attribute value. `usize::MAX` when there is no such comma.
fn title_start(line: &str) -> usize {
    let mut quote: Option<char> = None;
    let mut previous = None;
    let mut start = usize::MAX;

    for (index, c) in line.char_indices() {
        match quote {
            Some(open) if c == open => quote = None,
            Some(_) => {}
            None if (c == '"' || c == '\'') && previous == Some('=') => quote = Some(c),
            None if c == ',' => start = index + 1,
            None => {}
        }
        previous = Some(c);
    }
    start
}

fn has_legal_mark(text: &str) -> bool {
    RECOGNIZED_KEYS.iter().any(|key| text.starts_with(key))
}

/// `key=value` with a plain attribute name that is not one of ours
fn is_foreign_attribute(text: &str) -> bool {
    match text.split_once('=') {
        Some((key, _)) => {
            !key.is_empty()
                && key
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
                && key.chars().any(|c| c.is_ascii_alphabetic())
        }
        None => false,
    }
}

/// Split a raw attribute value into its content and any display text that
/// follows it. Unquoted values end at the first comma when `comma_ends_value`
/// is set; `group-title` keeps its commas.
fn split_value(raw: &str, comma_ends_value: bool) -> (String, Option<String>) {
    let raw = raw.trim();
    let quote = match raw.chars().next() {
        Some(c @ ('"' | '\'')) => c,
        _ => {
            let (value, rest) = match raw.split_once(',') {
                Some((value, rest)) if comma_ends_value => (value, rest.trim()),
                _ => (raw, ""),
            };
            let trailing = (!rest.is_empty()).then(|| rest.to_string());
            return (strip_wrapper(value.trim()).trim().to_string(), trailing);
        }
    };

    let body = &raw[quote.len_utf8()..];
    match body.find(quote) {
        Some(end) => {
            let value = body[..end].trim().to_string();
            let rest = body[end + quote.len_utf8()..].trim_start();
            let rest = rest.strip_prefix(',').unwrap_or(rest).trim();
            let trailing = (!rest.is_empty()).then(|| rest.to_string());
            (value, trailing)
        }
        None => (strip_wrapper(raw).trim().to_string(), None),
    }
}

/// Remove exactly one matching wrapper pair, if present.
pub fn strip_wrapper(value: &str) -> &str {
    for (open, close) in WRAPPERS {
        if value.len() >= open.len_utf8() + close.len_utf8()
            && value.starts_with(open)
            && value.ends_with(close)
        {
            return &value[open.len_utf8()..value.len() - close.len_utf8()];
        }
    }
    value
}
