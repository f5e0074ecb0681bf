//! Playlist format detection

use serde::{Deserialize, Serialize};
use url::Url;

use super::interceptor::ParseInterceptor;
use super::m3u_parser::{playlist_lines, M3uParser, ParseOutcome, M3U_HEADER_MARK};
use crate::errors::FormatError;
use crate::utils::UrlUtils;

/// Parser implementations selectable by [`FormatDetector`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserKind {
    M3u,
    M3u8,
}

impl ParserKind {
    /// Run the parser for this format over playlist text.
    pub fn parse(&self, content: &str, interceptors: &[&dyn ParseInterceptor]) -> ParseOutcome {
        match self {
            ParserKind::M3u | ParserKind::M3u8 => M3uParser::parse_str(content, interceptors),
        }
    }
}

pub struct FormatDetector;

impl FormatDetector {
    /// Classify a subscription URL by its path suffix, ignoring case.
    ///
    /// `None` means the URL is malformed or names no supported format.
    pub fn classify(url: &str) -> Option<ParserKind> {
        let parsed = Url::parse(url).ok()?;
        let path = parsed.path().to_ascii_lowercase();
        if path.ends_with(".m3u") {
            Some(ParserKind::M3u)
        } else if path.ends_with(".m3u8") {
            Some(ParserKind::M3u8)
        } else {
            None
        }
    }

    /// Like [`classify`](Self::classify), failing with a [`FormatError`]
    /// that carries the URL with its credentials masked.
    pub fn require(url: &str) -> Result<ParserKind, FormatError> {
        Self::classify(url).ok_or_else(|| FormatError::UnsupportedUrl {
            url: UrlUtils::obfuscate_credentials(url),
        })
    }

    /// Recognize playlist content that starts with the `#EXTM3U` header.
    pub fn sniff(content: &str) -> Option<ParserKind> {
        playlist_lines(content)
            .map(str::trim)
            .find(|line| !line.is_empty())
            .filter(|line| line.starts_with(M3U_HEADER_MARK))
            .map(|_| ParserKind::M3u)
    }
}
