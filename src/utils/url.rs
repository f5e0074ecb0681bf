//! URL helpers for logging subscription URLs

use url::Url;

const MASK: &str = "****";

/// Query parameters whose values never reach the logs
const SENSITIVE_PARAMS: [&str; 8] = [
    "username", "password", "user", "pass", "pwd", "passwd", "token", "api_key",
];

pub struct UrlUtils;

impl UrlUtils {
    /// Mask userinfo and credential-bearing query parameters.
    ///
    /// Strings that do not parse as URLs are returned unchanged.
    pub fn obfuscate_credentials(url: &str) -> String {
        let Ok(mut parsed) = Url::parse(url) else {
            return url.to_string();
        };

        if !parsed.username().is_empty() || parsed.password().is_some() {
            let _ = parsed.set_username(MASK);
            let _ = parsed.set_password(Some(MASK));
        }

        if parsed.query().is_some() {
            let pairs: Vec<(String, String)> = parsed
                .query_pairs()
                .map(|(key, value)| {
                    let sensitive = SENSITIVE_PARAMS
                        .iter()
                        .any(|param| key.eq_ignore_ascii_case(param));
                    let value = if sensitive {
                        MASK.to_string()
                    } else {
                        value.into_owned()
                    };
                    (key.into_owned(), value)
                })
                .collect();
            parsed.query_pairs_mut().clear().extend_pairs(pairs);
        }

        parsed.to_string()
    }
}
