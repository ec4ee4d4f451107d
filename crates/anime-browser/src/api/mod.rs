//! Upstream API clients.
//!
//! Thin parameter-to-URL mappers over [`ResilientFetcher`](crate::fetch::ResilientFetcher),
//! with responses memoized in the shared [`TtlCache`](crate::cache::TtlCache).

pub mod jikan;
pub mod quotes;
pub mod types;

pub use jikan::JikanClient;
pub use quotes::{QuoteQuery, QuotesClient};
pub use types::*;

use crate::fetch::{FetchError, FetchErrorKind};
use reqwest::Url;

/// Join `path` onto `base` and append form-encoded query parameters
pub(crate) fn build_url(base: &str, path: &str, params: &[(&str, String)]) -> Result<String, FetchError> {
    let raw = format!("{}{}", base.trim_end_matches('/'), path);
    let url = if params.is_empty() {
        Url::parse(&raw)
    } else {
        Url::parse_with_params(&raw, params.iter().map(|(k, v)| (*k, v.as_str())))
    };

    url.map(String::from).map_err(|e| {
        FetchError::new(
            FetchErrorKind::BadRequest,
            format!("Invalid request URL {}: {}", raw, e),
        )
    })
}

/// Fail fast on a misconfigured base URL
pub(crate) fn validate_base_url(base: &str) -> anyhow::Result<()> {
    use anyhow::Context;

    let url = Url::parse(base).with_context(|| format!("Invalid API base URL: {}", base))?;
    anyhow::ensure!(
        matches!(url.scheme(), "http" | "https"),
        "API base URL must be http(s): {}",
        base
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url_encodes_params() {
        let url = build_url(
            "https://api.jikan.moe/v4/",
            "/anime",
            &[("q", "fullmetal alchemist & co".to_string()), ("page", "2".to_string())],
        )
        .unwrap();
        assert_eq!(
            url,
            "https://api.jikan.moe/v4/anime?q=fullmetal+alchemist+%26+co&page=2"
        );
    }

    #[test]
    fn test_validate_base_url() {
        assert!(validate_base_url("https://api.jikan.moe/v4").is_ok());
        assert!(validate_base_url("ftp://example.test").is_err());
        assert!(validate_base_url("not a url").is_err());
    }
}
