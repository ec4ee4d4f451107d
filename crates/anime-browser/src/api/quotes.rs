//! Anime quotes API client.
//!
//! The API is driven entirely by query parameters on `/quotes`. Random
//! lookups are cached under 10-second time buckets so repeated clicks
//! within a window reuse one answer.

use super::types::Quote;
use super::{build_url, validate_base_url};
use crate::cache::{time_bucket, TtlCache};
use crate::fetch::{FetchError, ResilientFetcher};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Lifetime of cached search results
pub const QUOTES_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Lifetime of cached random quotes
pub const RANDOM_QUOTE_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

/// Width of the random-quote key bucket
pub const RANDOM_QUOTE_WINDOW: Duration = Duration::from_secs(10);

/// Filters accepted by `/quotes`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuoteQuery {
    /// Character names, sent comma-separated
    pub characters: Vec<String>,
    /// Show names, sent comma-separated
    pub shows: Vec<String>,
    pub random: bool,
    /// Ignored for random queries
    pub page: Option<u32>,
}

impl QuoteQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();

        if !self.characters.is_empty() {
            params.push(("character", self.characters.join(",")));
        }
        if !self.shows.is_empty() {
            params.push(("show", self.shows.join(",")));
        }
        if self.random {
            params.push(("random", "1".to_string()));
        } else if let Some(page) = self.page {
            params.push(("page", page.to_string()));
        }

        params
    }
}

/// The API answers with either one quote or a list
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum QuotesPayload {
    Many(Vec<Quote>),
    One(Quote),
}

impl From<QuotesPayload> for Vec<Quote> {
    fn from(payload: QuotesPayload) -> Self {
        match payload {
            QuotesPayload::Many(quotes) => quotes,
            QuotesPayload::One(quote) => vec![quote],
        }
    }
}

/// Anime quotes client
#[derive(Clone)]
pub struct QuotesClient {
    fetcher: ResilientFetcher,
    cache: Arc<TtlCache>,
    base_url: String,
}

impl QuotesClient {
    pub fn new(base_url: impl Into<String>, fetcher: ResilientFetcher, cache: Arc<TtlCache>) -> anyhow::Result<Self> {
        let base_url = base_url.into();
        validate_base_url(&base_url)?;

        Ok(Self {
            fetcher,
            cache,
            base_url,
        })
    }

    /// Uncached `/quotes` request
    pub async fn fetch_quotes(&self, query: &QuoteQuery) -> Result<Vec<Quote>, FetchError> {
        let url = build_url(&self.base_url, "/quotes", &query.params())?;
        info!(url = %url, "Fetching quotes");
        let payload: QuotesPayload = self.fetcher.get_json(&url).await?;
        Ok(payload.into())
    }

    fn bucket(&self) -> i64 {
        time_bucket(self.cache.clock().as_ref(), RANDOM_QUOTE_WINDOW)
    }

    async fn cached(&self, key: String, ttl: Duration, query: QuoteQuery) -> Result<Vec<Quote>, FetchError> {
        self.cache
            .get_or_fetch(&key, ttl, || async move { self.fetch_quotes(&query).await })
            .await
    }

    pub async fn random_quote(&self) -> Result<Option<Quote>, FetchError> {
        let key = format!("random_quote_{}", self.bucket());
        let query = QuoteQuery {
            random: true,
            ..Default::default()
        };
        Ok(self.cached(key, RANDOM_QUOTE_CACHE_TTL, query).await?.into_iter().next())
    }

    pub async fn random_quote_by_character(&self, character: &str) -> Result<Option<Quote>, FetchError> {
        let key = format!("random_quote_character_{}_{}", character, self.bucket());
        let query = QuoteQuery {
            characters: vec![character.to_string()],
            random: true,
            ..Default::default()
        };
        Ok(self.cached(key, RANDOM_QUOTE_CACHE_TTL, query).await?.into_iter().next())
    }

    pub async fn random_quote_by_anime(&self, show: &str) -> Result<Option<Quote>, FetchError> {
        let key = format!("random_quote_anime_{}_{}", show, self.bucket());
        let query = QuoteQuery {
            shows: vec![show.to_string()],
            random: true,
            ..Default::default()
        };
        Ok(self.cached(key, RANDOM_QUOTE_CACHE_TTL, query).await?.into_iter().next())
    }

    pub async fn search_quotes_by_character(&self, character: &str, page: u32) -> Result<Vec<Quote>, FetchError> {
        let key = format!("quotes_character_{}_page_{}", character, page);
        let query = QuoteQuery {
            characters: vec![character.to_string()],
            page: Some(page),
            ..Default::default()
        };
        self.cached(key, QUOTES_CACHE_TTL, query).await
    }

    pub async fn search_quotes_by_anime(&self, show: &str) -> Result<Vec<Quote>, FetchError> {
        let key = format!("quotes_anime_{}", show);
        let query = QuoteQuery {
            shows: vec![show.to_string()],
            ..Default::default()
        };
        self.cached(key, QUOTES_CACHE_TTL, query).await
    }

    pub async fn all_quotes(&self, page: u32) -> Result<Vec<Quote>, FetchError> {
        let key = format!("all_quotes_page_{}", page);
        let query = QuoteQuery {
            page: Some(page),
            ..Default::default()
        };
        self.cached(key, QUOTES_CACHE_TTL, query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::fetch::testing::{ScriptedTransport, Step};
    use crate::fetch::RetryPolicy;
    use shared::MemoryStore;

    const BASE: &str = "https://yurippe.vercel.app/api";

    fn client(transport: Arc<ScriptedTransport>, clock: Arc<ManualClock>) -> QuotesClient {
        let cache = Arc::new(TtlCache::new(Arc::new(MemoryStore::new()), clock, QUOTES_CACHE_TTL));
        let fetcher = ResilientFetcher::new(transport, RetryPolicy::default());
        QuotesClient::new(BASE, fetcher, cache).unwrap()
    }

    #[test]
    fn test_query_params() {
        let query = QuoteQuery {
            characters: vec!["Levi".into(), "Eren Yeager".into()],
            shows: vec!["Attack on Titan".into()],
            random: false,
            page: Some(3),
        };
        assert_eq!(
            build_url(BASE, "/quotes", &query.params()).unwrap(),
            "https://yurippe.vercel.app/api/quotes?character=Levi%2CEren+Yeager&show=Attack+on+Titan&page=3"
        );

        let random = QuoteQuery {
            random: true,
            page: Some(2),
            ..Default::default()
        };
        assert_eq!(random.params(), vec![("random", "1".to_string())]);
        assert!(QuoteQuery::default().params().is_empty());
    }

    #[tokio::test]
    async fn test_single_object_payload_becomes_list() {
        let transport = ScriptedTransport::new(vec![Step::Respond(
            200,
            r#"{"id": 1, "quote": "Believe it!", "character": "Naruto", "show": "Naruto"}"#.into(),
        )]);
        let quotes = client(transport, Arc::new(ManualClock::new(0)));

        let quote = quotes.random_quote().await.unwrap().unwrap();
        assert_eq!(quote.quote, "Believe it!");
    }

    #[tokio::test]
    async fn test_random_quote_bucket() {
        let body = r#"[{"quote": "q", "character": "c", "show": "s"}]"#;
        let transport = ScriptedTransport::new(vec![
            Step::Respond(200, body.into()),
            Step::Respond(200, body.into()),
        ]);
        let clock = Arc::new(ManualClock::new(1_000));
        let quotes = client(transport.clone(), clock.clone());

        quotes.random_quote().await.unwrap();
        clock.advance(Duration::from_secs(5));
        quotes.random_quote().await.unwrap();
        assert_eq!(transport.calls(), 1);

        // Next 10-second window asks the API again
        clock.advance(Duration::from_secs(5));
        quotes.random_quote().await.unwrap();
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_search_keys_are_distinct() {
        let body = r#"[]"#;
        let transport = ScriptedTransport::repeating(Step::Respond(200, body.into()));
        let quotes = client(transport.clone(), Arc::new(ManualClock::new(0)));

        quotes.search_quotes_by_character("Levi", 1).await.unwrap();
        quotes.search_quotes_by_character("Levi", 2).await.unwrap();
        quotes.search_quotes_by_anime("Levi").await.unwrap();
        quotes.all_quotes(1).await.unwrap();
        quotes.search_quotes_by_character("Levi", 1).await.unwrap();

        assert_eq!(transport.calls(), 4);
        assert_eq!(
            transport.urls()[3],
            "https://yurippe.vercel.app/api/quotes?page=1"
        );
    }
}
