//! Wiring: config in, a ready router out.

use crate::api::{JikanClient, QuotesClient};
use crate::cache::{Clock, SystemClock, TtlCache};
use crate::document::Document;
use crate::fetch::{HttpTransport, ReqwestTransport, ResilientFetcher, RetryPolicy};
use crate::router::{HistoryLocation, Route, Router};
use crate::views::{
    render_my_list, render_settings, DetailView, HomeView, QuotesSettings, QuotesView, SearchState,
    SearchView,
};
use anyhow::{Context, Result};
use shared::{Config, KeyValueStore, MemoryStore, SqliteStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

/// The running application
pub struct App {
    pub router: Arc<Router>,
    pub document: Arc<Document>,
    pub cache: Arc<TtlCache>,
    pub search: SearchState,
    pub search_view: Arc<SearchView>,
    pub quotes_view: Arc<QuotesView>,
}

/// Collaborators the application is built from
pub struct AppParts {
    pub transport: Arc<dyn HttpTransport>,
    pub store: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn Clock>,
}

impl AppParts {
    /// Real HTTP transport plus the store selected by the cache settings
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.api.user_agent).context("Failed to create HTTP client")?;

        let store: Arc<dyn KeyValueStore> = if config.cache.enabled {
            let path = config.cache_database_path();
            info!(db_path = %path.display(), "Opening cache database");
            Arc::new(SqliteStore::open(&path).context("Failed to open cache database")?)
        } else {
            info!("Persistent cache disabled, caching in memory only");
            Arc::new(MemoryStore::new())
        };

        Ok(Self {
            transport: Arc::new(transport),
            store,
            clock: Arc::new(SystemClock),
        })
    }
}

impl App {
    /// Build the application starting at `initial` (empty for the default route).
    ///
    /// Returns the receiver for location change notifications; feed it to
    /// [`Router::next`] or [`Router::run`].
    pub fn build(config: &Config, parts: AppParts, initial: &str) -> Result<(Self, UnboundedReceiver<String>)> {
        let cache = Arc::new(TtlCache::new(parts.store, parts.clock, config.default_ttl()));
        let fetcher = ResilientFetcher::new(
            parts.transport,
            RetryPolicy {
                timeout: config.fetch.timeout(),
                backoff: config.fetch.backoff(),
            },
        );

        let jikan = JikanClient::new(&config.api.jikan_base_url, fetcher.clone(), cache.clone())
            .context("Invalid Jikan base URL")?;
        let quotes = QuotesClient::new(&config.api.quotes_base_url, fetcher, cache.clone())
            .context("Invalid quotes base URL")?;

        let search = SearchState::new();
        let search_view = Arc::new(SearchView::new(jikan.clone(), search.clone()));
        let quotes_view = Arc::new(QuotesView::new(
            quotes,
            QuotesSettings {
                per_page: config.views.quotes_per_page,
                min_loading: Duration::from_millis(config.views.quotes_min_loading_ms),
            },
        ));

        let routes = vec![
            Route::view("#/home", Arc::new(HomeView::new(jikan.clone(), config.views.featured_limit))),
            Route::view("#/search", search_view.clone()),
            Route::view("#/detail/:id", Arc::new(DetailView::new(jikan))),
            Route::fallback("#/my-list", render_my_list),
            Route::view("#/quotes", quotes_view.clone()),
            Route::fallback("#/settings", render_settings),
        ];

        let document = Arc::new(Document::new());
        let (location, changes) = HistoryLocation::new(initial);
        let router = Router::new(routes, &config.router.default_route, location, document.clone())
            .context("Failed to build router")?;

        let app = Self {
            router: Arc::new(router),
            document,
            cache,
            search,
            search_view,
            quotes_view,
        };
        Ok((app, changes))
    }
}
