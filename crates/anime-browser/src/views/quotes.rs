//! Quotes view: filtered quote listing with client-side paging.

use super::{View, ViewContext};
use crate::api::{Quote, QuotesClient};
use crate::document::retry_action;
use crate::fetch::{FetchError, FetchErrorKind};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info};

pub const FILTERS_CONTAINER: &str = "quotes-filters";
pub const QUOTES_CONTAINER: &str = "quotes-container";
pub const PAGINATION_CONTAINER: &str = "quotes-pagination";

/// Quotes shorter than this are listed after the longer ones
const SHORT_QUOTE_CHARS: usize = 50;

#[derive(Debug, Clone)]
pub struct QuotesSettings {
    pub per_page: usize,
    /// Minimum time the loading placeholder stays up
    pub min_loading: Duration,
}

impl Default for QuotesSettings {
    fn default() -> Self {
        Self {
            per_page: 18,
            min_loading: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Default)]
struct QuotesState {
    character: String,
    show: String,
    current_page: usize,
    quotes: Vec<Quote>,
}

/// Marker in the page-number strip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMarker {
    Page(usize),
    Ellipsis,
}

#[derive(Clone)]
pub struct QuotesView {
    client: QuotesClient,
    settings: QuotesSettings,
    state: Arc<Mutex<QuotesState>>,
}

impl QuotesView {
    pub fn new(client: QuotesClient, settings: QuotesSettings) -> Self {
        Self {
            client,
            settings: QuotesSettings {
                per_page: settings.per_page.max(1),
                ..settings
            },
            state: Arc::new(Mutex::new(QuotesState {
                current_page: 1,
                ..Default::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, QuotesState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Set the character and show filters; empty strings clear them
    pub fn set_filters(&self, character: &str, show: &str) {
        let mut state = self.state();
        state.character = character.trim().to_string();
        state.show = show.trim().to_string();
        state.current_page = 1;
    }

    pub fn filters(&self) -> (String, String) {
        let state = self.state();
        (state.character.clone(), state.show.clone())
    }

    pub fn current_page(&self) -> usize {
        self.state().current_page
    }

    fn mount(&self, ctx: &ViewContext) {
        let (character, show) = self.filters();
        let filters = filters_line(&character, &show);
        ctx.document.mount(
            &ctx.ticket,
            self.name(),
            "Anime Quotes",
            &[
                (FILTERS_CONTAINER, filters.as_str()),
                (QUOTES_CONTAINER, "Loading quotes..."),
                (PAGINATION_CONTAINER, ""),
            ],
        );
    }

    fn ensure_mounted(&self, ctx: &ViewContext) {
        if !ctx.document.has_container(QUOTES_CONTAINER) {
            debug!("Quotes container not found, re-rendering view");
            self.mount(ctx);
        }
    }

    async fn fetch_filtered(&self, character: &str, show: &str) -> Result<Vec<Quote>, FetchError> {
        match (character.is_empty(), show.is_empty()) {
            (false, false) => match self.client.search_quotes_by_character(character, 1).await {
                Ok(quotes) if !quotes.is_empty() => Ok(quotes),
                Ok(_) => self.client.search_quotes_by_anime(show).await,
                Err(e) => {
                    debug!(error = %e, "Character search failed, trying show");
                    self.client.search_quotes_by_anime(show).await
                }
            },
            (false, true) => self.client.search_quotes_by_character(character, 1).await,
            (true, false) => self.client.search_quotes_by_anime(show).await,
            (true, true) => self.client.all_quotes(1).await,
        }
    }

    /// Fetch quotes for the current filters and show the current page
    pub fn load_quotes(&self, ctx: ViewContext) -> BoxFuture<'static, ()> {
        let view = self.clone();

        async move {
            if ctx.is_stale() {
                return;
            }
            view.ensure_mounted(&ctx);
            ctx.document.write(&ctx.ticket, QUOTES_CONTAINER, "Loading quotes...");

            let (character, show) = view.filters();
            let started = Instant::now();
            let result = view.fetch_filtered(&character, &show).await;

            let elapsed = started.elapsed();
            if elapsed < view.settings.min_loading {
                sleep(view.settings.min_loading - elapsed).await;
            }

            match result {
                Ok(quotes) => {
                    info!(count = quotes.len(), character = %character, show = %show, "Loaded quotes");
                    view.show_quotes(&ctx, quotes);
                }
                Err(e) => {
                    error!(error = %e, status = e.status(), "Error loading quotes");
                    let (retry_view, retry_ctx) = (view.clone(), ctx.clone());
                    ctx.document.write_error(
                        &ctx.ticket,
                        QUOTES_CONTAINER,
                        &error_message(&e),
                        retry_action(move || retry_view.load_quotes(retry_ctx.clone())),
                    );
                    ctx.document.write(&ctx.ticket, PAGINATION_CONTAINER, "");
                }
            }
        }
        .boxed()
    }

    /// Show one random quote, honouring a character or show filter
    pub fn load_random_quote(&self, ctx: ViewContext) -> BoxFuture<'static, ()> {
        let view = self.clone();

        async move {
            if ctx.is_stale() {
                return;
            }
            view.ensure_mounted(&ctx);
            if !ctx
                .document
                .write(&ctx.ticket, QUOTES_CONTAINER, "Loading random quote...")
                .is_written()
            {
                return;
            }
            ctx.document.write(&ctx.ticket, PAGINATION_CONTAINER, "");
            view.state().quotes.clear();

            let (character, show) = view.filters();
            let result = if !character.is_empty() {
                view.client.random_quote_by_character(&character).await
            } else if !show.is_empty() {
                view.client.random_quote_by_anime(&show).await
            } else {
                view.client.random_quote().await
            };

            match result {
                Ok(quote) => {
                    let content = match quote {
                        Some(quote) => quote_card(&quote),
                        None => "No quotes found matching your criteria.".to_string(),
                    };
                    ctx.document.write(&ctx.ticket, QUOTES_CONTAINER, content);
                }
                Err(e) => {
                    error!(error = %e, "Error loading random quote");
                    let (retry_view, retry_ctx) = (view.clone(), ctx.clone());
                    ctx.document.write_error(
                        &ctx.ticket,
                        QUOTES_CONTAINER,
                        &format!("Failed to load random quote. {}", e),
                        retry_action(move || retry_view.load_random_quote(retry_ctx.clone())),
                    );
                }
            }
        }
        .boxed()
    }

    /// Show freshly loaded quotes. The list and page are only committed when
    /// the write lands, so a superseded load leaves the current state alone.
    fn show_quotes(&self, ctx: &ViewContext, quotes: Vec<Quote>) {
        let fetched = quotes.len();
        let mut quotes: Vec<Quote> = quotes.into_iter().filter(|q| !q.quote.trim().is_empty()).collect();
        sort_quotes(&mut quotes);

        let mut state = self.state();
        if ctx.is_stale() {
            debug!(count = fetched, "Discarding quotes loaded for a superseded view");
            return;
        }

        let page = state.current_page.clamp(1, self.total_pages(quotes.len()));
        let content = with_summary(&state, self.page_content(&quotes, page, fetched));
        if !ctx.document.write(&ctx.ticket, QUOTES_CONTAINER, content).is_written() {
            return;
        }

        state.quotes = quotes;
        state.current_page = page;
        let line = self.pagination(&state);
        ctx.document.write(&ctx.ticket, PAGINATION_CONTAINER, line);
    }

    fn total_pages(&self, count: usize) -> usize {
        count.div_ceil(self.settings.per_page).max(1)
    }

    fn page_content(&self, quotes: &[Quote], page: usize, fetched: usize) -> String {
        if fetched == 0 {
            return "No quotes found matching your criteria.".to_string();
        }
        if quotes.is_empty() {
            return "No valid quotes found.".to_string();
        }

        let start = (page - 1) * self.settings.per_page;
        quotes
            .iter()
            .skip(start)
            .take(self.settings.per_page)
            .map(quote_card)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn pagination(&self, state: &QuotesState) -> String {
        let total = state.quotes.len();
        if total <= self.settings.per_page {
            String::new()
        } else {
            pagination_line(state.current_page, self.total_pages(total), total)
        }
    }

    /// Jump to `page` of the quotes already loaded. Returns false when out of
    /// range or when `ctx` no longer owns the screen.
    pub fn goto_page(&self, ctx: &ViewContext, page: usize) -> bool {
        let mut state = self.state();
        if state.quotes.is_empty() || page < 1 || page > self.total_pages(state.quotes.len()) {
            return false;
        }

        let content = with_summary(&state, self.page_content(&state.quotes, page, state.quotes.len()));
        if !ctx.document.write(&ctx.ticket, QUOTES_CONTAINER, content).is_written() {
            return false;
        }

        state.current_page = page;
        let line = self.pagination(&state);
        ctx.document.write(&ctx.ticket, PAGINATION_CONTAINER, line);
        true
    }

    pub fn next_page(&self, ctx: &ViewContext) -> bool {
        let page = self.current_page();
        self.goto_page(ctx, page + 1)
    }

    pub fn prev_page(&self, ctx: &ViewContext) -> bool {
        let page = self.current_page();
        page > 1 && self.goto_page(ctx, page - 1)
    }
}

#[async_trait]
impl View for QuotesView {
    fn name(&self) -> &'static str {
        "quotes"
    }

    async fn render(&self, ctx: ViewContext, _param: Option<String>) {
        self.mount(&ctx);
        self.load_quotes(ctx).await;
    }
}

/// Longer quotes first, then the short ones; each group shortest first
pub fn sort_quotes(quotes: &mut [Quote]) {
    quotes.sort_by_key(|q| {
        let len = q.quote.chars().count();
        (len < SHORT_QUOTE_CHARS, len)
    });
}

/// Page numbers to offer: first, last and the neighbours of `current`,
/// with an ellipsis over each gap
pub fn page_window(current: usize, total: usize) -> Vec<PageMarker> {
    let total = total.max(1);
    let current = current.clamp(1, total);

    let mut pages = vec![1, current.saturating_sub(1), current, current + 1, total];
    pages.retain(|&p| p >= 1 && p <= total);
    pages.sort_unstable();
    pages.dedup();

    let mut markers = Vec::with_capacity(pages.len() * 2);
    let mut previous = 0;
    for page in pages {
        if previous != 0 && page > previous + 1 {
            markers.push(PageMarker::Ellipsis);
        }
        markers.push(PageMarker::Page(page));
        previous = page;
    }
    markers
}

fn pagination_line(current: usize, total_pages: usize, total_quotes: usize) -> String {
    let mut parts = Vec::new();
    parts.push(if current > 1 { "[prev]" } else { "(prev)" }.to_string());
    for marker in page_window(current, total_pages) {
        parts.push(match marker {
            PageMarker::Page(page) if page == current => format!("[{}]", page),
            PageMarker::Page(page) => page.to_string(),
            PageMarker::Ellipsis => "...".to_string(),
        });
    }
    parts.push(if current < total_pages { "[next]" } else { "(next)" }.to_string());

    format!(
        "{}  {} quotes total (Page {} of {})",
        parts.join(" "),
        total_quotes,
        current,
        total_pages
    )
}

fn quote_card(quote: &Quote) -> String {
    format!(
        "\"{}\"\n    - {}, {}",
        quote.quote.trim(),
        quote.character.as_deref().unwrap_or("Unknown Character"),
        quote.show.as_deref().unwrap_or("Unknown Anime")
    )
}

fn filters_line(character: &str, show: &str) -> String {
    format!(
        "Character: {}  Anime: {}",
        if character.is_empty() { "(any)" } else { character },
        if show.is_empty() { "(any)" } else { show }
    )
}

fn filter_summary(character: &str, show: &str) -> Option<String> {
    if character.is_empty() && show.is_empty() {
        return None;
    }

    let mut summary = "Showing quotes".to_string();
    if !character.is_empty() {
        summary.push_str(&format!(" for character \"{}\"", character));
    }
    if !show.is_empty() {
        summary.push_str(&format!(" from \"{}\"", show));
    }
    Some(summary)
}

fn with_summary(state: &QuotesState, content: String) -> String {
    match filter_summary(&state.character, &state.show) {
        Some(summary) => format!("{}\n\n{}", summary, content),
        None => content,
    }
}

fn error_message(error: &FetchError) -> String {
    match error.kind {
        FetchErrorKind::RateLimitExceeded => "API rate limit exceeded. Please try again in a minute.".to_string(),
        FetchErrorKind::NotFound => "No quotes found. Please check your search terms and try again.".to_string(),
        FetchErrorKind::NetworkError => "Network error. Please check your internet connection.".to_string(),
        _ => format!("Error: {}", error.message),
    }
}
