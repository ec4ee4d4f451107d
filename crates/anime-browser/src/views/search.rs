//! Search view: paginated title search.

use super::{anime_grid, View, ViewContext};
use crate::api::JikanClient;
use crate::document::retry_action;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error};

pub const RESULTS_CONTAINER: &str = "search-results-container";

/// The query typed into the search bar, kept for the session
#[derive(Debug, Clone, Default)]
pub struct SearchState {
    query: Arc<Mutex<String>>,
}

impl SearchState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, String> {
        self.query.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set(&self, query: &str) {
        *self.lock() = query.trim().to_string();
    }

    pub fn query(&self) -> String {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// Last page of results shown
#[derive(Debug, Clone, PartialEq, Eq)]
struct ShownPage {
    query: String,
    page: u32,
    last_page: u32,
}

#[derive(Clone)]
pub struct SearchView {
    jikan: JikanClient,
    state: SearchState,
    shown: Arc<Mutex<Option<ShownPage>>>,
}

impl SearchView {
    pub fn new(jikan: JikanClient, state: SearchState) -> Self {
        Self {
            jikan,
            state,
            shown: Arc::new(Mutex::new(None)),
        }
    }

    fn shown(&self) -> MutexGuard<'_, Option<ShownPage>> {
        self.shown.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn mount(&self, ctx: &ViewContext) {
        ctx.document.mount(
            &ctx.ticket,
            self.name(),
            "Search Anime",
            &[(RESULTS_CONTAINER, "Use the search bar above to find anime")],
        );
    }

    /// Run a search and show one page of results
    pub fn perform_search(&self, ctx: ViewContext, query: String, page: u32) -> BoxFuture<'static, ()> {
        let view = self.clone();

        async move {
            if ctx.is_stale() {
                return;
            }
            if !ctx.document.has_container(RESULTS_CONTAINER) {
                debug!("Search results container not found, re-rendering view");
                view.mount(&ctx);
            }

            ctx.document.write(&ctx.ticket, RESULTS_CONTAINER, "Searching for anime...");
            let heading = format!("Search Results for \"{}\"", query);

            match view.jikan.search_anime(&query, page).await {
                Ok(response) if !response.data.is_empty() => {
                    let pagination = &response.pagination;
                    let total = pagination
                        .items
                        .as_ref()
                        .map(|items| items.total as usize)
                        .unwrap_or(response.data.len());
                    let last_page = pagination.last_visible_page.max(1);

                    let mut content = format!("{}\nFound {} anime\n\n{}", heading, total, anime_grid(&response.data));
                    if last_page > 1 {
                        content.push_str("\n\n");
                        content.push_str(&pagination_line(page, last_page));
                    }

                    if ctx.document.write(&ctx.ticket, RESULTS_CONTAINER, content).is_written() {
                        *view.shown() = Some(ShownPage { query, page, last_page });
                    }
                }
                Ok(_) => {
                    let content = format!("{}\nNo anime found for your search. Try a different query.", heading);
                    if ctx.document.write(&ctx.ticket, RESULTS_CONTAINER, content).is_written() {
                        *view.shown() = None;
                    }
                }
                Err(e) => {
                    error!(error = %e, query = %query, page = page, "Error searching anime");
                    let (retry_view, retry_ctx) = (view.clone(), ctx.clone());
                    let retry_query = query.clone();
                    ctx.document.write_error(
                        &ctx.ticket,
                        RESULTS_CONTAINER,
                        &format!("{}\nFailed to load search results.", heading),
                        retry_action(move || {
                            retry_view.perform_search(retry_ctx.clone(), retry_query.clone(), page)
                        }),
                    );
                }
            }
        }
        .boxed()
    }

    /// Move `delta` pages from the page on screen, if that page exists
    pub fn change_page(&self, ctx: ViewContext, delta: i64) -> Option<BoxFuture<'static, ()>> {
        let shown = self.shown().clone()?;
        let target = i64::from(shown.page) + delta;
        if target < 1 || target > i64::from(shown.last_page) {
            return None;
        }

        Some(self.perform_search(ctx, shown.query, target as u32))
    }
}

fn pagination_line(page: u32, last_page: u32) -> String {
    let mut parts = Vec::new();
    if page > 1 {
        parts.push("[prev] Previous".to_string());
    }
    parts.push(format!("Page {} of {}", page, last_page));
    if page < last_page {
        parts.push("[next] Next".to_string());
    }
    parts.join("  ")
}

#[async_trait]
impl View for SearchView {
    fn name(&self) -> &'static str {
        "search"
    }

    async fn render(&self, ctx: ViewContext, _param: Option<String>) {
        if !ctx.document.has_container(RESULTS_CONTAINER) {
            self.mount(&ctx);
        }

        let query = self.state.query();
        if query.is_empty() {
            ctx.document.write(
                &ctx.ticket,
                RESULTS_CONTAINER,
                "Enter a search term in the search bar above to find anime",
            );
            return;
        }

        self.perform_search(ctx, query, 1).await;
    }
}
