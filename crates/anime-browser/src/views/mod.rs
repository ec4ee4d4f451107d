//! Views rendered by the router.
//!
//! A view owns one section of the [`Document`] and one or more load
//! sequences that fill its containers. Load sequences return boxed futures
//! so a failed load can register itself as the container's retry action.

mod detail;
mod fallback;
mod home;
mod quotes;
mod search;

pub use detail::DetailView;
pub use fallback::{render_my_list, render_settings};
pub use home::HomeView;
pub use quotes::{page_window, sort_quotes, PageMarker, QuotesSettings, QuotesView};
pub use search::{SearchState, SearchView};

use crate::api::AnimeSummary;
use crate::document::{Document, RenderTicket};
use async_trait::async_trait;
use std::sync::Arc;

/// Everything a render needs: where to write and which navigation it serves
#[derive(Clone)]
pub struct ViewContext {
    pub document: Arc<Document>,
    pub ticket: RenderTicket,
}

impl ViewContext {
    pub fn new(document: Arc<Document>, ticket: RenderTicket) -> Self {
        Self { document, ticket }
    }

    /// Whether a later navigation has replaced this render
    pub fn is_stale(&self) -> bool {
        !self.ticket.is_current()
    }
}

/// A page of the application bound to a route
#[async_trait]
pub trait View: Send + Sync {
    /// Section name the view mounts
    fn name(&self) -> &'static str;

    /// Mount the view's containers and run its load sequences
    async fn render(&self, ctx: ViewContext, param: Option<String>);
}

/// One-entry text card shared by the anime grids
pub(crate) fn anime_card(anime: &AnimeSummary) -> String {
    let rating = match anime.score {
        Some(score) => format!("Rating: {}/10", score),
        None => "Not rated".to_string(),
    };

    format!(
        "* {}\n    {} | {}\n    View Details: #/detail/{}",
        anime.display_title(),
        rating,
        anime.image_url().unwrap_or("no image"),
        anime.mal_id
    )
}

pub(crate) fn anime_grid<'a>(anime: impl IntoIterator<Item = &'a AnimeSummary>) -> String {
    anime.into_iter().map(anime_card).collect::<Vec<_>>().join("\n")
}
