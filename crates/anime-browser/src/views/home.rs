//! Home view: the currently airing season.

use super::{anime_card, anime_grid, View, ViewContext};
use crate::api::JikanClient;
use crate::document::retry_action;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, error};

pub const FEATURED_CONTAINER: &str = "featured-container";

#[derive(Clone)]
pub struct HomeView {
    jikan: JikanClient,
    featured_limit: usize,
}

impl HomeView {
    pub fn new(jikan: JikanClient, featured_limit: usize) -> Self {
        Self { jikan, featured_limit }
    }

    fn mount(&self, ctx: &ViewContext) {
        ctx.document.mount(
            &ctx.ticket,
            self.name(),
            "Welcome to Anime Browse",
            &[(FEATURED_CONTAINER, "Loading featured anime...")],
        );
    }

    /// Load currently airing anime into the featured container
    pub fn load_featured(&self, ctx: ViewContext) -> BoxFuture<'static, ()> {
        let view = self.clone();

        async move {
            if ctx.is_stale() {
                return;
            }
            if !ctx.document.has_container(FEATURED_CONTAINER) {
                debug!("Featured container not found, re-rendering view");
                view.mount(&ctx);
            }

            ctx.document.write(&ctx.ticket, FEATURED_CONTAINER, "Loading featured anime...");

            match view.jikan.seasons_now().await {
                Ok(response) if !response.data.is_empty() => {
                    let grid = anime_grid(response.data.iter().take(view.featured_limit));
                    ctx.document.write(&ctx.ticket, FEATURED_CONTAINER, grid);
                }
                Ok(_) => view.load_random(&ctx).await,
                Err(e) => {
                    error!(error = %e, status = e.status(), "Error loading featured anime");
                    let (retry_view, retry_ctx) = (view.clone(), ctx.clone());
                    ctx.document.write_error(
                        &ctx.ticket,
                        FEATURED_CONTAINER,
                        "Failed to load anime data.",
                        retry_action(move || retry_view.load_featured(retry_ctx.clone())),
                    );
                }
            }
        }
        .boxed()
    }

    /// Shown when the current season has nothing airing
    async fn load_random(&self, ctx: &ViewContext) {
        match self.jikan.random_anime().await {
            Ok(anime) => {
                ctx.document.write(&ctx.ticket, FEATURED_CONTAINER, anime_card(&anime));
            }
            Err(e) => {
                error!(error = %e, "Error loading random anime");
                let (view, retry_ctx) = (self.clone(), ctx.clone());
                ctx.document.write_error(
                    &ctx.ticket,
                    FEATURED_CONTAINER,
                    "Failed to load anime data.",
                    retry_action(move || view.load_featured(retry_ctx.clone())),
                );
            }
        }
    }
}

#[async_trait]
impl View for HomeView {
    fn name(&self) -> &'static str {
        "home"
    }

    async fn render(&self, ctx: ViewContext, _param: Option<String>) {
        self.mount(&ctx);
        self.load_featured(ctx).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::fetch::testing::{ScriptedTransport, Step};
    use crate::views::testing::jikan;
    use std::sync::Arc;

    fn season_body(count: u32) -> String {
        let entries: Vec<String> = (1..=count)
            .map(|id| format!(r#"{{"mal_id": {}, "title": "Show {}"}}"#, id, id))
            .collect();
        format!(r#"{{"data": [{}]}}"#, entries.join(","))
    }

    #[tokio::test]
    async fn test_featured_limit() {
        let transport = ScriptedTransport::new(vec![Step::Respond(200, season_body(15))]);
        let view = HomeView::new(jikan(transport), 12);
        let document = Arc::new(Document::new());

        view.render(ViewContext::new(document.clone(), document.issue_ticket()), None).await;

        let featured = document.content(FEATURED_CONTAINER).unwrap();
        assert!(featured.contains("#/detail/12"));
        assert!(!featured.contains("#/detail/13"));
        assert_eq!(document.section().as_deref(), Some("home"));
    }

    #[tokio::test]
    async fn test_load_remounts_over_other_section() {
        let transport = ScriptedTransport::new(vec![Step::Respond(200, season_body(3))]);
        let view = HomeView::new(jikan(transport), 12);
        let document = Arc::new(Document::new());
        let ticket = document.issue_ticket();
        document.mount(&ticket, "settings", "Settings", &[("settings-form", "Theme: light | dark")]);

        view.load_featured(ViewContext::new(document.clone(), ticket)).await;

        assert_eq!(document.section().as_deref(), Some("home"));
        assert!(!document.has_container("settings-form"));
        assert!(document.content(FEATURED_CONTAINER).unwrap().contains("Show 3"));
    }

    #[tokio::test]
    async fn test_empty_season_falls_back_to_random() {
        let transport = ScriptedTransport::new(vec![
            Step::Respond(200, season_body(0)),
            Step::Respond(200, r#"{"data": {"mal_id": 77, "title": "Random Pick"}}"#.into()),
        ]);
        let view = HomeView::new(jikan(transport.clone()), 12);
        let document = Arc::new(Document::new());

        view.render(ViewContext::new(document.clone(), document.issue_ticket()), None).await;

        assert!(document.content(FEATURED_CONTAINER).unwrap().contains("Random Pick"));
        assert!(transport.urls()[1].ends_with("/random/anime"));
    }

    #[tokio::test]
    async fn test_error_then_retry() {
        let transport = ScriptedTransport::new(vec![
            Step::Respond(500, String::new()),
            Step::Respond(200, season_body(2)),
        ]);
        let view = HomeView::new(jikan(transport), 12);
        let document = Arc::new(Document::new());

        view.render(ViewContext::new(document.clone(), document.issue_ticket()), None).await;
        assert!(document.content(FEATURED_CONTAINER).unwrap().contains("Failed to load anime data."));

        document.retry(FEATURED_CONTAINER).unwrap().await;
        assert!(document.content(FEATURED_CONTAINER).unwrap().contains("Show 2"));
        assert!(document.retryable().is_empty());
    }
}
