//! Detail view for a single anime.

use super::{View, ViewContext};
use crate::api::{AnimeFull, JikanClient};
use crate::document::retry_action;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use std::fmt::Write as _;
use tracing::{debug, error, warn};

pub const DETAIL_CONTAINER: &str = "anime-detail-container";

#[derive(Clone)]
pub struct DetailView {
    jikan: JikanClient,
}

impl DetailView {
    pub fn new(jikan: JikanClient) -> Self {
        Self { jikan }
    }

    fn mount(&self, ctx: &ViewContext) {
        ctx.document.mount(
            &ctx.ticket,
            self.name(),
            "Anime Details",
            &[(DETAIL_CONTAINER, "Loading anime details...")],
        );
    }

    pub fn load_details(&self, ctx: ViewContext, mal_id: u32) -> BoxFuture<'static, ()> {
        let view = self.clone();

        async move {
            if ctx.is_stale() {
                return;
            }
            if !ctx.document.has_container(DETAIL_CONTAINER) {
                debug!(mal_id = mal_id, "Anime detail container not found, re-rendering view");
                view.mount(&ctx);
            }

            ctx.document.write(&ctx.ticket, DETAIL_CONTAINER, "Loading anime details...");

            match view.jikan.anime_full(mal_id).await {
                Ok(anime) => {
                    ctx.document.write(&ctx.ticket, DETAIL_CONTAINER, detail_text(&anime));
                }
                Err(e) => {
                    error!(error = %e, mal_id = mal_id, "Error loading anime details");
                    let (retry_view, retry_ctx) = (view.clone(), ctx.clone());
                    ctx.document.write_error(
                        &ctx.ticket,
                        DETAIL_CONTAINER,
                        "Failed to load anime details.",
                        retry_action(move || retry_view.load_details(retry_ctx.clone(), mal_id)),
                    );
                }
            }
        }
        .boxed()
    }
}

fn detail_text(anime: &AnimeFull) -> String {
    let title = anime.display_title();
    let score = anime
        .score
        .map(|score| format!("{}/10", score))
        .unwrap_or_else(|| "Not rated".to_string());
    let episodes = anime
        .episodes
        .map(|episodes| episodes.to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    let aired = anime
        .aired
        .as_ref()
        .and_then(|aired| aired.string.as_deref())
        .unwrap_or("Unknown");
    let genres = if anime.genres.is_empty() {
        "Not categorized".to_string()
    } else {
        anime.genres.iter().map(|g| g.name.as_str()).collect::<Vec<_>>().join(", ")
    };

    let mut out = String::new();
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out, "Original Title: {}", anime.title);
    let _ = writeln!(out, "Score: {}", score);
    let _ = writeln!(out, "Status: {}", anime.status.as_deref().unwrap_or("Unknown status"));
    let _ = writeln!(out, "Episodes: {}", episodes);
    let _ = writeln!(out, "Aired: {}", aired);
    let _ = writeln!(out, "Genres: {}", genres);
    if let Some(rating) = &anime.rating {
        let _ = writeln!(out, "Rating: {}", rating);
    }
    if let Some(image) = anime.image_url() {
        let _ = writeln!(out, "Image: {}", image);
    }

    let _ = writeln!(out, "\nSynopsis\n{}", anime.synopsis.as_deref().unwrap_or("No synopsis available."));

    if let Some(trailer) = anime.trailer.as_ref().and_then(|t| t.url.as_deref().or(t.embed_url.as_deref())) {
        let _ = writeln!(out, "\nTrailer\n{}", trailer);
    }

    if !anime.relations.is_empty() {
        let _ = writeln!(out, "\nRelated Anime");
        for relation in &anime.relations {
            let entries: Vec<String> = relation
                .entry
                .iter()
                .map(|entry| {
                    if entry.entity_type == "anime" {
                        format!("{} (#/detail/{})", entry.name, entry.mal_id)
                    } else {
                        entry.name.clone()
                    }
                })
                .collect();
            let _ = writeln!(out, "  {}: {}", relation.relation, entries.join(", "));
        }
    }

    if !anime.streaming.is_empty() {
        let _ = writeln!(out, "\nWhere to Watch");
        for stream in &anime.streaming {
            let _ = writeln!(out, "  {} {}", stream.name, stream.url);
        }
    }

    out.trim_end().to_string()
}

#[async_trait]
impl View for DetailView {
    fn name(&self) -> &'static str {
        "detail"
    }

    async fn render(&self, ctx: ViewContext, param: Option<String>) {
        self.mount(&ctx);

        let Some(param) = param.filter(|p| !p.is_empty()) else {
            ctx.document.write(
                &ctx.ticket,
                DETAIL_CONTAINER,
                "No anime ID provided. Please go back and select an anime.",
            );
            return;
        };

        match param.parse::<u32>() {
            Ok(mal_id) => self.load_details(ctx, mal_id).await,
            Err(_) => {
                warn!(param = %param, "Invalid anime id");
                ctx.document.write(
                    &ctx.ticket,
                    DETAIL_CONTAINER,
                    format!("Invalid anime ID \"{}\". Please go back and select an anime.", param),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::fetch::testing::{ScriptedTransport, Step};
    use crate::views::testing::jikan;
    use std::sync::Arc;

    const BEBOP: &str = r#"{"data": {
        "mal_id": 1, "title": "Cowboy Bebop", "score": 8.75, "episodes": 26, "status": "Finished Airing",
        "genres": [{"mal_id": 1, "type": "anime", "name": "Action"}, {"mal_id": 24, "type": "anime", "name": "Sci-Fi"}],
        "relations": [
            {"relation": "Side Story", "entry": [{"mal_id": 5, "type": "anime", "name": "Tengoku no Tobira"}]},
            {"relation": "Adaptation", "entry": [{"mal_id": 173, "type": "manga", "name": "Cowboy Bebop"}]}
        ],
        "streaming": [{"name": "Crunchyroll", "url": "https://crunchyroll.test"}]
    }}"#;

    #[tokio::test]
    async fn test_details_rendered() {
        let transport = ScriptedTransport::new(vec![Step::Respond(200, BEBOP.into())]);
        let view = DetailView::new(jikan(transport.clone()));
        let document = Arc::new(Document::new());

        view.render(ViewContext::new(document.clone(), document.issue_ticket()), Some("1".into()))
            .await;

        let text = document.content(DETAIL_CONTAINER).unwrap();
        assert!(text.starts_with("Cowboy Bebop"));
        assert!(text.contains("Score: 8.75/10"));
        assert!(text.contains("Genres: Action, Sci-Fi"));
        assert!(text.contains("Side Story: Tengoku no Tobira (#/detail/5)"));
        assert!(text.contains("Adaptation: Cowboy Bebop\n"));
        assert!(text.contains("No synopsis available."));
        assert!(transport.urls()[0].ends_with("/anime/1/full"));
    }

    #[tokio::test]
    async fn test_load_mounts_empty_document() {
        let transport = ScriptedTransport::new(vec![Step::Respond(200, BEBOP.into())]);
        let view = DetailView::new(jikan(transport));
        let document = Arc::new(Document::new());
        assert!(document.section().is_none());

        view.load_details(ViewContext::new(document.clone(), document.issue_ticket()), 1)
            .await;

        assert_eq!(document.section().as_deref(), Some("detail"));
        assert!(document.content(DETAIL_CONTAINER).unwrap().starts_with("Cowboy Bebop"));
    }

    #[tokio::test]
    async fn test_missing_or_invalid_id() {
        let transport = ScriptedTransport::new(vec![]);
        let view = DetailView::new(jikan(transport.clone()));
        let document = Arc::new(Document::new());

        view.render(ViewContext::new(document.clone(), document.issue_ticket()), None).await;
        assert!(document.content(DETAIL_CONTAINER).unwrap().starts_with("No anime ID provided"));

        view.render(ViewContext::new(document.clone(), document.issue_ticket()), Some("abc".into()))
            .await;
        assert!(document.content(DETAIL_CONTAINER).unwrap().starts_with("Invalid anime ID"));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_not_found_offers_retry() {
        let transport = ScriptedTransport::new(vec![Step::Respond(404, String::new())]);
        let view = DetailView::new(jikan(transport));
        let document = Arc::new(Document::new());

        view.render(ViewContext::new(document.clone(), document.issue_ticket()), Some("999999".into()))
            .await;

        assert!(document.content(DETAIL_CONTAINER).unwrap().contains("Failed to load anime details."));
        assert_eq!(document.retryable(), vec![DETAIL_CONTAINER.to_string()]);
    }
}
