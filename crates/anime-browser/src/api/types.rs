//! Response types for the Jikan v4 and anime quotes APIs.
//!
//! Only the fields the views read are modelled; everything else in the
//! payloads is ignored.

use serde::{Deserialize, Serialize};

/// Generic pagination wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub pagination: Pagination,
}

/// Single-object wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleResponse<T> {
    pub data: T,
}

/// Pagination metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub last_visible_page: u32,
    #[serde(default)]
    pub has_next_page: bool,
    #[serde(default)]
    pub current_page: Option<u32>,
    #[serde(default)]
    pub items: Option<PaginationItems>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaginationItems {
    pub count: u32,
    pub total: u32,
    pub per_page: u32,
}

/// Anime entry as returned by search, season and random endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimeSummary {
    pub mal_id: u32,
    #[serde(default)]
    pub images: Option<AnimeImages>,
    pub title: String,
    #[serde(default)]
    pub title_english: Option<String>,
    #[serde(rename = "type", default)]
    pub anime_type: Option<String>,
    #[serde(default)]
    pub episodes: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
}

/// Full anime details (`/anime/{id}/full`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimeFull {
    pub mal_id: u32,
    #[serde(default)]
    pub images: Option<AnimeImages>,

    pub title: String,
    #[serde(default)]
    pub title_english: Option<String>,

    #[serde(rename = "type", default)]
    pub anime_type: Option<String>,
    #[serde(default)]
    pub episodes: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub aired: Option<Aired>,
    #[serde(default)]
    pub rating: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub synopsis: Option<String>,

    #[serde(default)]
    pub genres: Vec<MalEntity>,
    #[serde(default)]
    pub trailer: Option<Trailer>,
    #[serde(default)]
    pub relations: Vec<Relation>,
    #[serde(default)]
    pub streaming: Vec<ExternalLink>,
}

/// Anime images
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimeImages {
    pub jpg: ImageSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSet {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub large_image_url: Option<String>,
}

/// Aired dates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aired {
    #[serde(default)]
    pub string: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trailer {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub embed_url: Option<String>,
}

/// Related entries grouped by relation ("Sequel", "Adaptation", ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub relation: String,
    #[serde(default)]
    pub entry: Vec<MalEntity>,
}

/// MAL entity (genre, related anime, manga, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MalEntity {
    pub mal_id: u32,
    #[serde(rename = "type", default)]
    pub entity_type: String,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalLink {
    pub name: String,
    pub url: String,
}

/// A quote from the quotes API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub quote: String,
    #[serde(default)]
    pub character: Option<String>,
    #[serde(default, alias = "anime")]
    pub show: Option<String>,
}

impl AnimeSummary {
    /// English title when there is one
    pub fn display_title(&self) -> &str {
        self.title_english.as_deref().unwrap_or(&self.title)
    }

    pub fn image_url(&self) -> Option<&str> {
        self.images.as_ref()?.jpg.image_url.as_deref()
    }
}

impl AnimeFull {
    pub fn display_title(&self) -> &str {
        self.title_english.as_deref().unwrap_or(&self.title)
    }

    pub fn image_url(&self) -> Option<&str> {
        let jpg = &self.images.as_ref()?.jpg;
        jpg.large_image_url.as_deref().or(jpg.image_url.as_deref())
    }
}
