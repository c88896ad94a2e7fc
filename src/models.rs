//! Data models for the VOD catalog

use serde::{Deserialize, Serialize};
use std::fmt;

/// UI Tab selection
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tab {
    Home,
    Movies,
    Series,
    Search,
    Console,
}

/// Which catalog an item belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Movie,
    Series,
}

impl ContentKind {
    /// Path segment used by the Xtream stream endpoints
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Movie => "movie",
            ContentKind::Series => "series",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContentKind::Movie => "Movie",
            ContentKind::Series => "Series",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Movie or series entry as listed by the catalog endpoints
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogItem {
    pub id: i64,
    pub kind: ContentKind,
    pub name: String,
    pub poster: Option<String>,
    pub rating: Option<String>,
    pub genre: Option<String>,
    pub plot: Option<String>,
    pub backdrop: Option<String>,
}

/// A catalog item carried through search; the `kind` tag tells movies and
/// series apart once both catalogs are merged.
pub type SearchResult = CatalogItem;

/// One playable unit of a series
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    pub id: String,
    pub episode_num: i32,
    pub season: i32,
    pub title: String,
    pub still: Option<String>,
    pub plot: Option<String>,
    pub container_extension: String,
}

/// Where a playable item's stream comes from
#[derive(Debug, Clone, PartialEq)]
pub enum PlayableSource {
    Movie { stream_id: i64 },
    Episode { series_id: i64, episode: Episode },
}

/// Minimal data needed to start playback
#[derive(Debug, Clone, PartialEq)]
pub struct PlayableItem {
    pub name: String,
    pub poster: Option<String>,
    pub source: PlayableSource,
}

impl PlayableItem {
    pub fn movie(movie: &CatalogItem) -> Self {
        Self {
            name: movie.name.clone(),
            poster: movie.poster.clone(),
            source: PlayableSource::Movie { stream_id: movie.id },
        }
    }

    /// Episode of `series`; the episode still wins over the series cover
    pub fn episode(series: &CatalogItem, episode: &Episode) -> Self {
        Self {
            name: format!(
                "{} - Season {} Episode {}",
                series.name, episode.season, episode.episode_num
            ),
            poster: episode.still.clone().or_else(|| series.poster.clone()),
            source: PlayableSource::Episode {
                series_id: series.id,
                episode: episode.clone(),
            },
        }
    }

    pub fn kind(&self) -> ContentKind {
        match self.source {
            PlayableSource::Movie { .. } => ContentKind::Movie,
            PlayableSource::Episode { .. } => ContentKind::Series,
        }
    }

    /// Identifier the stream URL is built from
    pub fn stream_id(&self) -> String {
        match &self.source {
            PlayableSource::Movie { stream_id } => stream_id.to_string(),
            PlayableSource::Episode { episode, .. } => episode.id.clone(),
        }
    }

    pub fn episode_ref(&self) -> Option<&Episode> {
        match &self.source {
            PlayableSource::Episode { episode, .. } => Some(episode),
            PlayableSource::Movie { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> CatalogItem {
        CatalogItem {
            id: 42,
            kind: ContentKind::Series,
            name: "Dark".to_string(),
            poster: Some("http://img/dark.jpg".to_string()),
            rating: None,
            genre: None,
            plot: None,
            backdrop: None,
        }
    }

    fn episode(still: Option<&str>) -> Episode {
        Episode {
            id: "E17".to_string(),
            episode_num: 3,
            season: 2,
            title: "Ghosts".to_string(),
            still: still.map(String::from),
            plot: None,
            container_extension: "mkv".to_string(),
        }
    }

    #[test]
    fn test_episode_item_uses_episode_id_and_series_kind() {
        let item = PlayableItem::episode(&series(), &episode(None));
        assert_eq!(item.kind(), ContentKind::Series);
        assert_eq!(item.stream_id(), "E17");
        assert_eq!(item.name, "Dark - Season 2 Episode 3");
        assert_eq!(item.poster.as_deref(), Some("http://img/dark.jpg"));
    }

    #[test]
    fn test_episode_still_overrides_cover() {
        let item = PlayableItem::episode(&series(), &episode(Some("http://img/e17.jpg")));
        assert_eq!(item.poster.as_deref(), Some("http://img/e17.jpg"));
    }

    #[test]
    fn test_movie_item() {
        let mut movie = series();
        movie.kind = ContentKind::Movie;
        movie.id = 101;
        let item = PlayableItem::movie(&movie);
        assert_eq!(item.kind(), ContentKind::Movie);
        assert_eq!(item.stream_id(), "101");
        assert!(item.episode_ref().is_none());
    }
}
