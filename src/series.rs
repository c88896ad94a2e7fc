//! Series navigation: episode normalization and season/episode selection

use crate::api::{parse_leading_int, EpisodesPayload, RawEpisode};
use crate::deep_link::DeepLink;
use crate::models::Episode;

const DEFAULT_SEASON: i32 = 1;

/// Flatten either response shape into one episode list sorted by
/// (season, episode number)
pub fn normalize(payload: &EpisodesPayload) -> Vec<Episode> {
    let mut episodes: Vec<Episode> = match payload {
        EpisodesPayload::Flat(raw) => raw
            .iter()
            .map(|ep| episode(ep, ep.season.and_then(to_season)))
            .collect(),
        EpisodesPayload::BySeason(groups) => groups
            .iter()
            .flat_map(|(label, raw)| {
                let season = parse_leading_int(label).and_then(to_season);
                raw.iter().map(move |ep| episode(ep, season))
            })
            .collect(),
        EpisodesPayload::Unrecognized => Vec::new(),
    };
    episodes.sort_by_key(|ep| (ep.season, ep.episode_num));
    episodes
}

fn to_season(n: i64) -> Option<i32> {
    i32::try_from(n).ok()
}

fn episode(raw: &RawEpisode, season: Option<i32>) -> Episode {
    Episode {
        id: raw.id.clone(),
        episode_num: raw
            .episode_num
            .and_then(|n| i32::try_from(n).ok())
            .unwrap_or(0),
        season: season.unwrap_or(DEFAULT_SEASON),
        title: raw.title.clone().unwrap_or_else(|| "Unknown".to_string()),
        still: raw.still.clone(),
        plot: raw.plot.clone(),
        container_extension: raw
            .container_extension
            .clone()
            .unwrap_or_else(|| "mp4".to_string()),
    }
}

/// Distinct seasons, ascending
pub fn seasons(episodes: &[Episode]) -> Vec<i32> {
    let mut seasons: Vec<i32> = episodes.iter().map(|ep| ep.season).collect();
    seasons.sort_unstable();
    seasons.dedup();
    seasons
}

/// Episode list of one series plus the active season and episode
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesNavigator {
    series_id: i64,
    episodes: Vec<Episode>,
    seasons: Vec<i32>,
    season: i32,
    episode: Option<String>,
}

impl SeriesNavigator {
    /// Build the navigator once the detail response is in. Defaults are only
    /// computed after the episodes are normalized and sorted.
    pub fn open(
        series_id: i64,
        payload: &EpisodesPayload,
        season_param: Option<i32>,
        episode_param: Option<&str>,
    ) -> Self {
        let episodes = normalize(payload);
        let seasons = seasons(&episodes);

        let mut season = season_param
            .filter(|s| seasons.contains(s))
            .or_else(|| seasons.first().copied())
            .unwrap_or(DEFAULT_SEASON);

        let mut episode = None;
        if let Some(wanted) = episode_param {
            if let Some(found) = episodes.iter().find(|ep| ep.id == wanted) {
                season = found.season;
                episode = Some(found.id.clone());
            }
        }

        log::debug!(
            "series {}: {} episodes in {} seasons, season {} selected",
            series_id,
            episodes.len(),
            seasons.len(),
            season
        );

        Self {
            series_id,
            episodes,
            seasons,
            season,
            episode,
        }
    }

    pub fn series_id(&self) -> i64 {
        self.series_id
    }

    pub fn episodes(&self) -> &[Episode] {
        &self.episodes
    }

    pub fn seasons(&self) -> &[i32] {
        &self.seasons
    }

    pub fn selected_season(&self) -> i32 {
        self.season
    }

    pub fn selected_episode(&self) -> Option<&Episode> {
        let id = self.episode.as_deref()?;
        self.episodes.iter().find(|ep| ep.id == id)
    }

    pub fn season_episodes(&self) -> impl Iterator<Item = &Episode> + '_ {
        self.episodes.iter().filter(move |ep| ep.season == self.season)
    }

    /// Switching seasons drops the current episode
    pub fn select_season(&mut self, season: i32) {
        self.season = season;
        self.episode = None;
    }

    /// Select an episode by id; returns false for ids this series lacks
    pub fn select_episode(&mut self, id: &str) -> bool {
        match self.episodes.iter().find(|ep| ep.id == id) {
            Some(ep) => {
                self.season = ep.season;
                self.episode = Some(ep.id.clone());
                true
            }
            None => false,
        }
    }

    /// Leave playback, staying on the same season
    pub fn close_episode(&mut self) {
        self.episode = None;
    }

    /// Shareable parameters that reproduce this selection
    pub fn deep_link(&self) -> DeepLink {
        DeepLink {
            series: Some(self.series_id),
            season: Some(self.season),
            episode: self.episode.clone(),
            ..DeepLink::default()
        }
    }
}
