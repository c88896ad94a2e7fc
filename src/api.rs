//! Xtream Codes API client

use std::collections::HashSet;
use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::error::ApiError;
use crate::models::{CatalogItem, ContentKind};
use crate::playback::StreamCredentials;

/// Read access to the remote catalog. Views only talk to the API through
/// this trait so they can be exercised against in-memory catalogs.
pub trait CatalogSource: Send + Sync {
    fn list(&self, kind: ContentKind) -> Result<Vec<CatalogItem>, ApiError>;
    fn series_detail(&self, series_id: i64) -> Result<SeriesDetail, ApiError>;
}

/// Response of `get_series_info`
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesDetail {
    pub info: Option<CatalogItem>,
    pub episodes: EpisodesPayload,
}

/// The `episodes` field comes back in one of two shapes depending on the
/// panel: a flat list with a per-episode `season`, or an object keyed by
/// season label.
#[derive(Debug, Clone, PartialEq)]
pub enum EpisodesPayload {
    Flat(Vec<RawEpisode>),
    BySeason(Vec<(String, Vec<RawEpisode>)>),
    Unrecognized,
}

/// Episode record as sent by the server, before normalization
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawEpisode {
    pub id: String,
    pub episode_num: Option<i64>,
    pub season: Option<i64>,
    pub title: Option<String>,
    pub still: Option<String>,
    pub plot: Option<String>,
    pub container_extension: Option<String>,
}

impl EpisodesPayload {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(items) => EpisodesPayload::Flat(raw_episodes(items)),
            Value::Object(map) => EpisodesPayload::BySeason(
                map.iter()
                    .filter_map(|(label, eps)| {
                        let items = eps.as_array()?;
                        Some((label.clone(), raw_episodes(items)))
                    })
                    .collect(),
            ),
            _ => EpisodesPayload::Unrecognized,
        }
    }
}

fn raw_episodes(items: &[Value]) -> Vec<RawEpisode> {
    items.iter().filter_map(RawEpisode::from_value).collect()
}

impl RawEpisode {
    /// Entries without an id cannot be played and are skipped
    pub fn from_value(ep: &Value) -> Option<Self> {
        let id = value_as_string(ep.get("id")?)?;
        let info = ep.get("info");
        Some(Self {
            id,
            episode_num: ep.get("episode_num").and_then(value_as_i64),
            season: ep.get("season").and_then(value_as_i64),
            title: ep.get("title").and_then(value_as_string),
            still: info
                .and_then(|i| i.get("movie_image"))
                .and_then(first_string),
            plot: info.and_then(|i| i.get("plot")).and_then(value_as_string),
            container_extension: ep.get("container_extension").and_then(value_as_string),
        })
    }
}

pub struct XtreamClient {
    server: String,
    username: String,
    password: String,
    user_agent: String,
    agent: ureq::Agent,
}

impl XtreamClient {
    pub fn new(server: &str, username: &str, password: &str) -> Self {
        Self {
            server: server.trim().trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            agent: build_agent(Duration::from_secs(30)),
        }
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    pub fn credentials(&self) -> StreamCredentials {
        StreamCredentials {
            server: self.server.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    pub fn api_url(&self, action: &str, param: Option<(&str, &str)>) -> Result<Url, ApiError> {
        let mut url = Url::parse(&format!("{}/player_api.php", self.server))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("username", &self.username)
                .append_pair("password", &self.password)
                .append_pair("action", action);
            if let Some((name, value)) = param {
                query.append_pair(name, value);
            }
        }
        Ok(url)
    }

    fn get_json(&self, url: &Url) -> Result<Value, ApiError> {
        log::debug!("GET {}", redact(url));
        let response = self
            .agent
            .get(url.as_str())
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/json")
            .call()
            .map_err(|e| match e {
                ureq::Error::StatusCode(code) => ApiError::Status(code),
                other => ApiError::Request(other.to_string()),
            })?;

        // Catalog listings routinely exceed ureq's default in-memory body limit
        let reader = response.into_body().into_reader();
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn get_vod_streams(&self) -> Result<Vec<CatalogItem>, ApiError> {
        let url = self.api_url("get_vod_streams", None)?;
        decode_catalog(ContentKind::Movie, &self.get_json(&url)?)
    }

    pub fn get_series(&self) -> Result<Vec<CatalogItem>, ApiError> {
        let url = self.api_url("get_series", None)?;
        decode_catalog(ContentKind::Series, &self.get_json(&url)?)
    }

    pub fn get_series_info(&self, series_id: i64) -> Result<SeriesDetail, ApiError> {
        let id = series_id.to_string();
        let url = self.api_url("get_series_info", Some(("series_id", &id)))?;
        Ok(decode_series_detail(series_id, &self.get_json(&url)?))
    }
}

impl CatalogSource for XtreamClient {
    fn list(&self, kind: ContentKind) -> Result<Vec<CatalogItem>, ApiError> {
        match kind {
            ContentKind::Movie => self.get_vod_streams(),
            ContentKind::Series => self.get_series(),
        }
    }

    fn series_detail(&self, series_id: i64) -> Result<SeriesDetail, ApiError> {
        self.get_series_info(series_id)
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .timeout_connect(Some(Duration::from_secs(10)))
        .build()
        .new_agent()
}

/// Strip credentials before a URL reaches the log
fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "password" { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    shown.query_pairs_mut().clear().extend_pairs(pairs);
    shown.to_string()
}

/// Decode a `get_vod_streams` / `get_series` listing. Records without a
/// usable id are skipped; repeated ids keep the first occurrence.
pub fn decode_catalog(kind: ContentKind, value: &Value) -> Result<Vec<CatalogItem>, ApiError> {
    let records = value.as_array().ok_or(ApiError::Shape("array of catalog records"))?;
    let mut seen = HashSet::new();
    Ok(records
        .iter()
        .filter_map(|record| catalog_item(kind, record))
        .filter(|item| seen.insert(item.id))
        .collect())
}

fn catalog_item(kind: ContentKind, record: &Value) -> Option<CatalogItem> {
    let (id_key, poster_key) = match kind {
        ContentKind::Movie => ("stream_id", "stream_icon"),
        ContentKind::Series => ("series_id", "cover"),
    };
    Some(CatalogItem {
        id: record.get(id_key).and_then(value_as_i64)?,
        kind,
        name: record.get("name").and_then(value_as_string).unwrap_or_default(),
        poster: record.get(poster_key).and_then(value_as_string),
        rating: record.get("rating").and_then(value_as_string),
        genre: record.get("genre").and_then(value_as_string),
        plot: record.get("plot").and_then(value_as_string),
        backdrop: record.get("backdrop_path").and_then(first_string),
    })
}

/// Decode a `get_series_info` response. Anything that does not carry a
/// recognizable `episodes` field yields an empty payload instead of an error.
pub fn decode_series_detail(series_id: i64, value: &Value) -> SeriesDetail {
    let info = value.get("info").filter(|i| i.is_object()).map(|i| CatalogItem {
        id: series_id,
        kind: ContentKind::Series,
        name: i.get("name").and_then(value_as_string).unwrap_or_default(),
        poster: i.get("cover").and_then(value_as_string),
        rating: i.get("rating").and_then(value_as_string),
        genre: i.get("genre").and_then(value_as_string),
        plot: i.get("plot").and_then(value_as_string),
        backdrop: i.get("backdrop_path").and_then(first_string),
    });
    let episodes = value
        .get("episodes")
        .map(EpisodesPayload::from_value)
        .unwrap_or(EpisodesPayload::Unrecognized);
    SeriesDetail { info, episodes }
}

/// Numbers arrive both as JSON numbers and as strings depending on the panel
pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => parse_leading_int(s),
        _ => None,
    }
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `backdrop_path` and `movie_image` are sometimes a list of URLs
fn first_string(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => items.iter().find_map(value_as_string),
        other => value_as_string(other),
    }
}

/// Leading integer of a string: `" 2"` and `"2 (HD)"` both give 2
pub fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match *s.as_bytes().first()? {
        b'-' => (-1, &s[1..]),
        b'+' => (1, &s[1..]),
        _ => (1, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
