//! Search across the movie and series catalogs

use std::cmp::Ordering;
use std::thread;

use crate::api::CatalogSource;
use crate::error::ApiError;
use crate::models::{CatalogItem, ContentKind, SearchResult};

/// Results shown per kind in the combined view before "see all"
pub const SECTION_PREVIEW: usize = 12;

/// Which subset of the merged results is displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchFilter {
    #[default]
    All,
    Movie,
    Series,
}

impl SearchFilter {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "movie" | "movies" => SearchFilter::Movie,
            "series" => SearchFilter::Series,
            _ => SearchFilter::All,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchFilter::All => "all",
            SearchFilter::Movie => "movie",
            SearchFilter::Series => "series",
        }
    }

    pub fn matches(&self, kind: ContentKind) -> bool {
        match self {
            SearchFilter::All => true,
            SearchFilter::Movie => kind == ContentKind::Movie,
            SearchFilter::Series => kind == ContentKind::Series,
        }
    }
}

/// Ranked, merged results of one query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub query: String,
    items: Vec<SearchResult>,
}

impl SearchResults {
    pub fn new(query: &str, items: Vec<SearchResult>) -> Self {
        Self { query: query.to_string(), items }
    }

    pub fn all(&self) -> &[SearchResult] {
        &self.items
    }

    pub fn visible(&self, filter: SearchFilter) -> impl Iterator<Item = &SearchResult> + '_ {
        self.items.iter().filter(move |item| filter.matches(item.kind))
    }

    pub fn count(&self, kind: ContentKind) -> usize {
        self.items.iter().filter(|item| item.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Outcome of a search, including which catalogs could not be fetched
#[derive(Debug, Default)]
pub struct SearchOutcome {
    pub results: SearchResults,
    pub failures: Vec<(ContentKind, ApiError)>,
}

/// Identity of one issued search; only the latest ticket may commit results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    pub token: u64,
    pub query: String,
}

/// Search state that lives for the whole session and is shared by the views
/// that read or start searches
#[derive(Debug, Default)]
pub struct SearchSession {
    query: String,
    latest: u64,
    searching: bool,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }

    pub fn latest_token(&self) -> u64 {
        self.latest
    }

    /// Issue a new search for `query`. Blank queries reset the session.
    pub fn submit(&mut self, query: &str) -> Option<SearchTicket> {
        let query = query.trim();
        if query.is_empty() {
            self.reset();
            return None;
        }
        self.query = query.to_string();
        Some(self.issue())
    }

    /// Same text, new request
    pub fn retrigger(&mut self) -> Option<SearchTicket> {
        if self.query.is_empty() {
            return None;
        }
        Some(self.issue())
    }

    /// Start the search a shared link describes under the link's own token,
    /// so the link reads back unchanged. Falls back to a fresh token when the
    /// session has already moved past it.
    pub fn resume(&mut self, query: &str, token: u64) -> Option<SearchTicket> {
        let trimmed = query.trim();
        if trimmed.is_empty() || token <= self.latest {
            return self.submit(query);
        }
        self.query = trimmed.to_string();
        self.latest = token;
        self.searching = true;
        Some(SearchTicket {
            token,
            query: self.query.clone(),
        })
    }

    /// Adopt a token coming from outside (a deep link `t` parameter) so that
    /// later tokens keep increasing
    pub fn observe_token(&mut self, token: u64) {
        self.latest = self.latest.max(token);
    }

    fn issue(&mut self) -> SearchTicket {
        self.latest += 1;
        self.searching = true;
        SearchTicket {
            token: self.latest,
            query: self.query.clone(),
        }
    }

    pub fn reset(&mut self) {
        self.query.clear();
        self.searching = false;
    }

    /// Accept results for `ticket` only if no newer search was issued since
    pub fn commit(&mut self, ticket: &SearchTicket) -> bool {
        if ticket.token != self.latest {
            log::debug!("dropping stale results for '{}' (token {})", ticket.query, ticket.token);
            return false;
        }
        self.searching = false;
        true
    }
}

/// Case-insensitive substring match on the name
pub fn matches_query(name: &str, query_lower: &str) -> bool {
    name.to_lowercase().contains(query_lower)
}

/// Exact match first, then prefix match, then alphabetical by name
pub fn rank_cmp(a: &CatalogItem, b: &CatalogItem, query_lower: &str) -> Ordering {
    let a_lower = a.name.to_lowercase();
    let b_lower = b.name.to_lowercase();

    let a_exact = a_lower == query_lower;
    let b_exact = b_lower == query_lower;
    if a_exact != b_exact {
        return if a_exact { Ordering::Less } else { Ordering::Greater };
    }

    let a_prefix = a_lower.starts_with(query_lower);
    let b_prefix = b_lower.starts_with(query_lower);
    if a_prefix != b_prefix {
        return if a_prefix { Ordering::Less } else { Ordering::Greater };
    }

    a_lower.cmp(&b_lower).then_with(|| a.name.cmp(&b.name))
}

/// Filter both catalogs, merge and rank
pub fn rank(query: &str, movies: Vec<CatalogItem>, series: Vec<CatalogItem>) -> SearchResults {
    let query_lower = query.trim().to_lowercase();
    let mut merged: Vec<SearchResult> = movies
        .into_iter()
        .chain(series)
        .filter(|item| matches_query(&item.name, &query_lower))
        .collect();
    merged.sort_by(|a, b| rank_cmp(a, b, &query_lower));
    SearchResults::new(query.trim(), merged)
}

/// Fetch both catalogs concurrently and rank the matches. A failed fetch
/// contributes no results but does not hide the other catalog's matches.
pub fn search(source: &dyn CatalogSource, query: &str) -> SearchOutcome {
    let (movies, series) = thread::scope(|scope| {
        let movies = scope.spawn(|| source.list(ContentKind::Movie));
        let series = scope.spawn(|| source.list(ContentKind::Series));
        (join(movies), join(series))
    });

    let mut failures = Vec::new();
    let mut take = |kind: ContentKind, result: Result<Vec<CatalogItem>, ApiError>| match result {
        Ok(items) => items,
        Err(e) => {
            log::warn!("search: {} catalog unavailable: {}", kind, e);
            failures.push((kind, e));
            Vec::new()
        }
    };
    let movies = take(ContentKind::Movie, movies);
    let series = take(ContentKind::Series, series);

    let results = rank(query, movies, series);
    log::info!("search '{}': {} results", results.query, results.len());
    SearchOutcome { results, failures }
}

fn join(
    handle: thread::ScopedJoinHandle<'_, Result<Vec<CatalogItem>, ApiError>>,
) -> Result<Vec<CatalogItem>, ApiError> {
    handle
        .join()
        .unwrap_or_else(|_| Err(ApiError::Request("catalog fetch panicked".to_string())))
}

#[cfg(test)]
#[path = "search_tests.rs"]
mod tests;
