//! Tests for search ranking, filtering and request tokens

use super::*;
use crate::api::SeriesDetail;

fn item(id: i64, kind: ContentKind, name: &str) -> CatalogItem {
    CatalogItem {
        id,
        kind,
        name: name.to_string(),
        poster: None,
        rating: None,
        genre: None,
        plot: None,
        backdrop: None,
    }
}

struct FakeCatalog {
    movies: Result<Vec<CatalogItem>, u16>,
    series: Result<Vec<CatalogItem>, u16>,
}

impl CatalogSource for FakeCatalog {
    fn list(&self, kind: ContentKind) -> Result<Vec<CatalogItem>, ApiError> {
        let source = match kind {
            ContentKind::Movie => &self.movies,
            ContentKind::Series => &self.series,
        };
        source.clone().map_err(ApiError::Status)
    }

    fn series_detail(&self, _series_id: i64) -> Result<SeriesDetail, ApiError> {
        Err(ApiError::Status(404))
    }
}

fn names(results: &SearchResults) -> Vec<&str> {
    results.all().iter().map(|i| i.name.as_str()).collect()
}

#[test]
fn test_rank_exact_then_prefix_then_alphabetical() {
    let movies = vec![
        item(1, ContentKind::Movie, "The Matrix"),
        item(2, ContentKind::Movie, "Matrix Reloaded"),
        item(3, ContentKind::Movie, "Matrix"),
    ];
    let results = rank("Matrix", movies, Vec::new());
    assert_eq!(names(&results), vec!["Matrix", "Matrix Reloaded", "The Matrix"]);
}

#[test]
fn test_rank_is_case_insensitive() {
    let movies = vec![
        item(1, ContentKind::Movie, "batman begins"),
        item(2, ContentKind::Movie, "LEGO Batman"),
        item(3, ContentKind::Movie, "BATMAN"),
        item(4, ContentKind::Movie, "Superman"),
    ];
    let results = rank("Batman", movies, Vec::new());
    assert_eq!(names(&results), vec!["BATMAN", "batman begins", "LEGO Batman"]);
}

#[test]
fn test_rank_merges_both_kinds() {
    let movies = vec![item(1, ContentKind::Movie, "Dark Waters")];
    let series = vec![
        item(1, ContentKind::Series, "Dark"),
        item(2, ContentKind::Series, "The Dark Crystal"),
    ];
    let results = rank("dark", movies, series);
    assert_eq!(names(&results), vec!["Dark", "Dark Waters", "The Dark Crystal"]);
    assert_eq!(results.count(ContentKind::Movie), 1);
    assert_eq!(results.count(ContentKind::Series), 2);
}

#[test]
fn test_filter_only_changes_visible_subset() {
    let movies = vec![item(1, ContentKind::Movie, "Dark Waters")];
    let series = vec![item(1, ContentKind::Series, "Dark")];
    let results = rank("dark", movies, series);

    let series_only: Vec<_> = results.visible(SearchFilter::Series).map(|i| i.name.as_str()).collect();
    assert_eq!(series_only, vec!["Dark"]);
    let movies_only: Vec<_> = results.visible(SearchFilter::Movie).map(|i| i.name.as_str()).collect();
    assert_eq!(movies_only, vec!["Dark Waters"]);
    assert_eq!(results.visible(SearchFilter::All).count(), 2);
    assert_eq!(results.len(), 2);
}

#[test]
fn test_filter_parse() {
    assert_eq!(SearchFilter::parse("movie"), SearchFilter::Movie);
    assert_eq!(SearchFilter::parse("movies"), SearchFilter::Movie);
    assert_eq!(SearchFilter::parse("Series"), SearchFilter::Series);
    assert_eq!(SearchFilter::parse("all"), SearchFilter::All);
    assert_eq!(SearchFilter::parse("bogus"), SearchFilter::All);
}

#[test]
fn test_search_fetches_both_catalogs() {
    let source = FakeCatalog {
        movies: Ok(vec![item(1, ContentKind::Movie, "Heat"), item(2, ContentKind::Movie, "Alien")]),
        series: Ok(vec![item(9, ContentKind::Series, "Heated Rivalry")]),
    };
    let outcome = search(&source, "heat");
    assert!(outcome.failures.is_empty());
    assert_eq!(names(&outcome.results), vec!["Heat", "Heated Rivalry"]);
}

#[test]
fn test_search_keeps_partial_results_when_one_catalog_fails() {
    let source = FakeCatalog {
        movies: Err(503),
        series: Ok(vec![item(9, ContentKind::Series, "Heated Rivalry")]),
    };
    let outcome = search(&source, "heat");
    assert_eq!(names(&outcome.results), vec!["Heated Rivalry"]);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].0, ContentKind::Movie);
}

#[test]
fn test_search_both_failed_is_empty() {
    let source = FakeCatalog { movies: Err(500), series: Err(500) };
    let outcome = search(&source, "heat");
    assert!(outcome.results.is_empty());
    assert_eq!(outcome.failures.len(), 2);
}

#[test]
fn test_session_tokens_increase_and_stale_results_are_dropped() {
    let mut session = SearchSession::new();
    let first = session.submit("matrix").unwrap();
    let second = session.retrigger().unwrap();
    assert_eq!(second.query, "matrix");
    assert!(second.token > first.token);

    assert!(!session.commit(&first));
    assert!(session.is_searching());
    assert!(session.commit(&second));
    assert!(!session.is_searching());
}

#[test]
fn test_session_blank_query_resets() {
    let mut session = SearchSession::new();
    session.submit("dark").unwrap();
    assert!(session.submit("   ").is_none());
    assert_eq!(session.query(), "");
    assert!(session.retrigger().is_none());
}

#[test]
fn test_session_observed_token_keeps_tokens_monotonic() {
    let mut session = SearchSession::new();
    session.observe_token(1_700_000_000);
    let ticket = session.submit("dark").unwrap();
    assert_eq!(ticket.token, 1_700_000_001);
}

#[test]
fn test_session_resume_keeps_link_token() {
    let mut session = SearchSession::new();
    let ticket = session.resume("matrix", 5).unwrap();
    assert_eq!(ticket.token, 5);
    assert_eq!(session.latest_token(), 5);
    assert_eq!(session.query(), "matrix");
    assert!(session.commit(&ticket));

    // Later searches continue past the link's token
    assert_eq!(session.submit("dark").unwrap().token, 6);
}

#[test]
fn test_session_resume_with_spent_token_issues_fresh_one() {
    let mut session = SearchSession::new();
    session.observe_token(9);
    let ticket = session.resume("matrix", 3).unwrap();
    assert_eq!(ticket.token, 10);
    assert!(session.resume("  ", 20).is_none());
}
