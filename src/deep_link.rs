//! Shareable navigation state carried as URL query parameters

use url::form_urlencoded;

use crate::search::SearchFilter;

/// Every field is optional; absent fields fall back to each view's default
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeepLink {
    pub movie: Option<i64>,
    pub series: Option<i64>,
    pub season: Option<i32>,
    pub episode: Option<String>,
    pub q: Option<String>,
    pub filter: SearchFilter,
    pub t: Option<u64>,
}

impl DeepLink {
    /// Parse a full URL, a `?query` or a bare query string. Unknown keys are
    /// ignored and numbers that do not parse count as absent.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let query = match input.find('?') {
            Some(pos) => &input[pos + 1..],
            None => input,
        };
        let query = query.split('#').next().unwrap_or_default();

        let mut link = DeepLink::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            let value = value.trim();
            match key.as_ref() {
                "movie" => link.movie = value.parse().ok(),
                "series" => link.series = value.parse().ok(),
                "season" => link.season = value.parse().ok(),
                "episode" => link.episode = non_empty(value),
                "q" => link.q = non_empty(value),
                "type" => link.filter = SearchFilter::parse(value),
                "t" => link.t = value.parse().ok(),
                _ => {}
            }
        }
        link
    }

    /// Serialize in a fixed key order; the default search filter is omitted
    pub fn to_query(&self) -> String {
        let mut out = form_urlencoded::Serializer::new(String::new());
        if let Some(movie) = self.movie {
            out.append_pair("movie", &movie.to_string());
        }
        if let Some(series) = self.series {
            out.append_pair("series", &series.to_string());
        }
        if let Some(season) = self.season {
            out.append_pair("season", &season.to_string());
        }
        if let Some(episode) = &self.episode {
            out.append_pair("episode", episode);
        }
        if let Some(q) = &self.q {
            out.append_pair("q", q);
        }
        if self.filter != SearchFilter::All {
            out.append_pair("type", self.filter.as_str());
        }
        if let Some(t) = self.t {
            out.append_pair("t", &t.to_string());
        }
        out.finish()
    }

    pub fn is_empty(&self) -> bool {
        *self == DeepLink::default()
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
