//! Team news: endpoint fallback, shape extraction, relevance ordering
//!
//! ```text
//!   team news ?limit ─► team news ─► league news ?limit ─► league news
//!        (first successful, non-empty payload wins; strictly sequential)
//!                              │
//!            extractors: articles │ headlines │ items │ [..] │
//!                        sports[0].leagues[0].teams[0].news │ team.news
//!                              │
//!            partition: team-related first, rest after (stable)
//! ```

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::espn::{validate_segment, EspnClient};
use super::{first_str, lookup, UpstreamError};

/// Upstream page size requested by the `?limit` endpoint variants
pub const UPSTREAM_PAGE_SIZE: usize = 100;

/// Terms at least this long match as plain substrings
const SUBSTRING_MIN_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub title: String,
    pub description: String,
    pub url: String,
    pub published_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub byline: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsResponse {
    pub articles: Vec<Article>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Shape extraction
// ─────────────────────────────────────────────────────────────────────────────

type Extractor = fn(&Value) -> Option<&Vec<Value>>;

fn articles(v: &Value) -> Option<&Vec<Value>> {
    v.get("articles")?.as_array()
}

fn headlines(v: &Value) -> Option<&Vec<Value>> {
    v.get("headlines")?.as_array()
}

fn items(v: &Value) -> Option<&Vec<Value>> {
    v.get("items")?.as_array()
}

fn root(v: &Value) -> Option<&Vec<Value>> {
    v.as_array()
}

fn nested_team_news(v: &Value) -> Option<&Vec<Value>> {
    lookup(v, "sports.0.leagues.0.teams.0.news")?.as_array()
}

fn team_news(v: &Value) -> Option<&Vec<Value>> {
    lookup(v, "team.news")?.as_array()
}

/// Known response shapes, in the order they are tried
const EXTRACTORS: [(&str, Extractor); 6] = [
    ("articles", articles),
    ("headlines", headlines),
    ("items", items),
    ("root", root),
    ("sports.leagues.teams.news", nested_team_news),
    ("team.news", team_news),
];

/// Article list from the first shape that matches
pub fn extract_articles(payload: &Value) -> Option<&Vec<Value>> {
    EXTRACTORS.iter().find_map(|(shape, extract)| {
        let found = extract(payload)?;
        tracing::trace!(shape, count = found.len(), "News shape matched");
        Some(found)
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Relevance
// ─────────────────────────────────────────────────────────────────────────────

/// Decides whether an article is about a particular team
#[derive(Debug, Default)]
pub struct TeamMatcher {
    substrings: Vec<String>,
    words: Vec<Regex>,
}

impl TeamMatcher {
    /// Terms from an ESPN team object: names, location, abbreviation and
    /// display-name fragments longer than three characters
    pub fn from_team(team: &Value) -> Self {
        let mut terms: Vec<String> = ["displayName", "name", "shortDisplayName", "location", "abbreviation"]
            .iter()
            .filter_map(|key| first_str(team, &[*key]))
            .collect();

        if let Some(display) = first_str(team, &["displayName"]) {
            terms.extend(
                display
                    .split(' ')
                    .filter(|part| part.chars().count() > 3)
                    .map(str::to_string),
            );
        }

        Self::from_terms(terms)
    }

    pub fn from_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut matcher = Self::default();
        let mut seen: Vec<String> = Vec::new();

        for term in terms {
            let term = term.as_ref().trim().to_lowercase();
            let len = term.chars().count();
            if len < 2 || seen.contains(&term) {
                continue;
            }
            seen.push(term.clone());

            if len >= SUBSTRING_MIN_LEN {
                matcher.substrings.push(term);
            } else if let Ok(re) = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&term))) {
                matcher.words.push(re);
            }
        }
        matcher
    }

    pub fn is_empty(&self) -> bool {
        self.substrings.is_empty() && self.words.is_empty()
    }

    pub fn matches(&self, article: &Value) -> bool {
        if self.is_empty() {
            return false;
        }

        let haystack = ["headline", "title", "name", "description", "summary", "byline"]
            .iter()
            .filter_map(|key| article.get(*key).and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        self.substrings.iter().any(|term| haystack.contains(term.as_str()))
            || self.words.iter().any(|re| re.is_match(&haystack))
    }
}

/// Team-related articles first, everything else after; order within each
/// group is preserved
pub fn partition_by_relevance(articles: Vec<Value>, matcher: &TeamMatcher) -> Vec<Value> {
    let (mut related, other): (Vec<Value>, Vec<Value>) =
        articles.into_iter().partition(|a| matcher.matches(a));
    tracing::debug!(related = related.len(), other = other.len(), "News partitioned");
    related.extend(other);
    related
}

// ─────────────────────────────────────────────────────────────────────────────
// Normalization
// ─────────────────────────────────────────────────────────────────────────────

fn resolve_url(article: &Value, sport: &str, league: &str, web_base: &str) -> String {
    let base = web_base.trim_end_matches('/');
    let raw = first_str(
        article,
        &["url", "links.web.href", "links.web", "links.espn.href", "links.espn", "link", "href"],
    );

    match raw {
        Some(url) if url.starts_with("http") => url,
        Some(url) if url.starts_with('/') => format!("{base}{url}"),
        Some(url) => format!("{base}/{url}"),
        None => match article.get("id") {
            Some(Value::Number(id)) => format!("{base}/{sport}/{league}/story/_/id/{id}"),
            Some(Value::String(id)) if !id.is_empty() => {
                format!("{base}/{sport}/{league}/story/_/id/{id}")
            }
            _ => "#".to_string(),
        },
    }
}

fn resolve_image(article: &Value) -> Option<String> {
    if let Some(first) = article
        .get("images")
        .and_then(Value::as_array)
        .and_then(|imgs| imgs.first())
    {
        return first_str(first, &["url", "href"]);
    }
    for key in ["image", "thumbnail"] {
        if let Some(value) = article.get(key) {
            if let Some(s) = value.as_str().filter(|s| !s.is_empty()) {
                return Some(s.to_string());
            }
            if let Some(s) = first_str(value, &["url", "href"]) {
                return Some(s);
            }
        }
    }
    None
}

/// Map one upstream article onto the stable DTO
pub fn normalize_article(
    article: &Value,
    sport: &str,
    league: &str,
    web_base: &str,
    now: DateTime<Utc>,
) -> Article {
    Article {
        title: first_str(article, &["headline", "title", "name"])
            .unwrap_or_else(|| "Untitled".to_string()),
        description: first_str(article, &["description", "summary"]).unwrap_or_default(),
        url: resolve_url(article, sport, league, web_base),
        published_at: first_str(
            article,
            &["published", "publishedAt", "date", "createdAt", "lastModified"],
        )
        .unwrap_or_else(|| now.to_rfc3339()),
        image: resolve_image(article),
        byline: first_str(article, &["byline"]).unwrap_or_default(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fetch
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct NewsQuery {
    pub sport: String,
    pub league: String,
    pub team_id: Option<String>,
    /// Truncate the final list; no truncation when absent
    pub limit: Option<usize>,
}

/// Endpoint variants in fallback order
pub fn news_endpoints(espn: &EspnClient, query: &NewsQuery) -> Vec<(String, Option<usize>)> {
    let page = query.limit.unwrap_or(UPSTREAM_PAGE_SIZE);
    let mut endpoints = Vec::with_capacity(4);

    if let Some(team_id) = &query.team_id {
        let team_news = espn.url(&query.sport, &query.league, &format!("teams/{team_id}/news"));
        endpoints.push((team_news.clone(), Some(page)));
        endpoints.push((team_news, None));
    }

    let league_news = espn.url(&query.sport, &query.league, "news");
    endpoints.push((league_news.clone(), Some(page)));
    endpoints.push((league_news, None));
    endpoints
}

/// Fetch, order and normalize news for a league or team
pub async fn fetch_news(
    espn: &EspnClient,
    web_base: &str,
    query: &NewsQuery,
    now: DateTime<Utc>,
) -> Result<Vec<Article>, UpstreamError> {
    validate_segment("sport", &query.sport)?;
    validate_segment("league", &query.league)?;
    if let Some(team_id) = &query.team_id {
        validate_segment("teamId", team_id)?;
    }

    let matcher = match &query.team_id {
        Some(team_id) => match espn.team(&query.sport, &query.league, team_id).await {
            Ok(team) => TeamMatcher::from_team(&team),
            Err(e) => {
                tracing::debug!(team_id, error = %e, "Team lookup failed, news stays unordered");
                TeamMatcher::default()
            }
        },
        None => TeamMatcher::default(),
    };

    let mut articles: Option<Vec<Value>> = None;
    let mut last_error = None;

    for (url, page) in news_endpoints(espn, query) {
        let params: Vec<(&str, String)> = page.map(|p| vec![("limit", p.to_string())]).unwrap_or_default();
        match espn.get(&url, &params).await {
            Ok(payload) => {
                let found = extract_articles(&payload).cloned().unwrap_or_default();
                if !found.is_empty() {
                    articles = Some(found);
                    break;
                }
                tracing::debug!(url, "News endpoint returned no articles");
                articles.get_or_insert_with(Vec::new);
            }
            Err(e) => {
                tracing::debug!(url, error = %e, "News endpoint failed, trying next");
                last_error = Some(e);
            }
        }
    }

    // Only an error when no endpoint answered at all
    let articles = match (articles, last_error) {
        (Some(articles), _) => articles,
        (None, Some(e)) => return Err(e),
        (None, None) => return Err(UpstreamError::Exhausted("no news endpoint answered".into())),
    };

    let mut ordered: Vec<Article> = partition_by_relevance(articles, &matcher)
        .iter()
        .map(|a| normalize_article(a, &query.sport, &query.league, web_base, now))
        .collect();

    if let Some(limit) = query.limit {
        ordered.truncate(limit);
    }
    Ok(ordered)
}
