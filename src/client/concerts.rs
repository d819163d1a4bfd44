//! Concert feed: favourite-artist searches plus a general search, ranked

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};

use super::api::{ClientError, DashboardApi};
use crate::prefs::ConcertPreferences;
use crate::upstream::concerts::{rank_feed, ConcertEvent, ConcertQuery};

/// Page size per search; generous so the past filter still leaves enough
pub const FEED_PAGE_SIZE: u32 = 50;

/// One search per favourite artist, then the general search, in that order
pub fn feed_queries(prefs: &ConcertPreferences) -> Vec<ConcertQuery> {
    let base = ConcertQuery::for_location(prefs, FEED_PAGE_SIZE);
    prefs
        .favorite_artists
        .iter()
        .map(|artist| artist.trim())
        .filter(|artist| !artist.is_empty())
        .map(|artist| base.with_keyword(artist))
        .chain(std::iter::once(base.clone()))
        .collect()
}

/// Run every search with at most `fan_out` in flight and rank the union.
///
/// A failed search is logged and skipped. Only when every search fails is
/// the last error returned.
pub async fn fetch_feed(
    api: &dyn DashboardApi,
    prefs: &ConcertPreferences,
    fan_out: usize,
    now: DateTime<Utc>,
) -> Result<Vec<ConcertEvent>, ClientError> {
    let queries = feed_queries(prefs);
    let total = queries.len();

    // `buffered` keeps results in query order, so ranking ties stay stable
    let results: Vec<_> = stream::iter(queries.iter())
        .map(|query| async move { (query, api.concerts(query).await) })
        .buffered(fan_out.max(1))
        .collect()
        .await;

    let mut batches = Vec::new();
    let mut last_error = None;
    let mut failures = 0;
    for (query, result) in results {
        match result {
            Ok(response) => batches.extend(response.events),
            Err(e) => {
                tracing::warn!(
                    keyword = query.keyword.as_deref().unwrap_or("(general)"),
                    error = %e,
                    "Concert search failed"
                );
                failures += 1;
                last_error = Some(e);
            }
        }
    }

    if failures == total {
        if let Some(e) = last_error {
            return Err(e);
        }
    }

    let feed = rank_feed(batches, prefs, now);
    tracing::debug!(events = feed.len(), searches = total, "Concert feed ranked");
    Ok(feed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::session::test_support::FakeApi;
    use crate::upstream::concerts::{ConcertsResponse, Venue};
    use std::collections::HashMap;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-10-18T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn event(id: &str, artist: &str, date: &str) -> ConcertEvent {
        ConcertEvent {
            id: id.to_string(),
            name: format!("{artist} Live"),
            artist: artist.to_string(),
            genre: "Rock".to_string(),
            url: String::new(),
            image: String::new(),
            venue: Venue::default(),
            date: date.to_string(),
            time_zone: None,
            price_range: None,
        }
    }

    fn prefs(artists: &[&str]) -> ConcertPreferences {
        ConcertPreferences {
            favorite_artists: artists.iter().map(|a| a.to_string()).collect(),
            ..ConcertPreferences::default()
        }
    }

    #[test]
    fn test_queries_per_artist_then_general() {
        let queries = feed_queries(&prefs(&["Foo Fighters", "  ", "Heart"]));
        let keywords: Vec<_> = queries.iter().map(|q| q.keyword.clone()).collect();
        assert_eq!(
            keywords,
            [Some("Foo Fighters".to_string()), Some("Heart".to_string()), None]
        );
        assert!(queries.iter().all(|q| q.size == Some(FEED_PAGE_SIZE)));
    }

    #[tokio::test]
    async fn test_feed_merges_and_ranks() {
        let mut replies = HashMap::new();
        replies.insert(
            "Heart".to_string(),
            Ok(ConcertsResponse {
                events: vec![event("e1", "Heart", "2026-11-02T03:00:00Z")],
                total: 1,
            }),
        );
        replies.insert(
            String::new(),
            Ok(ConcertsResponse {
                events: vec![
                    event("e2", "Someone Else", "2026-11-01T03:00:00Z"),
                    event("e1", "Heart", "2026-11-02T03:00:00Z"),
                    event("old", "Yesterday", "2026-10-17T03:00:00Z"),
                ],
                total: 3,
            }),
        );
        let api = FakeApi {
            concert_replies: replies,
            ..FakeApi::default()
        };

        let feed = fetch_feed(&api, &prefs(&["Heart"]), 2, now()).await.unwrap();
        let ids: Vec<_> = feed.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["e1", "e2"]);
    }

    #[tokio::test]
    async fn test_one_failed_search_is_skipped() {
        let mut replies = HashMap::new();
        replies.insert("Heart".to_string(), Err((500, "Failed to fetch events")));
        replies.insert(
            String::new(),
            Ok(ConcertsResponse {
                events: vec![event("e2", "Someone Else", "2026-11-01T03:00:00Z")],
                total: 1,
            }),
        );
        let api = FakeApi {
            concert_replies: replies,
            ..FakeApi::default()
        };

        let feed = fetch_feed(&api, &prefs(&["Heart"]), 4, now()).await.unwrap();
        assert_eq!(feed.len(), 1);
    }

    #[tokio::test]
    async fn test_all_searches_failing_is_an_error() {
        let mut replies = HashMap::new();
        replies.insert(String::new(), Err((500, "Ticketmaster API key not configured")));
        let api = FakeApi {
            concert_replies: replies,
            ..FakeApi::default()
        };

        let err = fetch_feed(&api, &ConcertPreferences::default(), 4, now())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
    }
}
