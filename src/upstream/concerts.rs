//! Ticketmaster Discovery proxy and the concert feed ranking
//!
//! ```text
//!   ConcertQuery ──► TicketmasterClient::search ──► [ConcertEvent] (past dropped)
//!
//!   per-artist results ++ general results ──► rank_feed ──► deduped, upcoming,
//!                                                           favourites first
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{fetch_json, first_str, lookup, parse_timestamp, UpstreamError};
use crate::prefs::ConcertPreferences;

/// Upstream page size when the caller gives none
pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// Search radius in miles for coordinate searches
pub const DEFAULT_RADIUS: &str = "50";
/// Events that started within this window still count as upcoming
const PAST_GRACE: Duration = Duration::hours(1);

// ─────────────────────────────────────────────────────────────────────────────
// Query and response types
// ─────────────────────────────────────────────────────────────────────────────

/// Search parameters accepted by `GET /concerts`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcertQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification_name: Option<String>,
}

impl ConcertQuery {
    /// Location part of a search built from saved concert preferences
    pub fn for_location(prefs: &ConcertPreferences, size: u32) -> Self {
        let location = &prefs.location;
        let mut query = Self {
            size: Some(size),
            ..Self::default()
        };
        match (location.lat, location.lon) {
            (Some(lat), Some(lon)) if lat != 0.0 && lon != 0.0 => {
                query.lat = Some(lat.to_string());
                query.lon = Some(lon.to_string());
                query.radius = Some(DEFAULT_RADIUS.to_string());
            }
            _ => match location.city.as_deref().filter(|c| !c.is_empty()) {
                Some(city) => {
                    query.city = Some(city.to_string());
                    query.state_code = location.state_code.clone().filter(|s| !s.is_empty());
                }
                None => {
                    query.city = Some("San Diego".to_string());
                    query.state_code = Some("CA".to_string());
                }
            },
        }
        query
    }

    pub fn with_keyword(&self, keyword: &str) -> Self {
        Self {
            keyword: Some(keyword.to_string()),
            ..self.clone()
        }
    }

    /// Ticketmaster query string, without the API key
    fn upstream_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("size", self.size.unwrap_or(DEFAULT_PAGE_SIZE).to_string()),
            ("sort", "date,asc".to_string()),
        ];

        let present = |v: &Option<String>| v.as_deref().filter(|s| !s.is_empty()).map(str::to_string);

        if let (Some(lat), Some(lon)) = (present(&self.lat), present(&self.lon)) {
            params.push(("latlong", format!("{lat},{lon}")));
            params.push(("radius", present(&self.radius).unwrap_or_else(|| DEFAULT_RADIUS.to_string())));
            params.push(("unit", "miles".to_string()));
        } else if let Some(city) = present(&self.city) {
            params.push(("city", city));
            if let Some(state) = present(&self.state_code) {
                params.push(("stateCode", state));
            }
            params.push(("countryCode", present(&self.country_code).unwrap_or_else(|| "US".to_string())));
        }

        if let Some(keyword) = present(&self.keyword) {
            params.push(("keyword", keyword));
        }
        params.push((
            "classificationName",
            present(&self.classification_name).unwrap_or_else(|| "music".to_string()),
        ));
        params
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub name: String,
    pub city: String,
    pub state: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcertEvent {
    pub id: String,
    pub name: String,
    pub artist: String,
    pub genre: String,
    pub url: String,
    #[serde(default)]
    pub image: String,
    pub venue: Venue,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_range: Option<PriceRange>,
}

impl ConcertEvent {
    /// Flatten a Ticketmaster event
    pub fn from_ticketmaster(event: &Value) -> Self {
        let venue = lookup(event, "_embedded.venues.0").cloned().unwrap_or(Value::Null);

        let name = first_str(event, &["name"]).unwrap_or_default();
        let attractions = lookup(event, "_embedded.attractions")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let artist = attractions
            .iter()
            .find(|a| lookup(a, "classifications.0.primary").is_some_and(|p| !p.is_null()))
            .or_else(|| attractions.first())
            .and_then(|a| first_str(a, &["name"]))
            .unwrap_or_else(|| name.clone());

        let classifications = event
            .get("classifications")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let genre = classifications
            .iter()
            .find(|c| c.get("primary").and_then(Value::as_bool).unwrap_or(false))
            .or_else(|| classifications.first())
            .and_then(|c| first_str(c, &["genre.name", "segment.name"]))
            .unwrap_or_else(|| "Music".to_string());

        Self {
            id: first_str(event, &["id"]).unwrap_or_default(),
            artist,
            genre,
            url: first_str(event, &["url"]).unwrap_or_default(),
            image: pick_image(event),
            venue: Venue {
                name: first_str(&venue, &["name"]).unwrap_or_else(|| "TBD".to_string()),
                city: first_str(&venue, &["city.name"]).unwrap_or_default(),
                state: first_str(&venue, &["state.stateCode"]).unwrap_or_default(),
                address: first_str(&venue, &["address.line1"]).unwrap_or_default(),
            },
            date: first_str(event, &["dates.start.dateTime", "dates.start.localDate"]).unwrap_or_default(),
            time_zone: first_str(event, &["dates.timezone", "dates.start.timezone"]),
            price_range: lookup(event, "priceRanges.0").map(|range| PriceRange {
                min: range.get("min").and_then(Value::as_f64).unwrap_or(0.0),
                max: range.get("max").and_then(Value::as_f64).unwrap_or(0.0),
                currency: first_str(range, &["currency"]).unwrap_or_else(|| "USD".to_string()),
            }),
            name,
        }
    }

    /// `None` when the date cannot be parsed
    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.date)
    }
}

/// Prefer a wide 16:9 image, then whatever comes first
fn pick_image(event: &Value) -> String {
    let images = event.get("images").and_then(Value::as_array);
    images
        .and_then(|images| {
            images.iter().find(|img| {
                img.get("width").and_then(Value::as_u64).unwrap_or(0) > 200
                    && img.get("ratio").and_then(Value::as_str) == Some("16_9")
            })
        })
        .or_else(|| images.and_then(|images| images.first()))
        .and_then(|img| first_str(img, &["url"]))
        .unwrap_or_default()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConcertsResponse {
    pub events: Vec<ConcertEvent>,
    pub total: u64,
}

/// Drop events that started more than an hour ago; undated events stay
pub fn retain_upcoming(events: &mut Vec<ConcertEvent>, now: DateTime<Utc>) {
    let cutoff = now - PAST_GRACE;
    events.retain(|event| event.starts_at().map_or(true, |at| at >= cutoff));
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct TicketmasterClient {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl TicketmasterClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            url: url.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn search(
        &self,
        query: &ConcertQuery,
        now: DateTime<Utc>,
    ) -> Result<ConcertsResponse, UpstreamError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(UpstreamError::NotConfigured("Ticketmaster API key not configured"))?;

        let params = query.upstream_params();
        tracing::debug!(url = %self.url, ?params, "Ticketmaster request");

        let data: Value = fetch_json(
            self.http
                .get(&self.url)
                .query(&[("apikey", api_key)])
                .query(&params),
        )
        .await?;

        let mut events: Vec<ConcertEvent> = lookup(&data, "_embedded.events")
            .and_then(Value::as_array)
            .map(|events| events.iter().map(ConcertEvent::from_ticketmaster).collect())
            .unwrap_or_default();
        let fetched = events.len();
        retain_upcoming(&mut events, now);
        tracing::debug!(fetched, upcoming = events.len(), "Ticketmaster events filtered");

        let total = lookup(&data, "page.totalElements")
            .and_then(Value::as_u64)
            .unwrap_or(events.len() as u64);

        Ok(ConcertsResponse { events, total })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Feed ranking
// ─────────────────────────────────────────────────────────────────────────────

/// 1 = favourite artist, 2 = favourite genre, 3 = anything else
pub fn priority(event: &ConcertEvent, prefs: &ConcertPreferences) -> u8 {
    let artist = event.artist.to_lowercase();
    let name = event.name.to_lowercase();
    let genre = event.genre.to_lowercase();

    let artist_match = prefs
        .favorite_artists
        .iter()
        .map(|a| a.to_lowercase())
        .any(|a| artist.contains(&a) || name.contains(&a));
    if artist_match {
        return 1;
    }
    let genre_match = prefs
        .favorite_genres
        .iter()
        .map(|g| g.to_lowercase())
        .any(|g| genre.contains(&g));
    if genre_match {
        2
    } else {
        3
    }
}

/// Merge fetched batches into the displayed feed.
///
/// Duplicates by id keep the first position but the last payload. Past
/// events are dropped, then the rest is ordered by priority and start time
/// with undated events last within their priority.
pub fn rank_feed(
    batches: Vec<ConcertEvent>,
    prefs: &ConcertPreferences,
    now: DateTime<Utc>,
) -> Vec<ConcertEvent> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<ConcertEvent> = Vec::with_capacity(batches.len());
    for event in batches {
        match index.get(&event.id) {
            Some(&slot) => unique[slot] = event,
            None => {
                index.insert(event.id.clone(), unique.len());
                unique.push(event);
            }
        }
    }

    retain_upcoming(&mut unique, now);

    unique.sort_by_cached_key(|event| {
        let at = event.starts_at();
        (priority(event, prefs), at.is_none(), at)
    });
    unique
}
