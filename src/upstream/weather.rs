//! Current conditions from a wttr.in-compatible `format=j1` endpoint

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::{fetch_json, first_str, lookup, UpstreamError};

/// Used when the caller gives neither coordinates nor a place name
pub const DEFAULT_LOCATION: &str = "San Diego";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl WeatherQuery {
    /// Path segment wttr.in understands: `lat,lon` or a place name
    fn place(&self) -> String {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => format!("{lat},{lon}"),
            _ => self
                .location
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .unwrap_or(DEFAULT_LOCATION)
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    /// Degrees Fahrenheit
    pub temp: i32,
    pub condition: String,
    pub humidity: i32,
    /// Miles per hour
    pub wind_speed: i32,
    /// wttr.in weather code
    pub icon: String,
    pub location: String,
}

fn int_field(current: &Value, key: &str) -> i32 {
    first_str(current, &[key])
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0)
}

impl WeatherReport {
    /// `requested` labels the report when the payload names no area
    pub fn from_j1(data: &Value, requested: &str) -> Result<Self, UpstreamError> {
        let current = lookup(data, "current_condition.0")
            .ok_or_else(|| UpstreamError::Decode("no current_condition".to_string()))?;

        Ok(Self {
            temp: int_field(current, "temp_F"),
            condition: first_str(current, &["weatherDesc.0.value"]).unwrap_or_default(),
            humidity: int_field(current, "humidity"),
            wind_speed: int_field(current, "windspeedMiles"),
            icon: first_str(current, &["weatherCode"]).unwrap_or_default(),
            location: first_str(data, &["nearest_area.0.areaName.0.value"])
                .unwrap_or_else(|| requested.to_string()),
        })
    }
}

#[derive(Clone)]
pub struct WeatherClient {
    http: reqwest::Client,
    base_url: String,
}

impl WeatherClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    pub async fn current(&self, query: &WeatherQuery) -> Result<WeatherReport, UpstreamError> {
        let place = query.place();
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| UpstreamError::Decode(format!("bad weather base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| UpstreamError::Decode("weather base URL cannot take a path".to_string()))?
            .pop_if_empty()
            .push(&place);

        let data: Value = fetch_json(self.http.get(url).query(&[("format", "j1")])).await?;
        WeatherReport::from_j1(&data, &place)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::test_support::serve;
    use axum::extract::Path;
    use axum::{routing::get, Json, Router};
    use serde_json::json;

    fn j1(area: Option<&str>) -> Value {
        let mut data = json!({"current_condition": [{
            "temp_F": "72", "humidity": "55", "windspeedMiles": "8",
            "weatherCode": "116", "weatherDesc": [{"value": "Partly cloudy"}]
        }]});
        if let Some(area) = area {
            data["nearest_area"] = json!([{"areaName": [{"value": area}]}]);
        }
        data
    }

    #[test]
    fn test_report_from_j1() {
        let report = WeatherReport::from_j1(&j1(Some("La Jolla")), "32.8,-117.2").unwrap();
        assert_eq!(report.temp, 72);
        assert_eq!(report.condition, "Partly cloudy");
        assert_eq!(report.wind_speed, 8);
        assert_eq!(report.location, "La Jolla");

        let unnamed = WeatherReport::from_j1(&j1(None), "San Diego").unwrap();
        assert_eq!(unnamed.location, "San Diego");

        assert!(WeatherReport::from_j1(&json!({}), "x").is_err());
    }

    #[test]
    fn test_place_prefers_coordinates() {
        let coords = WeatherQuery {
            lat: Some(32.5),
            lon: Some(-117.0),
            location: Some("Denver".to_string()),
        };
        assert_eq!(coords.place(), "32.5,-117");
        assert_eq!(WeatherQuery::default().place(), DEFAULT_LOCATION);
    }

    #[tokio::test]
    async fn test_current_requests_place_path() {
        let app = Router::new().route(
            "/:place",
            get(|Path(place): Path<String>| async move { Json(j1(Some(&place))) }),
        );
        let base = serve(app).await;
        let client = WeatherClient::new(reqwest::Client::new(), base);
        let query = WeatherQuery {
            location: Some("San Francisco".to_string()),
            ..WeatherQuery::default()
        };
        let report = client.current(&query).await.unwrap();
        assert_eq!(report.location, "San Francisco");
    }
}
