//! Calendar fetch with the Google token lifecycle
//!
//! ```text
//!   disconnected ──connect──► connected ──expiry──► expired
//!        ▲                        ▲                    │ refresh
//!        │ 400/401                └───── ok ───────────┤
//!        └─────────────────────────────────────────────┘
//! ```
//!
//! Connecting reads the dashboard URL the OAuth callback redirected to.
//! A fetch refreshes at most once, either up front because the recorded
//! expiry has passed or after the server reports a 401 for a calendar.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use url::Url;

use super::api::{ClientError, DashboardApi};
use super::session::Session;
use crate::prefs::{CalendarPreferences, Section, ACCESS_TOKEN_LIFETIME_SECS};
use crate::upstream::calendar::CalendarEvents;

pub const SESSION_EXPIRED: &str =
    "Session expired. Please reconnect your Google account in Settings → Calendar.";

/// What the OAuth callback put on the dashboard URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuthRedirect {
    Connected {
        access_token: String,
        refresh_token: Option<String>,
        expires_in: i64,
    },
    Failed(String),
}

impl OAuthRedirect {
    /// Accepts the whole redirect URL or just its query string. `None` when
    /// neither an error code nor a successful grant is present.
    pub fn parse(redirect: &str) -> Option<Self> {
        let redirect = redirect.trim();
        let query = match Url::parse(redirect) {
            Ok(url) => url.query().unwrap_or_default().to_string(),
            Err(_) => redirect.trim_start_matches('?').to_string(),
        };
        let params: HashMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();

        if let Some(code) = params.get("oauth_error") {
            return Some(Self::Failed(code.clone()));
        }
        params.get("oauth_success")?;
        let access_token = params.get("access_token").filter(|t| !t.is_empty())?;
        Some(Self::Connected {
            access_token: access_token.clone(),
            refresh_token: params.get("refresh_token").filter(|t| !t.is_empty()).cloned(),
            expires_in: params
                .get("expires_in")
                .and_then(|v| v.parse().ok())
                .unwrap_or(ACCESS_TOKEN_LIFETIME_SECS),
        })
    }
}

/// Persist the tokens from an OAuth redirect. The account's calendars are
/// listed with the new token and become the selection; a failed listing
/// keeps the current selection and the tokens are saved anyway.
pub async fn connect(
    api: &dyn DashboardApi,
    session: &Session,
    redirect: OAuthRedirect,
    now: DateTime<Utc>,
) -> Result<CalendarPreferences, ClientError> {
    let (access_token, refresh_token, expires_in) = match redirect {
        OAuthRedirect::Connected {
            access_token,
            refresh_token,
            expires_in,
        } => (access_token, refresh_token, expires_in),
        OAuthRedirect::Failed(code) => {
            tracing::warn!(code = %code, "Google account connection failed");
            return Err(ClientError::OAuth(code));
        }
    };

    let calendar_ids = match api.calendar_list(&access_token).await {
        Ok(list) => list.calendars.into_iter().map(|c| c.id).collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Could not list calendars, keeping current selection");
            Vec::new()
        }
    };

    let calendar = session
        .connect_calendar(access_token, refresh_token, expires_in, calendar_ids, now)
        .await;
    tracing::info!(calendars = calendar.calendar_ids.len(), "Google account connected");
    Ok(calendar)
}

/// Upcoming events for the configured calendars
pub async fn fetch_events(
    api: &dyn DashboardApi,
    session: &Session,
    now: DateTime<Utc>,
) -> Result<CalendarEvents, ClientError> {
    let prefs = session.calendar();
    if prefs.calendar_ids.is_empty() {
        return Ok(CalendarEvents::default());
    }

    let mut token = prefs.access_token.clone();
    let mut refreshed = false;
    if prefs.is_expired(now) {
        tracing::debug!("Calendar token expired, refreshing");
        token = Some(refresh(api, session, now).await?);
        refreshed = true;
    }

    let result = api.calendar_events(&prefs.calendar_ids, token.as_deref()).await;
    let unauthorized = match &result {
        Ok(events) => events.unauthorized(),
        Err(e) => e.status() == Some(401),
    };

    if unauthorized && token.is_some() && !refreshed {
        tracing::info!("Calendar rejected the access token, refreshing once");
        let token = refresh(api, session, now).await?;
        return api.calendar_events(&prefs.calendar_ids, Some(&token)).await;
    }
    result
}

/// Trade the stored refresh token for a new access token and persist it
async fn refresh(
    api: &dyn DashboardApi,
    session: &Session,
    now: DateTime<Utc>,
) -> Result<String, ClientError> {
    let Some(refresh_token) = session.calendar().refresh_token else {
        tracing::warn!("No refresh token stored, Google account must be reconnected");
        expire(session).await;
        return Err(ClientError::SessionExpired(SESSION_EXPIRED));
    };

    match api.refresh_token(&refresh_token).await {
        Ok(granted) => {
            let access_token = granted.access_token;
            // Expiry is always one hour from now regardless of what Google reports
            session
                .update(Section::CalendarPreferences, |s| {
                    s.calendar.apply_refresh(access_token.clone(), now)
                })
                .await;
            Ok(access_token)
        }
        Err(e) if matches!(e.status(), Some(400 | 401)) => {
            tracing::warn!(error = %e, "Refresh token rejected");
            expire(session).await;
            Err(ClientError::SessionExpired(SESSION_EXPIRED))
        }
        Err(e) => Err(e),
    }
}

async fn expire(session: &Session) {
    session
        .update(Section::CalendarPreferences, |s| s.calendar.disconnect())
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::local::LocalStore;
    use crate::client::session::test_support::FakeApi;
    use crate::upstream::calendar::{CalendarEvent, CalendarFailure, CalendarList, CalendarSummary};
    use crate::upstream::oauth::RefreshedToken;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-10-18T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn calendar_doc(expiry: i64) -> serde_json::Value {
        json!({"calendarPreferences": {
            "calendarIds": ["primary"],
            "accessToken": "at-1",
            "refreshToken": "rt-1",
            "tokenExpiry": expiry,
        }})
    }

    fn one_event() -> CalendarEvents {
        CalendarEvents {
            events: vec![CalendarEvent {
                id: "primary-1".to_string(),
                title: "Dentist".to_string(),
                start: "2026-10-19T09:00:00Z".to_string(),
                end: "2026-10-19T10:00:00Z".to_string(),
                location: String::new(),
                description: String::new(),
                is_all_day: false,
                calendar_id: "primary".to_string(),
            }],
            errors: None,
        }
    }

    fn unauthorized() -> CalendarEvents {
        CalendarEvents {
            events: Vec::new(),
            errors: Some(vec![CalendarFailure {
                calendar_id: "primary".to_string(),
                error: "Invalid Credentials".to_string(),
                status: Some(401),
            }]),
        }
    }

    async fn session_for(api: &Arc<FakeApi>) -> Session {
        Session::load(api.clone(), Arc::new(LocalStore::memory())).await
    }

    fn fetch_calls(api: &FakeApi) -> Vec<String> {
        api.calls()
            .into_iter()
            .filter(|c| c.starts_with("refresh:") || c.starts_with("calendar:"))
            .collect()
    }

    #[tokio::test]
    async fn test_expired_token_refreshes_once_before_fetch() {
        let api = Arc::new(FakeApi {
            document: Mutex::new(Ok(calendar_doc(now().timestamp_millis() - 1))),
            refresh_reply: Ok(RefreshedToken {
                access_token: "at-2".to_string(),
                expires_in: 60,
            }),
            calendar_replies: Mutex::new(vec![Ok(one_event())]),
            ..FakeApi::default()
        });
        let session = session_for(&api).await;

        let events = fetch_events(api.as_ref(), &session, now()).await.unwrap();
        assert_eq!(events.events.len(), 1);
        assert_eq!(fetch_calls(&api), ["refresh:rt-1", "calendar:at-2"]);

        let calendar = session.calendar();
        assert_eq!(calendar.access_token.as_deref(), Some("at-2"));
        assert_eq!(calendar.refresh_token.as_deref(), Some("rt-1"));
        assert_eq!(calendar.token_expiry, Some(now().timestamp_millis() + 3_600_000));
    }

    #[tokio::test]
    async fn test_rejected_refresh_clears_tokens() {
        let api = Arc::new(FakeApi {
            document: Mutex::new(Ok(calendar_doc(0))),
            refresh_reply: Err((401, "Failed to refresh token")),
            ..FakeApi::default()
        });
        let session = session_for(&api).await;

        let err = fetch_events(api.as_ref(), &session, now()).await.unwrap_err();
        assert_eq!(err.to_string(), SESSION_EXPIRED);
        assert_eq!(fetch_calls(&api), ["refresh:rt-1"]);

        let calendar = session.calendar();
        assert!(calendar.access_token.is_none());
        assert!(calendar.refresh_token.is_none());
        assert!(calendar.token_expiry.is_none());
        assert_eq!(calendar.calendar_ids, ["primary"]);
        let (section, saved) = api.saves().pop().unwrap();
        assert_eq!(section, "calendarPreferences");
        assert_eq!(saved, json!({"calendarIds": ["primary"]}));
    }

    #[tokio::test]
    async fn test_unauthorized_fetch_refreshes_and_retries_once() {
        let api = Arc::new(FakeApi {
            document: Mutex::new(Ok(calendar_doc(now().timestamp_millis() + 60_000))),
            refresh_reply: Ok(RefreshedToken {
                access_token: "at-2".to_string(),
                expires_in: 3600,
            }),
            calendar_replies: Mutex::new(vec![Ok(unauthorized()), Ok(unauthorized())]),
            ..FakeApi::default()
        });
        let session = session_for(&api).await;

        let events = fetch_events(api.as_ref(), &session, now()).await.unwrap();
        assert!(events.unauthorized());
        assert_eq!(
            fetch_calls(&api),
            ["calendar:at-1", "refresh:rt-1", "calendar:at-2"]
        );
    }

    #[tokio::test]
    async fn test_no_refresh_after_upfront_refresh() {
        let api = Arc::new(FakeApi {
            document: Mutex::new(Ok(calendar_doc(0))),
            refresh_reply: Ok(RefreshedToken {
                access_token: "at-2".to_string(),
                expires_in: 3600,
            }),
            calendar_replies: Mutex::new(vec![Err((401, "Unauthorized"))]),
            ..FakeApi::default()
        });
        let session = session_for(&api).await;

        let err = fetch_events(api.as_ref(), &session, now()).await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(fetch_calls(&api), ["refresh:rt-1", "calendar:at-2"]);
    }

    #[test]
    fn test_redirect_parsing() {
        let ok = OAuthRedirect::parse(
            "http://localhost:3000/dashboard?oauth_success=true&access_token=at-1&refresh_token=rt-1&expires_in=3599",
        );
        assert_eq!(
            ok,
            Some(OAuthRedirect::Connected {
                access_token: "at-1".to_string(),
                refresh_token: Some("rt-1".to_string()),
                expires_in: 3599,
            })
        );

        let bare = OAuthRedirect::parse("?oauth_success=true&access_token=at-1");
        assert_eq!(
            bare,
            Some(OAuthRedirect::Connected {
                access_token: "at-1".to_string(),
                refresh_token: None,
                expires_in: 3600,
            })
        );

        assert_eq!(
            OAuthRedirect::parse("http://localhost:3000/dashboard?oauth_error=access+denied"),
            Some(OAuthRedirect::Failed("access denied".to_string()))
        );
        assert_eq!(OAuthRedirect::parse("http://localhost:3000/dashboard"), None);
        assert_eq!(OAuthRedirect::parse("oauth_success=true&access_token="), None);
    }

    #[tokio::test]
    async fn test_connect_persists_tokens_and_calendars() {
        let api = Arc::new(FakeApi {
            document: Mutex::new(Ok(json!({"calendarPreferences": {"calendarIds": ["old"]}}))),
            calendar_list: Ok(CalendarList {
                calendars: vec![
                    CalendarSummary {
                        id: "primary".to_string(),
                        summary: "Home".to_string(),
                        primary: true,
                        access_role: "owner".to_string(),
                    },
                    CalendarSummary {
                        id: "family".to_string(),
                        summary: "Family".to_string(),
                        primary: false,
                        access_role: "reader".to_string(),
                    },
                ],
            }),
            ..FakeApi::default()
        });
        let session = session_for(&api).await;
        let redirect = OAuthRedirect::Connected {
            access_token: "at-1".to_string(),
            refresh_token: Some("rt-1".to_string()),
            expires_in: 3599,
        };

        let calendar = connect(api.as_ref(), &session, redirect, now()).await.unwrap();
        assert!(api.calls().contains(&"calendar-list:at-1".to_string()));
        assert_eq!(calendar, session.calendar());

        let (section, saved) = api.saves().pop().unwrap();
        assert_eq!(section, "calendarPreferences");
        assert_eq!(
            saved,
            json!({
                "calendarIds": ["primary", "family"],
                "accessToken": "at-1",
                "refreshToken": "rt-1",
                "tokenExpiry": now().timestamp_millis() + 3_599_000,
            })
        );
    }

    #[tokio::test]
    async fn test_connect_keeps_selection_and_refresh_token_on_partial_data() {
        let api = Arc::new(FakeApi {
            document: Mutex::new(Ok(json!({"calendarPreferences": {
                "calendarIds": ["primary"],
                "refreshToken": "rt-old",
            }}))),
            calendar_list: Err((500, "Failed to fetch calendar list")),
            ..FakeApi::default()
        });
        let session = session_for(&api).await;
        let redirect = OAuthRedirect::Connected {
            access_token: "at-2".to_string(),
            refresh_token: None,
            expires_in: 3600,
        };

        let calendar = connect(api.as_ref(), &session, redirect, now()).await.unwrap();
        assert_eq!(calendar.calendar_ids, ["primary"]);
        assert_eq!(calendar.access_token.as_deref(), Some("at-2"));
        assert_eq!(calendar.refresh_token.as_deref(), Some("rt-old"));
    }

    #[tokio::test]
    async fn test_failed_redirect_changes_nothing() {
        let api = Arc::new(FakeApi::default());
        let session = session_for(&api).await;

        let err = connect(
            api.as_ref(),
            &session,
            OAuthRedirect::Failed("invalid_state".to_string()),
            now(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "OAuth error: invalid_state");
        assert!(api.saves().is_empty());
    }

    #[tokio::test]
    async fn test_no_calendars_means_no_calls() {
        let api = Arc::new(FakeApi::default());
        let session = session_for(&api).await;
        let events = fetch_events(api.as_ref(), &session, now()).await.unwrap();
        assert!(events.events.is_empty());
        assert!(fetch_calls(&api).is_empty());
    }
}
