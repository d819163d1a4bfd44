//! Headless dashboard client
//!
//! The data-synchronization half of the dashboard, without any rendering:
//!
//! ```text
//!   ┌────────────┐   DashboardApi    ┌──────────────┐
//!   │ Dashboard  │ ────────────────► │ HTTP server  │
//!   │            │                   └──────────────┘
//!   │  Session   │ preferences, optimistic writes
//!   │  DataCache │ weather / sports / concerts with TTLs
//!   │  Schedule  │ live / idle / calendar cadence
//!   └────────────┘
//!         │ fallback
//!         ▼
//!   LocalStore (local storage) + SessionStorage (reload marker)
//! ```

pub mod api;
pub mod cache;
pub mod calendar;
pub mod concerts;
pub mod local;
pub mod motivation;
pub mod scheduler;
pub mod session;
pub mod sports;

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tokio::sync::oneshot;

use crate::config::ClientConfig;
use crate::prefs::{CalendarPreferences, Note, WidgetId};
use crate::upstream::calendar::CalendarEvents;
use crate::upstream::concerts::{retain_upcoming, ConcertEvent};
use crate::upstream::weather::{WeatherQuery, WeatherReport};

use api::{ClientError, DashboardApi, HttpDashboardApi};
use calendar::OAuthRedirect;
use cache::{CacheCategory, DataCache};
use local::{LocalStore, SessionStorage};
use scheduler::{Schedule, Task};
use session::Session;
use sports::SportsBoard;

const LOCAL_STORAGE_FILE: &str = "local-storage.json";
const SESSION_STORAGE_FILE: &str = "session-storage.json";

#[derive(Debug, Clone, Serialize)]
pub struct WidgetError {
    pub widget: WidgetId,
    pub message: String,
}

/// Everything a render pass would need, as plain data
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub dashboard_name: String,
    pub dark_mode: bool,
    /// Visible main-column widgets in display order
    pub main: Vec<WidgetId>,
    /// Visible left-panel widgets in display order
    pub left: Vec<WidgetId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sports: Option<SportsBoard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concerts: Option<Vec<ConcertEvent>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar: Option<CalendarEvents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motivation: Option<String>,
    pub notes: Vec<Note>,
    pub unread_messages: usize,
    pub errors: Vec<WidgetError>,
}

/// Outcome of the last calendar fetch, served until the calendar interval passes
struct CalendarFetch {
    fetched_at: DateTime<Utc>,
    outcome: Result<CalendarEvents, String>,
}

pub struct Dashboard {
    api: Arc<dyn DashboardApi>,
    session: Session,
    cache: DataCache,
    concert_fan_out: usize,
    last_calendar: Option<CalendarFetch>,
}

impl Dashboard {
    /// Boot: reload check, cache load, then the preference load
    pub async fn boot(
        api: Arc<dyn DashboardApi>,
        local: Arc<LocalStore>,
        session_storage: &SessionStorage,
        concert_fan_out: usize,
        now: DateTime<Utc>,
    ) -> Self {
        let cache = DataCache::boot(Arc::clone(&local), session_storage, now);
        let session = Session::load(Arc::clone(&api), local).await;
        Self {
            api,
            session,
            cache,
            concert_fan_out,
            last_calendar: None,
        }
    }

    /// Boot against the configured server with storage under `state_dir`
    pub async fn open(
        config: &ClientConfig,
        session_storage: &SessionStorage,
        now: DateTime<Utc>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        let api: Arc<dyn DashboardApi> = Arc::new(HttpDashboardApi::new(http, &config.server_url));
        let local = Arc::new(LocalStore::open(config.state_dir.join(LOCAL_STORAGE_FILE)));
        Ok(Self::boot(api, local, session_storage, config.concert_fan_out, now).await)
    }

    pub fn session_storage(config: &ClientConfig) -> SessionStorage {
        SessionStorage::new(LocalStore::open(config.state_dir.join(SESSION_STORAGE_FILE)))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn cache(&self) -> &DataCache {
        &self.cache
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Widgets
    // ─────────────────────────────────────────────────────────────────────────

    fn weather_query(&self) -> WeatherQuery {
        let location = self.session.read(|s| s.concerts.location.clone());
        WeatherQuery {
            lat: location.lat,
            lon: location.lon,
            location: location.city,
        }
    }

    pub async fn weather(&mut self, now: DateTime<Utc>, force: bool) -> Result<WeatherReport, ClientError> {
        if !force {
            if let Some(report) = self.cache.get(CacheCategory::Weather, now) {
                return Ok(report);
            }
        }
        let report = self.api.weather(&self.weather_query()).await?;
        self.cache.put(CacheCategory::Weather, &report, now);
        Ok(report)
    }

    pub async fn sports(&mut self, now: DateTime<Utc>, force: bool) -> Result<SportsBoard, ClientError> {
        let prefs = self.session.read(|s| s.team.clone());
        if !force {
            if let Some(board) = self.cache.get::<SportsBoard>(CacheCategory::Sports, now) {
                // A cached board for a different selection is useless
                let cached: Vec<_> = board.teams.iter().map(|c| &c.key).collect();
                let matches = cached.len() == prefs.selected_teams.len()
                    && cached.iter().all(|k| prefs.selected_teams.contains(k));
                if matches {
                    return Ok(board);
                }
            }
        }
        let board = sports::build_board(self.api.as_ref(), &prefs, now).await?;
        self.cache.put(CacheCategory::Sports, &board, now);
        Ok(board)
    }

    pub async fn concerts(&mut self, now: DateTime<Utc>, force: bool) -> Result<Vec<ConcertEvent>, ClientError> {
        if !force {
            if let Some(mut events) = self.cache.get::<Vec<ConcertEvent>>(CacheCategory::Concerts, now) {
                retain_upcoming(&mut events, now);
                if !events.is_empty() {
                    return Ok(events);
                }
            }
        }
        let prefs = self.session.read(|s| s.concerts.clone());
        let feed = concerts::fetch_feed(self.api.as_ref(), &prefs, self.concert_fan_out, now).await?;
        self.cache.put(CacheCategory::Concerts, &feed, now);
        Ok(feed)
    }

    /// Fetch calendar events and keep the outcome for later snapshots
    pub async fn calendar(&mut self, now: DateTime<Utc>) -> Result<CalendarEvents, ClientError> {
        let result = calendar::fetch_events(self.api.as_ref(), &self.session, now).await;
        self.last_calendar = Some(CalendarFetch {
            fetched_at: now,
            outcome: result.as_ref().map(Clone::clone).map_err(|e| e.to_string()),
        });
        result
    }

    fn calendar_is_stale(&self, now: DateTime<Utc>) -> bool {
        self.last_calendar
            .as_ref()
            .map_or(true, |last| now - last.fetched_at >= Task::Calendar.interval(false))
    }

    /// Store the tokens an OAuth redirect carried
    pub async fn connect_calendar(
        &mut self,
        redirect: &str,
        now: DateTime<Utc>,
    ) -> Result<CalendarPreferences, ClientError> {
        let redirect = OAuthRedirect::parse(redirect).ok_or_else(|| {
            ClientError::Decode("redirect carries neither tokens nor an OAuth error".to_string())
        })?;
        let connected = calendar::connect(self.api.as_ref(), &self.session, redirect, now).await?;
        self.last_calendar = None;
        Ok(connected)
    }

    /// Fetch every visible widget (cache first) into one snapshot. Calendar
    /// events are reused until the calendar interval has passed.
    pub async fn snapshot(&mut self, now: DateTime<Utc>) -> DashboardSnapshot {
        let prefs = self.session.snapshot();
        let appearance = &prefs.appearance;
        let visible = |w: &WidgetId| appearance.is_visible(*w);

        let mut snapshot = DashboardSnapshot {
            dashboard_name: appearance.dashboard_name.clone(),
            dark_mode: appearance.dark_mode,
            main: appearance.main_order().into_iter().filter(visible).collect(),
            left: appearance.left_order().into_iter().filter(visible).collect(),
            weather: None,
            sports: None,
            concerts: None,
            calendar: None,
            motivation: None,
            notes: if appearance.show_notes { prefs.notes.clone() } else { Vec::new() },
            unread_messages: prefs.unread_messages(),
            errors: Vec::new(),
        };

        let mut record = |widget: WidgetId, message: String| {
            tracing::warn!(widget = widget.as_str(), error = %message, "Widget data unavailable");
            snapshot.errors.push(WidgetError { widget, message });
        };

        let mut weather = None;
        let mut sports = None;
        let mut concerts = None;
        let mut calendar = None;

        if appearance.show_weather {
            match self.weather(now, false).await {
                Ok(report) => weather = Some(report),
                Err(e) => record(WidgetId::Weather, e.to_string()),
            }
        }
        if appearance.show_sports {
            match self.sports(now, false).await {
                Ok(board) => sports = Some(board),
                Err(e) => record(WidgetId::Sports, e.to_string()),
            }
        }
        if appearance.show_concerts {
            match self.concerts(now, false).await {
                Ok(feed) => concerts = Some(feed),
                Err(e) => record(WidgetId::Concerts, e.to_string()),
            }
        }
        if appearance.show_calendar {
            if self.calendar_is_stale(now) {
                // Outcome lands in `last_calendar`
                let _ = self.calendar(now).await;
            }
            match self.last_calendar.as_ref().map(|last| &last.outcome) {
                Some(Ok(events)) => calendar = Some(events.clone()),
                Some(Err(message)) => record(WidgetId::Calendar, message.clone()),
                None => {}
            }
        }

        snapshot.weather = weather;
        snapshot.sports = sports;
        snapshot.concerts = concerts;
        snapshot.calendar = calendar;
        if appearance.show_motivation {
            let today = now.with_timezone(&Local).date_naive();
            snapshot.motivation = Some(self.session.daily_motivation(today).await);
        }
        // Tokens may have been refreshed or cleared during the calendar fetch
        snapshot.unread_messages = self.session.unread_messages();
        snapshot
    }

    /// Run one scheduled task. Returns whether a sports team is live.
    async fn run_task(&mut self, task: Task, now: DateTime<Utc>, sports_live: bool) -> bool {
        let result = match task {
            Task::Weather => self.weather(now, true).await.map(|_| ()),
            Task::Sports => match self.sports(now, true).await {
                Ok(board) => return board.has_live(),
                Err(e) => Err(e),
            },
            Task::Concerts => self.concerts(now, true).await.map(|_| ()),
            Task::Calendar => self.calendar(now).await.map(|_| ()),
        };
        if let Err(e) = result {
            tracing::warn!(task = ?task, error = %e, "Scheduled refresh failed");
        }
        sports_live
    }

    /// Refresh on the dashboard cadence until `shutdown` fires, handing a
    /// snapshot to `on_update` after every round that did work
    pub async fn watch<F>(&mut self, mut shutdown: oneshot::Receiver<()>, mut on_update: F)
    where
        F: FnMut(&DashboardSnapshot),
    {
        let mut schedule = Schedule::new(Utc::now());
        let mut sports_live = false;

        loop {
            let now = Utc::now();
            let due = schedule.due(now);
            for task in &due {
                sports_live = self.run_task(*task, now, sports_live).await;
                schedule.completed(*task, now, sports_live);
            }
            if !due.is_empty() {
                let snapshot = self.snapshot(Utc::now()).await;
                on_update(&snapshot);
            }

            let wait = schedule
                .next_wake()
                .map(|at| (at - Utc::now()).to_std().unwrap_or_default())
                .unwrap_or(std::time::Duration::from_secs(1));

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = &mut shutdown => {
                    tracing::info!("Watch loop stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::session::test_support::FakeApi;
    use super::*;
    use crate::upstream::espn::{AllTeams, Team};
    use serde_json::json;
    use std::sync::Mutex;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-10-18T18:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn weather() -> WeatherReport {
        WeatherReport {
            temp: 72,
            condition: "Sunny".to_string(),
            humidity: 40,
            wind_speed: 5,
            icon: "113".to_string(),
            location: "San Diego".to_string(),
        }
    }

    fn api() -> Arc<FakeApi> {
        Arc::new(FakeApi {
            document: Mutex::new(Ok(json!({
                "teamPreferences": {"selectedTeams": ["25-baseball-mlb"], "favoriteTeams": []},
                "appearancePreferences": {"showConcerts": false, "widgetOrder": ["sports", "weather"]},
                "messages": [{"id": "1", "name": "Sam", "message": "hi", "created_at": "x"}],
            }))),
            weather: Ok(weather()),
            all_teams: Ok(AllTeams::from_teams(vec![Team {
                id: "25".to_string(),
                name: "San Diego Padres".to_string(),
                sport: Some("baseball".to_string()),
                league: Some("mlb".to_string()),
                ..Team::default()
            }])),
            ..FakeApi::default()
        })
    }

    #[tokio::test]
    async fn test_snapshot_respects_layout_and_visibility() {
        let api = api();
        let local = Arc::new(LocalStore::memory());
        let session = SessionStorage::memory();
        let mut dashboard = Dashboard::boot(api.clone(), local, &session, 2, now()).await;

        let snapshot = dashboard.snapshot(now()).await;
        assert_eq!(
            snapshot.main,
            [WidgetId::Sports, WidgetId::Weather, WidgetId::Motivation]
        );
        assert_eq!(snapshot.left, [WidgetId::Calendar, WidgetId::Notes]);
        assert!(snapshot.concerts.is_none());
        assert_eq!(snapshot.weather.unwrap().temp, 72);
        assert_eq!(snapshot.sports.unwrap().teams.len(), 1);
        assert_eq!(snapshot.unread_messages, 1);
        assert!(snapshot.motivation.is_some());
        assert!(snapshot.errors.is_empty());
        assert!(!api.calls().iter().any(|c| c.starts_with("concerts")));
    }

    #[tokio::test]
    async fn test_second_snapshot_served_from_cache() {
        let api = api();
        let local = Arc::new(LocalStore::memory());
        let session = SessionStorage::memory();
        let mut dashboard = Dashboard::boot(api.clone(), local, &session, 2, now()).await;

        dashboard.snapshot(now()).await;
        dashboard.snapshot(now() + chrono::Duration::minutes(5)).await;
        let weather_calls = api.calls().iter().filter(|c| *c == "weather").count();
        let board_calls = api.calls().iter().filter(|c| *c == "all-teams").count();
        assert_eq!(weather_calls, 1);
        assert_eq!(board_calls, 1);
    }

    #[tokio::test]
    async fn test_reload_refetches_but_keeps_preferences() {
        let api = api();
        let local = Arc::new(LocalStore::memory());
        let session = SessionStorage::memory();

        let mut first = Dashboard::boot(api.clone(), Arc::clone(&local), &session, 2, now()).await;
        first.snapshot(now()).await;
        let team_before = first.session().snapshot().team;

        let mut reloaded = Dashboard::boot(api.clone(), Arc::clone(&local), &session, 2, now()).await;
        assert!(!reloaded.cache().is_fresh(CacheCategory::Weather, now()));
        assert!(!reloaded.cache().is_fresh(CacheCategory::Sports, now()));
        assert_eq!(reloaded.session().snapshot().team, team_before);

        reloaded.snapshot(now()).await;
        let weather_calls = api.calls().iter().filter(|c| *c == "weather").count();
        assert_eq!(weather_calls, 2);
    }

    fn connected_calendar() -> serde_json::Value {
        json!({"calendarPreferences": {
            "calendarIds": ["primary"],
            "accessToken": "at-1",
            "refreshToken": "rt-1",
            "tokenExpiry": (now() + chrono::Duration::hours(2)).timestamp_millis(),
        }})
    }

    fn calendar_api() -> Arc<FakeApi> {
        Arc::new(FakeApi {
            document: Mutex::new(Ok(connected_calendar())),
            weather: Ok(weather()),
            ..FakeApi::default()
        })
    }

    fn calendar_fetches(api: &FakeApi) -> usize {
        api.calls().iter().filter(|c| c.starts_with("calendar:")).count()
    }

    #[tokio::test]
    async fn test_calendar_fetched_once_per_interval() {
        let api = calendar_api();
        let session = SessionStorage::memory();
        let mut dashboard =
            Dashboard::boot(api.clone(), Arc::new(LocalStore::memory()), &session, 2, now()).await;

        let first = dashboard.snapshot(now()).await;
        let second = dashboard.snapshot(now() + chrono::Duration::seconds(15)).await;
        assert_eq!(calendar_fetches(&api), 1);
        assert_eq!(first.calendar, second.calendar);
        assert!(second.calendar.is_some());

        dashboard.snapshot(now() + chrono::Duration::minutes(5)).await;
        assert_eq!(calendar_fetches(&api), 2);
    }

    #[tokio::test]
    async fn test_scheduled_calendar_run_feeds_the_snapshot() {
        let api = calendar_api();
        let session = SessionStorage::memory();
        let mut dashboard =
            Dashboard::boot(api.clone(), Arc::new(LocalStore::memory()), &session, 2, now()).await;

        dashboard.run_task(Task::Calendar, now(), false).await;
        dashboard.snapshot(now() + chrono::Duration::seconds(1)).await;
        assert_eq!(calendar_fetches(&api), 1);
    }

    #[tokio::test]
    async fn test_failed_calendar_fetch_is_reported_until_next_interval() {
        let api = Arc::new(FakeApi {
            document: Mutex::new(Ok(connected_calendar())),
            calendar_replies: Mutex::new(vec![Err((500, "Internal server error"))]),
            ..FakeApi::default()
        });
        let session = SessionStorage::memory();
        let mut dashboard =
            Dashboard::boot(api.clone(), Arc::new(LocalStore::memory()), &session, 2, now()).await;

        let first = dashboard.snapshot(now()).await;
        let second = dashboard.snapshot(now() + chrono::Duration::minutes(2)).await;
        assert_eq!(calendar_fetches(&api), 1);
        for snapshot in [first, second] {
            assert!(snapshot.calendar.is_none());
            assert!(snapshot
                .errors
                .iter()
                .any(|e| e.widget == WidgetId::Calendar && e.message.contains("Internal server error")));
        }
    }

    #[tokio::test]
    async fn test_connect_from_redirect_url() {
        let api = Arc::new(FakeApi::default());
        let session = SessionStorage::memory();
        let mut dashboard =
            Dashboard::boot(api.clone(), Arc::new(LocalStore::memory()), &session, 2, now()).await;

        let calendar = dashboard
            .connect_calendar(
                "http://localhost:3000/dashboard?oauth_success=true&access_token=at-9&expires_in=60",
                now(),
            )
            .await
            .unwrap();
        assert_eq!(calendar.access_token.as_deref(), Some("at-9"));
        assert_eq!(calendar.token_expiry, Some(now().timestamp_millis() + 60_000));
        assert_eq!(dashboard.session().calendar(), calendar);
        let (section, _) = api.saves().pop().unwrap();
        assert_eq!(section, "calendarPreferences");

        let err = dashboard
            .connect_calendar("http://localhost:3000/dashboard", now())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[tokio::test]
    async fn test_widget_failure_is_reported_not_fatal() {
        let api = Arc::new(FakeApi {
            weather: Err((500, "Failed to fetch weather")),
            ..FakeApi::default()
        });
        let session = SessionStorage::memory();
        let mut dashboard =
            Dashboard::boot(api, Arc::new(LocalStore::memory()), &session, 2, now()).await;

        let snapshot = dashboard.snapshot(now()).await;
        assert!(snapshot.weather.is_none());
        assert_eq!(snapshot.errors[0].widget, WidgetId::Weather);
        assert!(snapshot.errors[0].message.contains("Failed to fetch weather"));
    }
}
