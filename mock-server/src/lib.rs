//! In-process stand-in for the Autoskope backend.
//!
//! Serves the two endpoints the client uses: a form login that hands out a
//! session cookie, and the vehicle listing that requires that cookie.
//! Behavior is driven by a `Fixture` so tests can shape the listing.

use std::{collections::HashSet, sync::Arc};

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const LOGIN_PATH: &str = "/scripts/ajax/login.php";
pub const INFO_PATH: &str = "/scripts/ajax/app/info.php";
pub const SESSION_COOKIE: &str = "PHPSESSID";
pub const OUTDATED_MESSAGE: &str =
    "Du verwendest eine veraltete App-Version. Bitte aktualisiere die App.";
pub const LOGIN_FAILED_BODY: &str = "Benutzername oder Passwort falsch";

/// Accounts and data served by the mock.
#[derive(Clone, Debug)]
pub struct Fixture {
    pub username: String,
    pub password: String,
    /// Logins with an older `appversion` get a 202 with `OUTDATED_MESSAGE`.
    pub current_app_version: String,
    pub cars: Value,
    /// Served verbatim as `lastPos`; normally a JSON-encoded string.
    pub last_pos: Value,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            username: "demo".to_string(),
            password: "demo-password".to_string(),
            current_app_version: "2.40".to_string(),
            cars: sample_cars(),
            last_pos: Value::String(sample_last_pos()),
        }
    }
}

/// Three vehicles: two valid, one missing `ex_pow`.
pub fn sample_cars() -> Value {
    json!([
        {
            "id": 101,
            "name": "Transporter",
            "ex_pow": "12.6",
            "bat_pow": "4.1",
            "hdop": "0.9",
            "device_type_id": "3"
        },
        {
            "id": "102",
            "name": "Motorrad",
            "ex_pow": 13.1,
            "bat_pow": 3.8,
            "hdop": 1.4,
            "device_type_id": 7,
            "support_infos": { "imei": "356938035643809" }
        },
        {
            "id": 103,
            "name": "Defekt",
            "bat_pow": "4.0",
            "hdop": "2.0"
        }
    ])
}

/// FeatureCollection with positions for cars 101 and 102, encoded as a string.
pub fn sample_last_pos() -> String {
    json!({
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [13.4, 52.5] },
                "properties": { "carid": "101", "s": "0", "dt": "2024-01-01T00:00:00Z", "park": 1 }
            },
            {
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [11.58, 48.14] },
                "properties": { "carid": 102, "s": 42.5, "dt": "2024-01-01T00:05:00Z", "park": false }
            }
        ]
    })
    .to_string()
}

struct AppState {
    fixture: Fixture,
    sessions: RwLock<HashSet<String>>,
}

type SharedState = Arc<AppState>;

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub appversion: String,
}

#[derive(Deserialize)]
pub struct InfoForm {
    #[serde(default)]
    pub appversion: String,
}

pub fn app() -> Router {
    app_with(Fixture::default())
}

pub fn app_with(fixture: Fixture) -> Router {
    let state: SharedState = Arc::new(AppState {
        fixture,
        sessions: RwLock::new(HashSet::new()),
    });
    Router::new()
        .route(LOGIN_PATH, post(login))
        .route(INFO_PATH, post(vehicle_info))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with(listener, Fixture::default()).await
}

pub async fn run_with(listener: TcpListener, fixture: Fixture) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(fixture)).await
}

async fn login(State(state): State<SharedState>, Form(form): Form<LoginForm>) -> Response {
    let fixture = &state.fixture;
    if form.username != fixture.username || form.password != fixture.password {
        warn!(user = %form.username, "login rejected");
        // The real backend answers a bad login with 200 and a message body.
        return (StatusCode::OK, LOGIN_FAILED_BODY).into_response();
    }

    let token = Uuid::new_v4().simple().to_string();
    state.sessions.write().await.insert(token.clone());
    let cookie = format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly");
    info!(user = %form.username, "session opened");

    if is_outdated(&form.appversion, &fixture.current_app_version) {
        debug!(appversion = %form.appversion, "outdated client version");
        return (
            StatusCode::ACCEPTED,
            [(header::SET_COOKIE, cookie)],
            Json(json!({ "message": OUTDATED_MESSAGE })),
        )
            .into_response();
    }

    (StatusCode::OK, [(header::SET_COOKIE, cookie)], String::new()).into_response()
}

async fn vehicle_info(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Form(form): Form<InfoForm>,
) -> Response {
    let authorized = match session_token(&headers) {
        Some(token) => state.sessions.read().await.contains(&token),
        None => false,
    };
    if !authorized {
        return StatusCode::FORBIDDEN.into_response();
    }

    debug!(appversion = %form.appversion, "vehicle info requested");
    Json(json!({
        "cars": state.fixture.cars,
        "lastPos": state.fixture.last_pos,
    }))
    .into_response()
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token.to_string())
}

/// Dotted numeric comparison; a missing or unparsable version is outdated.
fn is_outdated(version: &str, current: &str) -> bool {
    fn parts(v: &str) -> Option<Vec<u32>> {
        v.split('.').map(|p| p.trim().parse().ok()).collect()
    }
    match (parts(version), parts(current)) {
        (Some(version), Some(current)) => version < current,
        _ => true,
    }
}
