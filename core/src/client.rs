//! Stateless request builder and response interpreter for the Autoskope API.
//!
//! # Design
//! `AutoskopeClient` holds only the host and carries no session state. Each
//! endpoint is split into a `build_*` method that produces an `HttpRequest`
//! and an `interpret`/`parse_*` step that consumes the `HttpResponse`, so the
//! vendor's status-code conventions can be exercised without a network.

use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::constants::{
    APP_VERSION, FORM_CONTENT_TYPE, INFO_PATH, LOGIN_PATH, OUTDATED_VERSION_MARKER, USER_AGENT,
};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::parser;
use crate::types::Vehicle;

/// Leading bytes of a body worth putting in a debug log line.
const LOG_BODY_LIMIT: usize = 200;

#[derive(Debug, Clone)]
pub struct AutoskopeClient {
    host: String,
}

impl AutoskopeClient {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Generic form request against `path`, with the fixed client headers.
    pub fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        form: &[(&str, &str)],
    ) -> HttpRequest {
        HttpRequest {
            method,
            url: format!("{}{path}", self.host),
            path: path.to_string(),
            headers: vec![
                ("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string()),
                ("User-Agent".to_string(), USER_AGENT.to_string()),
            ],
            form: form
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn build_login(&self, username: &str, password: &str) -> HttpRequest {
        self.build_request(
            HttpMethod::Post,
            LOGIN_PATH,
            &[
                ("username", username),
                ("password", password),
                ("appversion", APP_VERSION),
            ],
        )
    }

    pub fn build_vehicle_info(&self) -> HttpRequest {
        self.build_request(HttpMethod::Post, INFO_PATH, &[("appversion", APP_VERSION)])
    }

    /// Apply the vendor status policy to a response from `path`.
    ///
    /// Returns `Ok(None)` for responses whose body is not decoded (any 202,
    /// and a successful login), and `Ok(Some(object))` otherwise.
    pub fn interpret(&self, path: &str, response: &HttpResponse) -> Result<Option<Map<String, Value>>, ApiError> {
        debug!(path, status = response.status, "response received");

        if response.status == 202 {
            debug!(body = snippet(&response.body), "status 202 response body");
            log_outdated_version(&response.body);
            return Ok(None);
        }

        if path == LOGIN_PATH {
            debug!(
                status = response.status,
                body = snippet(&response.body),
                "login response body"
            );
            if response.status == 200 && response.body.trim().is_empty() {
                return Ok(None);
            }
            return Err(ApiError::InvalidAuth(
                "authentication failed (non-200 status or non-empty body)".to_string(),
            ));
        }

        match response.status {
            401 | 403 => {
                return Err(ApiError::InvalidAuth(format!(
                    "authorization error: {}",
                    response.status
                )))
            }
            status if status >= 400 => {
                return Err(ApiError::CannotConnect(format!(
                    "API request failed with status {status}"
                )))
            }
            _ => {}
        }

        match serde_json::from_str::<Value>(&response.body) {
            Ok(Value::Object(map)) => Ok(Some(map)),
            Ok(_) => {
                warn!("API response is not a JSON object");
                Err(ApiError::CannotConnect(
                    "received non-dictionary JSON response from API".to_string(),
                ))
            }
            Err(e) => {
                error!(error = %e, "failed to decode API response");
                Err(ApiError::CannotConnect(
                    "received invalid response from API".to_string(),
                ))
            }
        }
    }

    pub fn parse_login(&self, response: &HttpResponse) -> Result<(), ApiError> {
        self.interpret(LOGIN_PATH, response).map(|_| ())
    }

    pub fn parse_vehicle_info(&self, response: &HttpResponse) -> Result<Vec<Vehicle>, ApiError> {
        let data = self.interpret(INFO_PATH, response)?.unwrap_or_default();
        parser::parse_vehicles(&data)
    }
}

/// The backend answers an outdated `appversion` with 202 and a message; the
/// login still counts as accepted.
fn log_outdated_version(body: &str) {
    match serde_json::from_str::<Value>(body) {
        Ok(json) => {
            if let Some(message) = json.get("message").and_then(Value::as_str) {
                if message.starts_with(OUTDATED_VERSION_MARKER) {
                    debug!(server_message = message, "API reports outdated client version, proceeding");
                }
            }
        }
        Err(_) => debug!("non-JSON body on status 202, proceeding"),
    }
}

fn snippet(body: &str) -> &str {
    match body.char_indices().nth(LOG_BODY_LIMIT) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
