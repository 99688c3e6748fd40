//! Executes `HttpRequest` values against the network.
//!
//! A `Transport` owns the connection resources of one session: the HTTP
//! agent and its cookie store. `open` acquires them, `close` releases them,
//! and the session manager decides when either happens.

use tracing::debug;
use ureq::Agent;

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

pub trait Transport {
    /// Acquire transport resources. Calling this on an open transport is a
    /// no-op.
    fn open(&mut self, config: &ClientConfig) -> Result<(), TransportError>;

    /// Release transport resources. Safe to call repeatedly.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Perform one round-trip. Non-2xx statuses are returned as data.
    fn execute(&mut self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Blocking transport backed by a cookie-storing `ureq::Agent`.
///
/// The agent is created on `open` and dropped on `close`, so the session
/// cookie never outlives the session.
#[derive(Default)]
pub struct UreqTransport {
    agent: Option<Agent>,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for UreqTransport {
    fn open(&mut self, config: &ClientConfig) -> Result<(), TransportError> {
        if self.agent.is_none() {
            debug!(host = %config.host, "creating HTTP agent");
            // Status interpretation belongs to the session, so 4xx/5xx must
            // come back as responses rather than errors.
            let agent = Agent::config_builder()
                .http_status_as_error(false)
                .timeout_global(Some(config.timeout))
                .build()
                .new_agent();
            self.agent = Some(agent);
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.agent.take().is_some() {
            debug!("HTTP agent released");
        }
    }

    fn is_open(&self) -> bool {
        self.agent.is_some()
    }

    fn execute(&mut self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let agent = self.agent.as_ref().ok_or(TransportError::NotOpen)?;

        let mut response = match request.method {
            HttpMethod::Get => {
                let mut builder = agent.get(&request.url);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                for (key, value) in &request.form {
                    builder = builder.query(key.as_str(), value.as_str());
                }
                builder.call()?
            }
            HttpMethod::Post => {
                let mut builder = agent.post(&request.url);
                // send_form sets the form content type itself.
                for (name, value) in request
                    .headers
                    .iter()
                    .filter(|(name, _)| !name.eq_ignore_ascii_case("content-type"))
                {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.send_form(
                    request
                        .form
                        .iter()
                        .map(|(k, v)| (k.as_str(), v.as_str())),
                )?
            }
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.body_mut().read_to_string()?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
