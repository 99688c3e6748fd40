//! Authenticated session against the Autoskope backend.
//!
//! # Design
//! `AutoskopeApi` owns exactly one `Transport` (and therefore one cookie
//! store) and moves through `SessionState` only via `connect`,
//! `authenticate` and `close`. Requests run one at a time on `&mut self`.
//! Transport resources are released on `close`, on a failed `connect`, and
//! on drop.

use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::client::AutoskopeClient;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest};
use crate::parser;
use crate::transport::{Transport, UreqTransport};
use crate::types::{SessionState, Vehicle};

pub struct AutoskopeApi<T: Transport = UreqTransport> {
    config: ClientConfig,
    client: AutoskopeClient,
    transport: T,
    authenticated: bool,
}

impl AutoskopeApi<UreqTransport> {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(config, UreqTransport::new())
    }

    /// Create a session and connect it. The returned value releases its
    /// transport when dropped.
    pub fn open(config: ClientConfig) -> Result<Self, ApiError> {
        Self::open_with(config, UreqTransport::new())
    }
}

impl<T: Transport> AutoskopeApi<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        let client = AutoskopeClient::new(&config.host);
        Self {
            config,
            client,
            transport,
            authenticated: false,
        }
    }

    pub fn open_with(config: ClientConfig, transport: T) -> Result<Self, ApiError> {
        let mut api = Self::with_transport(config, transport);
        api.connect()?;
        Ok(api)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        match (self.transport.is_open(), self.authenticated) {
            (false, _) => SessionState::Disconnected,
            (true, false) => SessionState::Connected,
            (true, true) => SessionState::Authenticated,
        }
    }

    /// True when the transport is open and the login was accepted.
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    /// Open the transport if needed and log in unless already authenticated.
    ///
    /// On failure the transport is closed again before the error is returned.
    pub fn connect(&mut self) -> Result<(), ApiError> {
        let result = self.try_connect();
        if result.is_err() {
            self.close();
        }
        result
    }

    fn try_connect(&mut self) -> Result<(), ApiError> {
        self.transport.open(&self.config).map_err(|e| {
            error!(host = %self.config.host, error = %e, "failed to open transport");
            ApiError::CannotConnect(format!("error connecting to Autoskope API: {e}"))
        })?;
        if !self.authenticated {
            self.authenticate()?;
        }
        Ok(())
    }

    /// Post the credentials to the login endpoint.
    ///
    /// A 202 counts as success even when the body says the client version is
    /// outdated.
    pub fn authenticate(&mut self) -> Result<(), ApiError> {
        if !self.transport.is_open() {
            return Err(ApiError::NotConnected);
        }

        let request = self
            .client
            .build_login(&self.config.username, &self.config.password);
        let result = self.round_trip(&request);
        let user = self.config.username.as_str();

        match result {
            Ok(_) => {
                debug!(user, "authentication successful");
                self.authenticated = true;
                Ok(())
            }
            Err(ApiError::InvalidAuth(reason)) => {
                warn!(user, %reason, "authentication failed");
                self.authenticated = false;
                Err(ApiError::InvalidAuth("authentication failed".to_string()))
            }
            Err(ApiError::NotConnected) => {
                self.authenticated = false;
                Err(ApiError::NotConnected)
            }
            Err(ApiError::CannotConnect(reason)) => {
                error!(user, %reason, "connection error during authentication");
                self.authenticated = false;
                Err(ApiError::CannotConnect(format!(
                    "connection error during authentication: {reason}"
                )))
            }
        }
    }

    /// Release the transport and forget the login. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.transport.close();
        self.authenticated = false;
    }

    /// Generic form request. Returns the decoded JSON object, or an empty
    /// map for responses that carry no decoded body (202, login).
    pub fn request(
        &mut self,
        method: HttpMethod,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<Map<String, Value>, ApiError> {
        if !self.transport.is_open() {
            return Err(ApiError::NotConnected);
        }
        let request = self.client.build_request(method, path, form);
        Ok(self.round_trip(&request)?.unwrap_or_default())
    }

    /// Fetch and parse the vehicle list.
    ///
    /// An authorization failure clears the authenticated flag so the caller
    /// can reconnect.
    pub fn get_vehicles(&mut self) -> Result<Vec<Vehicle>, ApiError> {
        if !self.transport.is_open() {
            return Err(ApiError::NotConnected);
        }
        debug!("fetching vehicle data");

        let request = self.client.build_vehicle_info();
        let data = match self.round_trip(&request) {
            Ok(data) => data.unwrap_or_default(),
            Err(ApiError::InvalidAuth(_)) => {
                error!("authentication error during vehicle fetch");
                self.authenticated = false;
                return Err(ApiError::InvalidAuth("authentication required".to_string()));
            }
            Err(ApiError::CannotConnect(reason)) => {
                error!(%reason, "failed to fetch vehicle data");
                return Err(ApiError::CannotConnect(format!(
                    "failed to fetch data from Autoskope API: {reason}"
                )));
            }
            Err(ApiError::NotConnected) => return Err(ApiError::NotConnected),
        };

        let vehicles = parser::parse_vehicles(&data)?;
        debug!(count = vehicles.len(), "successfully parsed vehicles");
        Ok(vehicles)
    }

    fn round_trip(&mut self, request: &HttpRequest) -> Result<Option<Map<String, Value>>, ApiError> {
        debug!(method = request.method.as_str(), url = %request.url, "requesting");
        let response = self.transport.execute(request).map_err(|e| {
            error!(url = %request.url, error = %e, "API request connection error");
            ApiError::from(e)
        })?;
        self.client.interpret(&request.path, &response)
    }
}

impl<T: Transport> Drop for AutoskopeApi<T> {
    fn drop(&mut self) {
        self.close();
    }
}
