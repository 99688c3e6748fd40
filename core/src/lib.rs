//! Client library for the Autoskope vehicle-tracking backend.
//!
//! # Overview
//! Logs in through the vendor's session-cookie endpoint, fetches the
//! device listing, and turns the nested JSON (including a string-embedded
//! GeoJSON FeatureCollection of last positions) into typed `Vehicle` records.
//!
//! # Design
//! - `AutoskopeClient` builds `HttpRequest` values and interprets
//!   `HttpResponse` values without I/O; status-code policy lives there.
//! - `Transport` executes requests. `UreqTransport` is the blocking,
//!   cookie-storing default; tests substitute scripted transports.
//! - `AutoskopeApi` owns one transport and the login state, and releases the
//!   transport on `close` or drop.
//! - Diagnostics go through `tracing`; the host installs the subscriber.

pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod http;
pub mod parser;
pub mod session;
pub mod transport;
pub mod types;

pub use client::AutoskopeClient;
pub use config::ClientConfig;
pub use constants::{model_for_device_type, APP_VERSION, DEFAULT_MODEL, MANUFACTURER};
pub use error::{ApiError, ConfigError, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use parser::{parse_vehicles, SkipReason};
pub use session::AutoskopeApi;
pub use transport::{Transport, UreqTransport};
pub use types::{SessionState, Vehicle, VehiclePosition};
