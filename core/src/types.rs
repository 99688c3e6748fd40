//! Domain records produced by the vehicle-list parser.
//!
//! Records are rebuilt from scratch on every fetch and carry no identity
//! beyond the call that produced them.

use serde::{Deserialize, Serialize};

/// Last known position of a vehicle, taken from a GeoJSON feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehiclePosition {
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
    /// Vendor timestamp, passed through unparsed.
    pub timestamp: String,
    pub park_mode: bool,
}

/// A tracked vehicle.
///
/// `id` is the string form of the vendor's numeric car id and is the key
/// used to join position features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub name: String,
    pub position: Option<VehiclePosition>,
    pub external_voltage: f64,
    pub battery_voltage: f64,
    /// HDOP; lower is better.
    pub gps_quality: f64,
    pub imei: Option<String>,
    pub model: String,
}

/// Lifecycle of an `AutoskopeApi` session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    /// Transport open, login not (yet) accepted.
    Connected,
    Authenticated,
}
