//! Decodes the vehicle-listing response into `Vehicle` records.
//!
//! # Design
//! The listing carries two independent payloads: `cars`, an array of vehicle
//! objects, and `lastPos`, a *string* holding a GeoJSON FeatureCollection of
//! last known positions. Positions are joined to vehicles by the
//! stringified `properties.carid`.
//!
//! Failure handling is tiered:
//! - a missing or non-array `cars` fails the whole fetch;
//! - a malformed `lastPos` yields an empty position index;
//! - a malformed car entry is skipped with a `SkipReason`;
//! - a malformed position feature leaves that vehicle without a position.

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::constants::{model_for_device_type, DEFAULT_MODEL};
use crate::error::ApiError;
use crate::types::{Vehicle, VehiclePosition};

/// Why a single car entry was left out of the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotAnObject,
    MissingField(&'static str),
    InvalidField(&'static str),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotAnObject => write!(f, "entry is not a JSON object"),
            SkipReason::MissingField(field) => write!(f, "missing field '{field}'"),
            SkipReason::InvalidField(field) => write!(f, "invalid value for '{field}'"),
        }
    }
}

/// Parse a decoded listing body into vehicles, preserving `cars` order.
pub fn parse_vehicles(data: &Map<String, Value>) -> Result<Vec<Vehicle>, ApiError> {
    let index = position_index(data.get("lastPos"));

    let Some(Value::Array(cars)) = data.get("cars") else {
        error!("vehicle data 'cars' is missing or not a list");
        return Err(ApiError::CannotConnect(
            "invalid vehicle data format in API response".to_string(),
        ));
    };
    debug!(count = cars.len(), "received cars list");

    let vehicles: Vec<Vehicle> = cars
        .iter()
        .filter_map(|entry| match parse_vehicle(entry, &index) {
            Ok(vehicle) => Some(vehicle),
            Err(reason) => {
                let id = entry.get("id").and_then(id_string);
                warn!(
                    id = id.as_deref().unwrap_or("unknown"),
                    %reason,
                    "skipping vehicle entry"
                );
                None
            }
        })
        .collect();

    debug!(count = vehicles.len(), "parsed vehicles");
    Ok(vehicles)
}

/// Build the carid → feature map from the `lastPos` field.
///
/// Anything other than a string holding a FeatureCollection produces an
/// empty map. When two features share a carid the later one wins.
pub fn position_index(last_pos: Option<&Value>) -> HashMap<String, Value> {
    let mut index = HashMap::new();

    let raw = match last_pos {
        None | Some(Value::Null) => return index,
        Some(Value::String(raw)) if raw.is_empty() => return index,
        Some(Value::String(raw)) => raw,
        Some(_) => {
            debug!("lastPos is not a string");
            return index;
        }
    };

    let parsed: Value = match serde_json::from_str(raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(error = %e, "failed to parse lastPos JSON string");
            return index;
        }
    };

    let Value::Object(mut collection) = parsed else {
        debug!("lastPos is not a JSON object");
        return index;
    };
    if collection.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
        debug!("lastPos is not a FeatureCollection");
        return index;
    }
    let Some(Value::Array(features)) = collection.remove("features") else {
        debug!("lastPos has no features array");
        return index;
    };

    for feature in features {
        let carid = feature
            .get("properties")
            .and_then(Value::as_object)
            .and_then(|props| props.get("carid"))
            .and_then(id_string);
        if let Some(carid) = carid {
            index.insert(carid, feature);
        }
    }

    debug!(entries = index.len(), "built position index");
    index
}

/// Parse one `cars` entry and attach its position, if any.
pub fn parse_vehicle(
    entry: &Value,
    positions: &HashMap<String, Value>,
) -> Result<Vehicle, SkipReason> {
    let info = entry.as_object().ok_or(SkipReason::NotAnObject)?;

    let id = id_string(required(info, "id")?).ok_or(SkipReason::InvalidField("id"))?;
    let name = id_string(required(info, "name")?).ok_or(SkipReason::InvalidField("name"))?;
    let external_voltage = float_field(info, "ex_pow")?;
    let battery_voltage = float_field(info, "bat_pow")?;
    let gps_quality = float_field(info, "hdop")?;

    let position = positions.get(&id).and_then(parse_position);

    let imei = match info.get("support_infos") {
        Some(Value::Object(support)) => support.get("imei").and_then(id_string),
        _ => None,
    };

    let model = info
        .get("device_type_id")
        .and_then(id_string)
        .map(|code| model_for_device_type(&code))
        .unwrap_or(DEFAULT_MODEL)
        .to_string();

    Ok(Vehicle {
        id,
        name,
        position,
        external_voltage,
        battery_voltage,
        gps_quality,
        imei,
        model,
    })
}

/// Read a GeoJSON point feature into a position. `coordinates` is
/// `[longitude, latitude]`.
pub fn parse_position(feature: &Value) -> Option<VehiclePosition> {
    let position = read_position(feature);
    if position.is_none() {
        debug!("failed to parse position feature");
    }
    position
}

fn read_position(feature: &Value) -> Option<VehiclePosition> {
    let coordinates = feature.get("geometry")?.get("coordinates")?.as_array()?;
    let [longitude, latitude] = coordinates.as_slice() else {
        return None;
    };
    let longitude = as_float(longitude)?;
    let latitude = as_float(latitude)?;

    let properties = feature.get("properties")?.as_object()?;
    let speed = match properties.get("s") {
        None => 0.0,
        Some(s) => as_float(s)?,
    };
    let timestamp = match properties.get("dt") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(dt)) => dt.clone(),
        Some(Value::Number(dt)) => dt.to_string(),
        Some(_) => return None,
    };
    let park_mode = properties.get("park").map(truthy).unwrap_or(false);

    Some(VehiclePosition {
        latitude,
        longitude,
        speed,
        timestamp,
        park_mode,
    })
}

fn required<'a>(info: &'a Map<String, Value>, field: &'static str) -> Result<&'a Value, SkipReason> {
    info.get(field).ok_or(SkipReason::MissingField(field))
}

fn float_field(info: &Map<String, Value>, field: &'static str) -> Result<f64, SkipReason> {
    as_float(required(info, field)?).ok_or(SkipReason::InvalidField(field))
}

/// Numbers, or strings holding a number.
fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Identifiers arrive as either strings or numbers; `5` and `"5"` both
/// become `"5"`.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => {
            let s = s.trim();
            !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
        }
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn car_a() -> Value {
        json!({
            "id": 5,
            "name": "Car A",
            "ex_pow": "12.1",
            "bat_pow": "3.9",
            "hdop": "1.2",
            "device_type_id": "7"
        })
    }

    fn feature(carid: Value, props: Value) -> Value {
        let mut properties = props;
        properties["carid"] = carid;
        json!({
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [13.4, 52.5] },
            "properties": properties
        })
    }

    fn listing(cars: Value, features: Vec<Value>) -> Map<String, Value> {
        let last_pos = json!({ "type": "FeatureCollection", "features": features });
        let body = json!({ "cars": cars, "lastPos": last_pos.to_string() });
        body.as_object().unwrap().clone()
    }

    #[test]
    fn vehicle_without_position() {
        let data = listing(json!([car_a()]), Vec::new());
        let vehicles = parse_vehicles(&data).unwrap();
        assert_eq!(
            vehicles,
            vec![Vehicle {
                id: "5".to_string(),
                name: "Car A".to_string(),
                position: None,
                external_voltage: 12.1,
                battery_voltage: 3.9,
                gps_quality: 1.2,
                imei: None,
                model: "Motoskope".to_string(),
            }]
        );
    }

    #[test]
    fn vehicle_joined_with_position() {
        let data = listing(
            json!([car_a()]),
            vec![feature(
                json!(5),
                json!({ "s": "30", "dt": "2024-01-01T00:00:00Z", "park": 0 }),
            )],
        );
        let vehicles = parse_vehicles(&data).unwrap();
        assert_eq!(
            vehicles[0].position,
            Some(VehiclePosition {
                latitude: 52.5,
                longitude: 13.4,
                speed: 30.0,
                timestamp: "2024-01-01T00:00:00Z".to_string(),
                park_mode: false,
            })
        );
    }

    #[test]
    fn string_carid_joins_numeric_id() {
        let data = listing(json!([car_a()]), vec![feature(json!("5"), json!({ "park": true }))]);
        let position = parse_vehicles(&data).unwrap()[0].position.clone().unwrap();
        assert!(position.park_mode);
        assert_eq!(position.speed, 0.0);
        assert_eq!(position.timestamp, "");
    }

    #[test]
    fn entry_missing_ex_pow_is_skipped() {
        let mut broken = car_a();
        broken.as_object_mut().unwrap().remove("ex_pow");
        broken["id"] = json!(6);
        let mut other = car_a();
        other["id"] = json!(7);

        let data = listing(json!([car_a(), broken, other]), Vec::new());
        let ids: Vec<String> = parse_vehicles(&data).unwrap().into_iter().map(|v| v.id).collect();
        assert_eq!(ids, vec!["5", "7"]);
    }

    #[test]
    fn non_object_entries_are_skipped() {
        let data = listing(json!(["garbage", 3, null, car_a()]), Vec::new());
        assert_eq!(parse_vehicles(&data).unwrap().len(), 1);
    }

    #[test]
    fn cars_not_array_fails() {
        let data = json!({ "cars": { "id": 5 } }).as_object().unwrap().clone();
        let err = parse_vehicles(&data).unwrap_err();
        assert!(matches!(err, ApiError::CannotConnect(_)));
    }

    #[test]
    fn cars_missing_fails() {
        let data = json!({ "lastPos": "" }).as_object().unwrap().clone();
        assert!(matches!(parse_vehicles(&data), Err(ApiError::CannotConnect(_))));
    }

    #[test]
    fn malformed_last_pos_is_tolerated() {
        for last_pos in [
            json!("not json"),
            json!("{\"type\":\"Feature\"}"),
            json!("{\"type\":\"FeatureCollection\",\"features\":{}}"),
            json!("[]"),
            json!(42),
        ] {
            let data = json!({ "cars": [car_a()], "lastPos": last_pos })
                .as_object()
                .unwrap()
                .clone();
            let vehicles = parse_vehicles(&data).unwrap();
            assert_eq!(vehicles.len(), 1);
            assert!(vehicles[0].position.is_none());
        }
    }

    #[test]
    fn bad_position_feature_leaves_vehicle_without_position() {
        let mut bad = feature(json!(5), json!({ "s": "fast" }));
        let data = listing(json!([car_a()]), vec![bad.clone()]);
        assert!(parse_vehicles(&data).unwrap()[0].position.is_none());

        bad["properties"]["s"] = json!(10);
        bad["geometry"]["coordinates"] = json!([13.4]);
        let data = listing(json!([car_a()]), vec![bad]);
        let vehicles = parse_vehicles(&data).unwrap();
        assert_eq!(vehicles.len(), 1);
        assert!(vehicles[0].position.is_none());
    }

    #[test]
    fn unknown_device_type_uses_default_model() {
        let mut car = car_a();
        car["device_type_id"] = json!(99);
        let mut no_type = car_a();
        no_type.as_object_mut().unwrap().remove("device_type_id");
        let mut numeric = car_a();
        numeric["device_type_id"] = json!(10);

        let data = listing(json!([car, no_type, numeric]), Vec::new());
        let models: Vec<String> = parse_vehicles(&data).unwrap().into_iter().map(|v| v.model).collect();
        assert_eq!(models, vec!["Autoskope", "Autoskope", "Autoskope V3"]);
    }

    #[test]
    fn imei_read_from_support_infos() {
        let mut car = car_a();
        car["support_infos"] = json!({ "imei": "356938035643809" });
        let mut not_object = car_a();
        not_object["support_infos"] = json!("356938035643809");

        let data = listing(json!([car, not_object]), Vec::new());
        let vehicles = parse_vehicles(&data).unwrap();
        assert_eq!(vehicles[0].imei.as_deref(), Some("356938035643809"));
        assert_eq!(vehicles[1].imei, None);
    }

    #[test]
    fn park_flag_coercion() {
        assert!(truthy(&json!(1)));
        assert!(truthy(&json!(true)));
        assert!(truthy(&json!("1")));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!(false)));
        assert!(!truthy(&json!("0")));
        assert!(!truthy(&json!(null)));
    }

    #[test]
    fn parsing_is_idempotent() {
        let data = listing(
            json!([car_a()]),
            vec![feature(json!(5), json!({ "s": 12.5, "dt": "x", "park": 1 }))],
        );
        assert_eq!(parse_vehicles(&data).unwrap(), parse_vehicles(&data).unwrap());
    }

    #[test]
    fn skip_reasons_name_the_field() {
        let index = HashMap::new();
        let mut car = car_a();
        car["hdop"] = json!("n/a");
        assert_eq!(parse_vehicle(&car, &index), Err(SkipReason::InvalidField("hdop")));
        car.as_object_mut().unwrap().remove("name");
        assert_eq!(parse_vehicle(&car, &index), Err(SkipReason::MissingField("name")));
        assert_eq!(parse_vehicle(&json!([1]), &index), Err(SkipReason::NotAnObject));
    }
}
