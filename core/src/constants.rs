//! Fixed vendor constants: client version tag, endpoint paths, and the
//! device-type to model-name table.

/// Client version tag sent as `appversion` with every form body.
pub const APP_VERSION: &str = "2.40";

pub const MANUFACTURER: &str = "Autoskope GmbH";

/// Fixed client identifier attached to every outgoing request.
pub const USER_AGENT: &str = "autoskope-client/2.40";

pub const LOGIN_PATH: &str = "/scripts/ajax/login.php";
pub const INFO_PATH: &str = "/scripts/ajax/app/info.php";

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Prefix of the message the backend attaches to a 202 login response when
/// the client version is outdated.
pub const OUTDATED_VERSION_MARKER: &str = "Du verwendest eine veraltete App-Version";

/// Model name used when the device type is missing or unknown.
pub const DEFAULT_MODEL: &str = "Autoskope";

/// Device-type code to display model name.
pub const DEVICE_TYPE_MODELS: &[(&str, &str)] = &[
    ("1", "AutoskopeX"),
    ("3", "Autoskope V2"),
    ("5", "Autoskope V2"),
    ("7", "Motoskope"),
    ("8", "Bootskope"),
    ("10", "Autoskope V3"),
    ("11", "Solarskope"),
];

/// Resolve a device-type code to its model name, falling back to
/// [`DEFAULT_MODEL`].
pub fn model_for_device_type(code: &str) -> &'static str {
    DEVICE_TYPE_MODELS
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, model)| *model)
        .unwrap_or(DEFAULT_MODEL)
}
