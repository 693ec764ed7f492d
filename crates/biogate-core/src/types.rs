use crate::{
    Result,
    constants::{
        DEFAULT_COMM_KEY, DEFAULT_DEVICE_PORT, DEFAULT_RELAY_TYPE, DEFAULT_UNLOCK_SECONDS,
        SETTING_COMM_KEY, SETTING_IP, SETTING_PORT, SETTING_RELAY_TYPE, SETTING_UNLOCK_SECONDS,
    },
    error::Error,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Raw key/value settings as returned by the membership repository.
pub type SettingsMap = HashMap<String, Value>;

/// Connection parameters for the fingerprint terminal.
///
/// A `DeviceSettings` value is an immutable snapshot: it is read from the
/// settings store at the start of an operation and never updated in place.
///
/// # Examples
///
/// ```
/// use biogate_core::DeviceSettings;
///
/// let settings = DeviceSettings::new("192.168.1.201");
/// assert_eq!(settings.port, 4370);
/// assert_eq!(settings.comm_key, 0);
/// assert_eq!(settings.unlock_seconds, 3);
/// assert_eq!(settings.address(), "192.168.1.201:4370");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Terminal host name or IP address
    pub ip: String,

    /// Terminal TCP port
    pub port: u16,

    /// Shared communication key echoed in every frame
    pub comm_key: u32,

    /// How long the door stays unlocked after a grant
    pub unlock_seconds: u8,

    /// Relay wiring (`NO`/`NC`), informational only
    pub relay_type: String,
}

impl DeviceSettings {
    /// Create settings for the given address with every other field defaulted.
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            port: DEFAULT_DEVICE_PORT,
            comm_key: DEFAULT_COMM_KEY,
            unlock_seconds: DEFAULT_UNLOCK_SECONDS,
            relay_type: DEFAULT_RELAY_TYPE.to_string(),
        }
    }

    /// Set the terminal port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the communication key.
    pub fn comm_key(mut self, comm_key: u32) -> Self {
        self.comm_key = comm_key;
        self
    }

    /// Set the unlock duration.
    pub fn unlock_seconds(mut self, seconds: u8) -> Self {
        self.unlock_seconds = seconds;
        self
    }

    /// `host:port` string suitable for `TcpStream::connect`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    /// Build a settings snapshot from the repository's key/value settings.
    ///
    /// Values may be stored as JSON numbers or as strings. Numeric fields that
    /// cannot be parsed fall back to their defaults with a warning.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingConfig` when no terminal address is configured.
    pub fn from_settings(settings: &SettingsMap) -> Result<Self> {
        let ip = setting_text(settings, SETTING_IP)
            .map(|ip| ip.trim().to_string())
            .filter(|ip| !ip.is_empty())
            .ok_or_else(|| Error::MissingConfig(SETTING_IP.to_string()))?;

        Ok(Self {
            ip,
            port: numeric_setting(settings, SETTING_PORT, DEFAULT_DEVICE_PORT),
            comm_key: numeric_setting(settings, SETTING_COMM_KEY, DEFAULT_COMM_KEY),
            unlock_seconds: numeric_setting(
                settings,
                SETTING_UNLOCK_SECONDS,
                DEFAULT_UNLOCK_SECONDS,
            ),
            relay_type: setting_text(settings, SETTING_RELAY_TYPE)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_RELAY_TYPE.to_string()),
        })
    }

    /// Serialize back into repository settings entries.
    pub fn to_settings(&self) -> SettingsMap {
        let mut map = SettingsMap::new();
        map.insert(SETTING_IP.to_string(), Value::from(self.ip.clone()));
        map.insert(SETTING_PORT.to_string(), Value::from(self.port.to_string()));
        map.insert(
            SETTING_COMM_KEY.to_string(),
            Value::from(self.comm_key.to_string()),
        );
        map.insert(
            SETTING_UNLOCK_SECONDS.to_string(),
            Value::from(self.unlock_seconds.to_string()),
        );
        map.insert(
            SETTING_RELAY_TYPE.to_string(),
            Value::from(self.relay_type.clone()),
        );
        map
    }
}

impl fmt::Display for DeviceSettings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

fn setting_text(settings: &SettingsMap, key: &str) -> Option<String> {
    match settings.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn numeric_setting<T>(settings: &SettingsMap, key: &str, default: T) -> T
where
    T: FromStr + Copy + fmt::Display,
{
    let Some(raw) = setting_text(settings, key) else {
        return default;
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return default;
    }

    // Accept a leading integer followed by junk ("4370 " or "3s"), as the
    // settings screen stores free text.
    let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
    match digits.parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            warn!(key, value = raw, %default, "Invalid numeric setting, using default");
            default
        }
    }
}
