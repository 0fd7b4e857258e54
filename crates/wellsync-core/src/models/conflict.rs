//! Sync conflict model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::entry::FieldEntry;

/// Numeric production/equipment fields compared one by one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarField {
    OilVolume,
    GasVolume,
    WaterVolume,
    Pressure,
    Temperature,
}

impl ScalarField {
    /// Comparison order used for `conflict_fields`.
    pub const ALL: [Self; 5] = [
        Self::OilVolume,
        Self::GasVolume,
        Self::WaterVolume,
        Self::Pressure,
        Self::Temperature,
    ];

    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::OilVolume => "oilVolume",
            Self::GasVolume => "gasVolume",
            Self::WaterVolume => "waterVolume",
            Self::Pressure => "pressure",
            Self::Temperature => "temperature",
        }
    }

    /// Fields where masking a high reading can hide a hazardous condition.
    #[must_use]
    pub const fn is_safety_critical(self) -> bool {
        matches!(self, Self::WaterVolume | Self::Pressure | Self::Temperature)
    }

    /// Read this field from an entry. Volumes are always present.
    #[must_use]
    pub const fn value(self, entry: &FieldEntry) -> Option<f64> {
        match self {
            Self::OilVolume => Some(entry.production.oil),
            Self::GasVolume => Some(entry.production.gas),
            Self::WaterVolume => Some(entry.production.water),
            Self::Pressure => entry.readings.pressure,
            Self::Temperature => entry.readings.temperature,
        }
    }

    /// Write this field on an entry. `None` leaves a volume untouched.
    pub fn set(self, entry: &mut FieldEntry, value: Option<f64>) {
        match self {
            Self::OilVolume => {
                if let Some(v) = value {
                    entry.production.oil = v;
                }
            }
            Self::GasVolume => {
                if let Some(v) = value {
                    entry.production.gas = v;
                }
            }
            Self::WaterVolume => {
                if let Some(v) = value {
                    entry.production.water = v;
                }
            }
            Self::Pressure => entry.readings.pressure = value,
            Self::Temperature => entry.readings.temperature = value,
        }
    }
}

/// A comparable field, tagged by category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum FieldPath {
    Scalar(ScalarField),
    /// One named checklist boolean, rendered `checklist.<name>`
    ChecklistEntry(String),
    /// Latitude/longitude/accuracy compared as one unit
    Location,
}

impl FieldPath {
    /// Dotted path, e.g. `pressure`, `checklist.valveOpen`, `location`.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Scalar(field) => field.path().to_string(),
            Self::ChecklistEntry(name) => format!("checklist.{name}"),
            Self::Location => "location".to_string(),
        }
    }

    /// Human-readable value of this field on `entry`; `-` when absent.
    #[must_use]
    pub fn describe(&self, entry: &FieldEntry) -> String {
        match self {
            Self::Scalar(field) => field
                .value(entry)
                .map_or_else(|| "-".to_string(), |value| value.to_string()),
            Self::ChecklistEntry(name) => entry
                .checklist
                .as_ref()
                .and_then(|checklist| checklist.get(name))
                .map_or_else(|| "-".to_string(), |value| value.to_string()),
            Self::Location => entry.location.map_or_else(
                || "-".to_string(),
                |fix| format!("{:.6},{:.6}", fix.latitude, fix.longitude),
            ),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

impl FromStr for FieldPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == "location" {
            return Ok(Self::Location);
        }
        if let Some(name) = s.strip_prefix("checklist.") {
            if name.is_empty() {
                return Err(Error::InvalidInput("empty checklist field name".into()));
            }
            return Ok(Self::ChecklistEntry(name.to_string()));
        }
        ScalarField::ALL
            .into_iter()
            .find(|field| field.path() == s)
            .map(Self::Scalar)
            .ok_or_else(|| Error::InvalidInput(format!("unknown field path '{s}'")))
    }
}

impl From<FieldPath> for String {
    fn from(value: FieldPath) -> Self {
        value.path()
    }
}

impl TryFrom<String> for FieldPath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Local and server versions of a conflicted entry with the differing fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictInfo {
    pub local_version: FieldEntry,
    pub server_version: FieldEntry,
    pub conflict_fields: Vec<FieldPath>,
}

impl ConflictInfo {
    /// Build conflict info by diffing the two versions.
    #[must_use]
    pub fn new(local_version: FieldEntry, server_version: FieldEntry) -> Self {
        let conflict_fields = crate::conflict::detect(&local_version, &server_version);
        Self {
            local_version,
            server_version,
            conflict_fields,
        }
    }

    /// Dotted paths of the differing fields.
    #[must_use]
    pub fn field_paths(&self) -> Vec<String> {
        self.conflict_fields.iter().map(FieldPath::path).collect()
    }
}

/// How a conflict is settled. Exactly one is chosen per resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStrategy {
    /// Local version is authoritative and is re-submitted
    Local,
    /// Server version is authoritative and overwrites the local entry
    Server,
    /// Field-by-field, safety-biased for critical readings
    Merge,
}

impl ResolutionStrategy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Server => "server",
            Self::Merge => "merge",
        }
    }
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "server" => Ok(Self::Server),
            "merge" => Ok(Self::Merge),
            other => Err(Error::InvalidInput(format!(
                "unknown resolution strategy '{other}' (expected local, server or merge)"
            ))),
        }
    }
}
