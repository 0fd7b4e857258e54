//! Field entry model

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Entity type name used for field entries in the queue and event log.
pub const FIELD_ENTRY_ENTITY: &str = "field_entry";

/// A unique identifier for a field entry, using UUID v7 (time-sortable).
///
/// Generated on the device and stable across sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Create a new unique entry ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Sync lifecycle of a field entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Waiting for the next sync pass
    #[default]
    Pending,
    /// Submission in flight
    Syncing,
    /// Server confirmed the current local state
    Synced,
    /// Last submission failed; still queued
    Failed,
    /// Server holds a divergent version; waiting for a resolution choice
    Conflicted,
}

impl SyncStatus {
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Syncing,
        Self::Synced,
        Self::Failed,
        Self::Conflicted,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Failed => "failed",
            Self::Conflicted => "conflicted",
        }
    }

    /// Statuses that must be backed by exactly one queue item.
    #[must_use]
    pub const fn requires_queue_item(self) -> bool {
        !matches!(self, Self::Synced)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidInput(format!("unknown sync status '{s}'")))
    }
}

/// Daily production volumes. All values are non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionVolumes {
    /// Oil volume (bbl)
    pub oil: f64,
    /// Gas volume (mcf)
    pub gas: f64,
    /// Water volume (bbl)
    pub water: f64,
}

/// Equipment readings taken at the well site.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentReadings {
    /// Pressure (psi)
    #[serde(default)]
    pub pressure: Option<f64>,
    /// Temperature (°F)
    #[serde(default)]
    pub temperature: Option<f64>,
}

/// Structured checklist of named boolean fields, ordered by name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checklist(BTreeMap<String, bool>);

impl Checklist {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Set a named item, returning the previous value.
    pub fn set(&mut self, name: impl Into<String>, value: bool) -> Option<bool> {
        self.0.insert(name.into(), value)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<bool> {
        self.0.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, bool)> for Checklist {
    fn from_iter<I: IntoIterator<Item = (K, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// GPS fix captured with the entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in meters
    pub accuracy_m: f64,
}

/// A unit of captured field data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldEntry {
    /// Unique identifier
    pub id: EntryId,
    /// Well reference
    pub well_id: String,
    /// Production day this entry describes
    pub entry_date: NaiveDate,
    #[serde(default)]
    pub production: ProductionVolumes,
    #[serde(default)]
    pub readings: EquipmentReadings,
    #[serde(default)]
    pub notes: String,
    /// Photo references (local paths or upload keys)
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub checklist: Option<Checklist>,
    #[serde(default)]
    pub location: Option<GpsFix>,
    #[serde(default)]
    pub sync_status: SyncStatus,
    /// Creation timestamp (Unix ms, client clock)
    pub created_at: i64,
    /// Last update timestamp (Unix ms, client clock)
    pub updated_at: i64,
    /// Last server version this device knows about
    #[serde(default)]
    pub server_version: Option<i64>,
    /// Soft delete flag; deletion is synced like any other mutation
    #[serde(default)]
    pub is_deleted: bool,
}

impl FieldEntry {
    /// Validate captured values.
    pub fn validate(&self) -> Result<()> {
        if self.well_id.trim().is_empty() {
            return Err(Error::InvalidInput("well reference must not be empty".into()));
        }

        let volumes = [
            ("oil", self.production.oil),
            ("gas", self.production.gas),
            ("water", self.production.water),
        ];
        for (name, value) in volumes {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidInput(format!(
                    "{name} volume must be a non-negative number (got {value})"
                )));
            }
        }

        let readings = [
            ("pressure", self.readings.pressure),
            ("temperature", self.readings.temperature),
        ];
        for (name, value) in readings {
            if let Some(value) = value {
                if !value.is_finite() {
                    return Err(Error::InvalidInput(format!("{name} must be a finite number")));
                }
            }
        }

        if let Some(fix) = self.location {
            if !(-90.0..=90.0).contains(&fix.latitude) {
                return Err(Error::InvalidInput(format!(
                    "latitude {} is out of range",
                    fix.latitude
                )));
            }
            if !(-180.0..=180.0).contains(&fix.longitude) {
                return Err(Error::InvalidInput(format!(
                    "longitude {} is out of range",
                    fix.longitude
                )));
            }
            if !fix.accuracy_m.is_finite() || fix.accuracy_m < 0.0 {
                return Err(Error::InvalidInput(
                    "GPS accuracy must be a non-negative number of meters".into(),
                ));
            }
        }

        Ok(())
    }

    /// Serialized snapshot used as a queue payload.
    pub fn snapshot(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Rebuild an entry from a queue or event payload snapshot.
    pub fn from_snapshot(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Input for creating a field entry.
///
/// `id` may be supplied by the caller (e.g. a form that pre-allocates ids);
/// otherwise one is generated.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFieldEntry {
    pub id: Option<EntryId>,
    pub well_id: String,
    pub entry_date: NaiveDate,
    pub production: ProductionVolumes,
    pub readings: EquipmentReadings,
    pub notes: String,
    pub photos: Vec<String>,
    pub checklist: Option<Checklist>,
    pub location: Option<GpsFix>,
}

impl NewFieldEntry {
    /// Start an entry for a well and production day with everything else empty.
    #[must_use]
    pub fn new(well_id: impl Into<String>, entry_date: NaiveDate) -> Self {
        Self {
            id: None,
            well_id: well_id.into(),
            entry_date,
            production: ProductionVolumes::default(),
            readings: EquipmentReadings::default(),
            notes: String::new(),
            photos: Vec::new(),
            checklist: None,
            location: None,
        }
    }

    /// Materialize into a pending entry stamped with `now` (Unix ms).
    #[must_use]
    pub fn into_entry(self, now: i64) -> FieldEntry {
        FieldEntry {
            id: self.id.unwrap_or_default(),
            well_id: self.well_id.trim().to_string(),
            entry_date: self.entry_date,
            production: self.production,
            readings: self.readings,
            notes: self.notes,
            photos: self.photos,
            checklist: self.checklist,
            location: self.location,
            sync_status: SyncStatus::Pending,
            created_at: now,
            updated_at: now,
            server_version: None,
            is_deleted: false,
        }
    }
}

/// Partial update of an entry's captured content.
///
/// Optional attributes use `Option<Option<_>>` so a patch can clear them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntryPatch {
    pub well_id: Option<String>,
    pub entry_date: Option<NaiveDate>,
    pub oil: Option<f64>,
    pub gas: Option<f64>,
    pub water: Option<f64>,
    pub pressure: Option<Option<f64>>,
    pub temperature: Option<Option<f64>>,
    pub notes: Option<String>,
    pub photos: Option<Vec<String>>,
    /// Individual checklist items to set (merged into the existing checklist)
    pub checklist_items: Vec<(String, bool)>,
    pub clear_checklist: bool,
    pub location: Option<Option<GpsFix>>,
}

impl EntryPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Apply this patch to `entry`'s captured content.
    pub fn apply(&self, entry: &mut FieldEntry) {
        if let Some(well_id) = &self.well_id {
            entry.well_id = well_id.trim().to_string();
        }
        if let Some(date) = self.entry_date {
            entry.entry_date = date;
        }
        if let Some(oil) = self.oil {
            entry.production.oil = oil;
        }
        if let Some(gas) = self.gas {
            entry.production.gas = gas;
        }
        if let Some(water) = self.water {
            entry.production.water = water;
        }
        if let Some(pressure) = self.pressure {
            entry.readings.pressure = pressure;
        }
        if let Some(temperature) = self.temperature {
            entry.readings.temperature = temperature;
        }
        if let Some(notes) = &self.notes {
            entry.notes.clone_from(notes);
        }
        if let Some(photos) = &self.photos {
            entry.photos.clone_from(photos);
        }
        if self.clear_checklist {
            entry.checklist = None;
        }
        if !self.checklist_items.is_empty() {
            let checklist = entry.checklist.get_or_insert_with(Checklist::new);
            for (name, value) in &self.checklist_items {
                checklist.set(name.clone(), *value);
            }
        }
        if let Some(location) = self.location {
            entry.location = location;
        }
    }
}
