use serde::{Deserialize, Serialize};

use crate::models::{ConflictInfo, FieldEntry, ResolutionStrategy, ScalarField};

/// A safety-critical field decided by the merge rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyDecision {
    pub field: String,
    pub local: Option<f64>,
    pub server: Option<f64>,
    pub chosen: Option<f64>,
}

/// Outcome of applying a strategy to a conflict.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub strategy: ResolutionStrategy,
    /// Resolved content. Sync metadata is finalized by the repository.
    pub entry: FieldEntry,
    /// Whether the resolved entry must be re-submitted to the server
    pub resubmit: bool,
    /// Safety-critical fields whose values differed and were arbitrated
    pub safety_decisions: Vec<SafetyDecision>,
}

/// Safety-biased pick for one critical reading.
///
/// The higher reading wins when both sides have one; a missing reading never
/// masks a present one.
pub fn safety_pick(local: Option<f64>, server: Option<f64>) -> Option<f64> {
    match (local, server) {
        (Some(local), Some(server)) => Some(local.max(server)),
        (Some(value), None) | (None, Some(value)) => Some(value),
        (None, None) => None,
    }
}

/// Apply `strategy` to `info`.
pub fn resolve(info: &ConflictInfo, strategy: ResolutionStrategy) -> Resolution {
    match strategy {
        ResolutionStrategy::Local => Resolution {
            strategy,
            entry: info.local_version.clone(),
            resubmit: true,
            safety_decisions: Vec::new(),
        },
        ResolutionStrategy::Server => {
            let mut entry = info.server_version.clone();
            entry.id = info.local_version.id;
            Resolution {
                strategy,
                entry,
                resubmit: false,
                safety_decisions: Vec::new(),
            }
        }
        ResolutionStrategy::Merge => merge(info),
    }
}

#[allow(clippy::float_cmp)]
fn merge(info: &ConflictInfo) -> Resolution {
    let local = &info.local_version;
    let server = &info.server_version;
    let mut entry = local.clone();
    let mut safety_decisions = Vec::new();

    for field in ScalarField::ALL.into_iter().filter(|f| f.is_safety_critical()) {
        let local_value = field.value(local);
        let server_value = field.value(server);
        if local_value == server_value {
            continue;
        }
        let chosen = safety_pick(local_value, server_value);
        field.set(&mut entry, chosen);
        safety_decisions.push(SafetyDecision {
            field: field.path().to_string(),
            local: local_value,
            server: server_value,
            chosen,
        });
    }

    // Checklist items only the server knows about are kept; local wins otherwise.
    if let Some(server_checklist) = &server.checklist {
        let checklist = entry.checklist.get_or_insert_with(Default::default);
        for (name, value) in server_checklist.iter() {
            if checklist.get(name).is_none() {
                checklist.set(name, value);
            }
        }
    }

    Resolution {
        strategy: ResolutionStrategy::Merge,
        entry,
        resubmit: true,
        safety_decisions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GpsFix, NewFieldEntry};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn pair() -> (FieldEntry, FieldEntry) {
        let mut local =
            NewFieldEntry::new("W-3", NaiveDate::from_ymd_opt(2024, 1, 9).unwrap()).into_entry(10);
        local.production.oil = 80.0;
        local.production.water = 20.0;
        local.readings.pressure = Some(1200.0);
        local.readings.temperature = Some(180.0);
        local.notes = "choke adjusted".into();
        let mut server = local.clone();
        server.updated_at = 50;
        server.notes = "office note".into();
        (local, server)
    }

    #[test]
    fn safety_pick_prefers_higher_reading() {
        assert_eq!(safety_pick(Some(1200.0), Some(1250.0)), Some(1250.0));
        assert_eq!(safety_pick(Some(1300.0), Some(1250.0)), Some(1300.0));
        assert_eq!(safety_pick(None, Some(7.0)), Some(7.0));
        assert_eq!(safety_pick(Some(7.0), None), Some(7.0));
        assert_eq!(safety_pick(None, None), None);
    }

    #[test]
    fn local_keeps_local_values_and_resubmits() {
        let (local, mut server) = pair();
        server.readings.pressure = Some(1250.0);
        let info = ConflictInfo::new(local.clone(), server);

        let resolution = resolve(&info, ResolutionStrategy::Local);
        assert!(resolution.resubmit);
        assert_eq!(resolution.entry.readings.pressure, Some(1200.0));
        assert_eq!(resolution.entry, local);
    }

    #[test]
    fn server_takes_server_values_without_resubmission() {
        let (local, mut server) = pair();
        server.readings.pressure = Some(1250.0);
        let info = ConflictInfo::new(local, server);

        let resolution = resolve(&info, ResolutionStrategy::Server);
        assert!(!resolution.resubmit);
        assert_eq!(resolution.entry.readings.pressure, Some(1250.0));
        assert_eq!(resolution.entry.notes, "office note");
    }

    #[test]
    fn merge_is_safety_biased_for_critical_fields() {
        let (local, mut server) = pair();
        server.readings.pressure = Some(1250.0);
        server.readings.temperature = Some(170.0);
        server.production.water = 35.0;
        server.production.oil = 60.0;
        let info = ConflictInfo::new(local, server);

        let resolution = resolve(&info, ResolutionStrategy::Merge);
        assert!(resolution.resubmit);
        assert_eq!(resolution.entry.readings.pressure, Some(1250.0));
        assert_eq!(resolution.entry.readings.temperature, Some(180.0));
        assert_eq!(resolution.entry.production.water, 35.0);
        // non-critical fields default to local
        assert_eq!(resolution.entry.production.oil, 80.0);
        assert_eq!(resolution.entry.notes, "choke adjusted");

        let decided = resolution
            .safety_decisions
            .iter()
            .map(|d| d.field.as_str())
            .collect::<Vec<_>>();
        assert_eq!(decided, vec!["waterVolume", "pressure", "temperature"]);
    }

    #[test]
    fn merge_keeps_present_reading_over_missing_one() {
        let (mut local, server) = pair();
        local.readings.pressure = None;
        let info = ConflictInfo::new(local, server);

        let resolution = resolve(&info, ResolutionStrategy::Merge);
        assert_eq!(resolution.entry.readings.pressure, Some(1200.0));
    }

    #[test]
    fn merge_unions_checklists_and_keeps_local_location() {
        let (mut local, mut server) = pair();
        local.checklist = Some([("valveOpen", true)].into_iter().collect());
        server.checklist = Some(
            [("valveOpen", false), ("gaugeCalibrated", true)]
                .into_iter()
                .collect(),
        );
        local.location = Some(GpsFix {
            latitude: 31.0,
            longitude: -102.0,
            accuracy_m: 5.0,
        });

        let info = ConflictInfo::new(local, server);
        let resolution = resolve(&info, ResolutionStrategy::Merge);

        let checklist = resolution.entry.checklist.unwrap();
        assert_eq!(checklist.get("valveOpen"), Some(true));
        assert_eq!(checklist.get("gaugeCalibrated"), Some(true));
        assert!(resolution.entry.location.is_some());
        assert!(resolution.safety_decisions.is_empty());
    }
}
