use std::collections::BTreeSet;

use crate::models::{Checklist, FieldEntry, FieldPath, GpsFix, ScalarField};

/// Fields whose values differ between `local` and `server`, in a stable order:
/// scalars, then checklist entries by name, then location.
pub fn detect(local: &FieldEntry, server: &FieldEntry) -> Vec<FieldPath> {
    let mut fields = Vec::new();

    for field in ScalarField::ALL {
        if !same_scalar(field.value(local), field.value(server)) {
            fields.push(FieldPath::Scalar(field));
        }
    }

    fields.extend(
        checklist_differences(local.checklist.as_ref(), server.checklist.as_ref())
            .into_iter()
            .map(FieldPath::ChecklistEntry),
    );

    if !same_location(local.location.as_ref(), server.location.as_ref()) {
        fields.push(FieldPath::Location);
    }

    fields
}

#[allow(clippy::float_cmp)] // structural comparison of captured values
fn same_scalar(local: Option<f64>, server: Option<f64>) -> bool {
    local == server
}

/// Names over the union of both checklists whose values differ.
/// A name present on only one side counts as different.
fn checklist_differences(local: Option<&Checklist>, server: Option<&Checklist>) -> Vec<String> {
    let names = local
        .into_iter()
        .chain(server)
        .flat_map(Checklist::names)
        .collect::<BTreeSet<_>>();

    names
        .into_iter()
        .filter(|name| {
            let local_value = local.and_then(|checklist| checklist.get(name));
            let server_value = server.and_then(|checklist| checklist.get(name));
            local_value != server_value
        })
        .map(str::to_string)
        .collect()
}

#[allow(clippy::float_cmp)]
fn same_location(local: Option<&GpsFix>, server: Option<&GpsFix>) -> bool {
    match (local, server) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            a.latitude == b.latitude && a.longitude == b.longitude && a.accuracy_m == b.accuracy_m
        }
        _ => false,
    }
}
