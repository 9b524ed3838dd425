use std::collections::{BTreeMap, BTreeSet};

use crate::{
    extraction::types::{ConsolidatedReport, MeasurementMappingTable},
    types::CanonicalMeasurement,
};

/// Assigns canonical ids to report results from the mapping table.
///
/// Lookups key on the trimmed, lowercased raw description and the last table
/// entry wins for a repeated key. Entries pointing outside `measurements` are
/// ignored, so every assigned id is a canonical id.
///
/// Each batch is resolved on its own, in two passes:
/// 1. results whose description equals a canonical name exactly (case
///    sensitive) claim their mapped id first;
/// 2. every other result takes its mapped id if no result in the batch holds
///    it yet.
///
/// A canonical id is held by at most one result per batch. Results left
/// without a candidate stay unmapped. Ids already present on a result are
/// never overwritten.
pub fn remap_measurements_to_canonical(
    measurements: &[CanonicalMeasurement],
    report: &mut ConsolidatedReport,
    table: &MeasurementMappingTable,
) {
    let valid_ids: BTreeSet<&str> = measurements.iter().map(|m| m.id.as_str()).collect();
    let lookup: BTreeMap<String, &str> = table
        .entries
        .iter()
        .filter(|entry| valid_ids.contains(entry.mapped_to_canonical_id.as_str()))
        .map(|entry| {
            (
                lookup_key(&entry.raw_description),
                entry.mapped_to_canonical_id.as_str(),
            )
        })
        .collect();
    let canonical_names: BTreeSet<&str> = measurements.iter().map(|m| m.name.as_str()).collect();

    for batch in &mut report.batches {
        let mut used: BTreeSet<&str> = batch
            .results
            .iter()
            .filter_map(|result| result.id.as_deref())
            .filter_map(|id| valid_ids.get(id).copied())
            .collect();

        for result in &mut batch.results {
            if result.id.is_some() || !canonical_names.contains(result.description.as_str()) {
                continue;
            }
            if let Some(&id) = lookup.get(&lookup_key(&result.description)) {
                if used.insert(id) {
                    result.id = Some(id.to_string());
                }
            }
        }

        for result in &mut batch.results {
            if result.id.is_some() {
                continue;
            }
            if let Some(&id) = lookup.get(&lookup_key(&result.description)) {
                if used.insert(id) {
                    result.id = Some(id.to_string());
                }
            }
        }
    }
}

fn lookup_key(description: &str) -> String {
    description.trim().to_lowercase()
}
