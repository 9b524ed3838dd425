use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    extraction::types::{
        ConsolidatedBatch, ConsolidatedMeasurementResult, ExtractionResult, MeasurementValue,
    },
    types::{CanonicalId, Task},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementResult {
    /// `None` when no canonical measurement was matched.
    pub measurement_id: Option<CanonicalId>,
    pub measurement_name: String,
    pub value: Option<MeasurementValue>,
    pub accept: bool,
    pub flag_uncertain: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchData {
    pub batch_number: Option<String>,
    pub expiration_date: Option<String>,
    pub results: Vec<MeasurementResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoaResponse {
    pub task_id: String,
    pub order_number: Option<String>,
    pub identification_warning: bool,
    pub batches: Vec<BatchData>,
    #[serde(default)]
    pub mock: bool,
}

/// Mapped results are named after their canonical measurement, unmapped ones
/// keep the description the experts reported.
pub fn to_coa_response(task: &Task, result: &ExtractionResult) -> CoaResponse {
    let canonical_names: BTreeMap<&str, &str> = task
        .request
        .measurements
        .iter()
        .map(|m| (m.id.as_str(), m.name.as_str()))
        .collect();

    let report = &result.consolidated_report;
    CoaResponse {
        task_id: task.id.clone(),
        order_number: report.order_number.clone(),
        identification_warning: report.flag_identification_warning,
        batches: report
            .batches
            .iter()
            .map(|batch| batch_data(batch, &canonical_names))
            .collect(),
        mock: task.mock_mode,
    }
}

fn batch_data(batch: &ConsolidatedBatch, canonical_names: &BTreeMap<&str, &str>) -> BatchData {
    BatchData {
        batch_number: batch.batch_number.clone(),
        expiration_date: batch.expiration_date.clone(),
        results: batch
            .results
            .iter()
            .map(|result| measurement_result(result, canonical_names))
            .collect(),
    }
}

fn measurement_result(
    result: &ConsolidatedMeasurementResult,
    canonical_names: &BTreeMap<&str, &str>,
) -> MeasurementResult {
    let measurement_name = result
        .id
        .as_deref()
        .and_then(|id| canonical_names.get(id))
        .map_or_else(|| result.description.clone(), |name| name.to_string());

    MeasurementResult {
        measurement_id: result.id.clone(),
        measurement_name,
        value: result.value.clone(),
        accept: result.accept,
        flag_uncertain: result.flag_disagreement,
    }
}
