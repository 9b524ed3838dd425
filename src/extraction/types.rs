use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::types::CanonicalId;

/// Marker the mapper uses for "no canonical match".
pub const UNMAPPED_MARKER: &str = "?";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum MeasurementValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConsolidatedMeasurementResult {
    /// Assigned by canonical remapping only; never part of the model-facing schema.
    #[serde(default)]
    #[schemars(skip)]
    pub id: Option<CanonicalId>,
    pub description: String,
    pub value: Option<MeasurementValue>,
    pub accept: bool,
    /// Flag this if the experts have a disagreement on the value for this measurement
    pub flag_disagreement: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConsolidatedBatch {
    pub batch_number: Option<String>,
    /// Using ISO 8601 Date format
    pub expiration_date: Option<String>,
    pub results: Vec<ConsolidatedMeasurementResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConsolidatedReport {
    pub order_number: Option<String>,
    pub product_name: Option<String>,
    pub flag_identification_warning: bool,
    pub batches: Vec<ConsolidatedBatch>,
}

impl ConsolidatedReport {
    pub fn results(&self) -> impl Iterator<Item = &ConsolidatedMeasurementResult> {
        self.batches.iter().flat_map(|batch| batch.results.iter())
    }

    /// Drops every id on the report. Ids come from canonical remapping only,
    /// never from a model reply or a stored copy of one.
    pub fn clear_canonical_ids(&mut self) {
        for batch in &mut self.batches {
            for result in &mut batch.results {
                result.id = None;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MeasurementMappingEntry {
    pub raw_description: String,
    pub mapped_to_canonical_id: String,
}

impl MeasurementMappingEntry {
    pub fn new(
        raw_description: impl Into<String>,
        mapped_to_canonical_id: impl Into<String>,
    ) -> Self {
        Self {
            raw_description: raw_description.into(),
            mapped_to_canonical_id: mapped_to_canonical_id.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MeasurementMappingTable {
    pub entries: Vec<MeasurementMappingEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub request_id: String,
    pub consolidated_report: ConsolidatedReport,
    pub measurements_mapping: MeasurementMappingTable,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

/// Token counters reported by a model call. Providers that do not distinguish
/// cached input or reasoning output leave those at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default)]
    pub cached_input_tokens: u64,
    #[serde(default)]
    pub reasoning_output_tokens: u64,
}
