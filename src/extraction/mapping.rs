use std::{collections::BTreeSet, path::PathBuf};

use crate::{
    cache::MAPPING_NAMESPACE,
    extraction::{
        error::ExtractionError,
        ports::{SupervisorHandle, SupervisorPrompt},
        prompts::{
            SUPERVISOR_SYSTEM_PROMPT, mapping_cache_context, render_mapping_prompt, schema_value,
        },
        supervisor::{StructuredCall, cached_structured_call},
        types::{ConsolidatedReport, MeasurementMappingEntry, MeasurementMappingTable},
    },
    types::{CanonicalMeasurement, Task},
};

/// Asks a supervisor to map free-text result descriptions onto the caller's
/// canonical measurement ids.
pub struct MappingSupervisor {
    supervisor: SupervisorHandle,
    cache_root: PathBuf,
}

impl MappingSupervisor {
    pub fn new(supervisor: SupervisorHandle, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            supervisor,
            cache_root: cache_root.into(),
        }
    }

    pub async fn map(
        &self,
        task: &Task,
        report: &ConsolidatedReport,
    ) -> Result<MeasurementMappingTable, ExtractionError> {
        let raw_descriptions = distinct_descriptions(report);
        tracing::info!(
            target: "mapping",
            task_id = %task.id,
            description_count = raw_descriptions.len(),
            canonical_count = task.request.measurements.len(),
            model = %self.supervisor.model.model_id,
            "mapping_started"
        );

        let call = StructuredCall {
            stage: "mapping",
            namespace: MAPPING_NAMESPACE,
            context: mapping_cache_context()?,
            prompt: SupervisorPrompt {
                system: SUPERVISOR_SYSTEM_PROMPT.to_string(),
                user: render_mapping_prompt(&raw_descriptions, &task.request.measurements),
                schema_name: "MeasurementMappingTable",
                schema: schema_value::<MeasurementMappingTable>()?,
            },
        };

        let measurements = &task.request.measurements;
        let table = cached_structured_call(
            &self.supervisor,
            &self.cache_root,
            task,
            call,
            |table| finalize_mapping_table(table, measurements),
        )
        .await?;

        tracing::info!(
            target: "mapping",
            task_id = %task.id,
            entry_count = table.entries.len(),
            "mapping_completed"
        );
        Ok(table)
    }
}

/// Every canonical name maps to its own id, and only entries pointing at a
/// known canonical id survive. The unmapped marker is dropped with the rest.
pub fn finalize_mapping_table(
    mut table: MeasurementMappingTable,
    measurements: &[CanonicalMeasurement],
) -> MeasurementMappingTable {
    table.entries.extend(
        measurements
            .iter()
            .map(|m| MeasurementMappingEntry::new(m.name.clone(), m.id.clone())),
    );
    table
        .entries
        .retain(|entry| measurements.iter().any(|m| m.id == entry.mapped_to_canonical_id));
    table
}

fn distinct_descriptions(report: &ConsolidatedReport) -> Vec<&str> {
    report
        .results()
        .map(|result| result.description.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
