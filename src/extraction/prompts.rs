use schemars::{JsonSchema, schema_for};
use serde_json::Value;

use crate::{
    extraction::{
        error::{ExtractionError, internal_error},
        types::{ConsolidatedReport, MeasurementMappingTable},
    },
    types::CanonicalMeasurement,
};

/// Bump to invalidate every cache built from these prompts.
pub const CACHE_CONTEXT_VERSION: &str = "1";

pub const EXPERT_SYSTEM_PROMPT: &str = "You are an expert in the field of material quality analysis and inspection. You output Markdown";

pub const EXPERT_QUERY_PROMPT: &str = "Please extract the inspection result values and identifying data from the provided document.
Only report results never ranges. Only report results based on the actual content.
Report results for each batch (when absent use lot number) separately.
# General details to extract:
purchase order no.
## Each batch:
batch no.
expiration date
batch results:
- measurement: result, Accept/Reject
- ...
";

pub const SUPERVISOR_SYSTEM_PROMPT: &str = "You are an inspection analysis process supervisor";

pub const CONSOLIDATION_QUERY_TEMPLATE: &str = "Here are the same inspection results of multiple batches / materials by independent experts:

{expert_inputs}
# Your Task - Consolidate results

Please consolidate expert responses into a coherent analysis report.

Qualitative results should be reported as Boolean values: accept=True / reject=False
If there is a disagreement between experts - Flag the inspected value.
Sometimes no batch number is reported - use the lot number instead.
Compensate for descriptions and units as much as possible - identification may not be precise.
If the identification of the inspection like batch no. purchase order no. etc. is incoherent between experts - flag this as an identification warning.
Measurements description should be descriptive and based on the reported measurements only";

pub const MAPPING_QUERY_TEMPLATE: &str = "Here is a list of measurement descriptions coming from analysis reports:

# Raw Measurement Descriptions
{raw_measurement_descriptions}

# Your Task - Map each to the canonical measurement id

Below is the canonical list of measurements in use.
Please consider the meaning of the description and match to each raw description the proper canonical measurement id.
If no apparent match is found - Use \"?\" as the id to mark \"no match\".
Partial matches are expected.

# Canonical Measurements
{canonical_measurement_list}
";

pub fn expert_cache_context() -> Vec<String> {
    vec![
        CACHE_CONTEXT_VERSION.to_string(),
        EXPERT_SYSTEM_PROMPT.to_string(),
        EXPERT_QUERY_PROMPT.to_string(),
    ]
}

pub fn consolidation_cache_context() -> Result<Vec<String>, ExtractionError> {
    Ok(vec![
        CACHE_CONTEXT_VERSION.to_string(),
        SUPERVISOR_SYSTEM_PROMPT.to_string(),
        CONSOLIDATION_QUERY_TEMPLATE.to_string(),
        schema_value::<ConsolidatedReport>()?.to_string(),
    ])
}

pub fn mapping_cache_context() -> Result<Vec<String>, ExtractionError> {
    Ok(vec![
        CACHE_CONTEXT_VERSION.to_string(),
        SUPERVISOR_SYSTEM_PROMPT.to_string(),
        MAPPING_QUERY_TEMPLATE.to_string(),
        schema_value::<MeasurementMappingTable>()?.to_string(),
    ])
}

/// The schema is part of the cache fingerprint, so a failure here is never
/// papered over with a placeholder.
pub fn schema_value<T: JsonSchema>() -> Result<Value, ExtractionError> {
    serde_json::to_value(schema_for!(T))
        .map_err(|err| internal_error(format!("failed to serialize output schema: {err}")))
}

pub fn render_consolidation_prompt(expert_outputs: &[String]) -> String {
    let expert_inputs = expert_outputs
        .iter()
        .enumerate()
        .map(|(idx, output)| format!("# Expert {idx}\n\n{output}\n\n"))
        .collect::<Vec<_>>()
        .join("\n");
    fill_template(
        CONSOLIDATION_QUERY_TEMPLATE,
        &[("{expert_inputs}", expert_inputs.as_str())],
    )
}

pub fn render_mapping_prompt(
    raw_descriptions: &[&str],
    measurements: &[CanonicalMeasurement],
) -> String {
    let canonical_rows = measurements
        .iter()
        .map(|m| format!("{}: {}", m.id, m.name))
        .collect::<Vec<_>>()
        .join("\n");
    let raw_rows = raw_descriptions.join("\n");
    fill_template(
        MAPPING_QUERY_TEMPLATE,
        &[
            ("{raw_measurement_descriptions}", raw_rows.as_str()),
            ("{canonical_measurement_list}", canonical_rows.as_str()),
        ],
    )
}

/// Single left-to-right pass over `template`. Substituted text is never
/// scanned again, so placeholders inside inputs stay literal.
fn fill_template(template: &str, slots: &[(&str, &str)]) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        rendered.push_str(&rest[..start]);
        let tail = &rest[start..];
        match slots.iter().find(|(placeholder, _)| tail.starts_with(placeholder)) {
            Some((placeholder, value)) => {
                rendered.push_str(value);
                rest = &tail[placeholder.len()..];
            }
            None => {
                rendered.push('{');
                rest = &tail[1..];
            }
        }
    }
    rendered.push_str(rest);
    rendered
}
