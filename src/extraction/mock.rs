//! Fabricated extraction for integration testing. Touches neither the cache
//! nor any model and never adds cost to the task.

use chrono::{Days, Utc};
use rand::{Rng, distributions::Alphanumeric, seq::SliceRandom};

use crate::{
    extraction::{
        remap::remap_measurements_to_canonical,
        types::{
            ConsolidatedBatch, ConsolidatedMeasurementResult, ConsolidatedReport, ExtractionResult,
            MeasurementMappingEntry, MeasurementMappingTable, MeasurementValue,
        },
    },
    types::{ImageArtifact, Task},
};

pub const MOCK_DESCRIPTIONS: &[&str] = &[
    "Density @ 25°C (g/cm³)",
    "Melting Point (95% purity) °C",
    "Ash Content (muffle furnace) %",
    "Particle Size (D50) μm",
    "Free Acid (HCl equivalent) mg/kg",
    "Moisture Content (oven-dry) %",
    "Refractive Index (20°C)",
    "Tensile Strength (ASTM D882) MPa",
    "Residue on 325 Mesh (% w/w)",
    "Boiling Range (ASTM D1078) °C",
];

pub const MOCK_PRODUCT_NAME: &str = "mock product name";

pub fn extract<R: Rng + ?Sized>(
    task: &Task,
    images: &[ImageArtifact],
    rng: &mut R,
) -> ExtractionResult {
    let mut report = mock_report(task, images, rng);
    let table = mock_mapping_table(task, &report, rng);
    remap_measurements_to_canonical(&task.request.measurements, &mut report, &table);

    tracing::info!(
        target: "pipeline",
        task_id = %task.id,
        mock_mode = true,
        batch_count = report.batches.len(),
        cost = format_args!("{:.7}", 0.0),
        "extraction_completed"
    );

    ExtractionResult {
        request_id: task.id.clone(),
        consolidated_report: report,
        measurements_mapping: table,
        errors: None,
    }
}

fn mock_report<R: Rng + ?Sized>(
    task: &Task,
    images: &[ImageArtifact],
    rng: &mut R,
) -> ConsolidatedReport {
    // One batch per page at most, but always room for a few.
    let batch_count = rng.gen_range(1..=images.len().max(3));
    ConsolidatedReport {
        order_number: Some(task.request.order_number.clone()),
        product_name: Some(MOCK_PRODUCT_NAME.to_string()),
        flag_identification_warning: rng.gen_bool(0.2),
        batches: (0..batch_count).map(|_| mock_batch(task, rng)).collect(),
    }
}

fn mock_batch<R: Rng + ?Sized>(task: &Task, rng: &mut R) -> ConsolidatedBatch {
    let mut descriptions: Vec<&str> = MOCK_DESCRIPTIONS
        .iter()
        .copied()
        .chain(task.request.measurements.iter().map(|m| m.name.as_str()))
        .collect();
    descriptions.shuffle(rng);
    descriptions.truncate(rng.gen_range(2..=5));

    let expiration_date = if rng.gen_bool(0.6) {
        Utc::now()
            .date_naive()
            .checked_add_days(Days::new(rng.gen_range(30..=300)))
            .map(|date| date.to_string())
    } else {
        None
    };

    ConsolidatedBatch {
        batch_number: Some(random_batch_number(rng)),
        expiration_date,
        results: descriptions
            .into_iter()
            .map(|description| mock_result(description, rng))
            .collect(),
    }
}

fn mock_result<R: Rng + ?Sized>(description: &str, rng: &mut R) -> ConsolidatedMeasurementResult {
    let value = if rng.gen_bool(0.8) {
        MeasurementValue::Number((rng.gen_range(0.0..100.0_f64) * 100.0).round() / 100.0)
    } else {
        MeasurementValue::Bool(true)
    };
    ConsolidatedMeasurementResult {
        id: None,
        description: description.to_string(),
        value: Some(value),
        accept: rng.gen_bool(0.7),
        flag_disagreement: rng.gen_bool(0.3),
    }
}

fn random_batch_number<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..7)
        .map(|_| char::from(rng.sample(Alphanumeric)).to_ascii_uppercase())
        .collect()
}

fn mock_mapping_table<R: Rng + ?Sized>(
    task: &Task,
    report: &ConsolidatedReport,
    rng: &mut R,
) -> MeasurementMappingTable {
    let mut entries: Vec<MeasurementMappingEntry> = task
        .request
        .measurements
        .iter()
        .map(|m| MeasurementMappingEntry::new(m.name.clone(), m.id.clone()))
        .collect();

    let mut free_text: Vec<&str> = MOCK_DESCRIPTIONS
        .iter()
        .copied()
        .filter(|candidate| report.results().any(|r| r.description == *candidate))
        .collect();

    for measurement in &task.request.measurements {
        if free_text.is_empty() {
            break;
        }
        if rng.gen_bool(0.8) {
            let picked = free_text.swap_remove(rng.gen_range(0..free_text.len()));
            entries.push(MeasurementMappingEntry::new(picked, measurement.id.clone()));
        }
    }

    MeasurementMappingTable { entries }
}
