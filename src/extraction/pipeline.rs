use std::path::PathBuf;

use rand::{SeedableRng, rngs::StdRng};

use crate::{
    extraction::{
        consolidation::ConsolidationSupervisor,
        error::{ExtractionError, invalid_request},
        experts::ExpertFanOut,
        mapping::MappingSupervisor,
        mock,
        ports::{ExpertHandle, SupervisorHandle},
        remap::remap_measurements_to_canonical,
        types::ExtractionResult,
    },
    types::{ImageArtifact, Task},
};

/// Experts, then consolidation, then mapping, then remapping. Each stage waits
/// for the previous one; only the experts inside the first stage overlap.
pub struct ExtractionPipeline {
    fan_out: ExpertFanOut,
    consolidator: ConsolidationSupervisor,
    mapper: MappingSupervisor,
}

impl ExtractionPipeline {
    pub fn new(
        experts: Vec<ExpertHandle>,
        consolidator: SupervisorHandle,
        mapper: SupervisorHandle,
        cache_root: impl Into<PathBuf>,
    ) -> Self {
        let cache_root = cache_root.into();
        Self {
            fan_out: ExpertFanOut::new(experts, cache_root.clone()),
            consolidator: ConsolidationSupervisor::new(consolidator, cache_root.clone()),
            mapper: MappingSupervisor::new(mapper, cache_root),
        }
    }

    #[tracing::instrument(
        name = "extraction",
        target = "pipeline",
        skip(self, task, images),
        fields(task_id = %task.id, mock_mode = task.mock_mode, image_count = images.len())
    )]
    pub async fn extract(
        &self,
        task: &Task,
        images: &[ImageArtifact],
    ) -> Result<ExtractionResult, ExtractionError> {
        if task.mock_mode {
            let mut rng = StdRng::from_entropy();
            return Ok(mock::extract(task, images, &mut rng));
        }

        if self.fan_out.experts().is_empty() {
            return Err(invalid_request("no experts are configured"));
        }

        let expert_outputs = self.fan_out.run(task, images).await?;
        let mut report = self.consolidator.consolidate(task, &expert_outputs).await?;
        let table = self.mapper.map(task, &report).await?;
        remap_measurements_to_canonical(&task.request.measurements, &mut report, &table);

        let mapped = report.results().filter(|r| r.id.is_some()).count();
        let total = report.results().count();
        tracing::info!(
            target: "pipeline",
            task_id = %task.id,
            mock_mode = false,
            batch_count = report.batches.len(),
            mapped_results = mapped,
            unmapped_results = total - mapped,
            cost = format_args!("{:.7}", task.cost()),
            "extraction_completed"
        );

        Ok(ExtractionResult {
            request_id: task.id.clone(),
            consolidated_report: report,
            measurements_mapping: table,
            errors: None,
        })
    }
}
