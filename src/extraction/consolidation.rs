use std::path::PathBuf;

use crate::{
    cache::CONSOLIDATION_NAMESPACE,
    extraction::{
        error::ExtractionError,
        ports::{SupervisorHandle, SupervisorPrompt},
        prompts::{
            SUPERVISOR_SYSTEM_PROMPT, consolidation_cache_context, render_consolidation_prompt,
            schema_value,
        },
        supervisor::{StructuredCall, cached_structured_call},
        types::ConsolidatedReport,
    },
    types::Task,
};

/// Merges the raw expert outputs into one structured report.
pub struct ConsolidationSupervisor {
    supervisor: SupervisorHandle,
    cache_root: PathBuf,
}

impl ConsolidationSupervisor {
    pub fn new(supervisor: SupervisorHandle, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            supervisor,
            cache_root: cache_root.into(),
        }
    }

    pub async fn consolidate(
        &self,
        task: &Task,
        expert_outputs: &[String],
    ) -> Result<ConsolidatedReport, ExtractionError> {
        tracing::info!(
            target: "consolidation",
            task_id = %task.id,
            expert_count = expert_outputs.len(),
            model = %self.supervisor.model.model_id,
            "consolidation_started"
        );

        let call = StructuredCall {
            stage: "consolidation",
            namespace: CONSOLIDATION_NAMESPACE,
            context: consolidation_cache_context()?,
            prompt: SupervisorPrompt {
                system: SUPERVISOR_SYSTEM_PROMPT.to_string(),
                user: render_consolidation_prompt(expert_outputs),
                schema_name: "ConsolidatedReport",
                schema: schema_value::<ConsolidatedReport>()?,
            },
        };

        let mut report: ConsolidatedReport = cached_structured_call(
            &self.supervisor,
            &self.cache_root,
            task,
            call,
            |mut report: ConsolidatedReport| {
                report.clear_canonical_ids();
                report
            },
        )
        .await?;
        report.clear_canonical_ids();

        tracing::info!(
            target: "consolidation",
            task_id = %task.id,
            batch_count = report.batches.len(),
            identification_warning = report.flag_identification_warning,
            "consolidation_completed"
        );
        Ok(report)
    }
}
