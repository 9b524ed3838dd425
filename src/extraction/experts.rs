use std::{convert::Infallible, path::PathBuf, time::Instant};

use futures_util::future::try_join_all;

use crate::{
    cache::{CacheLookup, ContentAddressedCache, EXPERTS_NAMESPACE, namespace_dir},
    extraction::{
        cost::usage_cost,
        error::ExtractionError,
        ports::{ExpertHandle, ExpertPrompt},
        prompts::{EXPERT_QUERY_PROMPT, EXPERT_SYSTEM_PROMPT, expert_cache_context},
    },
    types::{ImageArtifact, Task},
};

/// Runs every configured expert over the same page images.
///
/// Experts run concurrently on the calling task and the fan-out resolves once
/// all of them have answered. The first failure abandons the remaining calls.
/// Outputs come back in configuration order, not completion order.
pub struct ExpertFanOut {
    experts: Vec<ExpertHandle>,
    cache_root: PathBuf,
}

impl ExpertFanOut {
    pub fn new(experts: Vec<ExpertHandle>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            experts,
            cache_root: cache_root.into(),
        }
    }

    pub fn experts(&self) -> &[ExpertHandle] {
        &self.experts
    }

    pub async fn run(
        &self,
        task: &Task,
        images: &[ImageArtifact],
    ) -> Result<Vec<String>, ExtractionError> {
        let cache = ContentAddressedCache::open(
            namespace_dir(&self.cache_root, &task.id, EXPERTS_NAMESPACE),
            &expert_cache_context(),
        )?;

        tracing::info!(
            target: "experts",
            task_id = %task.id,
            expert_count = self.experts.len(),
            image_count = images.len(),
            "expert_fan_out_started"
        );

        let passes = self
            .experts
            .iter()
            .map(|expert| extract_with_expert(expert, &cache, task, images));
        try_join_all(passes).await
    }
}

pub fn expert_cache_key(expert: &ExpertHandle) -> String {
    format!(
        "expert_response_{}_{}",
        expert.model.model_id,
        expert.model.provider_label()
    )
}

async fn extract_with_expert(
    expert: &ExpertHandle,
    cache: &ContentAddressedCache,
    task: &Task,
    images: &[ImageArtifact],
) -> Result<String, ExtractionError> {
    let model = &expert.model;
    tracing::info!(
        target: "experts",
        task_id = %task.id,
        model = %model.model_id,
        provider = model.provider_label(),
        "expert_extraction_started"
    );

    let cache_key = expert_cache_key(expert);
    match cache.lookup(&cache_key, |raw| Ok::<_, Infallible>(raw.to_string())) {
        CacheLookup::Hit(content) => {
            tracing::info!(
                target: "experts",
                task_id = %task.id,
                model = %model.model_id,
                provider = model.provider_label(),
                "expert_cache_hit"
            );
            tracing::debug!(
                target: "experts",
                task_id = %task.id,
                payload = %content,
                "expert_cached_payload"
            );
            return Ok(content);
        }
        CacheLookup::Miss => {}
        CacheLookup::Failure(failure) => {
            return Err(ExtractionError::from(failure).with_model(model.to_string()));
        }
    }

    let started = Instant::now();
    let reply = expert
        .port
        .invoke(
            model,
            ExpertPrompt {
                system: EXPERT_SYSTEM_PROMPT,
                query: EXPERT_QUERY_PROMPT,
                images,
            },
        )
        .await
        .map_err(|err| {
            tracing::warn!(
                target: "experts",
                task_id = %task.id,
                model = %model.model_id,
                error = %err,
                "expert_call_failed"
            );
            err
        })?;
    let elapsed = started.elapsed();

    let cost = usage_cost(
        &model.model_id,
        model.provider.as_deref(),
        &reply.usage,
        images.len(),
    );
    task.add_cost(cost);
    cache.put(&cache_key, &reply.content)?;

    tracing::info!(
        target: "experts",
        task_id = %task.id,
        model = %model.model_id,
        provider = model.provider_label(),
        elapsed_ms = elapsed.as_millis() as u64,
        input_tokens = reply.usage.input_tokens,
        output_tokens = reply.usage.output_tokens,
        cost = format_args!("{cost:.7}"),
        "expert_extraction_completed"
    );
    tracing::debug!(
        target: "experts",
        task_id = %task.id,
        payload = %reply.content,
        "expert_payload"
    );

    Ok(reply.content)
}
