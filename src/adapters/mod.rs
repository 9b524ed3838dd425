pub mod credentials;
pub mod openai_compatible;

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use anyhow::{Context, Result, anyhow};

use crate::{
    config::{Config, ModelRouteConfig},
    extraction::{
        ExtractionPipeline,
        ports::{ExpertHandle, SupervisorHandle},
    },
};

use self::openai_compatible::OpenAiCompatibleBackend;

/// Wires configured backends into a pipeline. Credentials are not touched
/// here; they resolve on the first call that needs them.
pub fn build_pipeline(config: &Config) -> Result<ExtractionPipeline> {
    let timeout = Duration::from_millis(config.request_timeout_ms);
    let mut backends = BTreeMap::new();
    for backend in &config.backends {
        let client = OpenAiCompatibleBackend::new(
            backend.id.clone(),
            backend.endpoint.clone(),
            backend.credential.clone(),
            timeout,
            backend.max_output_tokens,
        )
        .with_context(|| format!("failed to build backend {}", backend.id))?;
        if backends.insert(backend.id.clone(), Arc::new(client)).is_some() {
            return Err(anyhow!("duplicate backend id {}", backend.id));
        }
    }

    let lookup = |route: &ModelRouteConfig, role: &str| {
        backends.get(&route.backend_id).cloned().ok_or_else(|| {
            anyhow!(
                "{} model {} references unknown backend {}",
                role,
                route.model_id,
                route.backend_id
            )
        })
    };

    let experts = config
        .enabled_experts()
        .into_iter()
        .map(|route| -> Result<ExpertHandle> {
            Ok(ExpertHandle::new(route.identity(), lookup(route, "expert")?))
        })
        .collect::<Result<Vec<_>>>()?;
    if experts.is_empty() {
        return Err(anyhow!("at least one expert must be configured"));
    }

    let consolidator = SupervisorHandle::new(
        config.consolidator.identity(),
        lookup(&config.consolidator, "consolidator")?,
    );
    let mapper = SupervisorHandle::new(config.mapper.identity(), lookup(&config.mapper, "mapper")?);

    tracing::info!(
        target: "adapters",
        backend_count = backends.len(),
        expert_count = experts.len(),
        consolidator = %config.consolidator.identity(),
        mapper = %config.mapper.identity(),
        "pipeline_built"
    );

    Ok(ExtractionPipeline::new(
        experts,
        consolidator,
        mapper,
        config.storage.cache_dir.clone(),
    ))
}
