use std::{path::Path, time::Instant};

use serde::{Serialize, de::DeserializeOwned};

use crate::{
    cache::{CacheLookup, ContentAddressedCache, namespace_dir},
    extraction::{
        cost::usage_cost,
        error::{ExtractionError, internal_error, structured_parse_failed},
        ports::{SupervisorHandle, SupervisorPrompt},
    },
    types::Task,
};

/// Both supervisors answer once per task, so they share one fixed key.
pub const SUPERVISOR_CACHE_KEY: &str = "supervisor";

/// One cached structured supervisor round.
pub(crate) struct StructuredCall {
    pub stage: &'static str,
    pub namespace: &'static str,
    pub context: Vec<String>,
    pub prompt: SupervisorPrompt,
}

/// Cache hit returns the stored value with no call and no cost. On a miss the
/// supervisor is invoked, a parse problem is fatal, cost is added to the task,
/// and `finalize(parsed)` is what gets stored and returned.
pub(crate) async fn cached_structured_call<T>(
    supervisor: &SupervisorHandle,
    cache_root: &Path,
    task: &Task,
    call: StructuredCall,
    finalize: impl FnOnce(T) -> T,
) -> Result<T, ExtractionError>
where
    T: Serialize + DeserializeOwned,
{
    let model = &supervisor.model;
    let stage = call.stage;
    let cache = ContentAddressedCache::open(
        namespace_dir(cache_root, &task.id, call.namespace),
        &call.context,
    )?;

    match cache.lookup(SUPERVISOR_CACHE_KEY, |raw| serde_json::from_str::<T>(raw)) {
        CacheLookup::Hit(value) => {
            tracing::info!(
                target: "supervisor",
                task_id = %task.id,
                stage,
                model = %model.model_id,
                "supervisor_cache_hit"
            );
            return Ok(value);
        }
        CacheLookup::Miss => {}
        CacheLookup::Failure(failure) => {
            return Err(ExtractionError::from(failure).with_model(model.to_string()));
        }
    }

    tracing::debug!(
        target: "supervisor",
        task_id = %task.id,
        stage,
        model = %model.model_id,
        payload = %call.prompt.user,
        "supervisor_prompt"
    );

    let started = Instant::now();
    let reply = supervisor.port.invoke_structured(model, call.prompt).await?;
    let elapsed = started.elapsed();

    if let Some(parsing_error) = reply.parsing_error {
        tracing::error!(
            target: "supervisor",
            task_id = %task.id,
            stage,
            model = %model.model_id,
            error = %parsing_error,
            raw = %reply.raw_content,
            "supervisor_parse_failed"
        );
        return Err(structured_parse_failed(format!(
            "{stage} response could not be parsed: {parsing_error}"
        ))
        .with_model(model.to_string()));
    }

    let parsed = reply.parsed.ok_or_else(|| {
        tracing::error!(
            target: "supervisor",
            task_id = %task.id,
            stage,
            model = %model.model_id,
            raw = %reply.raw_content,
            "supervisor_parse_missing"
        );
        structured_parse_failed(format!("{stage} returned no structured output"))
            .with_model(model.to_string())
    })?;

    let value: T = serde_json::from_value(parsed).map_err(|err| {
        tracing::error!(
            target: "supervisor",
            task_id = %task.id,
            stage,
            model = %model.model_id,
            error = %err,
            raw = %reply.raw_content,
            "supervisor_parse_failed"
        );
        structured_parse_failed(format!("{stage} output does not match schema: {err}"))
            .with_model(model.to_string())
    })?;

    let cost = usage_cost(&model.model_id, model.provider.as_deref(), &reply.raw_usage, 0);
    task.add_cost(cost);
    tracing::info!(
        target: "supervisor",
        task_id = %task.id,
        stage,
        model = %model.model_id,
        elapsed_ms = elapsed.as_millis() as u64,
        input_tokens = reply.raw_usage.input_tokens,
        output_tokens = reply.raw_usage.output_tokens,
        cost = format_args!("{cost:.7}"),
        "supervisor_completed"
    );

    let value = finalize(value);
    let stored = serde_json::to_string(&value)
        .map_err(|err| internal_error(format!("failed to serialize {stage} output: {err}")))?;
    cache.put(SUPERVISOR_CACHE_KEY, &stored)?;
    tracing::debug!(
        target: "supervisor",
        task_id = %task.id,
        stage,
        payload = %stored,
        "supervisor_payload"
    );

    Ok(value)
}
