use std::{
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use certex::{
    extraction::{
        error::{ExtractionError, transport_failed},
        ports::{
            ExpertHandle, ExpertPort, ExpertPrompt, ExpertReply, ModelIdentity, StructuredReply,
            SupervisorHandle, SupervisorPort, SupervisorPrompt,
        },
        types::{
            ConsolidatedBatch, ConsolidatedMeasurementResult, ConsolidatedReport, MeasurementValue,
            UsageMetadata,
        },
    },
    types::{CanonicalMeasurement, Task, TaskRequest},
};

pub fn work_dir(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!("certex-{label}-test-{}", Uuid::now_v7()))
}

pub fn canonical(id: &str, name: &str) -> CanonicalMeasurement {
    CanonicalMeasurement {
        id: id.to_string(),
        name: name.to_string(),
        qualitative: false,
    }
}

pub fn task(id: &str, measurements: Vec<CanonicalMeasurement>, mock_mode: bool) -> Task {
    Task::new(
        id,
        TaskRequest {
            order_number: "PO-1001".to_string(),
            measurements,
            doc_files: vec![],
        },
        mock_mode,
    )
}

pub fn usage(input: u64, output: u64) -> UsageMetadata {
    UsageMetadata {
        input_tokens: input,
        output_tokens: output,
        cached_input_tokens: 0,
        reasoning_output_tokens: 0,
    }
}

pub fn result(description: &str) -> ConsolidatedMeasurementResult {
    ConsolidatedMeasurementResult {
        id: None,
        description: description.to_string(),
        value: Some(MeasurementValue::Number(1.0)),
        accept: true,
        flag_disagreement: false,
    }
}

pub fn report(batches: Vec<Vec<&str>>) -> ConsolidatedReport {
    ConsolidatedReport {
        order_number: Some("PO-1001".to_string()),
        product_name: Some("Glycerin".to_string()),
        flag_identification_warning: false,
        batches: batches
            .into_iter()
            .enumerate()
            .map(|(idx, descriptions)| ConsolidatedBatch {
                batch_number: Some(format!("B-{idx}")),
                expiration_date: None,
                results: descriptions.into_iter().map(result).collect(),
            })
            .collect(),
    }
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-12
}

pub struct FakeExpert {
    pub content: String,
    pub usage: UsageMetadata,
    pub delay: Option<Duration>,
    pub fail: bool,
    pub calls: Arc<AtomicUsize>,
}

impl FakeExpert {
    pub fn answering(content: &str) -> Self {
        Self {
            content: content.to_string(),
            usage: usage(1000, 1000),
            delay: None,
            fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::answering("")
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl ExpertPort for FakeExpert {
    async fn invoke(
        &self,
        _model: &ModelIdentity,
        _prompt: ExpertPrompt<'_>,
    ) -> Result<ExpertReply, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(transport_failed("connection reset by peer"));
        }
        Ok(ExpertReply {
            content: self.content.clone(),
            usage: self.usage,
        })
    }
}

pub fn expert(model_id: &str, port: FakeExpert) -> ExpertHandle {
    ExpertHandle::new(ModelIdentity::new(model_id, None), Arc::new(port))
}

pub struct FakeSupervisor {
    pub payload: Value,
    pub parsing_error: Option<String>,
    pub usage: UsageMetadata,
    pub calls: Arc<AtomicUsize>,
    pub last_prompt: Arc<Mutex<Option<SupervisorPrompt>>>,
}

impl FakeSupervisor {
    pub fn answering(payload: Value) -> Self {
        Self {
            payload,
            parsing_error: None,
            usage: usage(1000, 1000),
            calls: Arc::new(AtomicUsize::new(0)),
            last_prompt: Arc::new(Mutex::new(None)),
        }
    }

    pub fn unparseable(raw: &str) -> Self {
        Self {
            parsing_error: Some(format!("expected value at line 1 column 1 in {raw:?}")),
            ..Self::answering(Value::String(raw.to_string()))
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    pub fn last_prompt(&self) -> Arc<Mutex<Option<SupervisorPrompt>>> {
        Arc::clone(&self.last_prompt)
    }
}

#[async_trait]
impl SupervisorPort for FakeSupervisor {
    async fn invoke_structured(
        &self,
        _model: &ModelIdentity,
        prompt: SupervisorPrompt,
    ) -> Result<StructuredReply, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().expect("prompt lock") = Some(prompt);
        let raw_content = self.payload.to_string();
        Ok(match &self.parsing_error {
            Some(error) => StructuredReply {
                parsed: None,
                raw_content,
                raw_usage: self.usage,
                parsing_error: Some(error.clone()),
            },
            None => StructuredReply {
                parsed: Some(self.payload.clone()),
                raw_content,
                raw_usage: self.usage,
                parsing_error: None,
            },
        })
    }
}

pub fn supervisor(model_id: &str, port: FakeSupervisor) -> SupervisorHandle {
    SupervisorHandle::new(ModelIdentity::new(model_id, None), Arc::new(port))
}
