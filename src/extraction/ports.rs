use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    extraction::{error::ExtractionError, types::UsageMetadata},
    types::ImageArtifact,
};

/// Logical model name and billing provider of a client handle. Carried next
/// to the handle instead of being read back from the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelIdentity {
    pub model_id: String,
    #[serde(default)]
    pub provider: Option<String>,
}

impl ModelIdentity {
    pub fn new(model_id: impl Into<String>, provider: Option<String>) -> Self {
        Self {
            model_id: model_id.into(),
            provider: provider.filter(|p| !p.trim().is_empty()),
        }
    }

    pub fn provider_label(&self) -> &str {
        self.provider.as_deref().unwrap_or("default")
    }
}

impl fmt::Display for ModelIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.provider {
            Some(provider) => write!(f, "{}-{}", provider, self.model_id),
            None => write!(f, "{}", self.model_id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExpertPrompt<'a> {
    pub system: &'a str,
    pub query: &'a str,
    pub images: &'a [ImageArtifact],
}

#[derive(Debug, Clone)]
pub struct ExpertReply {
    pub content: String,
    pub usage: UsageMetadata,
}

#[derive(Debug, Clone)]
pub struct SupervisorPrompt {
    pub system: String,
    pub user: String,
    pub schema_name: &'static str,
    pub schema: Value,
}

/// Raw structured answer. A parse problem is reported in `parsing_error`
/// rather than as an `Err`, which is reserved for transport failures.
#[derive(Debug, Clone)]
pub struct StructuredReply {
    pub parsed: Option<Value>,
    pub raw_content: String,
    pub raw_usage: UsageMetadata,
    pub parsing_error: Option<String>,
}

#[async_trait]
pub trait ExpertPort: Send + Sync {
    async fn invoke(
        &self,
        model: &ModelIdentity,
        prompt: ExpertPrompt<'_>,
    ) -> Result<ExpertReply, ExtractionError>;
}

#[async_trait]
pub trait SupervisorPort: Send + Sync {
    async fn invoke_structured(
        &self,
        model: &ModelIdentity,
        prompt: SupervisorPrompt,
    ) -> Result<StructuredReply, ExtractionError>;
}

#[derive(Clone)]
pub struct ExpertHandle {
    pub model: ModelIdentity,
    pub port: Arc<dyn ExpertPort>,
}

impl ExpertHandle {
    pub fn new(model: ModelIdentity, port: Arc<dyn ExpertPort>) -> Self {
        Self { model, port }
    }
}

#[derive(Clone)]
pub struct SupervisorHandle {
    pub model: ModelIdentity,
    pub port: Arc<dyn SupervisorPort>,
}

impl SupervisorHandle {
    pub fn new(model: ModelIdentity, port: Arc<dyn SupervisorPort>) -> Self {
        Self { model, port }
    }
}
