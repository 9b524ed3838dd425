use std::{
    fmt,
    sync::{Mutex, PoisonError},
};

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

pub type TaskId = String;
pub type CanonicalId = String;

/// Caller-defined target schema entry that extracted results are reconciled against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalMeasurement {
    pub id: CanonicalId,
    pub name: String,
    #[serde(default)]
    pub qualitative: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub order_number: String,
    #[serde(default)]
    pub measurements: Vec<CanonicalMeasurement>,
    #[serde(default)]
    pub doc_files: Vec<String>,
}

/// One extraction job. Lives for a single request.
///
/// The running cost is shared by the concurrent expert passes of one task, so it
/// sits behind a ledger with interior mutability instead of requiring `&mut Task`.
#[derive(Debug)]
pub struct Task {
    pub id: TaskId,
    pub request: TaskRequest,
    pub mock_mode: bool,
    cost: CostLedger,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, request: TaskRequest, mock_mode: bool) -> Self {
        Self {
            id: id.into(),
            request,
            mock_mode,
            cost: CostLedger::default(),
        }
    }

    pub fn cost(&self) -> f64 {
        self.cost.total()
    }

    pub fn add_cost(&self, amount: f64) {
        self.cost.add(amount);
    }
}

/// Monotonic cost accumulator. Not transactional: whatever was added before a
/// failure stays on the task.
#[derive(Debug, Default)]
pub struct CostLedger {
    total: Mutex<f64>,
}

impl CostLedger {
    pub fn add(&self, amount: f64) {
        let mut guard = self.total.lock().unwrap_or_else(PoisonError::into_inner);
        *guard += amount;
    }

    pub fn total(&self) -> f64 {
        *self.total.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A single rasterized page handed to the experts.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageArtifact {
    pub bytes: Vec<u8>,
    pub format: String,
    pub width: u32,
    pub height: u32,
}

impl ImageArtifact {
    pub fn mime_type(&self) -> String {
        format!("image/{}", self.format)
    }

    pub fn base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), self.base64())
    }
}

impl fmt::Debug for ImageArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Image ({}), {}x{}, {} bytes>",
            self.format,
            self.width,
            self.height,
            self.bytes.len()
        )
    }
}
