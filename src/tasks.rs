use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};

use crate::{
    rasterize::DocumentRasterizer,
    types::{ImageArtifact, Task, TaskRequest},
};

pub const REQUEST_FILE: &str = "request.json";

pub fn task_dir(tasks_dir: &Path, task_id: &str) -> PathBuf {
    tasks_dir.join(task_id)
}

/// Reads `<tasks_dir>/<task_id>/request.json`.
pub fn load_task(tasks_dir: &Path, task_id: &str, mock_mode: bool) -> Result<Task> {
    if task_id.is_empty() || task_id.contains(['/', '\\']) || task_id == "." || task_id == ".." {
        return Err(anyhow!("invalid task id {task_id:?}"));
    }

    let request_path = task_dir(tasks_dir, task_id).join(REQUEST_FILE);
    let content = fs::read_to_string(&request_path)
        .with_context(|| format!("failed to read {}", request_path.display()))?;
    let request: TaskRequest = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", request_path.display()))?;

    Ok(Task::new(task_id, request, mock_mode))
}

/// Pages of every document of the task, in document order. Document paths
/// are relative to the task directory unless absolute.
pub fn load_task_images(
    rasterizer: &dyn DocumentRasterizer,
    tasks_dir: &Path,
    task: &Task,
) -> Result<Vec<ImageArtifact>> {
    let base = task_dir(tasks_dir, &task.id);
    let mut images = Vec::new();
    for doc_file in &task.request.doc_files {
        let path = base.join(doc_file);
        let pages = rasterizer
            .rasterize(&path)
            .with_context(|| format!("failed to rasterize {}", path.display()))?;
        images.extend(pages);
    }

    tracing::info!(
        target: "tasks",
        task_id = %task.id,
        document_count = task.request.doc_files.len(),
        image_count = images.len(),
        "task_images_loaded"
    );
    Ok(images)
}
