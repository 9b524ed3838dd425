use anyhow::{Context, Result};

use certex::{
    adapters::build_pipeline,
    cli::cli_args_from_env,
    config::Config,
    logging::init_tracing,
    rasterize::PageImageRasterizer,
    response::to_coa_response,
    tasks::{load_task, load_task_images},
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli_args_from_env()?;
    let config = Config::load(&args.config_path)
        .with_context(|| format!("failed to load config from {}", args.config_path.display()))?;
    let _logging_guard = init_tracing(&config.logging).context("failed to initialize logging")?;

    let mock_mode = args.mock || config.mock_mode;
    let task = load_task(&config.storage.tasks_dir, &args.task_id, mock_mode)?;
    let images = load_task_images(&PageImageRasterizer, &config.storage.tasks_dir, &task)?;
    let pipeline = build_pipeline(&config).context("failed to build extraction pipeline")?;

    let result = match pipeline.extract(&task, &images).await {
        Ok(result) => result,
        Err(err) => {
            // Whatever was spent before the failure is still reported.
            tracing::error!(
                target: "pipeline",
                task_id = %task.id,
                error = %err,
                kind = ?err.kind,
                cost = format_args!("{:.7}", task.cost()),
                "extraction_failed"
            );
            return Err(err).with_context(|| format!("extraction failed for task {}", task.id));
        }
    };

    let response = to_coa_response(&task, &result);
    println!(
        "{}",
        serde_json::to_string_pretty(&response).context("failed to serialize response")?
    );
    eprintln!("task {} done, cost={:.7}", task.id, task.cost());
    Ok(())
}
