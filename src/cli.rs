use std::{env, path::PathBuf};

use anyhow::{Result, anyhow};

const USAGE: &str = "usage: certex [--config <path>] [--mock] <task-id>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub config_path: PathBuf,
    pub mock: bool,
    pub task_id: String,
}

pub fn cli_args_from_env() -> Result<CliArgs> {
    parse_args(env::args().skip(1))
}

pub fn parse_args(args: impl IntoIterator<Item = String>) -> Result<CliArgs> {
    let mut args = args.into_iter();
    let mut config_path = None;
    let mut mock = false;
    let mut task_id = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("missing value for --config"))?;
                config_path = Some(PathBuf::from(value));
            }
            "--mock" => mock = true,
            other if other.starts_with("--") => {
                return Err(anyhow!("unknown argument: {other}. {USAGE}"));
            }
            other => {
                if task_id.replace(other.to_string()).is_some() {
                    return Err(anyhow!("only one task id may be given. {USAGE}"));
                }
            }
        }
    }

    Ok(CliArgs {
        config_path: config_path.unwrap_or_else(|| PathBuf::from("./certex.jsonc")),
        mock,
        task_id: task_id.ok_or_else(|| anyhow!("missing task id. {USAGE}"))?,
    })
}
