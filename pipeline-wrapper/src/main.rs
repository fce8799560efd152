use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pipeline_wrapper::{RunArgs, WrapperDefinition, WrapperRunner};
use tracing_subscriber::{fmt, EnvFilter};

/// Run a containerized workflow described by a wrapper definition
#[derive(Parser, Debug)]
#[command(name = "pipeline-wrapper", version, about)]
struct Cli {
    /// Path to the wrapper definition YAML
    #[arg(short, long, env = "PIPELINE_WRAPPER_DEFINITION", value_name = "FILE")]
    definition: PathBuf,

    /// Arguments for the workflow itself (use `-- --help` to list them)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    args: Vec<OsString>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let definition = WrapperDefinition::load(&cli.definition)
        .with_context(|| format!("loading wrapper definition {}", cli.definition.display()))?;
    let config = definition.run_config();

    let command = definition.command();
    let matches = command
        .clone()
        .try_get_matches_from(std::iter::once(OsString::from(&config.name)).chain(cli.args))
        .unwrap_or_else(|err| err.exit());
    let args = RunArgs::from_matches(&command, &matches, &config);
    let pipeline_command = definition.pipeline_command(&args)?;

    let runner = WrapperRunner::new(config);
    let outcome = runner.run(&args, &pipeline_command).map_err(|err| {
        tracing::error!(code = err.code(), "{}", err);
        err
    })?;

    if !outcome.succeeded() {
        tracing::warn!(
            workdir = %outcome.workdir.display(),
            "pipeline did not complete successfully"
        );
    }
    Ok(())
}
