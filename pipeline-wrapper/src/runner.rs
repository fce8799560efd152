//! Orchestration of a single wrapped workflow run.

use std::path::{Path, PathBuf};

use clap::Command;
use tracing::{error, info};

use crate::cli::{self, RunArgs, OUTPUT_DIR};
use crate::mount::{self, ContainerInspector, DockerCli, MountInfo};
use crate::process::{shell_join, CommandFailure, CommandRunner, SystemRunner};
use crate::template;
use crate::workdir::{WorkDir, WorkDirState};
use crate::WrapperError;

/// Static description of a wrapped workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Engine executable; also names the work directory `Toil-<name>`.
    pub name: String,
    pub description: String,
    /// Config file body with `{key}` placeholders, see [`crate::template`].
    pub config_template: String,
    pub allow_no_clean: bool,
    pub allow_resume: bool,
}

impl RunConfig {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        config_template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            config_template: config_template.into(),
            allow_no_clean: true,
            allow_resume: true,
        }
    }

    pub fn with_no_clean(mut self, enabled: bool) -> Self {
        self.allow_no_clean = enabled;
        self
    }

    pub fn with_resume(mut self, enabled: bool) -> Self {
        self.allow_resume = enabled;
        self
    }
}

/// What a completed run did.
#[derive(Debug)]
pub struct RunOutcome {
    pub mount: MountInfo,
    pub workdir: PathBuf,
    pub workdir_state: WorkDirState,
    /// Set when the engine could not be spawned or exited non-zero.
    pub pipeline_failure: Option<CommandFailure>,
    pub cleaned: bool,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.pipeline_failure.is_none()
    }
}

/// Runs a workflow engine against the host directory shared with this
/// container.
pub struct WrapperRunner<I = DockerCli, R = SystemRunner> {
    config: RunConfig,
    inspector: I,
    runner: R,
}

impl WrapperRunner {
    /// Uses the container CLI from the environment and real child processes.
    pub fn new(config: RunConfig) -> Self {
        Self::with_backends(config, DockerCli::from_env(), SystemRunner)
    }
}

impl<I: ContainerInspector, R: CommandRunner> WrapperRunner<I, R> {
    pub fn with_backends(config: RunConfig, inspector: I, runner: R) -> Self {
        Self {
            config,
            inspector,
            runner,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn build_arg_parser(&self) -> Command {
        cli::build_arg_parser(&self.config)
    }

    pub fn resolve_mount(&self) -> Result<MountInfo, WrapperError> {
        mount::resolve_mount(&self.inspector)
    }

    /// Engine argv for a run in `workdir`.
    pub fn engine_command(
        &self,
        workdir: &WorkDir,
        restart: bool,
        pipeline_command: &[String],
    ) -> Vec<String> {
        let mut command = vec![
            self.config.name.clone(),
            "run".to_string(),
            path_arg(&workdir.job_store_path()),
            "--config".to_string(),
            path_arg(&workdir.config_path()),
            "--workDir".to_string(),
            path_arg(workdir.path()),
            "--retryCount".to_string(),
            "1".to_string(),
        ];
        command.extend(pipeline_command.iter().cloned());
        if restart {
            command.push("--restart".to_string());
        }
        command
    }

    /// Runs the workflow end to end.
    ///
    /// Errors returned from here happened before the engine was spawned, or
    /// while fixing ownership afterwards. An engine failure is logged and
    /// reported through [`RunOutcome::pipeline_failure`]; cleanup runs
    /// regardless.
    pub fn run(
        &self,
        args: &RunArgs,
        pipeline_command: &[String],
    ) -> Result<RunOutcome, WrapperError> {
        let mount = self.resolve_mount()?;
        let workdir = WorkDir::new(mount.workdir_for(&self.config.name));

        let mut values = args.values.clone();
        values.insert(OUTPUT_DIR.to_string(), path_arg(mount.path()));
        let config_body = template::render_config(&self.config.config_template, &values)?;

        let resume = self.config.allow_resume && args.flags.resume;
        let command = self.engine_command(&workdir, resume, pipeline_command);

        let workdir_state = workdir.prepare(resume)?;
        workdir.write_config(&config_body)?;

        info!(command = %shell_join(&command), "Starting pipeline");
        let pipeline_failure = match self.runner.run(&command) {
            Ok(()) => None,
            Err(failure) => {
                eprintln!("{}", failure);
                error!(error = %failure, "Pipeline failed");
                Some(failure)
            }
        };

        info!("Pipeline terminated, changing ownership of output files from root to user.");
        let ownership = self.fix_ownership(mount.path());

        let keep = self.config.allow_no_clean && args.flags.no_clean;
        let cleaned = if keep {
            info!(
                "Flag \"--no-clean\" was used, therefore {} was not deleted.",
                workdir.path().display()
            );
            false
        } else {
            info!("Cleaning up temporary directory: {}", workdir.path().display());
            if let Err(err) = workdir.remove() {
                ownership?;
                return Err(err);
            }
            true
        };
        ownership?;

        Ok(RunOutcome {
            mount,
            workdir: workdir.path().to_path_buf(),
            workdir_state,
            pipeline_failure,
            cleaned,
        })
    }

    /// Hands the mount tree back to the owner of the mount directory.
    fn fix_ownership(&self, mount: &Path) -> Result<(), WrapperError> {
        let (uid, gid) = owner_of(mount)?;
        let command = vec![
            "chown".to_string(),
            "-R".to_string(),
            format!("{}:{}", uid, gid),
            path_arg(mount),
        ];
        self.runner.run(&command).map_err(|failure| {
            error!(error = %failure, "Ownership change failed");
            WrapperError::Ownership(failure)
        })
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(unix)]
fn owner_of(path: &Path) -> Result<(u32, u32), WrapperError> {
    use std::os::unix::fs::MetadataExt;

    let meta = std::fs::metadata(path)
        .map_err(|err| WrapperError::io("Failed to stat mount", path, err))?;
    Ok((meta.uid(), meta.gid()))
}

#[cfg(not(unix))]
fn owner_of(path: &Path) -> Result<(u32, u32), WrapperError> {
    Err(WrapperError::environment(format!(
        "Cannot determine owner of {} on this platform",
        path.display()
    )))
}
