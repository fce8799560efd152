//! Runs containerized workflow engines against an auto-detected host mount.
//!
//! A wrapper is itself started in a container with the docker socket and one
//! host directory bind-mounted at identical paths. [`WrapperRunner`] finds
//! that directory, writes the workflow config into `<mount>/Toil-<name>`,
//! runs `<name> run ...`, hands ownership of the outputs back to the host
//! user and removes the scratch directory.
//!
//! ```no_run
//! use pipeline_wrapper::{RunArgs, RunConfig, WrapperRunner};
//!
//! let config = RunConfig::new("toil-rnaseq", "RNA-seq pipeline", "output-dir: {output_dir}\n");
//! let runner = WrapperRunner::new(config.clone());
//! let command = runner.build_arg_parser();
//! let matches = command.clone().get_matches();
//! let args = RunArgs::from_matches(&command, &matches, &config);
//! let outcome = runner.run(&args, &[]).expect("wrapper run");
//! assert!(outcome.cleaned || args.flags.no_clean);
//! ```

pub mod cli;
pub mod definition;
mod error;
pub mod mount;
pub mod process;
pub mod runner;
pub mod template;
pub mod workdir;

pub use cli::{build_arg_parser, RunArgs, RunFlags};
pub use definition::{ArgumentSpec, WrapperDefinition};
pub use error::WrapperError;
pub use mount::{ContainerInspector, DockerCli, MountInfo, MountPoint};
pub use process::{CommandFailure, CommandRunner, SystemRunner};
pub use runner::{RunConfig, RunOutcome, WrapperRunner};
pub use workdir::{WorkDir, WorkDirState};
