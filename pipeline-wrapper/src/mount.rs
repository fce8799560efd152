//! Host mount detection.
//!
//! The wrapper runs inside a container that has the docker socket and one
//! host directory bind-mounted at the same path on both sides. Sibling
//! containers launched by the engine see that directory under the same path,
//! so it is where all work and output has to live.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;
use tracing::{debug, info};

use crate::WrapperError;

const SOCKET_MARKER: &str = "docker.sock";

/// Environment variable naming the container CLI; defaults to `docker`.
pub const RUNTIME_ENV: &str = "PIPELINE_WRAPPER_CONTAINER_RUNTIME";

const SOCKET_HINT: &str = "docker run -v /var/run/docker.sock:/var/run/docker.sock";

/// One entry of the `Mounts` array in container inspect output.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MountPoint {
    pub source: String,
    pub destination: String,
    #[serde(default, rename = "Type")]
    pub kind: Option<String>,
}

impl MountPoint {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            kind: Some("bind".to_string()),
        }
    }

    pub fn is_socket(&self) -> bool {
        self.source.contains(SOCKET_MARKER)
    }

    pub fn is_mirrored(&self) -> bool {
        self.source == self.destination
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectEntry {
    #[serde(default)]
    mounts: Vec<MountPoint>,
}

/// The host directory shared between this container and the engine's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    host_path: PathBuf,
}

impl MountInfo {
    pub fn new(host_path: impl Into<PathBuf>) -> Self {
        Self {
            host_path: host_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.host_path
    }

    /// `<mount>/Toil-<name>`
    pub fn workdir_for(&self, name: &str) -> PathBuf {
        self.host_path.join(format!("Toil-{}", name))
    }
}

/// Introspection of the container the wrapper is running in.
pub trait ContainerInspector {
    /// Names of running containers, most recently started first.
    fn running_containers(&self) -> Result<Vec<String>, WrapperError>;

    fn mounts(&self, container: &str) -> Result<Vec<MountPoint>, WrapperError>;
}

impl<I: ContainerInspector + ?Sized> ContainerInspector for &I {
    fn running_containers(&self) -> Result<Vec<String>, WrapperError> {
        (**self).running_containers()
    }

    fn mounts(&self, container: &str) -> Result<Vec<MountPoint>, WrapperError> {
        (**self).mounts(container)
    }
}

/// Talks to a docker-compatible CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
    runtime: String,
}

impl DockerCli {
    pub fn new(runtime: impl Into<String>) -> Self {
        Self {
            runtime: runtime.into(),
        }
    }

    pub fn from_env() -> Self {
        match env::var(RUNTIME_ENV) {
            Ok(val) if !val.trim().is_empty() => Self::new(val.trim()),
            _ => Self::new("docker"),
        }
    }

    pub fn runtime(&self) -> &str {
        &self.runtime
    }

    fn output(&self, args: &[&str]) -> Result<String, WrapperError> {
        debug!(runtime = %self.runtime, ?args, "querying container runtime");
        let output = Command::new(&self.runtime).args(args).output().map_err(|err| {
            WrapperError::environment(format!(
                "Failed to run container runtime '{}': {}",
                self.runtime, err
            ))
        })?;
        if !output.status.success() {
            return Err(WrapperError::environment(format!(
                "'{} {}' failed: {}",
                self.runtime,
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ContainerInspector for DockerCli {
    fn running_containers(&self) -> Result<Vec<String>, WrapperError> {
        let stdout = self.output(&["ps", "--format", "{{.Names}}"])?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn mounts(&self, container: &str) -> Result<Vec<MountPoint>, WrapperError> {
        let stdout = self.output(&["inspect", container])?;
        parse_inspect(&stdout)
    }
}

/// Mounts of the first container in `docker inspect` JSON output.
pub fn parse_inspect(raw: &str) -> Result<Vec<MountPoint>, WrapperError> {
    let entries: Vec<InspectEntry> = serde_json::from_str(raw).map_err(|err| {
        WrapperError::environment(format!("Failed to parse container inspect output: {}", err))
    })?;
    entries
        .into_iter()
        .next()
        .map(|entry| entry.mounts)
        .ok_or_else(|| WrapperError::environment("Container inspect output is empty"))
}

/// Picks the shared work directory out of a container's mounts.
pub fn select_work_mount(mounts: &[MountPoint]) -> Result<PathBuf, WrapperError> {
    let sockets = mounts.iter().filter(|m| m.is_socket()).count();
    if sockets != 1 {
        return Err(WrapperError::environment(format!(
            "Missing socket mount. Requires the following: {}",
            SOCKET_HINT
        )));
    }

    let work: Vec<&MountPoint> = if mounts.len() == 2 {
        if !mounts.iter().all(MountPoint::is_mirrored) {
            return Err(WrapperError::environment(
                "Docker Src/Dst mount points, invoked with the -v argument, must be the same \
                 if only using one mount point aside from the docker socket.",
            ));
        }
        mounts.iter().filter(|m| !m.is_socket()).collect()
    } else {
        mounts
            .iter()
            .filter(|m| m.is_mirrored() && !m.is_socket())
            .collect()
    };

    match work.as_slice() {
        [only] => Ok(PathBuf::from(&only.source)),
        _ => Err(WrapperError::environment(format!(
            "Wrong number of mirror mounts provided: expected exactly one host directory \
             mounted at the same path inside the container, found {}.",
            work.len()
        ))),
    }
}

/// Finds the work mount of the most recently started running container.
pub fn resolve_mount<I: ContainerInspector + ?Sized>(
    inspector: &I,
) -> Result<MountInfo, WrapperError> {
    let no_container = || {
        WrapperError::environment(format!(
            "No container detected, ensure Docker is being run with: \"{}\" as an argument.",
            SOCKET_HINT.trim_start_matches("docker run ")
        ))
    };
    let containers = inspector.running_containers().map_err(|err| {
        WrapperError::environment(format!("{}\n\n{}", no_container(), err))
    })?;
    let name = containers.first().ok_or_else(no_container)?;

    let mounts = inspector.mounts(name)?;
    let path = select_work_mount(&mounts)?;
    info!("The work mount is: {}", path.display());
    Ok(MountInfo::new(path))
}
