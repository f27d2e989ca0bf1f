// ABOUTME: Configuration types and parsing for ferry.yml and FERRY_* variables.
// ABOUTME: Settings come from file and environment; RunConfig is the frozen per-run view.

mod remote;

pub use remote::RemoteTarget;

use crate::error::{Error, Result};
use crate::runtime::{RuntimeConfig, RuntimeType};
use crate::ssh::SessionConfig;
use crate::types::{ContainerName, ImageRef};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "ferry.yml";
pub const CONFIG_FILENAME_ALT: &str = "ferry.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".ferry/config.yml";

pub const DEFAULT_BASE_IMAGE: &str = "debian:stable-slim";

pub const ENV_BASE_IMAGE: &str = "FERRY_BASE_IMAGE";
pub const ENV_RUNTIME: &str = "FERRY_RUNTIME";
pub const ENV_STAGING_DIR: &str = "FERRY_STAGING_DIR";
pub const ENV_SSH_KEY: &str = "FERRY_SSH_KEY";

/// Tunables read from an optional config file and the environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Image used for helper containers on both hosts.
    #[serde(default = "default_base_image")]
    pub base_image: String,

    /// Runtime family; auto-detected when unset.
    #[serde(default)]
    pub runtime: Option<RuntimeType>,

    /// Runtime API socket; defaults per family.
    #[serde(default)]
    pub socket: Option<String>,

    /// Parent of the local staging directory.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,

    #[serde(default = "default_stop_timeout", with = "humantime_serde")]
    pub stop_timeout: Duration,

    /// Per-request timeout for runtime API calls, including image load.
    #[serde(default = "default_runtime_timeout", with = "humantime_serde")]
    pub runtime_timeout: Duration,

    #[serde(default)]
    pub ssh: SshSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SshSettings {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Private key; SSH agent and default keys are tried when unset.
    #[serde(default)]
    pub key: Option<PathBuf>,

    #[serde(default)]
    pub known_hosts: Option<PathBuf>,

    #[serde(default)]
    pub trust_first_connection: bool,

    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,
}

fn default_base_image() -> String {
    DEFAULT_BASE_IMAGE.to_string()
}

fn default_staging_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_stop_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_runtime_timeout() -> Duration {
    Duration::from_secs(3600)
}

fn default_port() -> u16 {
    22
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(300)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_image: default_base_image(),
            runtime: None,
            socket: None,
            staging_dir: default_staging_dir(),
            stop_timeout: default_stop_timeout(),
            runtime_timeout: default_runtime_timeout(),
            ssh: SshSettings::default(),
        }
    }
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            key: None,
            known_hosts: None,
            trust_first_connection: false,
            command_timeout: default_command_timeout(),
        }
    }
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty file parses as null; treat it as all defaults.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::ConfigNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        Self::from_yaml(&content)
    }

    /// Load the first config file found in `dir`, or defaults when there is none.
    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading config");
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Apply `FERRY_*` overrides. Empty values are ignored.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(image) = get(ENV_BASE_IMAGE) {
            self.base_image = image;
        }
        if let Some(runtime) = get(ENV_RUNTIME) {
            self.runtime = Some(runtime.parse().map_err(|e| {
                Error::InvalidConfig(format!("{ENV_RUNTIME}: {e}"))
            })?);
        }
        if let Some(dir) = get(ENV_STAGING_DIR) {
            self.staging_dir = PathBuf::from(dir);
        }
        if let Some(key) = get(ENV_SSH_KEY) {
            self.ssh.key = Some(PathBuf::from(key));
        }
        Ok(self)
    }

    /// Apply overrides from the process environment.
    pub fn with_process_env(self) -> Result<Self> {
        self.with_env(|key| std::env::var(key).ok())
    }
}

/// Positional arguments and flags of one invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub container: String,
    pub user: String,
    pub host: String,
}

/// SSH options frozen for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshOptions {
    pub key: Option<PathBuf>,
    pub known_hosts: Option<PathBuf>,
    pub trust_first_connection: bool,
    #[serde(with = "humantime_serde")]
    pub command_timeout: Duration,
}

/// Everything a migration run needs, resolved once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub container: ContainerName,
    pub remote: RemoteTarget,
    pub base_image: ImageRef,
    pub runtime: RuntimeConfig,
    pub staging_root: PathBuf,
    #[serde(with = "humantime_serde")]
    pub stop_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub runtime_timeout: Duration,
    pub ssh: SshOptions,
    /// The ferry executable that helper containers run.
    pub helper_binary: PathBuf,
}

impl RunConfig {
    pub fn build(
        invocation: &Invocation,
        settings: &Settings,
        helper_binary: impl Into<PathBuf>,
    ) -> Result<Self> {
        let container = ContainerName::new(&invocation.container)
            .map_err(|e| Error::Usage(format!("invalid container '{}': {e}", invocation.container)))?;

        let remote = RemoteTarget::parse(&invocation.user, &invocation.host, settings.ssh.port)
            .map_err(Error::Usage)?;

        let base_image = ImageRef::parse(&settings.base_image).map_err(|e| {
            Error::InvalidConfig(format!("base image '{}': {e}", settings.base_image))
        })?;

        Ok(Self {
            container,
            remote,
            base_image,
            runtime: RuntimeConfig {
                runtime: settings.runtime,
                socket: settings.socket.clone(),
            },
            staging_root: settings.staging_dir.clone(),
            stop_timeout: settings.stop_timeout,
            runtime_timeout: settings.runtime_timeout,
            ssh: SshOptions {
                key: settings.ssh.key.clone(),
                known_hosts: settings.ssh.known_hosts.clone(),
                trust_first_connection: settings.ssh.trust_first_connection,
                command_timeout: settings.ssh.command_timeout,
            },
            helper_binary: helper_binary.into(),
        })
    }

    /// Same run, executed by a different ferry binary (resume from another build).
    pub fn with_helper_binary(self, helper_binary: impl Into<PathBuf>) -> Self {
        Self {
            helper_binary: helper_binary.into(),
            ..self
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::new(&self.remote.host, &self.remote.user)
            .port(self.remote.port)
            .trust_on_first_use(self.ssh.trust_first_connection)
            .command_timeout(self.ssh.command_timeout);
        if let Some(key) = &self.ssh.key {
            config = config.key_path(key);
        }
        if let Some(known_hosts) = &self.ssh.known_hosts {
            config = config.known_hosts_path(known_hosts);
        }
        config
    }
}
