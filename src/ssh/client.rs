// ABOUTME: SSH session to the migration target built on russh.
// ABOUTME: Verifies the host key, authenticates, runs commands and streams files to the remote host.

use super::error::{Error, Result};
use parking_lot::Mutex;
use russh::client::{self, Config, Handle, Msg};
use russh::keys::agent::client::AgentClient;
use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key, ssh_key};
use russh::{Channel, ChannelMsg, Disconnect};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::UnixStream;

/// Keys tried under `~/.ssh` when neither a key file nor an agent is available.
const DEFAULT_KEYS: &[&str] = &["id_ed25519", "id_rsa", "id_ecdsa"];

/// SSH extended-data stream number carrying stderr.
const STDERR_STREAM: u32 = 1;

/// How to reach and authenticate against the remote host.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Explicit private key; otherwise the agent, then the default keys.
    pub key_path: Option<PathBuf>,
    /// Accept and record a host key that known_hosts has never seen.
    pub trust_on_first_use: bool,
    /// known_hosts file; `~/.ssh/known_hosts` when unset.
    pub known_hosts_path: Option<PathBuf>,
    /// Upper bound on a single remote command.
    pub command_timeout: Duration,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: user.into(),
            key_path: None,
            trust_on_first_use: false,
            known_hosts_path: None,
            command_timeout: Duration::from_secs(300),
        }
    }

    pub fn port(self, port: u16) -> Self {
        Self { port, ..self }
    }

    pub fn key_path(self, path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: Some(path.into()),
            ..self
        }
    }

    pub fn trust_on_first_use(self, trust_on_first_use: bool) -> Self {
        Self {
            trust_on_first_use,
            ..self
        }
    }

    pub fn known_hosts_path(self, path: impl Into<PathBuf>) -> Self {
        Self {
            known_hosts_path: Some(path.into()),
            ..self
        }
    }

    pub fn command_timeout(self, command_timeout: Duration) -> Self {
        Self {
            command_timeout,
            ..self
        }
    }
}

/// Exit status and captured streams of one remote command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: u32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Host key policy for one connection.
pub(crate) struct SshHandler {
    host: String,
    port: u16,
    trust_on_first_use: bool,
    known_hosts_path: Option<PathBuf>,
}

impl SshHandler {
    fn for_config(config: &SessionConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            trust_on_first_use: config.trust_on_first_use,
            known_hosts_path: config.known_hosts_path.clone(),
        }
    }

    fn lookup(&self, key: &ssh_key::PublicKey) -> std::result::Result<bool, russh::keys::Error> {
        match &self.known_hosts_path {
            Some(path) => check_known_hosts_path(&self.host, self.port, key, path),
            None => check_known_hosts(&self.host, self.port, key),
        }
    }

    fn remember(&self, key: &ssh_key::PublicKey) {
        let learned = match &self.known_hosts_path {
            Some(path) => learn_known_hosts_path(&self.host, self.port, key, path),
            None => learn_known_hosts(&self.host, self.port, key),
        };
        if let Err(e) = learned {
            tracing::warn!(host = %self.host, error = %e, "could not record host key");
        }
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let accepted = match self.lookup(server_public_key) {
            Ok(true) => true,
            // A changed key is refused even under trust-on-first-use.
            Err(russh::keys::Error::KeyChanged { .. }) => {
                tracing::error!(host = %self.host, "host key changed");
                false
            }
            Ok(false) if self.trust_on_first_use => {
                tracing::warn!(host = %self.host, port = self.port, "trusting unknown host key");
                self.remember(server_public_key);
                true
            }
            Err(e) if self.trust_on_first_use => {
                tracing::debug!(error = %e, "known_hosts unreadable, trusting on first use");
                true
            }
            Ok(false) | Err(_) => false,
        };
        Ok(accepted)
    }
}

/// Credential chosen for this session.
enum Credential {
    Agent(AgentClient<UnixStream>),
    Key(Arc<ssh_key::PrivateKey>),
}

impl Credential {
    /// Explicit key first, then the agent, then the default keys.
    async fn resolve(config: &SessionConfig) -> Result<Self> {
        if let Some(path) = &config.key_path {
            let key = load_secret_key(path, None).map_err(|e| Error::KeyLoadFailed {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            return Ok(Credential::Key(Arc::new(key)));
        }

        if let Ok(agent) = AgentClient::connect_env().await {
            return Ok(Credential::Agent(agent));
        }

        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| Error::AgentUnavailable("no SSH agent and HOME is not set".to_string()))?;
        DEFAULT_KEYS
            .iter()
            .map(|name| home.join(".ssh").join(name))
            .find_map(|path| load_secret_key(&path, None).ok())
            .map(|key| Credential::Key(Arc::new(key)))
            .ok_or_else(|| Error::AgentUnavailable("no SSH agent and no default key".to_string()))
    }

    async fn authenticate(self, handle: &mut Handle<SshHandler>, user: &str) -> Result<()> {
        let accepted = match self {
            Credential::Agent(mut agent) => {
                let identities = agent
                    .request_identities()
                    .await
                    .map_err(|e| Error::AgentUnavailable(format!("cannot list agent keys: {e}")))?;
                if identities.is_empty() {
                    return Err(Error::AgentUnavailable("agent holds no keys".to_string()));
                }
                let mut accepted = false;
                for identity in identities {
                    let result = handle
                        .authenticate_publickey_with(user, identity, None, &mut agent)
                        .await;
                    if matches!(result, Ok(ref r) if r.success()) {
                        accepted = true;
                        break;
                    }
                }
                accepted
            }
            Credential::Key(key) => {
                let hash = handle.best_supported_rsa_hash().await?.flatten();
                handle
                    .authenticate_publickey(user, PrivateKeyWithHashAlg::new(key, hash))
                    .await?
                    .success()
            }
        };
        if accepted {
            Ok(())
        } else {
            Err(Error::AuthenticationFailed)
        }
    }
}

/// Wait for the remote side of `channel` to finish and gather what it sent.
///
/// Fails with [`Error::ChannelClosed`] if no exit status arrived.
async fn collect(channel: &mut Channel<Msg>) -> Result<CommandOutput> {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut exit_code = None;
    let mut eof = false;

    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { data } => stdout.extend_from_slice(&data),
            ChannelMsg::ExtendedData { data, ext } if ext == STDERR_STREAM => {
                stderr.extend_from_slice(&data)
            }
            ChannelMsg::ExitStatus { exit_status } => exit_code = Some(exit_status),
            ChannelMsg::Eof => eof = true,
            ChannelMsg::Close => break,
            _ => {}
        }
        if eof && exit_code.is_some() {
            break;
        }
    }

    let exit_code = exit_code.ok_or(Error::ChannelClosed)?;
    Ok(CommandOutput {
        exit_code,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}

/// An authenticated SSH session.
pub struct Session {
    config: SessionConfig,
    handle: Arc<Handle<SshHandler>>,
    /// Socket tunnels closed on disconnect.
    tunnels: Mutex<Vec<super::forward::SocketTunnel>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("user", &self.config.user)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Connect, verify the host key and authenticate.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let credential = Credential::resolve(&config).await?;

        // Long helper runs leave the session idle; keepalives hold it open.
        let russh_config = Config {
            inactivity_timeout: None,
            keepalive_interval: Some(Duration::from_secs(15)),
            keepalive_max: 4,
            ..Default::default()
        };
        let address = (config.host.as_str(), config.port);
        let mut handle = client::connect(Arc::new(russh_config), address, SshHandler::for_config(&config))
            .await
            .map_err(|e| Error::Connection(format!("{}:{}: {e}", config.host, config.port)))?;

        credential.authenticate(&mut handle, &config.user).await?;
        tracing::debug!(host = %config.host, user = %config.user, "ssh session established");

        Ok(Self {
            config,
            handle: Arc::new(handle),
            tunnels: Mutex::new(Vec::new()),
        })
    }

    /// Host this session is connected to.
    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Whether `path` exists on the remote host.
    pub async fn file_exists(&self, path: &str) -> Result<bool> {
        let output = self.exec(&format!("test -e {}", super::shell_quote(path))).await?;
        Ok(output.success())
    }

    /// Run `command` through the remote shell, bounded by the configured timeout.
    pub async fn exec(&self, command: &str) -> Result<CommandOutput> {
        let timeout = self.config.command_timeout;
        tokio::time::timeout(timeout, async {
            let mut channel = self.open_exec(command).await?;
            collect(&mut channel).await
        })
        .await
        .map_err(|_| Error::CommandTimeout(timeout))?
    }

    async fn open_exec(&self, command: &str) -> Result<Channel<Msg>> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::CommandFailed(format!("cannot open channel: {e}")))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::CommandFailed(format!("cannot start '{command}': {e}")))?;
        Ok(channel)
    }

    /// Stream a local file into `remote_path` through `cat`, replacing any
    /// existing file.
    pub async fn copy_file(&self, local: &Path, remote_path: &str) -> Result<()> {
        let mut file = tokio::fs::File::open(local).await?;
        let transfer_failed = |e: russh::Error| Error::TransferFailed(format!("{remote_path}: {e}"));

        let mut channel = self
            .open_exec(&format!("cat > {}", super::shell_quote(remote_path)))
            .await?;
        let mut chunk = vec![0u8; 64 * 1024];
        loop {
            let n = file.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            channel.data(&chunk[..n]).await.map_err(transfer_failed)?;
        }
        channel.eof().await.map_err(transfer_failed)?;

        let output = collect(&mut channel).await?;
        if !output.success() {
            return Err(Error::TransferFailed(format!(
                "{remote_path}: remote cat exited {}: {}",
                output.exit_code,
                output.stderr.trim()
            )));
        }
        Ok(())
    }

    /// Expose `remote_socket` as a local Unix socket for the lifetime of the
    /// session and return the local path.
    pub async fn forward_socket(&self, remote_socket: &str) -> Result<String> {
        let tunnel =
            super::forward::SocketTunnel::open(Arc::clone(&self.handle), remote_socket.to_string())?;
        let path = tunnel
            .local_path()
            .to_str()
            .ok_or_else(|| Error::SocketForwardFailed("socket path is not valid UTF-8".to_string()))?
            .to_string();
        self.tunnels.lock().push(tunnel);
        Ok(path)
    }

    /// Close every tunnel, then the session.
    pub async fn disconnect(self) -> Result<()> {
        // Drain first so the lock is not held across the awaits.
        let tunnels: Vec<_> = self.tunnels.lock().drain(..).collect();
        for tunnel in tunnels {
            tunnel.close().await;
        }
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_override_defaults() {
        let config = SessionConfig::new("db1", "deploy")
            .port(2222)
            .key_path("/keys/id_ed25519")
            .trust_on_first_use(true)
            .command_timeout(Duration::from_secs(30));
        assert_eq!(config.port, 2222);
        assert_eq!(config.key_path.as_deref(), Some(Path::new("/keys/id_ed25519")));
        assert!(config.trust_on_first_use);
        assert!(config.known_hosts_path.is_none());
        assert_eq!(config.command_timeout, Duration::from_secs(30));
    }

    #[test]
    fn new_config_verifies_host_keys() {
        let config = SessionConfig::new("db1", "deploy");
        assert_eq!(config.port, 22);
        assert!(!config.trust_on_first_use);
        assert_eq!(config.command_timeout, Duration::from_secs(300));
    }
}
