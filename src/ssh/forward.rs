// ABOUTME: Local Unix socket tunnelled to a remote Unix socket over the SSH session.
// ABOUTME: Lets the runtime client talk to a remote docker or podman API socket.

use super::client::SshHandler;
use super::error::{Error, Result};
use russh::client::Handle;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};

/// How long `close` waits for in-flight connections to wind down.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// A listening local socket whose connections are relayed to `remote`.
///
/// Dropping the tunnel aborts it; [`SocketTunnel::close`] lets the accept
/// loop finish first.
pub struct SocketTunnel {
    local: PathBuf,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SocketTunnel {
    /// Bind a fresh local socket and start relaying to `remote` in the background.
    pub fn open(handle: Arc<Handle<SshHandler>>, remote: String) -> Result<Self> {
        let local = local_socket_path();
        // A stale socket from a crashed run would make bind fail.
        let _ = std::fs::remove_file(&local);
        let listener = UnixListener::bind(&local).map_err(|e| {
            Error::SocketForwardFailed(format!("cannot bind {}: {e}", local.display()))
        })?;
        tracing::debug!(local = %local.display(), remote, "socket tunnel listening");

        let (stop, stopped) = oneshot::channel();
        let task = tokio::spawn(accept_loop(listener, handle, remote, stopped));
        Ok(Self {
            local,
            stop: Some(stop),
            task: Some(task),
        })
    }

    pub fn local_path(&self) -> &Path {
        &self.local
    }

    /// Stop accepting, give open connections a grace period, remove the socket.
    pub async fn close(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(CLOSE_GRACE, &mut task).await.is_err() {
                tracing::debug!(local = %self.local.display(), "socket tunnel did not drain in time");
                task.abort();
            }
        }
        let _ = std::fs::remove_file(&self.local);
    }
}

impl Drop for SocketTunnel {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        let _ = std::fs::remove_file(&self.local);
    }
}

/// `<tmp>/ferry-<pid>-<n>.sock`, unique within this process.
fn local_socket_path() -> PathBuf {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    let n = NEXT.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("ferry-{}-{n}.sock", std::process::id()))
}

async fn accept_loop(
    listener: UnixListener,
    handle: Arc<Handle<SshHandler>>,
    remote: String,
    mut stopped: oneshot::Receiver<()>,
) {
    // Dropping the set on exit aborts relays still running.
    let mut relays = JoinSet::new();
    loop {
        tokio::select! {
            _ = &mut stopped => break,
            accepted = listener.accept() => match accepted {
                Ok((client, _)) => {
                    let handle = Arc::clone(&handle);
                    let remote = remote.clone();
                    relays.spawn(async move {
                        if let Err(e) = relay(client, &handle, &remote).await {
                            tracing::debug!(error = %e, "tunnelled connection ended with an error");
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "socket tunnel stopped accepting");
                    break;
                }
            },
            // Reap finished relays so the set does not grow unbounded.
            Some(_) = relays.join_next(), if !relays.is_empty() => {}
        }
    }
    let drain = async { while relays.join_next().await.is_some() {} };
    let _ = tokio::time::timeout(CLOSE_GRACE, drain).await;
}

/// Copy bytes both ways between one local client and a fresh
/// direct-streamlocal channel until either side closes.
async fn relay(mut client: UnixStream, handle: &Handle<SshHandler>, remote: &str) -> Result<()> {
    let channel = handle
        .channel_open_direct_streamlocal(remote)
        .await
        .map_err(|e| Error::SocketForwardFailed(format!("cannot open channel to {remote}: {e}")))?;
    let mut upstream = Box::pin(channel.into_stream());
    let (sent, received) = tokio::io::copy_bidirectional(&mut client, &mut upstream).await?;
    tracing::trace!(sent, received, "tunnelled connection closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_paths_are_unique_per_tunnel() {
        let first = local_socket_path();
        let second = local_socket_path();
        assert_ne!(first, second);
        assert!(first.starts_with(std::env::temp_dir()));
        let name = first.file_name().and_then(|n| n.to_str()).unwrap();
        assert!(name.starts_with(&format!("ferry-{}-", std::process::id())));
        assert!(name.ends_with(".sock"));
    }
}
