// ABOUTME: Unix socket tunnel over an SSH direct-streamlocal channel.
// ABOUTME: Lets a local Engine API client reach a remote runtime socket.

use super::error::{Error, Result};
use super::session::HostKeyCheck;
use russh::client::Handle;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;

/// A listening local socket whose connections are relayed to a remote socket.
///
/// Dropping the tunnel stops accepting and removes the socket file.
pub struct Tunnel {
    local_path: PathBuf,
    remote: String,
    acceptor: JoinHandle<()>,
}

impl Tunnel {
    pub(crate) async fn open(handle: Arc<Handle<HostKeyCheck>>, remote: &str) -> Result<Self> {
        let local_path = local_socket_path();
        // A stale file from a crashed run would make bind fail.
        let _ = std::fs::remove_file(&local_path);

        let listener = UnixListener::bind(&local_path).map_err(|e| Error::Tunnel {
            remote: remote.to_string(),
            reason: format!("cannot bind {}: {}", local_path.display(), e),
        })?;

        let acceptor = tokio::spawn(accept_loop(listener, handle, remote.to_string()));
        tracing::debug!(local = %local_path.display(), remote, "tunnel open");

        Ok(Self {
            local_path,
            remote: remote.to_string(),
            acceptor,
        })
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn close(self) {
        drop(self);
    }
}

impl Drop for Tunnel {
    fn drop(&mut self) {
        self.acceptor.abort();
        let _ = std::fs::remove_file(&self.local_path);
    }
}

fn local_socket_path() -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("hoist-{}-{}.sock", std::process::id(), n))
}

async fn accept_loop(listener: UnixListener, handle: Arc<Handle<HostKeyCheck>>, remote: String) {
    loop {
        let stream = match listener.accept().await {
            Ok((stream, _)) => stream,
            Err(e) => {
                tracing::warn!(remote = %remote, "tunnel stopped accepting: {}", e);
                return;
            }
        };
        let handle = Arc::clone(&handle);
        let remote = remote.clone();
        tokio::spawn(async move {
            if let Err(e) = relay(stream, &handle, &remote).await {
                tracing::debug!(remote = %remote, "tunnel connection ended: {}", e);
            }
        });
    }
}

async fn relay(mut local: UnixStream, handle: &Handle<HostKeyCheck>, remote: &str) -> Result<()> {
    let channel = handle
        .channel_open_direct_streamlocal(remote)
        .await
        .map_err(|e| Error::Tunnel {
            remote: remote.to_string(),
            reason: e.to_string(),
        })?;

    let mut remote_stream = channel.into_stream();
    let (up, down) = tokio::io::copy_bidirectional(&mut local, &mut remote_stream).await?;
    tracing::trace!(up, down, "tunnel connection closed");
    Ok(())
}
