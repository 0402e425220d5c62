// ABOUTME: Test support utilities.
// ABOUTME: Tracing setup, a tiny HTTP responder, and simulated pipeline components.

use hoist::build::Builder;
use hoist::cancel::CancelToken;
use hoist::pipeline::Components;
use hoist::probe::HttpProbe;
use hoist::registry::DaemonRegistry;
use hoist::retry::RetryPolicy;
use hoist::runtime::{InMemoryRuntime, SimulatedRegistry};
use hoist::target::LocalDaemonTarget;
use hoist::types::ImageRef;
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("hoist=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Serve `status` to every request on an ephemeral localhost port.
#[allow(dead_code)]
pub async fn serve_status(status: u16) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {status} Status\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok"
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    port
}

/// A port with a listener that accepts connections and never answers.
#[allow(dead_code)]
pub async fn serve_silence() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    port
}

/// Fast retries so failing tests do not sleep for seconds.
#[allow(dead_code)]
pub fn quick_retry() -> RetryPolicy {
    RetryPolicy {
        attempts: 3,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
    }
}

/// Simulated build host, registry and deploy host sharing one registry.
#[allow(dead_code)]
pub struct Simulation {
    pub registry: Arc<SimulatedRegistry>,
    pub build_host: Arc<InMemoryRuntime>,
    pub deploy_host: Arc<InMemoryRuntime>,
}

#[allow(dead_code)]
impl Simulation {
    pub fn new() -> Self {
        let registry = SimulatedRegistry::new();
        Self {
            build_host: Arc::new(InMemoryRuntime::with_registry(Arc::clone(&registry))),
            deploy_host: Arc::new(InMemoryRuntime::with_registry(Arc::clone(&registry))),
            registry,
        }
    }

    /// Components deploying to the simulated host and probing real HTTP.
    pub fn components(&self, builder: impl Builder + 'static, cancel: &CancelToken) -> Components {
        Components {
            builder: Arc::new(builder),
            registry: Arc::new(DaemonRegistry::new(
                Arc::clone(&self.build_host),
                ImageRef::parse("registry.example.com/acme/web").unwrap(),
                quick_retry(),
                cancel.clone(),
            )),
            target: Arc::new(LocalDaemonTarget::on_host(
                Arc::clone(&self.deploy_host),
                "127.0.0.1",
                "web",
            )),
            probe: Arc::new(HttpProbe::new()),
        }
    }
}
