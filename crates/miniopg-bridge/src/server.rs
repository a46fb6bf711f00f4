//! Listener lifecycle for the upload bridge.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use miniopg_core::config::ConfigStore;
use miniopg_core::storage::{S3Connector, StoreConnector};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{require_loopback, BridgeConfig};
use crate::error::BridgeError;
use crate::routes::{app_router, AppState};

const HANDOFF_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

struct RunningBridge {
    addr: SocketAddr,
    shutdown: Arc<watch::Sender<bool>>,
    task: JoinHandle<()>,
}

/// Owns the bridge listener. `start` and `stop` are idempotent.
pub struct BridgeServer {
    config: BridgeConfig,
    config_store: ConfigStore,
    connector: Arc<dyn StoreConnector>,
    running: Mutex<Option<RunningBridge>>,
}

impl BridgeServer {
    pub fn new(
        config: BridgeConfig,
        config_store: ConfigStore,
        connector: Arc<dyn StoreConnector>,
    ) -> Self {
        Self {
            config,
            config_store,
            connector,
            running: Mutex::new(None),
        }
    }

    /// Server backed by MinIO, using the config file named by `config`.
    pub fn from_config(config: BridgeConfig) -> Result<Self, BridgeError> {
        let config_store = match config.config_path.clone() {
            Some(path) => ConfigStore::at(path),
            None => ConfigStore::from_env().map_err(|error| BridgeError::config(error.to_string()))?,
        };
        Ok(Self::new(config, config_store, Arc::new(S3Connector)))
    }

    fn running(&self) -> MutexGuard<'_, Option<RunningBridge>> {
        self.running
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Whether the listener task is alive. A bridge stopped over `/shutdown`
    /// reports `false` once its task has wound down.
    pub fn is_running(&self) -> bool {
        self.running()
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }

    /// Address the listener is bound to, if running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running()
            .as_ref()
            .filter(|running| !running.task.is_finished())
            .map(|running| running.addr)
    }

    /// Bind and serve. When the port is taken, the current holder is asked to
    /// shut down and the bind is retried once after the handoff backoff.
    pub async fn start(&self) -> Result<SocketAddr, BridgeError> {
        if let Some(addr) = self.local_addr() {
            return Ok(addr);
        }
        require_loopback(self.config.bind_addr)
            .map_err(|error| BridgeError::config(error.to_string()))?;

        let listener = self.bind_with_handoff().await?;
        let addr = listener
            .local_addr()
            .map_err(|error| BridgeError::internal(format!("Failed to read bound address: {error}")))?;

        let mut running = self.running();
        if let Some(current) = running.as_ref().filter(|r| !r.task.is_finished()) {
            return Ok(current.addr);
        }

        let (sender, mut receiver) = watch::channel(false);
        let shutdown = Arc::new(sender);
        let state = AppState::new(
            self.config_store.clone(),
            self.connector.clone(),
            self.config.max_body_bytes,
            shutdown.clone(),
        );
        let router = app_router(state);

        let task = tokio::spawn(async move {
            let signal = async move {
                let _ = receiver.wait_for(|stop| *stop).await;
            };
            if let Err(error) = axum::serve(listener, router)
                .with_graceful_shutdown(signal)
                .await
            {
                tracing::error!(error = %error, "bridge listener failed");
            }
            tracing::info!(%addr, "bridge listener closed");
        });

        tracing::info!(%addr, "bridge listening");
        *running = Some(RunningBridge {
            addr,
            shutdown,
            task,
        });
        Ok(addr)
    }

    /// Close the listener and wait for in-flight requests. Does nothing when
    /// the bridge is not running.
    pub async fn stop(&self) {
        let Some(running) = self.running().take() else {
            return;
        };
        running.shutdown.send_replace(true);
        if let Err(error) = running.task.await {
            tracing::warn!(error = %error, "bridge task ended abnormally");
        }
    }

    /// Resolves once shutdown has been requested, locally or over HTTP.
    pub async fn stopped(&self) {
        let receiver = self
            .running()
            .as_ref()
            .map(|running| running.shutdown.subscribe());
        if let Some(mut receiver) = receiver {
            let _ = receiver.wait_for(|stop| *stop).await;
        }
    }

    /// Block until Ctrl-C or a `/shutdown` request, then stop.
    pub async fn wait_for_shutdown(&self) {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(error) = result {
                    tracing::warn!(error = %error, "failed to listen for Ctrl-C");
                }
                tracing::info!("interrupt received, shutting down");
            }
            () = self.stopped() => {}
        }
        self.stop().await;
    }

    async fn bind_with_handoff(&self) -> Result<TcpListener, BridgeError> {
        let addr = self.config.bind_addr;
        match TcpListener::bind(addr).await {
            Ok(listener) => Ok(listener),
            Err(error) if error.kind() == ErrorKind::AddrInUse => {
                tracing::warn!(%addr, "port in use, asking the running bridge to shut down");
                request_remote_shutdown(addr).await;
                tokio::time::sleep(self.config.handoff_backoff).await;
                TcpListener::bind(addr).await.map_err(|error| {
                    if error.kind() == ErrorKind::AddrInUse {
                        BridgeError::PortInUse { addr }
                    } else {
                        BridgeError::Bind {
                            addr,
                            source: error,
                        }
                    }
                })
            }
            Err(error) => Err(BridgeError::Bind {
                addr,
                source: error,
            }),
        }
    }
}

/// POST `/shutdown` to whatever listens on `addr`. Failures are only logged.
async fn request_remote_shutdown(addr: SocketAddr) {
    let url = format!("http://{addr}/shutdown");

    let client = match reqwest::Client::builder()
        .timeout(HANDOFF_REQUEST_TIMEOUT)
        .build()
    {
        Ok(client) => client,
        Err(error) => {
            tracing::warn!(error = %error, "failed to build handoff client");
            return;
        }
    };

    match client.post(&url).send().await {
        Ok(response) => tracing::info!(status = %response.status(), "previous bridge answered shutdown"),
        Err(error) => tracing::warn!(error = %error, url = %url, "shutdown handoff failed"),
    }
}
