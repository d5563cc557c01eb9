use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use futures::FutureExt;
use log::{error, info};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;

use crate::callback::service::CallbackService;
use crate::config::ListenerConfig;
use crate::proto::AppCallbackAlphaServer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// binding the socket
    Starting,
    /// accepting invocations
    Serving,
    /// shut down, either cleanly or because serving failed
    Stopped,
}

/// Handle to a running callback listener.
pub struct CallbackListener {
    local_addr: SocketAddr,
    state: watch::Receiver<ListenerState>,
    service: Arc<CallbackService>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), anyhow::Error>>,
}

/// Binds `config.listen_addr` and starts serving callbacks in the background.
///
/// Failing to bind is an error here; errors while serving surface from
/// [`CallbackListener::join`].
pub async fn start_listener(config: ListenerConfig) -> Result<CallbackListener, anyhow::Error> {
    let (state_tx, state_rx) = watch::channel(ListenerState::Starting);

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind callback listener on {}", config.listen_addr))?;
    let local_addr = listener.local_addr()?;
    info!("Callback listener bound to: {local_addr}");

    let service = Arc::new(CallbackService::new(config.handler));
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let service_copy = service.clone();
    let task = tokio::spawn(async move {
        let _ = state_tx.send(ListenerState::Serving);

        let result = Server::builder()
            .add_service(AppCallbackAlphaServer::from_arc(service_copy.clone()))
            // a dropped handle counts as a shutdown request as well
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown_rx.map(drop))
            .await;

        service_copy.deactivate_all().await;
        let _ = state_tx.send(ListenerState::Stopped);

        match result {
            Ok(()) => {
                info!("Callback listener on {local_addr} stopped");
                Ok(())
            }
            Err(err) => {
                error!("Callback listener on {local_addr} failed: {err}");
                Err(anyhow::Error::new(err).context("callback listener failed"))
            }
        }
    });

    Ok(CallbackListener {
        local_addr,
        state: state_rx,
        service,
        shutdown: Some(shutdown_tx),
        task,
    })
}

impl CallbackListener {
    /// The address actually bound, useful when listening on port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    pub fn service(&self) -> &CallbackService {
        &self.service
    }

    /// Waits until the listener accepts invocations.
    pub async fn wait_serving(&self, timeout: Duration) -> Result<(), anyhow::Error> {
        let mut state = self.state.clone();
        let reached = tokio::time::timeout(
            timeout,
            state.wait_for(|state| *state != ListenerState::Starting),
        )
        .await
        .with_context(|| format!("callback listener not serving after {timeout:?}"))?
        .map(|state| *state)
        .map_err(|_| anyhow!("callback listener task is gone"))?;

        match reached {
            ListenerState::Serving => Ok(()),
            other => Err(anyhow!("callback listener is {other:?} instead of serving")),
        }
    }

    /// Resolves once the server has stopped, for whatever reason.
    pub async fn stopped(&self) {
        let mut state = self.state.clone();
        let _ = state
            .wait_for(|state| *state == ListenerState::Stopped)
            .await;
    }

    /// Asks the server to stop accepting invocations. In-flight calls finish first.
    pub fn shutdown(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            info!("Shutting down callback listener on {}", self.local_addr);
            let _ = shutdown.send(());
        }
    }

    /// Waits for the server task to end.
    pub async fn join(self) -> Result<(), anyhow::Error> {
        // keep the shutdown sender alive until the task is done
        let CallbackListener { task, shutdown, .. } = self;
        let result = task.await.context("callback listener task panicked")?;
        drop(shutdown);
        result
    }
}
