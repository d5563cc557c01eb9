use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actor_sidecar::callback::{self, CallbackListener};
use actor_sidecar::client::{API_TOKEN_HEADER, SidecarClient};
use actor_sidecar::config::{HandlerConfig, ListenerConfig, SidecarConfig};
use actor_sidecar::invocation::ActorKey;
use actor_sidecar::proto::actor_invoke_v2_response::State;
use actor_sidecar::proto::{
    ActorInvokeV2Request, AppCallbackAlphaClient, Dapr, DaprServer, InvokeActorV2Alpha1Request,
    InvokeActorV2Alpha1Response, SetActorState,
};
use async_trait::async_trait;
use log::debug;
use prost_types::{Any, Struct};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Channel, Server};
use tonic::{Request, Response, Status};

/// Stands in for the sidecar: forwards `InvokeActorV2Alpha1` to the app's callback
/// listener and keeps the state each actor hands back, passing it along on that actor's
/// next invocation.
pub struct FakeSidecar {
    app: AppCallbackAlphaClient<Channel>,
    states: Mutex<HashMap<ActorKey, Struct>>,
    forwarded: Mutex<Vec<ActorInvokeV2Request>>,
    tokens: Mutex<Vec<Option<String>>>,
    unavailable: Option<ActorKey>,
}

impl FakeSidecar {
    /// every request passed on to the app, in arrival order
    pub fn forwarded(&self) -> Vec<ActorInvokeV2Request> {
        self.forwarded.lock().unwrap().clone()
    }

    /// the API token seen on every inbound call
    pub fn tokens(&self) -> Vec<Option<String>> {
        self.tokens.lock().unwrap().clone()
    }

    pub fn state_of(&self, key: &ActorKey) -> Option<Struct> {
        self.states.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl Dapr for FakeSidecar {
    async fn invoke_actor_v2_alpha1(
        &self,
        request: Request<InvokeActorV2Alpha1Request>,
    ) -> Result<Response<InvokeActorV2Alpha1Response>, Status> {
        let token = request
            .metadata()
            .get(API_TOKEN_HEADER)
            .and_then(|token| token.to_str().ok())
            .map(str::to_string);
        self.tokens.lock().unwrap().push(token);

        let request = request.into_inner();
        let key = ActorKey::new(request.actor_type.clone(), request.actor_id.clone());
        if self.unavailable.as_ref() == Some(&key) {
            return Err(Status::unavailable(format!("no host for {key}")));
        }

        let forwarded = ActorInvokeV2Request {
            actor_type: request.actor_type,
            actor_id: request.actor_id,
            method: request.method,
            data: Some(Any {
                type_url: String::new(),
                value: request.data,
            }),
            state: self.state_of(&key),
            metadata: request.metadata,
        };
        self.forwarded.lock().unwrap().push(forwarded.clone());
        debug!("Forwarding invocation of {key}");

        let response = self.app.clone().on_actor_invoke_v2(forwarded).await?.into_inner();

        if let Some(State::Set(SetActorState { state: Some(state) })) = response.state {
            self.states.lock().unwrap().insert(key, state);
        }

        Ok(Response::new(InvokeActorV2Alpha1Response {
            data: response.data.map(|data| data.value).unwrap_or_default(),
        }))
    }
}

// -------------------------------------------------------------------------------------------------------

pub struct RunningSidecar {
    pub addr: SocketAddr,
    pub sidecar: Arc<FakeSidecar>,
    task: JoinHandle<()>,
}

impl RunningSidecar {
    /// Client configuration pointing at this sidecar.
    pub fn config(&self) -> SidecarConfig {
        SidecarConfig {
            connect_timeout: Duration::from_secs(2),
            ..SidecarConfig::new(&self.addr.to_string())
        }
    }
}

impl Drop for RunningSidecar {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Serves a [`FakeSidecar`] on an ephemeral port, forwarding to the listener at `app_addr`.
///
/// Invocations of `unavailable` fail with `UNAVAILABLE` without reaching the app.
pub async fn start_fake_sidecar(
    app_addr: SocketAddr,
    unavailable: Option<ActorKey>,
) -> Result<RunningSidecar, anyhow::Error> {
    let app = AppCallbackAlphaClient::connect(format!("http://{app_addr}")).await?;
    let sidecar = Arc::new(FakeSidecar {
        app,
        states: Mutex::new(HashMap::new()),
        forwarded: Mutex::new(Vec::new()),
        tokens: Mutex::new(Vec::new()),
        unavailable,
    });

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let service = DaprServer::from_arc(sidecar.clone());
    let task = tokio::spawn(async move {
        let _ = Server::builder()
            .add_service(service)
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await;
    });

    Ok(RunningSidecar {
        addr,
        sidecar,
        task,
    })
}

/// Starts a callback listener on an ephemeral loopback port and waits until it serves.
pub async fn start_app(handler_delay: Duration) -> Result<CallbackListener, anyhow::Error> {
    start_app_with(HandlerConfig {
        delay: handler_delay,
        ..HandlerConfig::default()
    })
    .await
}

pub async fn start_app_with(handler: HandlerConfig) -> Result<CallbackListener, anyhow::Error> {
    let listener = callback::start_listener(ListenerConfig {
        listen_addr: "127.0.0.1:0".parse()?,
        handler,
    })
    .await?;
    listener.wait_serving(Duration::from_secs(5)).await?;
    Ok(listener)
}

/// A listener plus a fake sidecar in front of it, and a client connected to the sidecar.
pub async fn start_stack(
    handler_delay: Duration,
    unavailable: Option<ActorKey>,
) -> Result<(CallbackListener, RunningSidecar, SidecarClient), anyhow::Error> {
    let app = start_app(handler_delay).await?;
    let sidecar = start_fake_sidecar(app.local_addr(), unavailable).await?;
    let client = SidecarClient::connect(&sidecar.config()).await?;
    Ok((app, sidecar, client))
}

/// Tears down what [`start_stack`] started, the sidecar first so no connection keeps the
/// listener's graceful shutdown waiting.
pub async fn stop_stack(
    mut app: CallbackListener,
    sidecar: RunningSidecar,
) -> Result<(), anyhow::Error> {
    drop(sidecar);
    app.shutdown();
    app.join().await
}
