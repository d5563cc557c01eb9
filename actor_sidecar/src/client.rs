use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use log::{debug, info};
use tonic::metadata::{Ascii, MetadataValue};
use tonic::codegen::InterceptedService;
use tonic::service::Interceptor;
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Status};

use crate::config::SidecarConfig;
use crate::driver::ActorInvoker;
use crate::invocation::Invocation;
use crate::proto::{DaprClient, InvokeActorV2Alpha1Request};

/// Metadata key carrying the sidecar API token.
pub const API_TOKEN_HEADER: &str = "dapr-api-token";

const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(250);

// -------------------------------------------------------------------------------------------------------

/// Adds the API token (if any) to every outbound call.
#[derive(Debug, Clone, Default)]
pub struct ApiTokenInterceptor {
    token: Option<MetadataValue<Ascii>>,
}

impl ApiTokenInterceptor {
    pub fn new(token: Option<&str>) -> Result<Self, anyhow::Error> {
        let token = token
            .map(|token| token.parse::<MetadataValue<Ascii>>())
            .transpose()
            .context("API token is not a valid header value")?;
        Ok(Self { token })
    }
}

impl Interceptor for ApiTokenInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        if let Some(token) = &self.token {
            request
                .metadata_mut()
                .insert(API_TOKEN_HEADER, token.clone());
        }
        Ok(request)
    }
}

// -------------------------------------------------------------------------------------------------------

/// Handle to the sidecar's gRPC API.
///
/// Cheap to clone; all clones share one connection, which closes once the last clone is
/// dropped.
#[derive(Debug, Clone)]
pub struct SidecarClient {
    inner: DaprClient<InterceptedService<Channel, ApiTokenInterceptor>>,
}

impl SidecarClient {
    /// Connects to the sidecar, waiting up to `config.connect_timeout` for it to come up.
    pub async fn connect(config: &SidecarConfig) -> Result<Self, anyhow::Error> {
        let endpoint = Endpoint::from_shared(config.endpoint.clone())
            .with_context(|| format!("invalid sidecar endpoint: {}", config.endpoint))?
            .connect_timeout(config.connect_timeout);
        let interceptor = ApiTokenInterceptor::new(config.api_token.as_deref())?;

        info!("Connecting to sidecar at: {}", config.endpoint);
        let channel = wait_for_sidecar(&endpoint, config.connect_timeout)
            .await
            .with_context(|| format!("sidecar at {} is not reachable", config.endpoint))?;
        info!("Sidecar connection established to: {}", config.endpoint);

        Ok(Self {
            inner: DaprClient::with_interceptor(channel, interceptor),
        })
    }

    pub async fn invoke_actor(&self, invocation: Invocation) -> Result<Vec<u8>, anyhow::Error> {
        let target = invocation.actor.clone();
        let method = invocation.method.clone();
        let request = InvokeActorV2Alpha1Request::from(invocation);

        // tonic clients need `&mut self`; clones share the channel
        let mut client = self.inner.clone();
        let response = client
            .invoke_actor_v2_alpha1(request)
            .await
            .with_context(|| format!("invoking {method} on {target}"))?;

        Ok(response.into_inner().data)
    }
}

#[async_trait]
impl ActorInvoker for SidecarClient {
    async fn invoke_actor(&self, invocation: Invocation) -> Result<Vec<u8>, anyhow::Error> {
        SidecarClient::invoke_actor(self, invocation).await
    }
}

/// Retries the connection until it succeeds or `timeout` has elapsed.
async fn wait_for_sidecar(endpoint: &Endpoint, timeout: Duration) -> Result<Channel, anyhow::Error> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match endpoint.connect().await {
            Ok(channel) => return Ok(channel),
            Err(err) if tokio::time::Instant::now() + CONNECT_RETRY_INTERVAL < deadline => {
                debug!("Sidecar not ready yet ({err}), retrying");
                tokio::time::sleep(CONNECT_RETRY_INTERVAL).await;
            }
            Err(err) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("gave up connecting after {timeout:?}")));
            }
        }
    }
}
