use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use ractor::ActorRef;
use ractor::rpc::CallResult;
use tonic::{Request, Response, Status};

use crate::callback::actor::{ActorMap, InvocationMsg, forget_actor, spawn_hosted_actor};
use crate::config::HandlerConfig;
use crate::invocation::ActorKey;
use crate::proto::{ActorInvokeV2Request, ActorInvokeV2Response, AppCallbackAlpha};

/// Receives invocations from the sidecar and routes each to the actor hosting its
/// identity, activating that actor on first use. Idle actors deactivate themselves.
pub struct CallbackService {
    config: Arc<HandlerConfig>,
    actors: ActorMap,
}

impl CallbackService {
    pub fn new(config: HandlerConfig) -> Self {
        Self {
            config: Arc::new(config),
            actors: ActorMap::default(),
        }
    }

    async fn actor_for(&self, key: &ActorKey) -> Result<ActorRef<InvocationMsg>, Status> {
        let mut actors = self.actors.lock().await;
        if let Some(actor) = actors.get(key) {
            return Ok(actor.clone());
        }

        let actor = spawn_hosted_actor(key.clone(), self.config.clone(), self.actors.clone())
            .await
            .map_err(|err| Status::internal(format!("failed to activate {key}: {err}")))?;
        info!("Activated actor {key}");
        actors.insert(key.clone(), actor.clone());
        Ok(actor)
    }

    /// Identities that currently have a live actor.
    pub async fn active_actors(&self) -> Vec<ActorKey> {
        let mut keys: Vec<ActorKey> = self.actors.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Stops every hosted actor.
    pub async fn deactivate_all(&self) {
        let mut actors = self.actors.lock().await;
        for (key, actor) in actors.drain() {
            info!("Deactivating actor {key}");
            actor.stop(None);
        }
    }
}

#[async_trait]
impl AppCallbackAlpha for CallbackService {
    async fn on_actor_invoke_v2(
        &self,
        request: Request<ActorInvokeV2Request>,
    ) -> Result<Response<ActorInvokeV2Response>, Status> {
        let request = request.into_inner();
        let key = ActorKey::from(&request);

        // an actor can deactivate between lookup and delivery: retry once on a fresh one
        let mut retried = false;
        loop {
            let actor = self.actor_for(&key).await?;
            let invocation = request.clone();

            match actor
                .call(|rpc| InvocationMsg::Invoke(invocation, rpc), None)
                .await
            {
                Ok(CallResult::Success(response)) => return Ok(Response::new(response)),
                Ok(CallResult::Timeout) => {
                    return Err(Status::deadline_exceeded(format!(
                        "{key} did not answer in time"
                    )));
                }
                Ok(CallResult::SenderError) | Err(_) if !retried => {
                    debug!("Actor {key} went away, activating a new one");
                    forget_actor(&self.actors, &key, actor.get_id()).await;
                    retried = true;
                }
                Ok(CallResult::SenderError) => {
                    forget_actor(&self.actors, &key, actor.get_id()).await;
                    return Err(Status::internal(format!("{key} dropped the invocation")));
                }
                Err(err) => {
                    warn!("Actor {key} is unreachable: {err}");
                    forget_actor(&self.actors, &key, actor.get_id()).await;
                    return Err(Status::internal(format!("{key} is unreachable: {err}")));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::callback::handler::DATE_FIELD;
    use crate::proto::actor_invoke_v2_response;

    fn request(actor_id: &str, payload: &str) -> Request<ActorInvokeV2Request> {
        Request::new(ActorInvokeV2Request {
            actor_type: "myactor".to_string(),
            actor_id: actor_id.to_string(),
            method: "hello".to_string(),
            data: Some(prost_types::Any {
                type_url: String::new(),
                value: payload.as_bytes().to_vec(),
            }),
            state: None,
            metadata: Default::default(),
        })
    }

    fn quick_config() -> HandlerConfig {
        HandlerConfig {
            delay: Duration::from_millis(50),
            ..HandlerConfig::default()
        }
    }

    #[tokio::test]
    async fn answers_pong_with_state_update() -> Result<(), Status> {
        let service = CallbackService::new(quick_config());

        let response = service
            .on_actor_invoke_v2(request("123", "first call"))
            .await?
            .into_inner();

        assert_eq!(response.data.unwrap().value, b"pong");
        let Some(actor_invoke_v2_response::State::Set(set)) = response.state else {
            panic!("expected a state update");
        };
        assert!(set.state.unwrap().fields.contains_key(DATE_FIELD));

        service.deactivate_all().await;
        Ok(())
    }

    #[tokio::test]
    async fn one_actor_per_identity() -> Result<(), Status> {
        let service = CallbackService::new(quick_config());

        service.on_actor_invoke_v2(request("123", "a")).await?;
        service.on_actor_invoke_v2(request("123", "b")).await?;
        service.on_actor_invoke_v2(request("456", "c")).await?;

        assert_eq!(
            service.active_actors().await,
            vec![ActorKey::new("myactor", "123"), ActorKey::new("myactor", "456")]
        );

        service.deactivate_all().await;
        assert!(service.active_actors().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn different_identities_run_concurrently() -> Result<(), Status> {
        let service = CallbackService::new(HandlerConfig {
            delay: Duration::from_millis(200),
            ..HandlerConfig::default()
        });

        let started = tokio::time::Instant::now();
        let (a, b) = tokio::join!(
            service.on_actor_invoke_v2(request("123", "a")),
            service.on_actor_invoke_v2(request("456", "b")),
        );
        a?;
        b?;
        // serialized handling would take at least 400ms
        assert!(started.elapsed() < Duration::from_millis(390));

        service.deactivate_all().await;
        Ok(())
    }

    #[tokio::test]
    async fn idle_identities_are_deactivated() -> Result<(), Status> {
        let service = CallbackService::new(HandlerConfig {
            delay: Duration::from_millis(10),
            idle_timeout: Duration::from_millis(300),
            ..HandlerConfig::default()
        });

        futures::future::try_join_all(
            (0..20).map(|id| service.on_actor_invoke_v2(request(&id.to_string(), "hello"))),
        )
        .await?;
        assert_eq!(service.active_actors().await.len(), 20);

        tokio::time::sleep(Duration::from_millis(800)).await;
        assert!(service.active_actors().await.is_empty());

        // a deactivated identity comes back on its next invocation
        service.on_actor_invoke_v2(request("7", "again")).await?;
        assert_eq!(
            service.active_actors().await,
            vec![ActorKey::new("myactor", "7")]
        );

        service.deactivate_all().await;
        Ok(())
    }

    #[tokio::test]
    async fn stopped_actor_is_replaced_transparently() -> Result<(), Status> {
        let service = CallbackService::new(quick_config());
        service.on_actor_invoke_v2(request("123", "a")).await?;

        // the actor stops, but a lookup already handed out its ref
        let key = ActorKey::new("myactor", "123");
        let stale = service.actors.lock().await[&key].clone();
        stale.stop(None);
        while stale.get_status() != ractor::ActorStatus::Stopped {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        service.actors.lock().await.insert(key.clone(), stale.clone());

        let response = service
            .on_actor_invoke_v2(request("123", "b"))
            .await?
            .into_inner();
        assert_eq!(response.data.unwrap().value, b"pong");

        let current = service.actors.lock().await[&key].clone();
        assert_ne!(current.get_id(), stale.get_id());

        service.deactivate_all().await;
        Ok(())
    }
}
