use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info};
use ractor::{Actor, ActorId, ActorProcessingErr, ActorRef, RpcReplyPort, SpawnErr, async_trait};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::callback::handler;
use crate::config::HandlerConfig;
use crate::invocation::ActorKey;
use crate::proto::{ActorInvokeV2Request, ActorInvokeV2Response};

pub enum InvocationMsg {
    Invoke(ActorInvokeV2Request, RpcReplyPort<ActorInvokeV2Response>),
    /// sent to itself to check whether it has been idle for too long
    IdleCheck,
}

/// The live hosted actors, by identity.
pub type ActorMap = Arc<Mutex<HashMap<ActorKey, ActorRef<InvocationMsg>>>>;

/// Removes `key` from `actors` if it still refers to the actor `id`.
///
/// A newer activation of the same identity is left alone.
pub async fn forget_actor(actors: &ActorMap, key: &ActorKey, id: ActorId) -> bool {
    let mut actors = actors.lock().await;
    match actors.get(key) {
        Some(actor) if actor.get_id() == id => {
            actors.remove(key);
            true
        }
        _ => false,
    }
}

// -------------------------------------------------------------------------------------------------------

/// Hosts one actor identity. Its mailbox serializes invocations, so a single identity
/// handles one call at a time while different identities run concurrently.
pub struct HostedActor;

pub struct HostedActorArgs {
    pub key: ActorKey,
    pub config: Arc<HandlerConfig>,
    pub actors: ActorMap,
}

pub struct HostedActorState {
    key: ActorKey,
    config: Arc<HandlerConfig>,
    actors: ActorMap,
    invocations: u64,
    last_active: Instant,
}

#[async_trait]
impl Actor for HostedActor {
    type Msg = InvocationMsg;
    type State = HostedActorState;
    type Arguments = HostedActorArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        debug!("Activating actor {}", args.key);
        Ok(HostedActorState {
            key: args.key,
            config: args.config,
            actors: args.actors,
            invocations: 0,
            last_active: Instant::now(),
        })
    }

    async fn post_start(
        &self,
        myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        myself.send_after(state.config.idle_timeout, || InvocationMsg::IdleCheck);
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            InvocationMsg::Invoke(request, reply) => {
                state.invocations += 1;
                debug!(
                    "{} handling {} (invocation #{})",
                    state.key, request.method, state.invocations
                );
                println!("{}", handler::describe_request(&request));

                // emulate work
                tokio::time::sleep(state.config.delay).await;

                let response = handler::build_response(&state.config.reply, Utc::now());
                // the caller may have gone away, nothing to do then
                let _ = reply.send(response);
                state.last_active = Instant::now();
            }
            InvocationMsg::IdleCheck => {
                let idle = state.last_active.elapsed();
                if idle >= state.config.idle_timeout {
                    info!("Deactivating actor {} after {idle:?} without invocations", state.key);
                    // unregister before stopping so no new invocation is routed here
                    forget_actor(&state.actors, &state.key, myself.get_id()).await;
                    myself.stop(Some("idle".to_string()));
                } else {
                    myself.send_after(state.config.idle_timeout - idle, || {
                        InvocationMsg::IdleCheck
                    });
                }
            }
        }
        Ok(())
    }

    async fn post_stop(
        &self,
        myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        forget_actor(&state.actors, &state.key, myself.get_id()).await;
        debug!(
            "Deactivated actor {} after {} invocations",
            state.key, state.invocations
        );
        Ok(())
    }
}

pub async fn spawn_hosted_actor(
    key: ActorKey,
    config: Arc<HandlerConfig>,
    actors: ActorMap,
) -> Result<ActorRef<InvocationMsg>, SpawnErr> {
    // unnamed: the ractor registry is process-global
    let (actor_ref, _handle) = Actor::spawn(
        None,
        HostedActor,
        HostedActorArgs {
            key,
            config,
            actors,
        },
    )
    .await?;
    Ok(actor_ref)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ractor::rpc::CallResult;

    use super::*;
    use crate::proto::actor_invoke_v2_response;

    fn request(payload: &str) -> ActorInvokeV2Request {
        ActorInvokeV2Request {
            actor_type: "myactor".to_string(),
            actor_id: "123".to_string(),
            method: "hello".to_string(),
            data: Some(prost_types::Any {
                type_url: String::new(),
                value: payload.as_bytes().to_vec(),
            }),
            state: None,
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn replies_pong_after_the_delay() -> Result<(), Box<dyn std::error::Error>> {
        let config = Arc::new(HandlerConfig {
            delay: Duration::from_millis(100),
            ..HandlerConfig::default()
        });
        let actor = spawn_hosted_actor(ActorKey::new("myactor", "123"), config, ActorMap::default()).await?;

        let started = tokio::time::Instant::now();
        let result = actor
            .call(|rpc| InvocationMsg::Invoke(request("first call"), rpc), None)
            .await;
        let elapsed = started.elapsed();

        let Ok(CallResult::Success(response)) = result else {
            panic!("call did not succeed");
        };
        assert!(elapsed >= Duration::from_millis(100), "{elapsed:?}");
        assert_eq!(response.data.unwrap().value, b"pong");
        assert!(matches!(
            response.state,
            Some(actor_invoke_v2_response::State::Set(_))
        ));

        actor.stop(None);
        Ok(())
    }

    #[tokio::test]
    async fn one_identity_handles_one_call_at_a_time() -> Result<(), Box<dyn std::error::Error>> {
        let config = Arc::new(HandlerConfig {
            delay: Duration::from_millis(100),
            ..HandlerConfig::default()
        });
        let actor = spawn_hosted_actor(ActorKey::new("myactor", "123"), config, ActorMap::default()).await?;

        let started = tokio::time::Instant::now();
        let (a, b) = tokio::join!(
            actor.call(|rpc| InvocationMsg::Invoke(request("a"), rpc), None),
            actor.call(|rpc| InvocationMsg::Invoke(request("b"), rpc), None),
        );
        assert!(matches!(a, Ok(CallResult::Success(_))));
        assert!(matches!(b, Ok(CallResult::Success(_))));
        assert!(started.elapsed() >= Duration::from_millis(200));

        actor.stop(None);
        Ok(())
    }

    #[tokio::test]
    async fn idle_actor_deactivates_and_unregisters() -> Result<(), Box<dyn std::error::Error>> {
        let config = Arc::new(HandlerConfig {
            delay: Duration::from_millis(10),
            idle_timeout: Duration::from_millis(150),
            ..HandlerConfig::default()
        });
        let key = ActorKey::new("myactor", "123");
        let actors = ActorMap::default();
        let actor = spawn_hosted_actor(key.clone(), config, actors.clone()).await?;
        actors.lock().await.insert(key.clone(), actor.clone());

        // activity postpones deactivation
        tokio::time::sleep(Duration::from_millis(100)).await;
        let result = actor
            .call(|rpc| InvocationMsg::Invoke(request("keep alive"), rpc), None)
            .await;
        assert!(matches!(result, Ok(CallResult::Success(_))));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(actors.lock().await.contains_key(&key));

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(actors.lock().await.is_empty());
        assert_eq!(actor.get_status(), ractor::ActorStatus::Stopped);
        Ok(())
    }

    #[tokio::test]
    async fn forgetting_leaves_a_newer_activation_alone() -> Result<(), Box<dyn std::error::Error>> {
        let config = Arc::new(HandlerConfig::default());
        let key = ActorKey::new("myactor", "123");
        let actors = ActorMap::default();
        let stale = spawn_hosted_actor(key.clone(), config.clone(), actors.clone()).await?;
        let fresh = spawn_hosted_actor(key.clone(), config, actors.clone()).await?;
        actors.lock().await.insert(key.clone(), fresh.clone());

        assert!(!forget_actor(&actors, &key, stale.get_id()).await);
        assert!(actors.lock().await.contains_key(&key));

        assert!(forget_actor(&actors, &key, fresh.get_id()).await);
        assert!(actors.lock().await.is_empty());

        stale.stop(None);
        fresh.stop(None);
        Ok(())
    }
}
