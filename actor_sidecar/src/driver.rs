//! Drives a fixed sequence of actor invocations: one initial call, then a fan-out of
//! concurrent loops joined by a barrier.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use log::{debug, info};
use tokio::task::JoinSet;

use crate::invocation::{ActorKey, Invocation, format_response};

/// Anything that can deliver an [`Invocation`] and hand back the response payload.
///
/// Implementations must be safe to call from several tasks at once.
#[async_trait]
pub trait ActorInvoker: Send + Sync + 'static {
    async fn invoke_actor(&self, invocation: Invocation) -> Result<Vec<u8>, anyhow::Error>;
}

// -------------------------------------------------------------------------------------------------------

/// One of the concurrent call loops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallLoop {
    pub actor_id: String,
    /// the iteration number is appended to form each payload
    pub payload_prefix: String,
}

impl CallLoop {
    pub fn new(actor_id: impl Into<String>, payload_prefix: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            payload_prefix: payload_prefix.into(),
        }
    }

    pub fn payload(&self, iteration: usize) -> String {
        format!("{}{}", self.payload_prefix, iteration)
    }
}

#[derive(Debug, Clone)]
pub struct InvocationPlan {
    pub app_id: String,
    pub actor_type: String,
    pub method: String,
    pub metadata: HashMap<String, String>,
    pub initial_actor_id: String,
    pub initial_payload: String,
    /// pause between the initial call and the start of the loops
    pub settle: Duration,
    pub loops: Vec<CallLoop>,
    pub iterations: usize,
    /// pause after every call inside a loop
    pub pause: Duration,
}

impl Default for InvocationPlan {
    fn default() -> Self {
        Self {
            app_id: "dev".to_string(),
            actor_type: "myactor".to_string(),
            method: "hello".to_string(),
            metadata: HashMap::from([("foo".to_string(), "bar".to_string())]),
            initial_actor_id: "123".to_string(),
            initial_payload: "first call".to_string(),
            settle: Duration::from_secs(2),
            loops: vec![
                // two loops against the same actor, one against a different actor
                CallLoop::new("123", "ciao mondo 1/"),
                CallLoop::new("123", "ciao mondo 2/"),
                CallLoop::new("456", "hello world "),
            ],
            iterations: 10,
            pause: Duration::from_secs(2),
        }
    }
}

impl InvocationPlan {
    pub fn invocation(&self, actor_id: &str, payload: impl Into<Vec<u8>>) -> Invocation {
        Invocation::new(
            self.app_id.clone(),
            ActorKey::new(self.actor_type.clone(), actor_id),
            self.method.clone(),
            payload,
        )
        .with_metadata(self.metadata.clone())
    }

    pub fn initial_invocation(&self) -> Invocation {
        self.invocation(&self.initial_actor_id, self.initial_payload.clone())
    }
}

/// How many calls completed, per phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverReport {
    pub initial_calls: usize,
    /// indexed like [`InvocationPlan::loops`]
    pub loop_calls: Vec<usize>,
}

impl DriverReport {
    pub fn total_calls(&self) -> usize {
        self.initial_calls + self.loop_calls.iter().sum::<usize>()
    }
}

// -------------------------------------------------------------------------------------------------------

/// Runs `plan` against `invoker`, printing every response as it arrives.
///
/// The initial call completes before any loop starts. Returns once every loop has
/// finished. The first failing call ends the run: the error is returned and the loops
/// still in flight are aborted.
pub async fn run_plan(
    invoker: Arc<dyn ActorInvoker>,
    plan: &InvocationPlan,
) -> Result<DriverReport, anyhow::Error> {
    let initial = plan.initial_invocation();
    info!("Invoking {} ({})", initial.actor, initial.method);
    let data = invoker
        .invoke_actor(initial)
        .await
        .context("initial invocation failed")?;
    println!("{}", format_response(&data));

    tokio::time::sleep(plan.settle).await;

    let mut loops = JoinSet::new();
    for (index, call_loop) in plan.loops.iter().enumerate() {
        let invocations: Vec<Invocation> = (0..plan.iterations)
            .map(|i| plan.invocation(&call_loop.actor_id, call_loop.payload(i)))
            .collect();

        loops.spawn(invocation_loop(
            index,
            invoker.clone(),
            invocations,
            plan.pause,
        ));
    }

    // join barrier
    let mut loop_calls = vec![0; plan.loops.len()];
    while let Some(joined) = loops.join_next().await {
        let (index, calls) = joined.context("invocation loop panicked")??;
        debug!("Loop #{index} finished after {calls} calls");
        loop_calls[index] = calls;
    }

    Ok(DriverReport {
        initial_calls: 1,
        loop_calls,
    })
}

async fn invocation_loop(
    index: usize,
    invoker: Arc<dyn ActorInvoker>,
    invocations: Vec<Invocation>,
    pause: Duration,
) -> Result<(usize, usize), anyhow::Error> {
    let mut calls = 0;
    for invocation in invocations {
        let target = invocation.actor.clone();
        let data = invoker
            .invoke_actor(invocation)
            .await
            .with_context(|| format!("loop #{index}: invocation #{calls} on {target} failed"))?;
        calls += 1;
        println!("{}", format_response(&data));

        tokio::time::sleep(pause).await;
    }
    Ok((index, calls))
}

// -------------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------------
