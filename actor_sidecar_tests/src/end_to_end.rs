use std::sync::Arc;
use std::time::Duration;

use actor_sidecar::callback::handler::DATE_FIELD;
use actor_sidecar::client::SidecarClient;
use actor_sidecar::config::{HandlerConfig, SidecarConfig};
use actor_sidecar::driver::{CallLoop, InvocationPlan, run_plan};
use actor_sidecar::invocation::{ActorKey, format_response};

use crate::fake_sidecar::{start_app_with, start_fake_sidecar, start_stack, stop_stack};

fn quick_plan() -> InvocationPlan {
    InvocationPlan {
        settle: Duration::from_millis(10),
        iterations: 3,
        pause: Duration::from_millis(10),
        ..InvocationPlan::default()
    }
}

#[tokio::test]
async fn first_call_comes_back_as_pong() -> anyhow::Result<()> {
    let (app, sidecar, client) = start_stack(Duration::from_millis(100), None).await?;

    let started = tokio::time::Instant::now();
    let data = client
        .invoke_actor(InvocationPlan::default().initial_invocation())
        .await?;

    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(data, b"pong");
    assert_eq!(format_response(&data), "Response: pong");

    drop(client);
    stop_stack(app, sidecar).await
}

#[tokio::test]
async fn request_reaches_the_actor_unchanged() -> anyhow::Result<()> {
    let (app, sidecar, client) = start_stack(Duration::from_millis(10), None).await?;

    client
        .invoke_actor(InvocationPlan::default().initial_invocation())
        .await?;

    let forwarded = sidecar.sidecar.forwarded();
    assert_eq!(forwarded.len(), 1);
    assert_eq!(forwarded[0].actor_type, "myactor");
    assert_eq!(forwarded[0].actor_id, "123");
    assert_eq!(forwarded[0].method, "hello");
    assert_eq!(forwarded[0].data.as_ref().unwrap().value, b"first call");
    assert_eq!(
        forwarded[0].metadata.get("foo").map(String::as_str),
        Some("bar")
    );
    assert_eq!(
        app.service().active_actors().await,
        vec![ActorKey::new("myactor", "123")]
    );

    drop(client);
    stop_stack(app, sidecar).await
}

#[tokio::test]
async fn state_is_handed_to_the_next_invocation() -> anyhow::Result<()> {
    let (app, sidecar, client) = start_stack(Duration::from_millis(10), None).await?;
    let plan = InvocationPlan::default();

    client.invoke_actor(plan.invocation("123", "one")).await?;
    client.invoke_actor(plan.invocation("123", "two")).await?;
    client.invoke_actor(plan.invocation("456", "three")).await?;

    let forwarded = sidecar.sidecar.forwarded();
    // first activation of each identity starts without state
    assert!(forwarded[0].state.is_none());
    assert!(forwarded[2].state.is_none());

    let state = forwarded[1].state.as_ref().expect("second call carries state");
    assert!(state.fields.contains_key(DATE_FIELD));

    let stored = sidecar
        .sidecar
        .state_of(&ActorKey::new("myactor", "456"))
        .expect("state stored for 456");
    assert!(stored.fields.contains_key(DATE_FIELD));

    drop(client);
    stop_stack(app, sidecar).await
}

#[tokio::test]
async fn full_plan_runs_to_completion() -> anyhow::Result<()> {
    let (app, sidecar, client) = start_stack(Duration::from_millis(20), None).await?;

    let report = run_plan(Arc::new(client), &quick_plan()).await?;

    assert_eq!(report.loop_calls, vec![3, 3, 3]);
    assert_eq!(report.total_calls(), 10);
    assert_eq!(sidecar.sidecar.forwarded().len(), 10);
    assert_eq!(
        app.service().active_actors().await,
        vec![ActorKey::new("myactor", "123"), ActorKey::new("myactor", "456")]
    );

    stop_stack(app, sidecar).await
}

#[tokio::test]
async fn unavailable_actor_aborts_the_run() -> anyhow::Result<()> {
    let unavailable = ActorKey::new("myactor", "456");
    let (app, sidecar, client) =
        start_stack(Duration::from_millis(20), Some(unavailable)).await?;

    let plan = InvocationPlan {
        iterations: 20,
        pause: Duration::from_millis(50),
        ..quick_plan()
    };
    let err = run_plan(Arc::new(client), &plan)
        .await
        .expect_err("the run must fail");

    let message = format!("{err:#}");
    assert!(message.contains("myactor/456"), "{message}");
    assert!(message.contains("no host for"), "{message}");

    // the sibling loops were cut short
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(sidecar.sidecar.forwarded().len() < 1 + 2 * 20);

    stop_stack(app, sidecar).await
}

#[tokio::test]
async fn api_token_is_sent_with_every_call() -> anyhow::Result<()> {
    let (app, sidecar, _) = start_stack(Duration::from_millis(10), None).await?;
    let client = SidecarClient::connect(&SidecarConfig {
        api_token: Some("s3cr3t".to_string()),
        ..sidecar.config()
    })
    .await?;

    let plan = InvocationPlan {
        loops: vec![CallLoop::new("789", "tick ")],
        iterations: 2,
        ..quick_plan()
    };
    run_plan(Arc::new(client), &plan).await?;

    let tokens = sidecar.sidecar.tokens();
    assert_eq!(tokens.len(), 3);
    assert!(tokens.iter().all(|token| token.as_deref() == Some("s3cr3t")));

    stop_stack(app, sidecar).await
}

#[tokio::test]
async fn identities_are_independent_but_each_is_sequential() -> anyhow::Result<()> {
    let (app, sidecar, client) = start_stack(Duration::from_millis(200), None).await?;
    let plan = InvocationPlan::default();

    // two identities, one call each: handled side by side
    let started = tokio::time::Instant::now();
    let results = futures::future::join_all(vec![
        client.invoke_actor(plan.invocation("123", "a")),
        client.invoke_actor(plan.invocation("456", "b")),
    ])
    .await;
    for result in results {
        result?;
    }
    assert!(started.elapsed() < Duration::from_millis(390));

    // one identity, two calls: one after the other
    let started = tokio::time::Instant::now();
    let results = futures::future::join_all(vec![
        client.invoke_actor(plan.invocation("123", "c")),
        client.invoke_actor(plan.invocation("123", "d")),
    ])
    .await;
    for result in results {
        result?;
    }
    assert!(started.elapsed() >= Duration::from_millis(400));

    drop(client);
    stop_stack(app, sidecar).await
}

#[tokio::test]
async fn idle_actors_do_not_pile_up() -> anyhow::Result<()> {
    let app = start_app_with(HandlerConfig {
        delay: Duration::from_millis(1),
        idle_timeout: Duration::from_millis(200),
        ..HandlerConfig::default()
    })
    .await?;
    let sidecar = start_fake_sidecar(app.local_addr(), None).await?;
    let client = SidecarClient::connect(&sidecar.config()).await?;
    let plan = InvocationPlan::default();

    for id in 0..100 {
        client
            .invoke_actor(plan.invocation(&id.to_string(), "hello"))
            .await?;
    }
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert!(app.service().active_actors().await.is_empty());
    assert_eq!(sidecar.sidecar.forwarded().len(), 100);

    drop(client);
    stop_stack(app, sidecar).await
}
