use std::time::Duration;

use actor_sidecar::callback::{self, ListenerState};
use actor_sidecar::config::{HandlerConfig, ListenerConfig};
use actor_sidecar::invocation::ActorKey;
use actor_sidecar::proto::{
    ActorInvokeV2Request, AppCallbackAlphaClient, DaprClient, InvokeActorV2Alpha1Request,
};
use tokio::net::TcpListener;

use crate::fake_sidecar::start_app;

#[tokio::test]
async fn serves_until_shut_down() -> anyhow::Result<()> {
    let mut app = start_app(Duration::from_millis(10)).await?;
    assert_eq!(app.state(), ListenerState::Serving);

    app.shutdown();
    tokio::time::timeout(Duration::from_secs(5), app.stopped()).await?;
    assert_eq!(app.state(), ListenerState::Stopped);

    app.join().await
}

#[tokio::test]
async fn shutdown_deactivates_hosted_actors() -> anyhow::Result<()> {
    let mut app = start_app(Duration::from_millis(10)).await?;

    let mut client =
        AppCallbackAlphaClient::connect(format!("http://{}", app.local_addr())).await?;
    client
        .on_actor_invoke_v2(ActorInvokeV2Request {
            actor_type: "myactor".to_string(),
            actor_id: "123".to_string(),
            method: "hello".to_string(),
            ..Default::default()
        })
        .await?;
    drop(client);
    assert_eq!(
        app.service().active_actors().await,
        vec![ActorKey::new("myactor", "123")]
    );

    app.shutdown();
    app.stopped().await;
    assert!(app.service().active_actors().await.is_empty());

    app.join().await
}

#[tokio::test]
async fn occupied_port_is_reported() -> anyhow::Result<()> {
    let squatter = TcpListener::bind("127.0.0.1:0").await?;

    let result = callback::start_listener(ListenerConfig {
        listen_addr: squatter.local_addr()?,
        handler: HandlerConfig::default(),
    })
    .await;

    let Err(err) = result else {
        panic!("binding an occupied port must fail");
    };
    assert!(format!("{err:#}").contains("failed to bind"), "{err:#}");
    Ok(())
}

#[tokio::test]
async fn unknown_methods_are_unimplemented() -> anyhow::Result<()> {
    let mut app = start_app(Duration::from_millis(10)).await?;

    // the listener only serves the callback API
    let mut client = DaprClient::connect(format!("http://{}", app.local_addr())).await?;
    let status = client
        .invoke_actor_v2_alpha1(InvokeActorV2Alpha1Request::default())
        .await
        .expect_err("the listener does not serve the sidecar API");
    assert_eq!(status.code(), tonic::Code::Unimplemented);
    drop(client);

    app.shutdown();
    app.join().await
}
