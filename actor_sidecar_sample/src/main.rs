use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use actor_sidecar::callback;
use actor_sidecar::client::SidecarClient;
use actor_sidecar::config::{self, HandlerConfig, ListenerConfig, SidecarConfig};
use actor_sidecar::driver::{self, InvocationPlan};
use clap::Parser;
use log::info;

const LISTENER_READY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address the callback listener binds to
    #[arg(long, default_value_t = config::DEFAULT_LISTEN_ADDR)]
    listen: SocketAddr,

    /// Application id the invocations are addressed to
    #[arg(long, default_value = "dev")]
    app_id: String,

    /// Actor type to invoke
    #[arg(long, default_value = "myactor")]
    actor_type: String,

    /// Calls per concurrent loop
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Pause after every call, and between the first call and the loops
    #[arg(long, default_value_t = 2000)]
    pause_ms: u64,

    /// Simulated processing time of every hosted actor invocation
    #[arg(long, default_value_t = 2000)]
    handler_delay_ms: u64,

    /// Deactivate a hosted actor after this many seconds without invocations
    #[arg(long, default_value_t = config::DEFAULT_IDLE_TIMEOUT.as_secs())]
    idle_timeout_secs: u64,

    /// Sidecar gRPC endpoint (e.g. 127.0.0.1:50001), overriding DAPR_GRPC_ENDPOINT / DAPR_GRPC_PORT
    #[arg(long)]
    sidecar: Option<String>,

    /// Only host the actors, until Ctrl-C
    #[arg(long)]
    serve_only: bool,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("ERROR: {:#}", e); // Pretty format with all causes
        std::process::exit(1);
    }
}

async fn run() -> Result<(), anyhow::Error> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let cli = Cli::parse();

    let mut listener = callback::start_listener(ListenerConfig {
        listen_addr: cli.listen,
        handler: HandlerConfig {
            delay: Duration::from_millis(cli.handler_delay_ms),
            idle_timeout: Duration::from_secs(cli.idle_timeout_secs),
            ..HandlerConfig::default()
        },
    })
    .await?;
    listener.wait_serving(LISTENER_READY_TIMEOUT).await?;
    println!("Hosting actors on: {}", listener.local_addr());

    if cli.serve_only {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Ctrl-C received");
            }
            _ = listener.stopped() => {}
        }
        listener.shutdown();
        return listener.join().await;
    }

    let result = drive(&cli).await;

    listener.shutdown();
    let stopped = listener.join().await;
    // a failed run is the more interesting error
    result?;
    stopped
}

async fn drive(cli: &Cli) -> Result<(), anyhow::Error> {
    let sidecar = match &cli.sidecar {
        Some(endpoint) => SidecarConfig {
            // token and timeout still come from the environment
            endpoint: SidecarConfig::new(endpoint).endpoint,
            ..SidecarConfig::from_env()?
        },
        None => SidecarConfig::from_env()?,
    };
    let client = SidecarClient::connect(&sidecar).await?;

    let pause = Duration::from_millis(cli.pause_ms);
    let plan = InvocationPlan {
        app_id: cli.app_id.clone(),
        actor_type: cli.actor_type.clone(),
        iterations: cli.iterations,
        settle: pause,
        pause,
        ..InvocationPlan::default()
    };

    let report = driver::run_plan(Arc::new(client), &plan).await?;
    info!("Done, {} invocations completed", report.total_calls());
    Ok(())
}

