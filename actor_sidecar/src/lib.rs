//! Invoke actors through a runtime sidecar's gRPC API, and host the callback server the
//! sidecar dispatches those invocations to.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use actor_sidecar::{callback, client::SidecarClient, config, driver};
//! # async fn example() -> Result<(), anyhow::Error> {
//! let listener = callback::start_listener(config::ListenerConfig::default()).await?;
//! listener.wait_serving(std::time::Duration::from_secs(5)).await?;
//!
//! let client = SidecarClient::connect(&config::SidecarConfig::from_env()?).await?;
//! driver::run_plan(Arc::new(client), &driver::InvocationPlan::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod callback;
pub mod client;
pub mod config;
pub mod driver;
pub mod invocation;
pub mod proto;

pub use invocation::{ActorKey, Invocation};
