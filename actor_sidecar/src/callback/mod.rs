//! The server side: the sidecar calls back into this process whenever one of the actors
//! hosted here is invoked.

mod actor;
pub mod handler;
mod listener;
mod service;

pub use listener::{CallbackListener, ListenerState, start_listener};
pub use service::CallbackService;
