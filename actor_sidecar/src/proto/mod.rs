//! Bindings for the sidecar's actor (v2 alpha) gRPC API.
//!
//! Generated from `proto/dapr/proto/runtime/v1/actors_v2.proto` and committed, so
//! building the crate does not need `protoc`.

#![allow(clippy::large_enum_variant)]

pub mod runtime {
    pub mod v1 {
        include!("dapr.proto.runtime.v1.rs");
    }
}

pub use runtime::v1::actor_invoke_v2_response::{self, SetActorState};
pub use runtime::v1::app_callback_alpha_client::AppCallbackAlphaClient;
pub use runtime::v1::app_callback_alpha_server::{AppCallbackAlpha, AppCallbackAlphaServer};
pub use runtime::v1::dapr_client::DaprClient;
pub use runtime::v1::dapr_server::{Dapr, DaprServer};
pub use runtime::v1::{
    ActorInvokeV2Request, ActorInvokeV2Response, InvokeActorV2Alpha1Request,
    InvokeActorV2Alpha1Response,
};
