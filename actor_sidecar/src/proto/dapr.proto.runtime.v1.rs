// @generated
// This file is @generated by prost-build.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InvokeActorV2Alpha1Request {
    #[prost(string, tag = "1")]
    pub app_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub actor_type: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub actor_id: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub method: ::prost::alloc::string::String,
    #[prost(bytes = "vec", tag = "5")]
    pub data: ::prost::alloc::vec::Vec<u8>,
    #[prost(map = "string, string", tag = "6")]
    pub metadata: ::std::collections::HashMap<
        ::prost::alloc::string::String,
        ::prost::alloc::string::String,
    >,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InvokeActorV2Alpha1Response {
    #[prost(bytes = "vec", tag = "1")]
    pub data: ::prost::alloc::vec::Vec<u8>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ActorInvokeV2Request {
    #[prost(string, tag = "1")]
    pub actor_type: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub actor_id: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub method: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "4")]
    pub data: ::core::option::Option<::prost_types::Any>,
    /// State currently persisted for the actor, if any.
    #[prost(message, optional, tag = "5")]
    pub state: ::core::option::Option<::prost_types::Struct>,
    #[prost(map = "string, string", tag = "6")]
    pub metadata: ::std::collections::HashMap<
        ::prost::alloc::string::String,
        ::prost::alloc::string::String,
    >,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ActorInvokeV2Response {
    #[prost(message, optional, tag = "1")]
    pub data: ::core::option::Option<::prost_types::Any>,
    #[prost(oneof = "actor_invoke_v2_response::State", tags = "2")]
    pub state: ::core::option::Option<actor_invoke_v2_response::State>,
}
/// Nested message and enum types in `ActorInvokeV2Response`.
pub mod actor_invoke_v2_response {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SetActorState {
        #[prost(message, optional, tag = "1")]
        pub state: ::core::option::Option<::prost_types::Struct>,
    }
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum State {
        #[prost(message, tag = "2")]
        Set(SetActorState),
    }
}
include!("dapr.proto.runtime.v1.tonic.rs");
