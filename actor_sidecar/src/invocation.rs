use std::collections::HashMap;
use std::fmt;

use crate::proto::{ActorInvokeV2Request, InvokeActorV2Alpha1Request};

/// Identity of an actor: its type plus its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorKey {
    pub actor_type: String,
    pub actor_id: String,
}

impl ActorKey {
    pub fn new(actor_type: impl Into<String>, actor_id: impl Into<String>) -> Self {
        Self {
            actor_type: actor_type.into(),
            actor_id: actor_id.into(),
        }
    }
}

impl fmt::Display for ActorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.actor_type, self.actor_id)
    }
}

impl From<&ActorInvokeV2Request> for ActorKey {
    fn from(request: &ActorInvokeV2Request) -> Self {
        ActorKey::new(request.actor_type.clone(), request.actor_id.clone())
    }
}

// -------------------------------------------------------------------------------------------------------

/// One outbound call of an actor method, addressed through the sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub app_id: String,
    pub actor: ActorKey,
    pub method: String,
    pub data: Vec<u8>,
    pub metadata: HashMap<String, String>,
}

impl Invocation {
    pub fn new(
        app_id: impl Into<String>,
        actor: ActorKey,
        method: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            actor,
            method: method.into(),
            data: data.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }
}

impl From<Invocation> for InvokeActorV2Alpha1Request {
    fn from(invocation: Invocation) -> Self {
        InvokeActorV2Alpha1Request {
            app_id: invocation.app_id,
            actor_type: invocation.actor.actor_type,
            actor_id: invocation.actor.actor_id,
            method: invocation.method,
            data: invocation.data,
            metadata: invocation.metadata,
        }
    }
}

/// The line printed for every response the driver receives.
pub fn format_response(data: &[u8]) -> String {
    format!("Response: {}", String::from_utf8_lossy(data))
}
