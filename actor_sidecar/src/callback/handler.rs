use chrono::{DateTime, Utc};
use prost_types::value::Kind;
use prost_types::{Any, Struct, Value};

use crate::proto::{ActorInvokeV2Request, ActorInvokeV2Response, SetActorState, actor_invoke_v2_response};

/// Key under which the handler records when it last ran.
pub const DATE_FIELD: &str = "date";

/// The line printed for every inbound invocation.
pub fn describe_request(request: &ActorInvokeV2Request) -> String {
    let data = request
        .data
        .as_ref()
        .map(|any| String::from_utf8_lossy(&any.value).into_owned())
        .unwrap_or_default();
    let state = request
        .state
        .as_ref()
        .map(struct_to_json)
        .unwrap_or(serde_json::Value::Null);

    format!("Request with data: '{data}' State: {state}")
}

/// State update instructing the runtime to persist `{"date": <now>}`.
pub fn state_update(now: DateTime<Utc>) -> Struct {
    let mut state = Struct::default();
    state.fields.insert(
        DATE_FIELD.to_string(),
        Value {
            kind: Some(Kind::StringValue(now.to_string())),
        },
    );
    state
}

pub fn build_response(reply: &[u8], now: DateTime<Utc>) -> ActorInvokeV2Response {
    ActorInvokeV2Response {
        data: Some(Any {
            type_url: String::new(),
            value: reply.to_vec(),
        }),
        state: Some(actor_invoke_v2_response::State::Set(SetActorState {
            state: Some(state_update(now)),
        })),
    }
}

// -------------------------------------------------------------------------------------------------------

pub fn struct_to_json(value: &Struct) -> serde_json::Value {
    serde_json::Value::Object(
        value
            .fields
            .iter()
            .map(|(key, value)| (key.clone(), value_to_json(value)))
            .collect(),
    )
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match &value.kind {
        None | Some(Kind::NullValue(_)) => serde_json::Value::Null,
        Some(Kind::NumberValue(n)) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Some(Kind::StringValue(s)) => serde_json::Value::String(s.clone()),
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(*b),
        Some(Kind::StructValue(s)) => struct_to_json(s),
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.iter().map(value_to_json).collect())
        }
    }
}
