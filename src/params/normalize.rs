//! Decoding of the two inbound calling conventions.
//!
//! An action gateway (Hasura actions) wraps the parameters as
//! `{"input": {...}, "session_variables": {...}, "action": {"name": ...}}`;
//! direct callers send the parameters as the body itself. The envelope is
//! recognised by the presence of all three keys, so a direct payload that
//! happens to carry all of them is decoded as an envelope.

use serde_json::{json, Map, Value};

const ENVELOPE_KEYS: [&str; 3] = ["input", "session_variables", "action"];

#[derive(Debug, Clone, PartialEq)]
pub enum CallingConvention {
    Gateway {
        input: Value,
        action: Value,
        session_variables: Value,
    },
    Raw(Value),
}

impl CallingConvention {
    pub fn decode(body: Value) -> Self {
        match body {
            Value::Object(mut map) if ENVELOPE_KEYS.iter().all(|k| map.contains_key(*k)) => {
                Self::Gateway {
                    input: map.remove("input").unwrap_or_default(),
                    action: map.remove("action").unwrap_or_default(),
                    session_variables: map.remove("session_variables").unwrap_or_default(),
                }
            }
            other => Self::Raw(other),
        }
    }

    pub fn is_gateway(&self) -> bool {
        matches!(self, Self::Gateway { .. })
    }

    /// Canonical parameters: the raw body, or the envelope's input annotated
    /// with `hasura: {action, session_variables}`.
    pub fn into_params(self) -> Value {
        match self {
            Self::Raw(body) => body,
            Self::Gateway {
                input,
                action,
                session_variables,
            } => {
                let mut params = match input {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                let action_name = action.get("name").cloned().unwrap_or_default();
                params.insert(
                    "hasura".to_string(),
                    json!({
                        "action": action_name,
                        "session_variables": session_variables,
                    }),
                );
                Value::Object(params)
            }
        }
    }
}

pub fn normalize(body: Value) -> Value {
    CallingConvention::decode(body).into_params()
}
