//! Request parameter handling: calling-convention normalization, required-key
//! validation and field expansion.

pub mod normalize;
pub mod tester;

pub use normalize::{normalize, CallingConvention};
pub use tester::ParamTester;

use serde_json::{Map, Value};

/// Mutable key/value parameters of one request.
pub type ParamBag = Map<String, Value>;

/// Lowercase shape tag of a value; `None` stands for an absent field.
pub fn type_check(value: Option<&Value>) -> &'static str {
    match value {
        None => "undefined",
        Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "boolean",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
    }
}

/// The action that triggered this call, for either calling convention:
/// `params.action` if present, else `params.hasura.action`.
pub fn get_action(params: &ParamBag) -> Option<Value> {
    if let Some(action) = params.get("action") {
        return Some(action.clone());
    }
    params
        .get("hasura")
        .and_then(|hasura| hasura.get("action"))
        .cloned()
}
