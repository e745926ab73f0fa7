//! Built-in pipeline callbacks over JSON values.
//!
//! | Kind | Names |
//! |------|-------|
//! | predicates | `truthy`, `falsy`, `is_number`, `is_string`, `is_object` |
//! | mappers | `identity`, `to_string`, `length`, `negate` |
//! | sinks | `print`, `log` |

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;
use strand_core::Registry;

/// Truthiness as a scripting language would judge it: `null`, `false`, `0`,
/// `NaN` and `""` are false, everything else (including empty arrays and
/// objects) is true.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn to_string(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}

fn length(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::from(s.chars().count()),
        Value::Array(items) => Value::from(items.len()),
        Value::Object(fields) => Value::from(fields.len()),
        _ => Value::Null,
    }
}

fn negate(value: &Value) -> Value {
    match value {
        Value::Bool(b) => Value::Bool(!b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64().and_then(i64::checked_neg) {
                Value::from(i)
            } else {
                n.as_f64().map(|f| Value::from(-f)).unwrap_or(Value::Null)
            }
        }
        _ => Value::Null,
    }
}

/// Builds the built-in registry. The `print` sink appends the compact JSON
/// form of each event to `printed`.
pub fn registry(printed: Rc<RefCell<Vec<String>>>) -> Registry<Value> {
    Registry::new()
        .with_predicate("truthy", |v: &Value, _| truthy(v))
        .with_predicate("falsy", |v: &Value, _| !truthy(v))
        .with_predicate("is_number", |v: &Value, _| v.is_number())
        .with_predicate("is_string", |v: &Value, _| v.is_string())
        .with_predicate("is_object", |v: &Value, _| v.is_object())
        .with_mapper("identity", |v: &Value, _| v.clone())
        .with_mapper("to_string", |v: &Value, _| to_string(v))
        .with_mapper("length", |v: &Value, _| length(v))
        .with_mapper("negate", |v: &Value, _| negate(v))
        .with_sink("print", move |v: &Value, _| {
            printed.borrow_mut().push(v.to_string())
        })
        .with_sink("log", |v: &Value, index| {
            tracing::info!(index, event = %v, "pipeline event")
        })
}
