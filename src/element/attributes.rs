// ============================================================================
// spark-element - Attribute Coercion
// Raw attribute strings ↔ typed property values
// ============================================================================

use crate::errors::CoercionError;
use crate::types::{TypeTag, Value};

// =============================================================================
// COERCION
// =============================================================================

/// Coerce a raw attribute string into a typed value.
///
/// `raw` is `None` when the attribute is absent or was removed. Booleans are
/// presence-based; numbers must parse fully; objects must be valid JSON and
/// parse failures propagate to the caller instead of being swallowed.
pub fn coerce_attribute(
    type_tag: TypeTag,
    raw: Option<&str>,
) -> Result<Value, CoercionError> {
    let Some(raw) = raw else {
        return Ok(match type_tag {
            TypeTag::Bool => Value::Bool(false),
            _ => Value::Null,
        });
    };

    match type_tag {
        TypeTag::Bool => Ok(Value::Bool(true)),
        TypeTag::String => Ok(Value::String(raw.to_string())),
        TypeTag::Number => raw
            .trim()
            .parse::<f64>()
            .map(Value::Number)
            .map_err(|_| CoercionError::InvalidNumber(raw.to_string())),
        TypeTag::Object => {
            let parsed = serde_json::from_str(raw)?;
            Ok(Value::Object(parsed))
        }
    }
}

// =============================================================================
// REFLECTION
// =============================================================================

/// Serialize a property value for attribute reflection.
///
/// `None` means "remove the attribute": null values, and `false` for
/// presence-based booleans.
pub fn reflect_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(false) => None,
        Value::Bool(true) => Some(String::new()),
        Value::Number(n) => {
            if n.fract() == 0.0 && n.is_finite() {
                Some(format!("{}", *n as i64))
            } else {
                Some(n.to_string())
            }
        }
        Value::String(s) => Some(s.clone()),
        Value::Object(v) => serde_json::to_string(v).ok(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
