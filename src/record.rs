use std::borrow::Cow;
use std::cmp::Ordering;

pub use serde_json::{Map, Value};

/// One row of domain data. Field order is irrelevant to the view engine.
pub type Record = Map<String, Value>;

static NULL: Value = Value::Null;

/// Field lookup treating absent keys like explicit nulls.
pub fn field<'a>(record: &'a Record, key: &str) -> &'a Value {
    record.get(key).unwrap_or(&NULL)
}

/// Textual form used for searching, export and default rendering.
///
/// Strings are returned as-is, numbers in their shortest form, booleans as
/// `true`/`false`, nested objects and arrays as compact JSON and null as the
/// empty string.
pub fn value_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::Null => Cow::Borrowed(""),
        Value::String(s) => Cow::Borrowed(s.as_str()),
        Value::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
        Value::Number(n) => Cow::Owned(n.to_string()),
        Value::Array(_) | Value::Object(_) => Cow::Owned(value.to_string()),
    }
}

/// Turns edited text back into a value of the same kind as `previous`.
///
/// Empty text clears the field. Text that does not fit the previous kind is
/// kept as a string, and fields without a kind infer one from the text.
pub fn parse_input(text: &str, previous: &Value) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    let parsed = serde_json::from_str::<Value>(trimmed).ok();
    let fits = match (previous, &parsed) {
        (Value::String(_), _) => false,
        (Value::Number(_), Some(v)) => v.is_number(),
        (Value::Bool(_), Some(v)) => v.is_boolean(),
        (Value::Null | Value::Array(_) | Value::Object(_), Some(v)) => {
            !v.is_string() && !v.is_null()
        }
        (_, None) => false,
    };
    match parsed {
        Some(value) if fits => value,
        _ => Value::String(text.to_string()),
    }
}

/// Rank of the value kinds that have a natural order. Nulls, nested objects
/// and arrays have none.
fn kind_rank(value: &Value) -> Option<u8> {
    match value {
        Value::Number(_) => Some(0),
        Value::String(_) => Some(1),
        Value::Bool(_) => Some(2),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Whether `value` takes part in ordering at all.
pub fn is_ordered(value: &Value) -> bool {
    kind_rank(value).is_some()
}

/// Total ordering of two field values.
///
/// Values of one kind use their natural order. Different kinds order as
/// numbers < strings < booleans. Unordered values (null, nested) are equal to
/// each other and come after everything else.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (kind_rank(a), kind_rank(b)) {
        (Some(ra), Some(rb)) if ra != rb => ra.cmp(&rb),
        (Some(_), Some(_)) => match (a, b) {
            (Value::Number(x), Value::Number(y)) => {
                let x = x.as_f64().unwrap_or(0.0);
                let y = y.as_f64().unwrap_or(0.0);
                x.total_cmp(&y)
            }
            (Value::String(x), Value::String(y)) => x.cmp(y),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            _ => Ordering::Equal,
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Case-insensitive containment over every field of the record.
///
/// `needle` must already be lowercase.
pub fn record_matches(record: &Record, needle: &str) -> bool {
    record
        .values()
        .any(|v| value_text(v).to_lowercase().contains(needle))
}
