use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value};

/// Characters left untouched by URI component encoding:
/// `A-Z a-z 0-9 - _ . ! ~ * ' ( )`
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const DESIGN_PREFIX: &str = "_design/";
const ENCODED_DESIGN_PREFIX: &str = "_design%2F";

/// Percent-encode a single path or query component.
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Encode a document id into a path segment.
///
/// A leading `_design/` stays literal so design-document sub-resources
/// (views, lists, shows) still route.
pub fn encode_id(id: &str) -> String {
    let encoded = encode_component(id);
    match encoded.strip_prefix(ENCODED_DESIGN_PREFIX) {
        Some(rest) => format!("{}{}", DESIGN_PREFIX, rest),
        None => encoded,
    }
}

/// Encode query parameters as `k=v&k=v`.
///
/// Arrays repeat their key, `null` becomes an empty value, nested objects are
/// sent as JSON text.
pub fn query_string(params: &Map<String, Value>) -> String {
    let mut pairs = Vec::with_capacity(params.len());
    for (key, value) in params {
        let key = encode_component(key);
        match value {
            Value::Array(items) => {
                for item in items {
                    pairs.push(format!("{}={}", key, encode_component(&scalar_text(item))));
                }
            }
            other => pairs.push(format!("{}={}", key, encode_component(&scalar_text(other)))),
        }
    }
    pairs.join("&")
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
