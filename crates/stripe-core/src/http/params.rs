//! Parameter encoding for form bodies and query strings
//!
//! Nested parameters are flattened into bracket notation
//! (`card[number]`, `expand[]`, `items[][price]`) and percent-encoded.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value};

/// Characters left untouched by [`url_encode`]
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode a key segment or value
pub fn url_encode(input: &str) -> String {
    utf8_percent_encode(input, UNRESERVED).to_string()
}

/// Flatten nested parameters into ordered `(key, value)` pairs.
///
/// Keys are percent-encoded per segment; values are left raw so callers can
/// choose where to encode them.
pub fn flatten_params(params: &Value) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    match params {
        Value::Object(map) => flatten_object(map, None, &mut pairs),
        Value::Null => {}
        other => pairs.push((String::new(), scalar_to_string(other))),
    }
    pairs
}

fn flatten_object(map: &Map<String, Value>, prefix: Option<&str>, pairs: &mut Vec<(String, String)>) {
    for (key, value) in map {
        let encoded = url_encode(key);
        let full_key = match prefix {
            Some(prefix) => format!("{}[{}]", prefix, encoded),
            None => encoded,
        };
        flatten_value(value, full_key, pairs);
    }
}

fn flatten_array(items: &[Value], prefix: &str, pairs: &mut Vec<(String, String)>) {
    let item_key = format!("{}[]", prefix);
    for item in items {
        match item {
            Value::Object(map) => flatten_object(map, Some(&item_key), pairs),
            Value::Array(nested) => flatten_array(nested, &item_key, pairs),
            scalar => pairs.push((item_key.clone(), scalar_to_string(scalar))),
        }
    }
}

fn flatten_value(value: &Value, key: String, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => flatten_object(map, Some(&key), pairs),
        Value::Array(items) => flatten_array(items, &key, pairs),
        scalar => pairs.push((key, scalar_to_string(scalar))),
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Encode parameters as `k=v` pairs joined by `&`
pub fn encode_params(params: &Value) -> String {
    flatten_params(params)
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, url_encode(&value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Rebuild a nested structure from a bracket-notation encoded string.
///
/// Inverse of [`encode_params`] for structures whose sequences hold either
/// scalars or mappings. A mapping inside a sequence is closed and a new one
/// started when the full key path below `[]` is already present in it. All
/// scalars decode as strings.
pub fn decode_params(encoded: &str) -> Value {
    let mut root = Map::new();

    for pair in encoded.split('&').filter(|pair| !pair.is_empty()) {
        let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let segments = parse_key(&percent_decode(raw_key));
        if segments.is_empty() {
            continue;
        }
        insert_segments(&mut root, &segments, Value::String(percent_decode(raw_value)));
    }

    Value::Object(root)
}

/// Parse a single `key=value` argument into the same structure
pub fn decode_param(argument: &str) -> Value {
    let (key, value) = argument.split_once('=').unwrap_or((argument, ""));
    decode_params(&format!("{}={}", url_encode_key(key), url_encode(value)))
}

fn url_encode_key(key: &str) -> String {
    // Brackets are structure, not data.
    key.split_inclusive(['[', ']'])
        .map(|part| {
            let (text, bracket) = match part.char_indices().last() {
                Some((idx, c)) if c == '[' || c == ']' => part.split_at(idx),
                _ => (part, ""),
            };
            format!("{}{}", url_encode(text), bracket)
        })
        .collect()
}

fn percent_decode(input: &str) -> String {
    percent_decode_str(input).decode_utf8_lossy().into_owned()
}

#[derive(Debug, PartialEq)]
enum Segment {
    Key(String),
    Push,
}

fn parse_key(key: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let (head, mut rest) = match key.find('[') {
        Some(idx) => key.split_at(idx),
        None => (key, ""),
    };
    segments.push(Segment::Key(head.to_string()));

    while let Some(stripped) = rest.strip_prefix('[') {
        match stripped.find(']') {
            Some(end) => {
                let inner = &stripped[..end];
                segments.push(if inner.is_empty() {
                    Segment::Push
                } else {
                    Segment::Key(inner.to_string())
                });
                rest = &stripped[end + 1..];
            }
            None => break,
        }
    }

    segments
}

fn insert_segments(map: &mut Map<String, Value>, segments: &[Segment], value: Value) {
    let (first, rest) = match segments.split_first() {
        Some((Segment::Key(key), rest)) => (key.clone(), rest),
        _ => return,
    };

    if rest.is_empty() {
        map.insert(first, value);
        return;
    }

    let slot = map.entry(first).or_insert_with(|| empty_container(&rest[0]));
    insert_into(slot, rest, value);
}

fn insert_into(slot: &mut Value, segments: &[Segment], value: Value) {
    match (&segments[0], slot) {
        (Segment::Key(_), Value::Object(map)) => insert_segments(map, segments, value),
        (Segment::Push, Value::Array(items)) => {
            let rest = &segments[1..];
            match rest.first() {
                None => items.push(value),
                Some(Segment::Key(_)) => {
                    let start_new = match items.last() {
                        Some(Value::Object(last)) => path_exists(last, rest),
                        _ => true,
                    };
                    if start_new {
                        items.push(Value::Object(Map::new()));
                    }
                    if let Some(Value::Object(last)) = items.last_mut() {
                        insert_segments(last, rest, value);
                    }
                }
                Some(Segment::Push) => {
                    items.push(Value::Array(Vec::new()));
                    if let Some(last) = items.last_mut() {
                        insert_into(last, rest, value);
                    }
                }
            }
        }
        (segment, slot) => {
            // Conflicting shapes; the later structure wins.
            *slot = empty_container(segment);
            insert_into(slot, segments, value);
        }
    }
}

/// Whether `segments` already names a value inside `map`. Paths that pass
/// through a sequence never count as present.
fn path_exists(map: &Map<String, Value>, segments: &[Segment]) -> bool {
    match segments.split_first() {
        Some((Segment::Key(key), rest)) => match (map.get(key), rest.is_empty()) {
            (None, _) => false,
            (Some(_), true) => true,
            (Some(Value::Object(inner)), false) => path_exists(inner, rest),
            (Some(_), false) => false,
        },
        _ => false,
    }
}

fn empty_container(segment: &Segment) -> Value {
    match segment {
        Segment::Key(_) => Value::Object(Map::new()),
        Segment::Push => Value::Array(Vec::new()),
    }
}

/// Converts nested resource objects into their primitive identifiers
/// before parameters are encoded.
pub trait ObjectIds: Send + Sync {
    fn objects_to_ids(&self, params: &Value) -> Value;
}

/// Collapses any mapping that carries both an `id` string and an `object`
/// string into its `id`
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceIds;

impl ObjectIds for ResourceIds {
    fn objects_to_ids(&self, params: &Value) -> Value {
        match params {
            Value::Object(map) => {
                if let (Some(Value::String(id)), Some(Value::String(_))) = (map.get("id"), map.get("object")) {
                    return Value::String(id.clone());
                }
                Value::Object(
                    map.iter()
                        .map(|(key, value)| (key.clone(), self.objects_to_ids(value)))
                        .collect(),
                )
            }
            Value::Array(items) => Value::Array(items.iter().map(|item| self.objects_to_ids(item)).collect()),
            other => other.clone(),
        }
    }
}
