//! Property-based tests for parameter encoding
//!
//! Encoding must be deterministic and reversible through the
//! bracket-notation decoder for every structure the API accepts.

use proptest::collection::{btree_map, btree_set, vec};
use proptest::prelude::*;
use serde_json::{Map, Value};
use stripe_core::http::{decode_params, encode_params, flatten_params, url_encode};

/// Strategy for parameter names, including characters that need escaping
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z_ ]{0,7}"
}

/// Strategy for scalar values, including reserved and non-ASCII characters
fn leaf_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 &=+%#?/\\[\\]._~éü-]{0,12}"
}

/// Sequence of mappings sharing one key set, as list parameters do
fn object_list_strategy() -> impl Strategy<Value = Value> {
    (btree_set(key_strategy(), 1..4), 1usize..4).prop_flat_map(|(keys, count)| {
        let keys: Vec<String> = keys.into_iter().collect();
        let width = keys.len();
        vec(vec(leaf_strategy(), width), count).prop_map(move |rows| {
            Value::Array(
                rows.into_iter()
                    .map(|row| {
                        Value::Object(keys.iter().cloned().zip(row.into_iter().map(Value::String)).collect())
                    })
                    .collect(),
            )
        })
    })
}

/// Sequence of mappings that themselves hold mappings, shaped like
/// `line_items[][price_data][currency]`
fn nested_object_list_strategy() -> impl Strategy<Value = Value> {
    (btree_set(key_strategy(), 1..3), btree_set(key_strategy(), 1..3), 1usize..4).prop_flat_map(
        |(outer, inner, count)| {
            let outer: Vec<String> = outer.into_iter().collect();
            let inner: Vec<String> = inner.into_iter().collect();
            let width = outer.len() * inner.len() + 1;
            vec(vec(leaf_strategy(), width), count).prop_map(move |rows| {
                Value::Array(
                    rows.into_iter()
                        .map(|row| {
                            let mut leaves = row.into_iter().map(Value::String);
                            let mut item = Map::new();
                            for key in &outer {
                                let nested: Map<String, Value> =
                                    inner.iter().cloned().zip(leaves.by_ref()).collect();
                                item.insert(key.clone(), Value::Object(nested));
                            }
                            // Uppercase never collides with generated keys
                            if let Some(quantity) = leaves.next() {
                                item.insert("Quantity".to_string(), quantity);
                            }
                            Value::Object(item)
                        })
                        .collect(),
                )
            })
        },
    )
}

fn flat_object_strategy() -> impl Strategy<Value = Value> {
    btree_map(key_strategy(), leaf_strategy().prop_map(Value::String), 1..4)
        .prop_map(|entries| Value::Object(entries.into_iter().collect()))
}

/// Strategy for one parameter value
fn node_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        leaf_strategy().prop_map(Value::String),
        vec(leaf_strategy().prop_map(Value::String), 1..4).prop_map(Value::Array),
        flat_object_strategy(),
        btree_map(key_strategy(), flat_object_strategy(), 1..3)
            .prop_map(|entries| Value::Object(entries.into_iter().collect())),
        object_list_strategy(),
        nested_object_list_strategy(),
    ]
}

/// Strategy for a full parameter set
fn params_strategy() -> impl Strategy<Value = Value> {
    btree_map(key_strategy(), node_strategy(), 0..5)
        .prop_map(|entries| Value::Object(entries.into_iter().collect::<Map<String, Value>>()))
}

proptest! {
    #[test]
    fn prop_encoding_is_deterministic(params in params_strategy()) {
        prop_assert_eq!(encode_params(&params), encode_params(&params));
        prop_assert_eq!(flatten_params(&params), flatten_params(&params));
    }

    #[test]
    fn prop_round_trips_through_decoder(params in params_strategy()) {
        let encoded = encode_params(&params);
        prop_assert_eq!(decode_params(&encoded), params);
    }

    #[test]
    fn prop_nested_list_items_round_trip(items in nested_object_list_strategy()) {
        let params = serde_json::json!({ "line_items": items });
        prop_assert_eq!(decode_params(&encode_params(&params)), params);
    }

    #[test]
    fn prop_encoded_output_has_no_raw_separators(params in params_strategy()) {
        let encoded = encode_params(&params);
        prop_assert!(!encoded.contains(' '));
        prop_assert!(!encoded.contains('+'));
        prop_assert!(!encoded.contains('#'));
        for pair in encoded.split('&').filter(|pair| !pair.is_empty()) {
            prop_assert_eq!(pair.matches('=').count(), 1);
        }
    }

    #[test]
    fn prop_url_encode_keeps_unreserved(input in "[A-Za-z0-9_.!~*'()-]{0,32}") {
        prop_assert_eq!(url_encode(&input), input);
    }
}
