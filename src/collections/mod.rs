//! Reshaping helpers for JSON-like records
//!
//! Column maps are `BTreeMap`s, so "key order" everywhere in this module means sorted
//! key order.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Flatten nested objects into one level, joining keys with `sep`
///
/// `{"a": {"b": 1}, "c": 2}` becomes `{"a.b": 1, "c": 2}` with `sep = "."`.
/// Arrays are leaves and are not descended into.
pub fn ravel_dict(map: &Map<String, Value>, sep: &str) -> Map<String, Value> {
    let mut raveled = Map::new();
    for (key, value) in map {
        match value {
            Value::Object(inner) => {
                for (inner_key, inner_value) in ravel_dict(inner, sep) {
                    raveled.insert(format!("{key}{sep}{inner_key}"), inner_value);
                }
            }
            other => {
                raveled.insert(key.clone(), other.clone());
            }
        }
    }
    raveled
}

/// Turn columns into rows: row `i` holds the `i`-th element of every column long enough
///
/// The row count is the length of the longest column; shorter columns are simply
/// missing from the trailing rows.
pub fn dict_of_lists_to_list_of_dicts<V: Clone>(
    columns: &BTreeMap<String, Vec<V>>,
) -> Vec<BTreeMap<String, V>> {
    let rows = columns.values().map(Vec::len).max().unwrap_or(0);

    (0..rows)
        .map(|i| {
            columns
                .iter()
                .filter_map(|(key, column)| column.get(i).map(|v| (key.clone(), v.clone())))
                .collect()
        })
        .collect()
}

/// Every combination of one value per column, last key varying fastest
///
/// Any empty column makes the product empty.
pub fn dict_of_lists_to_product_list_of_dicts<V: Clone>(
    columns: &BTreeMap<String, Vec<V>>,
) -> Vec<BTreeMap<String, V>> {
    if columns.is_empty() || columns.values().any(Vec::is_empty) {
        return Vec::new();
    }

    let mut rows = vec![BTreeMap::new()];
    for (key, column) in columns {
        rows = rows
            .into_iter()
            .flat_map(|row| {
                column.iter().map(move |value| {
                    let mut row = row.clone();
                    row.insert(key.clone(), value.clone());
                    row
                })
            })
            .collect();
    }
    rows
}

/// SHA-256 hex digest of the compact, key-sorted JSON encoding of `value`
///
/// Non-ASCII characters are hashed as raw UTF-8 rather than `\u` escapes.
pub fn hash_dict<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    // Going through Value sorts the keys of structs and maps alike
    let canonical = serde_json::to_string(&serde_json::to_value(value)?)?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}
