//! Sort-key comparison for `sorted-child`/`sorted-sibling` placement. A
//! sorted `TreeTable` carries an ordered list of payload keys; nodes are
//! compared lexicographically over that key list, the same way the engine's
//! bulk loader orders DFS children before insertion.

use std::cmp::Ordering;

use serde_json::Value;

/// Compares two payload objects over `order_by`, falling back to the next
/// key on a tie and treating a missing key as sorting before any present
/// value.
pub fn compare_keys(a: &Value, b: &Value, order_by: &[String]) -> Ordering {
    for key in order_by {
        let ordering = compare_values(a.get(key), b.get(key));
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare_value_pair(a, b),
    }
}

fn compare_value_pair(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or(f64::NAN);
            let b = b.as_f64().unwrap_or(f64::NAN);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        // Mismatched or non-orderable JSON shapes (arrays, objects, null vs.
        // scalar) compare equal: the caller's order_by is expected to name
        // scalar keys only, this is a defined fallback rather than a panic.
        _ => Ordering::Equal,
    }
}
