//! Candidate collection.
//!
//! Every other lookup in this crate starts here: a payload is flattened
//! into the list of JSON objects reachable from its root, and extractors
//! search that list in order instead of guessing at fixed paths.
//!
//! ```text
//!   {"data": {"task": {"status": "queued"}}, "meta": [{"page": 1}]}
//!
//!   candidates: [root, data, meta[0], task]
//! ```
//!
//! Traversal is breadth-first over an explicit worklist. Arrays are
//! transparent (their elements are enqueued, the array is never emitted).
//! Objects are emitted once each, tracked by address, then their values
//! are enqueued in property order.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;
use serde_json::{Map, Value};

/// A JSON object node found while walking a payload.
pub type Object = Map<String, Value>;

/// Collect every object reachable from `root`, breadth-first.
///
/// Scalars and `null` yield an empty list. Each object appears at most
/// once and the order is deterministic: breadth-first, then property
/// order within each object.
pub fn collect(root: &Value) -> Vec<&Object> {
    walk(VecDeque::from([root]), FxHashSet::default(), Vec::new())
}

/// [`collect`] for a payload already known to be an object.
///
/// `root` is the first candidate.
pub fn collect_object(root: &Object) -> Vec<&Object> {
    let seen = FxHashSet::from_iter([std::ptr::from_ref(root)]);
    walk(root.values().collect(), seen, vec![root])
}

fn walk<'a>(
    mut queue: VecDeque<&'a Value>,
    mut seen: FxHashSet<*const Object>,
    mut candidates: Vec<&'a Object>,
) -> Vec<&'a Object> {
    while let Some(node) = queue.pop_front() {
        match node {
            Value::Array(items) => queue.extend(items),
            Value::Object(map) => {
                if seen.insert(std::ptr::from_ref(map)) {
                    candidates.push(map);
                    queue.extend(map.values());
                }
            }
            _ => {}
        }
    }

    candidates
}
