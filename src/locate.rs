//! Task entity location for "create job" and "list jobs" responses.
//!
//! ```text
//!   {"data": [{..t1..}, {..t2..}]}          → [t1, t2]
//!   {"ok": true, "job": {..j..}}            → [j]
//!   {"id": "t9", "status": "queued"}        → [root]   (fallback)
//! ```

use rustc_hash::FxHashSet;
use serde_json::Value;

use crate::collect::Object;
use crate::extract::Candidates;

/// Keys whose array values hold task objects.
pub const LIST_KEYS: &[&str] = &[
    "tasks", "items", "tracks", "list", "data", "results", "entities",
];

/// Keys whose object values are a single task.
pub const SINGLE_KEYS: &[&str] = &["task", "job", "track", "item", "entity"];

/// Task objects embedded in `payload`.
///
/// Array containers come first (flattened, order kept), then single-object
/// containers; duplicates are dropped. When neither matches, the last
/// collected object is returned as a best guess. Scalars yield nothing.
pub fn locate_tasks(payload: &Value) -> Vec<&Object> {
    locate_in(&Candidates::new(payload))
}

pub(crate) fn locate_in<'a>(candidates: &Candidates<'a>) -> Vec<&'a Object> {
    let objects = candidates.as_slice();

    let listed = objects.iter().copied().flat_map(|object| {
        LIST_KEYS
            .iter()
            .filter_map(move |key| object.get(*key).and_then(Value::as_array))
            .flatten()
            .filter_map(Value::as_object)
    });
    let single = objects.iter().copied().flat_map(|object| {
        SINGLE_KEYS
            .iter()
            .filter_map(move |key| object.get(*key).and_then(Value::as_object))
    });

    let mut seen: FxHashSet<*const Object> = FxHashSet::default();
    let tasks: Vec<&'a Object> = listed
        .chain(single)
        .filter(|task| seen.insert(std::ptr::from_ref(*task)))
        .collect();

    if tasks.is_empty() {
        return candidates.last().into_iter().collect();
    }
    tasks
}
