//! Keyed value extraction over collected candidates.
//!
//! Lookup is two-level. The outer axis is candidate order (breadth-first,
//! see [`collect`](crate::collect::collect)); the inner axis is key priority.
//! A lower-priority key on an earlier object therefore beats a
//! higher-priority key on a later one:
//!
//! ```text
//!   {"state": "queued", "data": {"status": "done"}}   keys = [status, state]
//!
//!   root  -> status? no   state? "queued"  => wins
//!   data  -> never inspected
//! ```

use serde_json::Value;

use crate::collect::{Object, collect, collect_object};

/// Default acceptance predicate: anything except `null`.
pub fn is_present(value: &Value) -> bool {
    !value.is_null()
}

/// Acceptance predicate for strings with visible content.
pub fn is_non_blank_str(value: &Value) -> bool {
    value.as_str().is_some_and(|s| !s.trim().is_empty())
}

/// The objects of one payload, collected once and searched many times.
#[derive(Debug, Clone)]
pub struct Candidates<'a> {
    objects: Vec<&'a Object>,
}

impl<'a> Candidates<'a> {
    /// Collect the candidates of `root`.
    pub fn new(root: &'a Value) -> Self {
        Self {
            objects: collect(root),
        }
    }

    /// Collect the candidates of an object, itself first.
    pub fn from_object(root: &'a Object) -> Self {
        Self {
            objects: collect_object(root),
        }
    }

    /// Candidates in traversal order.
    pub fn as_slice(&self) -> &[&'a Object] {
        &self.objects
    }

    /// The last candidate in traversal order.
    pub fn last(&self) -> Option<&'a Object> {
        self.objects.last().copied()
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if the payload held no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// First value under any of `keys` that passes `accept`.
    pub fn find(&self, keys: &[&str], accept: impl Fn(&Value) -> bool) -> Option<&'a Value> {
        self.objects.iter().copied().find_map(|object| {
            keys.iter()
                .filter_map(|key| object.get(*key))
                .find(|value| accept(*value))
        })
    }

    /// Like [`find`](Self::find), with `transform` applied to the winner only.
    pub fn find_map<T>(
        &self,
        keys: &[&str],
        accept: impl Fn(&Value) -> bool,
        transform: impl FnOnce(&'a Value) -> T,
    ) -> Option<T> {
        self.find(keys, accept).map(transform)
    }
}

/// First non-null value under any of `keys`, anywhere in `root`.
pub fn extract<'a>(root: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    Candidates::new(root).find(keys, is_present)
}

/// First value under any of `keys` that passes `accept`, transformed.
///
/// Returns `None` when nothing matches; absence is never an error.
pub fn extract_with<'a, T>(
    root: &'a Value,
    keys: &[&str],
    accept: impl Fn(&Value) -> bool,
    transform: impl FnOnce(&'a Value) -> T,
) -> Option<T> {
    Candidates::new(root).find_map(keys, accept, transform)
}
