//! Differ - Compare a plan with persisted state
//!
//! Decides whether a declared resource must be created, updated in place,
//! replaced, or left alone. Attributes flagged `requires_replace` in the
//! schema turn an update into a replacement.

use std::collections::HashMap;

use crate::resource::{Resource, ResourceId, State, Value};
use crate::schema::ResourceSchema;

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// A replace-on-change attribute differs -> delete then create
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff(schema: &ResourceSchema, desired: &Resource, current: &State) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = find_changed_attributes(schema, &desired.attributes, &current.attributes);

    if changed.is_empty() {
        return Diff::NoChange(desired.id.clone());
    }

    let replace = changed.iter().any(|name| {
        schema
            .attributes
            .get(name)
            .is_some_and(|attr| attr.requires_replace)
    });

    if replace {
        Diff::Replace {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    }
}

/// Find changed attributes between desired and current state.
/// Computed attributes are owned by the provider and never compared.
fn find_changed_attributes(
    schema: &ResourceSchema,
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, desired_value) in desired {
        if schema.attributes.get(key).is_some_and(|a| a.computed) {
            continue;
        }

        match current.get(key) {
            Some(current_value) if equivalent(current_value, desired_value) => {}
            _ => changed.push(key.clone()),
        }
    }

    // Attributes dropped from configuration also count as a change,
    // unless the provider fills them in
    for (key, current_value) in current {
        if desired.contains_key(key)
            || schema
                .attributes
                .get(key)
                .is_none_or(|a| a.computed || a.optional_computed)
        {
            continue;
        }
        if !is_empty(current_value) {
            changed.push(key.clone());
        }
    }

    changed.sort();
    changed
}

/// Lists and sets of the same strings compare equal
fn equivalent(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Set(set), Value::List(list)) | (Value::List(list), Value::Set(set)) => {
            let list: std::collections::BTreeSet<String> = list
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            &list == set
        }
        _ => a == b,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::String(s) => s.is_empty(),
        Value::List(items) => items.is_empty(),
        Value::Set(items) => items.is_empty(),
        Value::Map(map) => map.is_empty(),
        Value::Int(_) | Value::Bool(_) => false,
    }
}
