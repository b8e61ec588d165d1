//! Alias tracking.
//!
//! Clients may rename any field. The request phase records, for every targeted field, the response
//! key the client asked for so the result phase can find the value again. Records are first seen
//! wins and live in a [`RequestAliases`] owned by the caller, so concurrent requests never share
//! them.

use std::collections::HashMap;

use apollo_compiler::Name;
use apollo_compiler::executable::Field;
use apollo_compiler::executable::Selection;
use apollo_compiler::executable::SelectionSet;
use serde_json_bytes::ByteString;
use serde_json_bytes::Value;

use crate::Object;

/// Identifies one modifier of one rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ModifierId {
    pub(crate) rule: usize,
    pub(crate) modifier: usize,
}

/// Aliases recorded while rewriting one request.
#[derive(Clone, Debug, Default)]
pub struct RequestAliases {
    fields: HashMap<Name, HashMap<Name, Name>>,
    nested: HashMap<ModifierId, NestedAliases>,
}

impl RequestAliases {
    /// Records the response key used for `type_name.field`, unless one was recorded already.
    pub(crate) fn record(&mut self, type_name: &Name, field: &Field) {
        self.fields
            .entry(type_name.clone())
            .or_default()
            .entry(field.name.clone())
            .or_insert_with(|| {
                tracing::debug!(
                    type_name = %type_name,
                    field = %field.name,
                    alias = %field.response_key(),
                    "recording field alias"
                );
                field.response_key().clone()
            });
    }

    /// The key holding `type_name.field` in results: the recorded alias or the field name itself.
    pub fn response_key<'a>(&'a self, type_name: &str, field: &'a str) -> &'a str {
        self.fields
            .get(type_name)
            .and_then(|fields| fields.get(field))
            .map_or(field, |alias| alias.as_str())
    }

    /// Whether the request selected `type_name.field`.
    pub(crate) fn selected(&self, type_name: &str, field: &str) -> bool {
        self.fields
            .get(type_name)
            .is_some_and(|fields| fields.contains_key(field))
    }

    pub(crate) fn nested_mut(&mut self, id: ModifierId) -> &mut NestedAliases {
        self.nested.entry(id).or_default()
    }

    pub(crate) fn nested(&self, id: ModifierId) -> Option<&NestedAliases> {
        self.nested.get(&id)
    }
}

/// Aliases found inside the selection set of a field, keyed by the declared name of the parent
/// field and the declared name of the child.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NestedAliases {
    records: HashMap<String, HashMap<String, String>>,
}

impl NestedAliases {
    /// Records `alias` for `parent.child`, unless one was recorded already.
    pub(crate) fn record(&mut self, parent: &str, child: &str, alias: &str) {
        self.records
            .entry(parent.to_string())
            .or_default()
            .entry(child.to_string())
            .or_insert_with(|| alias.to_string());
    }

    /// Walks a selection set and records the alias of every aliased field, at any depth.
    pub(crate) fn record_selection_set(&mut self, parent: &str, selection_set: &SelectionSet) {
        for selection in &selection_set.selections {
            match selection {
                Selection::Field(field) => {
                    if let Some(alias) = &field.alias {
                        self.record(parent, &field.name, alias);
                    }
                    self.record_selection_set(&field.name, &field.selection_set);
                }
                Selection::InlineFragment(fragment) => {
                    self.record_selection_set(parent, &fragment.selection_set);
                }
                // Named fragments are not followed.
                Selection::FragmentSpread(_) => {}
            }
        }
    }

    pub fn get(&self, parent: &str, child: &str) -> Option<&str> {
        self.records
            .get(parent)
            .and_then(|children| children.get(child))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Renames the keys of a value tree from declared names to response keys.
///
/// `lookup(parent, child)` returns the alias of `child` below the field `parent`, both declared
/// names. Keys without an alias are kept. Every non-container value is passed to `leaf` with its
/// dotted path of declared names, relative to the root value.
pub(crate) fn rename_keys<L, F, E>(
    value: Value,
    parent: &str,
    path: &str,
    lookup: &L,
    leaf: &mut F,
) -> Result<Value, E>
where
    L: Fn(&str, &str) -> Option<String>,
    F: FnMut(&str, Value) -> Result<Value, E>,
{
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| rename_keys(item, parent, path, lookup, leaf))
            .collect::<Result<Vec<_>, E>>()
            .map(Value::Array),
        Value::Object(object) => {
            let mut renamed = Object::new();
            for (key, child) in object {
                let declared = key.as_str();
                let child_path = if path.is_empty() {
                    declared.to_string()
                } else {
                    format!("{path}.{declared}")
                };
                let child = rename_keys(child, declared, &child_path, lookup, leaf)?;
                let response_key = lookup(parent, declared).unwrap_or_else(|| declared.to_string());
                renamed.insert(ByteString::from(response_key), child);
            }
            Ok(Value::Object(renamed))
        }
        scalar if path.is_empty() => Ok(scalar),
        scalar => leaf(path, scalar),
    }
}

/// Recursively removes `null`, `""`, `[]` and `{}` from arrays and objects.
pub(crate) fn deep_clean(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(deep_clean)
                .filter(|item| !is_empty(item))
                .collect(),
        ),
        Value::Object(object) => {
            let mut cleaned = Object::new();
            for (key, child) in object {
                let child = deep_clean(child);
                if !is_empty(&child) {
                    cleaned.insert(key, child);
                }
            }
            Value::Object(cleaned)
        }
        other => other,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(string) => string.as_str().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(object) => object.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
