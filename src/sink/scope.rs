//! Decoration carried by derived sink handles.
//!
//! A scope is the set of attributes and the group path baked into a handle by
//! `with_attrs` / `with_group`. Attributes remember the groups that were open
//! when they were attached; record attributes land under every open group.

use serde_json::{Map, Value as JsonValue};

use crate::sink::record::{Attr, LogRecord, Value};

/// An attribute attached through `with_attrs`, with the group path in effect
/// at that time.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedAttr {
    pub groups: Vec<String>,
    pub attr: Attr,
}

/// Immutable decoration shared by every record a handle submits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    attrs: Vec<ScopedAttr>,
    groups: Vec<String>,
}

impl Scope {
    pub fn root() -> Self {
        Self::default()
    }

    /// A copy of this scope with `attrs` qualified by the current groups.
    pub fn with_attrs(&self, attrs: impl IntoIterator<Item = Attr>) -> Self {
        let mut next = self.clone();
        next.attrs.extend(attrs.into_iter().map(|attr| ScopedAttr {
            groups: self.groups.clone(),
            attr,
        }));
        next
    }

    /// A copy of this scope with `name` appended to the group path.
    pub fn with_group(&self, name: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.groups.push(name.into());
        next
    }

    pub fn attrs(&self) -> &[ScopedAttr] {
        &self.attrs
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty() && self.groups.is_empty()
    }

    /// Scope and record attributes as dotted keys (`group.sub.key`), scope first.
    pub fn flatten(&self, record: &LogRecord) -> Vec<(String, Value)> {
        let scoped = self
            .attrs
            .iter()
            .map(|s| (dotted(&s.groups, &s.attr.key), s.attr.value.clone()));
        let own = record
            .attrs()
            .iter()
            .map(|a| (dotted(&self.groups, &a.key), a.value.clone()));
        scoped.chain(own).collect()
    }

    /// Insert scope and record attributes into `map`, nesting groups as
    /// objects. Empty groups never appear.
    pub fn nest_into(&self, record: &LogRecord, map: &mut Map<String, JsonValue>) {
        for s in &self.attrs {
            insert_at(map, &s.groups, &s.attr);
        }
        for a in record.attrs() {
            insert_at(map, &self.groups, a);
        }
    }
}

fn dotted(groups: &[String], key: &str) -> String {
    if groups.is_empty() {
        return key.to_owned();
    }
    let mut out = groups.join(".");
    out.push('.');
    out.push_str(key);
    out
}

fn insert_at(map: &mut Map<String, JsonValue>, groups: &[String], attr: &Attr) {
    let mut current = map;
    for group in groups {
        let slot = current
            .entry(group.clone())
            .or_insert_with(|| JsonValue::Object(Map::new()));
        if !slot.is_object() {
            *slot = JsonValue::Object(Map::new());
        }
        let JsonValue::Object(inner) = slot else {
            return;
        };
        current = inner;
    }
    current.insert(attr.key.clone(), to_json(&attr.value));
}

fn to_json(value: &Value) -> JsonValue {
    match value {
        Value::Str(s) => JsonValue::String(s.clone()),
        Value::Int(v) => JsonValue::from(*v),
        Value::Uint(v) => JsonValue::from(*v),
        Value::Float(v) => JsonValue::from(*v),
        Value::Bool(v) => JsonValue::Bool(*v),
    }
}
