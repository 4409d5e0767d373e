//! Structural diff between two JSON values.
//!
//! Used to prove that a session survives serialization: the persisted form
//! is encoded, decoded, rebuilt, and encoded again, and the two encodings
//! must produce no changes.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// A value present on both sides differs.
    Set,
    /// Present only on the right-hand side.
    Add,
    /// Present only on the left-hand side.
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// One difference between the two values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    pub kind: ChangeKind,
    pub path: Vec<PathSegment>,
    /// New value for set/add, removed value for remove.
    pub value: Value,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ChangeKind::Set => "set",
            ChangeKind::Add => "add",
            ChangeKind::Remove => "remove",
        };
        write!(f, "{kind} ")?;
        if self.path.is_empty() {
            f.write_str("$")?;
        }
        for (i, segment) in self.path.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => write!(f, "{key}")?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        write!(f, " = {}", self.value)
    }
}

/// Lists every change needed to turn `lhs` into `rhs`.
///
/// Objects are compared key by key; arrays index by index, with trailing
/// extra elements reported one change each.
pub fn diff(lhs: &Value, rhs: &Value) -> Vec<Change> {
    let mut changes = Vec::new();
    let mut path = Vec::new();
    diff_into(lhs, rhs, &mut path, &mut changes);
    changes
}

fn diff_into(lhs: &Value, rhs: &Value, path: &mut Vec<PathSegment>, out: &mut Vec<Change>) {
    match (lhs, rhs) {
        (Value::Object(left), Value::Object(right)) => {
            for (key, left_value) in left {
                path.push(PathSegment::Key(key.clone()));
                match right.get(key) {
                    Some(right_value) => diff_into(left_value, right_value, path, out),
                    None => out.push(change(ChangeKind::Remove, path, left_value)),
                }
                path.pop();
            }
            for (key, right_value) in right {
                if !left.contains_key(key) {
                    path.push(PathSegment::Key(key.clone()));
                    out.push(change(ChangeKind::Add, path, right_value));
                    path.pop();
                }
            }
        }
        (Value::Array(left), Value::Array(right)) => {
            let common = left.len().min(right.len());
            for idx in 0..common {
                path.push(PathSegment::Index(idx));
                diff_into(&left[idx], &right[idx], path, out);
                path.pop();
            }
            for (idx, removed) in left.iter().enumerate().skip(common) {
                path.push(PathSegment::Index(idx));
                out.push(change(ChangeKind::Remove, path, removed));
                path.pop();
            }
            for (idx, added) in right.iter().enumerate().skip(common) {
                path.push(PathSegment::Index(idx));
                out.push(change(ChangeKind::Add, path, added));
                path.pop();
            }
        }
        _ if lhs == rhs => {}
        _ => out.push(change(ChangeKind::Set, path, rhs)),
    }
}

fn change(kind: ChangeKind, path: &[PathSegment], value: &Value) -> Change {
    Change {
        kind,
        path: path.to_vec(),
        value: value.clone(),
    }
}
