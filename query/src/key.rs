use std::fmt;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cache key: procedure path plus canonical input JSON.
///
/// Object keys are sorted before serialization, so `{"a":1,"b":2}` and
/// `{"b":2,"a":1}` produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryKey {
    path: String,
    input: String,
}

impl QueryKey {
    #[must_use]
    pub fn new(path: impl Into<String>, input: &Value) -> Self {
        Self {
            path: path.into(),
            input: canonical_json(input),
        }
    }

    /// Key for a procedure called without input.
    #[must_use]
    pub fn without_input(path: impl Into<String>) -> Self {
        Self::new(path, &Value::Null)
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Canonical JSON text of the input.
    #[must_use]
    pub fn input_json(&self) -> &str {
        &self.input
    }

    /// Whether this key lives under `prefix`.
    ///
    /// `""` matches everything; `"users"` matches `users` and `users.list` but
    /// not `usersAdmin`.
    #[must_use]
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        if prefix.is_empty() || self.path == prefix {
            return true;
        }
        self.path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('.'))
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.path, self.input)
    }
}

/// Serialize `value` with object keys sorted at every depth.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Display for Value::String emits quoted, escaped JSON.
                let _ = write!(out, "{}:", Value::String(k.clone()));
                write_canonical(v, out);
            }
            out.push('}');
        }
        scalar => {
            let _ = write!(out, "{scalar}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_matter() {
        let a = QueryKey::new("hello", &json!({"a": 1, "b": {"y": [1, 2], "x": null}}));
        let b = QueryKey::new("hello", &json!({"b": {"x": null, "y": [1, 2]}, "a": 1}));
        assert_eq!(a, b);
        assert_eq!(a.input_json(), r#"{"a":1,"b":{"x":null,"y":[1,2]}}"#);
    }

    #[test]
    fn different_inputs_give_different_keys() {
        let a = QueryKey::new("hello", &json!({"text": "a"}));
        let b = QueryKey::new("hello", &json!({"text": "b"}));
        let c = QueryKey::new("hello2", &json!({"text": "a"}));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(QueryKey::new("p", &json!("1")), QueryKey::new("p", &json!(1)));
    }

    #[test]
    fn strings_are_escaped() {
        let key = QueryKey::new("p", &json!({"quote\"d": "line\nbreak"}));
        assert_eq!(key.input_json(), r#"{"quote\"d":"line\nbreak"}"#);
    }

    #[test]
    fn prefix_matching_respects_segments() {
        let key = QueryKey::without_input("users.list");
        assert!(key.matches_prefix(""));
        assert!(key.matches_prefix("users"));
        assert!(key.matches_prefix("users.list"));
        assert!(!key.matches_prefix("user"));
        assert!(!key.matches_prefix("users.list.all"));
    }
}
