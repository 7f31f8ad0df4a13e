use {
    serde::{Deserialize, Serialize},
    std::{cmp::Ordering, fmt},
};

/// Dynamically typed field value read from a source row.
///
/// Serialized untagged, so JSON literals in filter configurations map onto
/// the matching variant (`null`, `true`, `3`, `2.5`, `"text"`, `[..]`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Ordering between two scalars. Integers and floats compare numerically,
    /// everything else only against its own kind.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y)? {
                        Ordering::Equal => continue,
                        ord => return Some(ord),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None,
        }
    }

    pub fn loosely_equals(&self, other: &Value) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }

    /// Elements of a list value; a scalar counts as a one-element list.
    pub fn elements(&self) -> &[Value] {
        match self {
            Value::List(items) => items,
            Value::Null => &[],
            scalar => std::slice::from_ref(scalar),
        }
    }

    /// Every text fragment of the value, lists flattened.
    pub fn texts(&self) -> Vec<String> {
        match self {
            Value::Null => vec![],
            Value::List(items) => items.iter().flat_map(Value::texts).collect(),
            scalar => vec![scalar.to_string()],
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

#[cfg(test)]
mod tests {
    use {super::Value, std::cmp::Ordering};

    #[test]
    fn json_literals() {
        let vals: Vec<Value> = serde_json::from_str(r#"[null, true, 3, 2.5, "x", ["a", 1]]"#).unwrap();
        assert_eq!(
            vals,
            vec![
                Value::Null,
                Value::Bool(true),
                Value::Int(3),
                Value::Float(2.5),
                Value::Text("x".into()),
                Value::List(vec![Value::Text("a".into()), Value::Int(1)]),
            ]
        );
    }

    #[test]
    fn numeric_compare_across_kinds() {
        assert_eq!(Value::Int(2).compare(&Value::Float(2.5)), Some(Ordering::Less));
        assert!(Value::Float(3.0).loosely_equals(&Value::Int(3)));
        assert_eq!(Value::Text("3".into()).compare(&Value::Int(3)), None);
    }

    #[test]
    fn scalar_as_elements() {
        assert_eq!(Value::Int(1).elements(), &[Value::Int(1)]);
        assert!(Value::Null.elements().is_empty());
        assert_eq!(Value::from(vec!["a", "b"]).texts(), vec!["a".to_string(), "b".to_string()]);
    }
}
