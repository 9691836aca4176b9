//! Query Types - comparison conditions carried by a where clause

use std::fmt;

use serde_json::{json, Value};

/// Condition applied to a single field
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Neq(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    /// Field value is one of the listed values
    Inq(Vec<Value>),
    /// Field value is none of the listed values
    Nin(Vec<Value>),
    Between(Value, Value),
    Like(String),
    Exists(bool),
}

impl Condition {
    /// Operator name as used in the JSON form of a where clause
    pub fn operator(&self) -> &'static str {
        match self {
            Condition::Eq(_) => "eq",
            Condition::Neq(_) => "neq",
            Condition::Gt(_) => "gt",
            Condition::Gte(_) => "gte",
            Condition::Lt(_) => "lt",
            Condition::Lte(_) => "lte",
            Condition::Inq(_) => "inq",
            Condition::Nin(_) => "nin",
            Condition::Between(_, _) => "between",
            Condition::Like(_) => "like",
            Condition::Exists(_) => "exists",
        }
    }

    /// JSON form; equality uses the `{field: value}` shorthand
    pub fn to_json(&self) -> Value {
        match self {
            Condition::Eq(value) => value.clone(),
            Condition::Neq(value)
            | Condition::Gt(value)
            | Condition::Gte(value)
            | Condition::Lt(value)
            | Condition::Lte(value) => json!({ self.operator(): value }),
            Condition::Inq(values) | Condition::Nin(values) => json!({ self.operator(): values }),
            Condition::Between(low, high) => json!({ "between": [low, high] }),
            Condition::Like(pattern) => json!({ "like": pattern }),
            Condition::Exists(exists) => json!({ "exists": exists }),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}
