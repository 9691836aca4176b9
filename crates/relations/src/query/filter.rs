//! Where clauses, filters and inclusion requests
//!
//! The relation engine only builds these values. Interpreting them is the job
//! of the repository they are handed to.

use serde_json::{json, Map, Value};

use super::types::Condition;
use crate::model::entity::DataObject;

/// Boolean combination of field conditions
#[derive(Debug, Clone, PartialEq)]
pub enum Where {
    Field { field: String, condition: Condition },
    And(Vec<Where>),
    Or(Vec<Where>),
}

impl Where {
    pub fn field(field: &str, condition: Condition) -> Self {
        Where::Field {
            field: field.to_string(),
            condition,
        }
    }

    /// `field == value`
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::field(field, Condition::Eq(value.into()))
    }

    pub fn neq(field: &str, value: impl Into<Value>) -> Self {
        Self::field(field, Condition::Neq(value.into()))
    }

    pub fn gt(field: &str, value: impl Into<Value>) -> Self {
        Self::field(field, Condition::Gt(value.into()))
    }

    pub fn gte(field: &str, value: impl Into<Value>) -> Self {
        Self::field(field, Condition::Gte(value.into()))
    }

    pub fn lt(field: &str, value: impl Into<Value>) -> Self {
        Self::field(field, Condition::Lt(value.into()))
    }

    pub fn lte(field: &str, value: impl Into<Value>) -> Self {
        Self::field(field, Condition::Lte(value.into()))
    }

    pub fn like(field: &str, pattern: &str) -> Self {
        Self::field(field, Condition::Like(pattern.to_string()))
    }

    /// `field IN (values)`
    pub fn inq<I>(field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Self::field(field, Condition::Inq(values.into_iter().collect()))
    }

    pub fn nin<I>(field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Self::field(field, Condition::Nin(values.into_iter().collect()))
    }

    /// Equality on `field`, or membership when more than one value is given
    pub fn eq_or_inq(field: &str, mut values: Vec<Value>) -> Self {
        if values.len() == 1 {
            Self::eq(field, values.remove(0))
        } else {
            Self::inq(field, values)
        }
    }

    /// Both clauses must hold; nested `And`s are flattened
    pub fn and(self, other: Where) -> Self {
        let mut clauses = match self {
            Where::And(clauses) => clauses,
            single => vec![single],
        };
        match other {
            Where::And(more) => clauses.extend(more),
            single => clauses.push(single),
        }
        Where::And(clauses)
    }

    /// Either clause may hold
    pub fn or(self, other: Where) -> Self {
        match self {
            Where::Or(mut clauses) => {
                clauses.push(other);
                Where::Or(clauses)
            }
            single => Where::Or(vec![single, other]),
        }
    }

    /// One equality per entry of `data`; `None` when `data` is empty
    pub fn from_data(data: &DataObject) -> Option<Self> {
        let mut clauses: Vec<Where> = data
            .iter()
            .map(|(field, value)| Where::eq(field, value.clone()))
            .collect();
        match clauses.len() {
            0 => None,
            1 => clauses.pop(),
            _ => Some(Where::And(clauses)),
        }
    }

    /// JSON form, e.g. `{"id": {"inq": [9, 8]}}`
    pub fn to_json(&self) -> Value {
        match self {
            Where::Field { field, condition } => {
                let mut object = Map::new();
                object.insert(field.clone(), condition.to_json());
                Value::Object(object)
            }
            Where::And(clauses) => json!({ "and": clauses.iter().map(Where::to_json).collect::<Vec<_>>() }),
            Where::Or(clauses) => json!({ "or": clauses.iter().map(Where::to_json).collect::<Vec<_>>() }),
        }
    }
}

/// Query filter handed to [`EntityCrudRepository::find`](crate::repository::EntityCrudRepository::find)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub where_clause: Option<Where>,
    pub fields: Option<Vec<String>>,
    /// Sort keys such as `"name ASC"`
    pub order: Vec<String>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
    pub include: Vec<Inclusion>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_where(mut self, where_clause: Where) -> Self {
        self.where_clause = Some(where_clause);
        self
    }

    /// Add a condition, combined with any existing one using `and`
    pub fn and_where(mut self, clause: Where) -> Self {
        self.where_clause = Some(match self.where_clause.take() {
            Some(existing) => existing.and(clause),
            None => clause,
        });
        self
    }

    pub fn where_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.and_where(Where::eq(field, value))
    }

    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.fields = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn order_by(mut self, order: &str) -> Self {
        self.order.push(order.to_string());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn include(mut self, inclusion: impl Into<Inclusion>) -> Self {
        self.include.push(inclusion.into());
        self
    }

    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        if let Some(where_clause) = &self.where_clause {
            object.insert("where".to_string(), where_clause.to_json());
        }
        if let Some(fields) = &self.fields {
            object.insert("fields".to_string(), json!(fields));
        }
        if !self.order.is_empty() {
            object.insert("order".to_string(), json!(self.order));
        }
        if let Some(limit) = self.limit {
            object.insert("limit".to_string(), json!(limit));
        }
        if let Some(skip) = self.skip {
            object.insert("skip".to_string(), json!(skip));
        }
        if !self.include.is_empty() {
            let include: Vec<Value> = self.include.iter().map(Inclusion::to_json).collect();
            object.insert("include".to_string(), Value::Array(include));
        }
        Value::Object(object)
    }
}

/// Request to eager-load a named relation
#[derive(Debug, Clone, PartialEq)]
pub struct Inclusion {
    pub relation: String,
    /// Extra criteria merged into the target fetch
    pub scope: Option<Filter>,
    /// Criteria for the join model of a through relation. Not supported:
    /// inclusion resolvers reject it instead of ignoring it.
    pub through_scope: Option<Filter>,
}

impl Inclusion {
    pub fn new(relation: &str) -> Self {
        Self {
            relation: relation.to_string(),
            scope: None,
            through_scope: None,
        }
    }

    pub fn with_scope(mut self, scope: Filter) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_through_scope(mut self, scope: Filter) -> Self {
        self.through_scope = Some(scope);
        self
    }

    pub fn to_json(&self) -> Value {
        if self.scope.is_none() && self.through_scope.is_none() {
            return Value::String(self.relation.clone());
        }
        let mut object = Map::new();
        object.insert("relation".to_string(), json!(self.relation));
        if let Some(scope) = &self.scope {
            object.insert("scope".to_string(), scope.to_json());
        }
        if let Some(scope) = &self.through_scope {
            object.insert("throughScope".to_string(), scope.to_json());
        }
        Value::Object(object)
    }
}

impl From<&str> for Inclusion {
    fn from(relation: &str) -> Self {
        Inclusion::new(relation)
    }
}

impl From<String> for Inclusion {
    fn from(relation: String) -> Self {
        Inclusion::new(&relation)
    }
}
