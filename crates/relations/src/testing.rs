//! In-memory repositories for unit tests
//!
//! `InMemoryRepository` evaluates the filters the relation engine builds and
//! records how often it was queried.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ModelError, ModelResult};
use crate::model::entity::{Count, DataObject, Options};
use crate::query::filter::{Filter, Where};
use crate::query::types::Condition;
use crate::repository::{repository_getter, EntityCrudRepository, RepositoryGetter};

/// Convert a JSON object literal into a row
pub fn row(value: Value) -> DataObject {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

pub fn getter(repository: &Arc<InMemoryRepository>) -> RepositoryGetter<DataObject> {
    repository_getter(repository.clone())
}

/// Install a test subscriber honoring `RUST_LOG`; repeated calls are ignored
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
struct State {
    rows: Vec<DataObject>,
    next_id: i64,
    last_filter: Option<Filter>,
}

pub struct InMemoryRepository {
    model: String,
    id_field: String,
    state: Mutex<State>,
    find_calls: AtomicUsize,
}

impl InMemoryRepository {
    pub fn new(model: &str, id_field: &str) -> Self {
        Self {
            model: model.to_string(),
            id_field: id_field.to_string(),
            state: Mutex::new(State {
                next_id: 1,
                ..State::default()
            }),
            find_calls: AtomicUsize::new(0),
        }
    }

    pub fn shared(model: &str, id_field: &str) -> Arc<Self> {
        Arc::new(Self::new(model, id_field))
    }

    /// Store a row, assigning the next id when it has none
    pub fn insert(&self, value: Value) -> DataObject {
        self.store(row(value))
    }

    fn store(&self, mut data: DataObject) -> DataObject {
        let mut state = self.state.lock().unwrap();
        match data.get(&self.id_field).and_then(Value::as_i64) {
            Some(id) => state.next_id = state.next_id.max(id + 1),
            None => {
                let id = state.next_id;
                state.next_id += 1;
                data.insert(self.id_field.clone(), Value::from(id));
            }
        }
        state.rows.push(data.clone());
        data
    }

    pub fn rows(&self) -> Vec<DataObject> {
        self.state.lock().unwrap().rows.clone()
    }

    /// Number of `find` calls so far
    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn last_filter(&self) -> Option<Filter> {
        self.state.lock().unwrap().last_filter.clone()
    }
}

#[async_trait]
impl EntityCrudRepository<DataObject> for InMemoryRepository {
    async fn find(&self, filter: Option<Filter>, _options: &Options) -> ModelResult<Vec<DataObject>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        let filter = filter.unwrap_or_default();
        let mut state = self.state.lock().unwrap();
        state.last_filter = Some(filter.clone());

        let mut found: Vec<DataObject> = state
            .rows
            .iter()
            .filter(|row| filter.where_clause.as_ref().map_or(true, |w| matches(row, w)))
            .cloned()
            .collect();

        for order in filter.order.iter().rev() {
            let mut parts = order.split_whitespace();
            let field = parts.next().unwrap_or_default().to_string();
            let descending = parts.next().map_or(false, |d| d.eq_ignore_ascii_case("desc"));
            found.sort_by(|a, b| {
                let ordering = compare(a.get(&field).unwrap_or(&Value::Null), b.get(&field).unwrap_or(&Value::Null))
                    .unwrap_or(CmpOrdering::Equal);
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        let found = found
            .into_iter()
            .skip(filter.skip.unwrap_or(0))
            .take(filter.limit.unwrap_or(usize::MAX));

        Ok(match &filter.fields {
            Some(fields) => found
                .map(|row| row.into_iter().filter(|(k, _)| fields.contains(k)).collect())
                .collect(),
            None => found.collect(),
        })
    }

    async fn find_by_id(&self, id: &Value, _options: &Options) -> ModelResult<DataObject> {
        let state = self.state.lock().unwrap();
        state
            .rows
            .iter()
            .find(|row| row.get(&self.id_field).map_or(false, |v| same(v, id)))
            .cloned()
            .ok_or_else(|| ModelError::NotFound(format!("{} with id {}", self.model, id)))
    }

    async fn create(&self, data: DataObject, _options: &Options) -> ModelResult<DataObject> {
        Ok(self.store(data))
    }

    async fn update_all(&self, data: DataObject, where_clause: Option<Where>, _options: &Options) -> ModelResult<Count> {
        let mut state = self.state.lock().unwrap();
        let mut count = 0;
        for row in state.rows.iter_mut() {
            if where_clause.as_ref().map_or(true, |w| matches(row, w)) {
                for (key, value) in &data {
                    row.insert(key.clone(), value.clone());
                }
                count += 1;
            }
        }
        Ok(Count::new(count))
    }

    async fn delete_all(&self, where_clause: Option<Where>, _options: &Options) -> ModelResult<Count> {
        let mut state = self.state.lock().unwrap();
        let before = state.rows.len();
        state
            .rows
            .retain(|row| !where_clause.as_ref().map_or(true, |w| matches(row, w)));
        Ok(Count::new((before - state.rows.len()) as u64))
    }
}

/// Repository whose every call fails with a storage error
pub struct FailingRepository;

impl FailingRepository {
    pub fn error() -> ModelError {
        ModelError::Database("connection refused".to_string())
    }
}

#[async_trait]
impl EntityCrudRepository<DataObject> for FailingRepository {
    async fn find(&self, _filter: Option<Filter>, _options: &Options) -> ModelResult<Vec<DataObject>> {
        Err(Self::error())
    }

    async fn find_by_id(&self, _id: &Value, _options: &Options) -> ModelResult<DataObject> {
        Err(Self::error())
    }

    async fn create(&self, _data: DataObject, _options: &Options) -> ModelResult<DataObject> {
        Err(Self::error())
    }

    async fn update_all(&self, _data: DataObject, _where: Option<Where>, _options: &Options) -> ModelResult<Count> {
        Err(Self::error())
    }

    async fn delete_all(&self, _where: Option<Where>, _options: &Options) -> ModelResult<Count> {
        Err(Self::error())
    }
}

fn matches(row: &DataObject, where_clause: &Where) -> bool {
    match where_clause {
        Where::Field { field, condition } => holds(row.get(field).unwrap_or(&Value::Null), condition),
        Where::And(clauses) => clauses.iter().all(|clause| matches(row, clause)),
        Where::Or(clauses) => clauses.iter().any(|clause| matches(row, clause)),
    }
}

fn holds(value: &Value, condition: &Condition) -> bool {
    match condition {
        Condition::Eq(expected) => same(value, expected),
        Condition::Neq(expected) => !same(value, expected),
        Condition::Gt(bound) => compare(value, bound) == Some(CmpOrdering::Greater),
        Condition::Gte(bound) => matches!(compare(value, bound), Some(CmpOrdering::Greater | CmpOrdering::Equal)),
        Condition::Lt(bound) => compare(value, bound) == Some(CmpOrdering::Less),
        Condition::Lte(bound) => matches!(compare(value, bound), Some(CmpOrdering::Less | CmpOrdering::Equal)),
        Condition::Inq(values) => values.iter().any(|v| same(value, v)),
        Condition::Nin(values) => !values.iter().any(|v| same(value, v)),
        Condition::Between(low, high) => {
            matches!(compare(value, low), Some(CmpOrdering::Greater | CmpOrdering::Equal))
                && matches!(compare(value, high), Some(CmpOrdering::Less | CmpOrdering::Equal))
        }
        Condition::Like(pattern) => value.as_str().map_or(false, |text| like(text, pattern)),
        Condition::Exists(exists) => !value.is_null() == *exists,
    }
}

fn same(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => l == r,
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Option<CmpOrdering> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.as_f64()?.partial_cmp(&r.as_f64()?),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
        _ => None,
    }
}

/// SQL-style `like` with `%` wildcards
fn like(text: &str, pattern: &str) -> bool {
    let parts: Vec<&str> = pattern.split('%').collect();
    if parts.len() == 1 {
        return text == pattern;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(index) => rest = &rest[index + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_in_memory_filtering() {
        let repo = InMemoryRepository::new("Product", "id");
        repo.insert(json!({"name": "pen", "price": 3}));
        repo.insert(json!({"name": "paper", "price": 1}));
        repo.insert(json!({"name": "ink", "price": 7}));

        let filter = Filter::new()
            .with_where(Where::like("name", "p%").or(Where::gt("price", 5)))
            .order_by("price DESC")
            .limit(2);
        let found = repo.find(Some(filter), &Options::new()).await.unwrap();

        let names: Vec<&Value> = found.iter().map(|r| &r["name"]).collect();
        assert_eq!(names, vec![&json!("ink"), &json!("pen")]);
        assert_eq!(repo.find_calls(), 1);
        assert_eq!(repo.rows()[2]["id"], json!(3));
    }
}
