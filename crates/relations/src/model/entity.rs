//! Entities - the data shapes repositories hand to and receive from the relation engine

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Plain field-name to value data, used for writes and for untyped rows
pub type DataObject = Map<String, Value>;

/// Opaque options forwarded to the underlying repository
pub type Options = Map<String, Value>;

/// Number of rows affected by a bulk write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Count {
    pub count: u64,
}

impl Count {
    pub fn new(count: u64) -> Self {
        Self { count }
    }
}

/// A row of some model as seen by the relation engine.
///
/// Only field access is needed; the default goes through serde, so any
/// serializable struct works. That default serializes the whole entity on
/// every call, and batch operations read one or two key fields per entity,
/// so types with cheap field access should override [`Entity::field`] and
/// [`Entity::fields`].
pub trait Entity: Clone + Serialize + Send + Sync + 'static {
    /// Value of the named field, `None` if the field is absent
    fn field(&self, name: &str) -> Option<Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut fields)) => fields.remove(name),
            _ => None,
        }
    }

    /// Values of several fields in the order of `names`, serializing once
    fn fields(&self, names: &[&str]) -> Vec<Option<Value>> {
        match serde_json::to_value(self) {
            Ok(Value::Object(fields)) => names.iter().map(|name| fields.get(*name).cloned()).collect(),
            _ => vec![None; names.len()],
        }
    }
}

impl Entity for DataObject {
    fn field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }

    fn fields(&self, names: &[&str]) -> Vec<Option<Value>> {
        names.iter().map(|name| self.get(*name).cloned()).collect()
    }
}

/// Value of a key field, treating JSON `null` the same as an absent field
pub fn key_value<E: Entity>(entity: &E, field: &str) -> Option<Value> {
    entity.field(field).filter(|value| !value.is_null())
}

/// [`key_value`] for several fields at once
pub fn key_values<E: Entity>(entity: &E, fields: &[&str]) -> Vec<Option<Value>> {
    entity
        .fields(fields)
        .into_iter()
        .map(|value| value.filter(|value| !value.is_null()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, Serialize)]
    struct Order {
        id: i64,
        customer_id: Option<i64>,
    }

    impl Entity for Order {}

    #[test]
    fn test_default_field_access_through_serde() {
        let order = Order { id: 3, customer_id: Some(7) };
        assert_eq!(order.field("id"), Some(json!(3)));
        assert_eq!(order.field("customer_id"), Some(json!(7)));
        assert_eq!(order.field("missing"), None);
    }

    #[test]
    fn test_key_value_ignores_null() {
        let order = Order { id: 3, customer_id: None };
        assert_eq!(order.field("customer_id"), Some(Value::Null));
        assert_eq!(key_value(&order, "customer_id"), None);
        assert_eq!(key_value(&order, "id"), Some(json!(3)));
    }

    static SERIALIZATIONS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug, Clone)]
    struct Link {
        category_id: i64,
        product_id: Option<i64>,
    }

    impl Serialize for Link {
        fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            use serde::ser::SerializeStruct;
            SERIALIZATIONS.fetch_add(1, Ordering::SeqCst);
            let mut state = serializer.serialize_struct("Link", 2)?;
            state.serialize_field("categoryId", &self.category_id)?;
            state.serialize_field("productId", &self.product_id)?;
            state.end()
        }
    }

    impl Entity for Link {}

    #[test]
    fn test_fields_serializes_once() {
        let link = Link { category_id: 2, product_id: None };
        let before = SERIALIZATIONS.load(Ordering::SeqCst);

        let values = key_values(&link, &["categoryId", "productId", "missing"]);

        assert_eq!(values, vec![Some(json!(2)), None, None]);
        assert_eq!(SERIALIZATIONS.load(Ordering::SeqCst) - before, 1);
    }

    #[test]
    fn test_data_object_entity() {
        let mut row = DataObject::new();
        row.insert("name".to_string(), json!("Ada"));
        assert_eq!(row.field("name"), Some(json!("Ada")));
        assert_eq!(row.fields(&["missing", "name"]), vec![None, Some(json!("Ada"))]);
        assert_eq!(Count::new(2).count, 2);
    }
}
