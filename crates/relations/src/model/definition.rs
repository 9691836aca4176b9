//! Model Definitions - properties, primary keys and declared relations of a model

use serde::{Deserialize, Serialize};

use crate::relations::inference::ForeignKeyConvention;
use crate::relations::metadata::{RelationDefinition, ThroughDefinition};

/// Property value types a model can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Number,
    Boolean,
    Date,
    Object,
    Array,
    Any,
}

/// A single property of a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    /// Whether this property is (part of) the primary key
    #[serde(default)]
    pub id: bool,
    #[serde(default)]
    pub required: bool,
}

impl PropertyDefinition {
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            property_type,
            id: false,
            required: false,
        }
    }

    /// Mark the property as the primary key
    pub fn id(mut self) -> Self {
        self.id = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Describes a model: its name, properties and relations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub name: String,
    #[serde(default)]
    properties: Vec<PropertyDefinition>,
    #[serde(default)]
    relations: Vec<RelationDefinition>,
}

impl ModelDefinition {
    /// Create an empty model definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Add a property; a property with the same name is replaced
    pub fn add_property(mut self, property: PropertyDefinition) -> Self {
        self.insert_property(property);
        self
    }

    /// Shorthand for a primary key property
    pub fn id_property(self, name: &str, property_type: PropertyType) -> Self {
        self.add_property(PropertyDefinition::new(name, property_type).id())
    }

    /// Shorthand for a plain property
    pub fn property_of(self, name: &str, property_type: PropertyType) -> Self {
        self.add_property(PropertyDefinition::new(name, property_type))
    }

    fn insert_property(&mut self, property: PropertyDefinition) {
        match self.properties.iter_mut().find(|p| p.name == property.name) {
            Some(existing) => *existing = property,
            None => self.properties.push(property),
        }
    }

    /// Get a property by name
    pub fn property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Check whether a property is declared
    pub fn has_property(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    /// All declared properties in declaration order
    pub fn properties(&self) -> &[PropertyDefinition] {
        &self.properties
    }

    /// Names of the primary key properties in declaration order
    pub fn id_properties(&self) -> Vec<&str> {
        self.properties
            .iter()
            .filter(|p| p.id)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// The first primary key property, if any
    pub fn primary_key(&self) -> Option<&str> {
        self.properties.iter().find(|p| p.id).map(|p| p.name.as_str())
    }

    /// Attach relation metadata to this model.
    ///
    /// A belongsTo relation with an explicit `key_from` declares that key as a
    /// property when the model does not have it yet.
    pub fn with_relation(mut self, mut relation: RelationDefinition) -> Self {
        relation.base_mut().source = self.name.clone();

        if let RelationDefinition::BelongsTo(base) = &relation {
            if let Some(key) = &base.key_from {
                if !self.has_property(key) {
                    self.insert_property(PropertyDefinition::new(key.clone(), PropertyType::Any));
                }
            }
        }

        let name = relation.name().to_string();
        match self.relations.iter_mut().find(|r| r.name() == name) {
            Some(existing) => *existing = relation,
            None => self.relations.push(relation),
        }
        self
    }

    pub fn has_many(self, name: &str, target: &str) -> Self {
        let relation = RelationDefinition::has_many(&self.name, name, target);
        self.with_relation(relation)
    }

    pub fn has_many_through(self, name: &str, target: &str, through: ThroughDefinition) -> Self {
        let relation = RelationDefinition::has_many_through(&self.name, name, target, through);
        self.with_relation(relation)
    }

    pub fn has_one(self, name: &str, target: &str) -> Self {
        let relation = RelationDefinition::has_one(&self.name, name, target);
        self.with_relation(relation)
    }

    /// Declare a belongsTo relation keyed by the conventional `<target>Id`
    /// property, which is added when the model does not declare it
    pub fn belongs_to(self, name: &str, target: &str) -> Self {
        let key = ForeignKeyConvention::default().foreign_key_for(target);
        self.belongs_to_key(name, target, &key)
    }

    /// Declare a belongsTo relation whose foreign key is the property `key`
    pub fn belongs_to_key(self, name: &str, target: &str, key: &str) -> Self {
        let relation = RelationDefinition::belongs_to(&self.name, name, target).with_key_from(key);
        self.with_relation(relation)
    }

    pub fn embeds_one(self, name: &str, target: &str) -> Self {
        let relation = RelationDefinition::embeds_one(&self.name, name, target);
        self.with_relation(relation)
    }

    pub fn embeds_many(self, name: &str, target: &str) -> Self {
        let relation = RelationDefinition::embeds_many(&self.name, name, target);
        self.with_relation(relation)
    }

    pub fn references_one(self, name: &str, target: &str) -> Self {
        let relation = RelationDefinition::references_one(&self.name, name, target);
        self.with_relation(relation)
    }

    pub fn references_many(self, name: &str, target: &str) -> Self {
        let relation = RelationDefinition::references_many(&self.name, name, target);
        self.with_relation(relation)
    }

    /// Get a relation declared on this model
    pub fn relation(&self, name: &str) -> Option<&RelationDefinition> {
        self.relations.iter().find(|r| r.name() == name)
    }

    /// All relations declared on this model
    pub fn relations(&self) -> &[RelationDefinition] {
        &self.relations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relations::metadata::RelationType;

    #[test]
    fn test_id_properties_in_declaration_order() {
        let model = ModelDefinition::new("Link")
            .id_property("left", PropertyType::Number)
            .property_of("label", PropertyType::String)
            .id_property("right", PropertyType::Number);

        assert_eq!(model.id_properties(), vec!["left", "right"]);
        assert_eq!(model.primary_key(), Some("left"));
        assert!(model.has_property("label"));
        assert!(!model.has_property("missing"));
    }

    #[test]
    fn test_model_without_primary_key() {
        let model = ModelDefinition::new("Note").property_of("title", PropertyType::String);
        assert!(model.id_properties().is_empty());
        assert_eq!(model.primary_key(), None);
    }

    #[test]
    fn test_add_property_replaces_existing() {
        let model = ModelDefinition::new("Customer")
            .property_of("id", PropertyType::String)
            .id_property("id", PropertyType::Number);

        assert_eq!(model.properties().len(), 1);
        assert_eq!(model.property("id").unwrap().property_type, PropertyType::Number);
        assert!(model.property("id").unwrap().id);
    }

    #[test]
    fn test_relation_builders_set_source() {
        let model = ModelDefinition::new("Customer")
            .id_property("id", PropertyType::Number)
            .has_many("orders", "Order")
            .has_one("address", "Address")
            .references_many("accounts", "Account");

        let orders = model.relation("orders").unwrap();
        assert_eq!(orders.relation_type(), RelationType::HasMany);
        assert_eq!(orders.source(), "Customer");
        assert_eq!(model.relations().len(), 3);
        assert!(model.relation("accounts").unwrap().targets_many());
    }

    #[test]
    fn test_belongs_to_declares_explicit_key() {
        let relation = RelationDefinition::belongs_to("Order", "customer", "Customer")
            .with_key_from("customerId");
        let model = ModelDefinition::new("Order")
            .id_property("id", PropertyType::Number)
            .with_relation(relation);

        assert!(model.has_property("customerId"));
        assert_eq!(model.property("customerId").unwrap().property_type, PropertyType::Any);
    }

    #[test]
    fn test_belongs_to_declares_conventional_key() {
        let model = ModelDefinition::new("Shop")
            .id_property("id", PropertyType::Number)
            .belongs_to("region", "Region")
            .belongs_to("owner", "StoreOwner");

        assert!(model.has_property("regionId"));
        assert!(model.has_property("storeOwnerId"));
        assert_eq!(model.relation("region").unwrap().base().key_from.as_deref(), Some("regionId"));
    }

    #[test]
    fn test_belongs_to_keeps_declared_key_property() {
        let model = ModelDefinition::new("Shop")
            .id_property("id", PropertyType::Number)
            .property_of("region_code", PropertyType::String)
            .belongs_to_key("region", "Region", "region_code");

        assert_eq!(model.properties().len(), 2);
        assert_eq!(model.property("region_code").unwrap().property_type, PropertyType::String);
        assert_eq!(model.relation("region").unwrap().base().key_from.as_deref(), Some("region_code"));
    }

    #[test]
    fn test_model_definition_from_json() {
        let model: ModelDefinition = serde_json::from_str(
            r#"{
                "name": "Order",
                "properties": [
                    {"name": "id", "type": "number", "id": true},
                    {"name": "customerId", "type": "number"}
                ],
                "relations": [
                    {"type": "belongsTo", "name": "customer", "source": "Order", "target": "Customer"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(model.primary_key(), Some("id"));
        let relation = model.relation("customer").unwrap();
        assert_eq!(relation.relation_type(), RelationType::BelongsTo);
        assert_eq!(relation.base().target.as_ref().unwrap().model_name(), "Customer");
    }
}
