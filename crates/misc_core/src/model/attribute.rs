//! Attribute definitions and per-object-type customizations.

use crate::model::entity::{
    impl_entity_capabilities, DomainObject, EntityKind, LifecycleInfo, ObjectId,
};
use crate::model::validation::{invalid, require_text, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Value type of a custom attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeDataType {
    #[default]
    Text,
    Integer,
    Decimal,
    Boolean,
    Date,
    /// Value must be one of `allowed_values`.
    Enumeration,
}

/// Custom attribute that can be attached to objects of one type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDefinition {
    #[serde(
        default,
        deserialize_with = "crate::model::entity::deserialize_identity",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<ObjectId>,
    pub name: String,
    pub object_type: String,
    #[serde(default)]
    pub data_type: AttributeDataType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<String>,
    #[serde(flatten)]
    pub lifecycle: LifecycleInfo,
}

impl AttributeDefinition {
    pub fn new(
        name: impl Into<String>,
        object_type: impl Into<String>,
        data_type: AttributeDataType,
    ) -> Self {
        Self {
            name: name.into(),
            object_type: object_type.into(),
            data_type,
            ..Self::default()
        }
    }
}

impl_entity_capabilities!(AttributeDefinition);

impl DomainObject for AttributeDefinition {
    const KIND: EntityKind = EntityKind::AttributeDefinition;

    fn validate(&self) -> Result<(), ValidationError> {
        let entity = Self::KIND.label();
        require_text(entity, "name", &self.name)?;
        require_text(entity, "objectType", &self.object_type)?;

        match (self.data_type, self.allowed_values.is_empty()) {
            (AttributeDataType::Enumeration, true) => Err(invalid(
                entity,
                "allowedValues",
                "enumeration attributes need at least one allowed value",
            )),
            (AttributeDataType::Enumeration, false) => {
                let mut seen = BTreeSet::new();
                for value in &self.allowed_values {
                    if !seen.insert(value.as_str()) {
                        return Err(invalid(
                            entity,
                            "allowedValues",
                            format!("duplicate value `{value}`"),
                        ));
                    }
                }
                Ok(())
            }
            (_, false) => Err(invalid(
                entity,
                "allowedValues",
                "only enumeration attributes take allowed values",
            )),
            (_, true) => Ok(()),
        }
    }
}

/// Attribute and category selection for one object type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectTypeCustomization {
    #[serde(
        default,
        deserialize_with = "crate::model::entity::deserialize_identity",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<ObjectId>,
    pub object_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Attribute definitions shown for this type, in display order.
    #[serde(default)]
    pub attribute_ids: Vec<ObjectId>,
    #[serde(default)]
    pub category_ids: Vec<ObjectId>,
    #[serde(flatten)]
    pub lifecycle: LifecycleInfo,
}

impl ObjectTypeCustomization {
    pub fn new(object_type: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            ..Self::default()
        }
    }
}

impl_entity_capabilities!(ObjectTypeCustomization);

impl DomainObject for ObjectTypeCustomization {
    const KIND: EntityKind = EntityKind::ObjectTypeCustomization;

    fn validate(&self) -> Result<(), ValidationError> {
        let entity = Self::KIND.label();
        require_text(entity, "objectType", &self.object_type)?;
        ensure_unique_ids(entity, "attributeIds", &self.attribute_ids)?;
        ensure_unique_ids(entity, "categoryIds", &self.category_ids)
    }
}

fn ensure_unique_ids(
    entity: &'static str,
    field: &'static str,
    ids: &[ObjectId],
) -> Result<(), ValidationError> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if id.is_nil() {
            return Err(invalid(entity, field, "contains the nil id"));
        }
        if !seen.insert(*id) {
            return Err(invalid(entity, field, format!("duplicate id `{id}`")));
        }
    }
    Ok(())
}
