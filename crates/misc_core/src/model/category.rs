//! Categories and the hierarchies that arrange them.

use crate::model::entity::{
    impl_entity_capabilities, DomainObject, EntityKind, LifecycleInfo, ObjectId,
};
use crate::model::validation::{invalid, require_text, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Classification node; categories may nest through `parent_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(
        default,
        deserialize_with = "crate::model::entity::deserialize_identity",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<ObjectId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        deserialize_with = "crate::model::entity::deserialize_identity",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<ObjectId>,
    #[serde(flatten)]
    pub lifecycle: LifecycleInfo,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl_entity_capabilities!(Category);

impl DomainObject for Category {
    const KIND: EntityKind = EntityKind::Category;

    fn validate(&self) -> Result<(), ValidationError> {
        let entity = Self::KIND.label();
        require_text(entity, "name", &self.name)?;
        if let (Some(id), Some(parent_id)) = (self.id, self.parent_id) {
            if !id.is_nil() && id == parent_id {
                return Err(invalid(entity, "parentId", "a category cannot be its own parent"));
            }
        }
        Ok(())
    }
}

/// Named, ordered list of levels used to arrange categories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hierarchy {
    #[serde(
        default,
        deserialize_with = "crate::model::entity::deserialize_identity",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<ObjectId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Level names from root to leaf.
    #[serde(default)]
    pub levels: Vec<String>,
    #[serde(flatten)]
    pub lifecycle: LifecycleInfo,
}

impl Hierarchy {
    pub fn new(name: impl Into<String>, levels: Vec<String>) -> Self {
        Self {
            name: name.into(),
            levels,
            ..Self::default()
        }
    }
}

impl_entity_capabilities!(Hierarchy);

impl DomainObject for Hierarchy {
    const KIND: EntityKind = EntityKind::Hierarchy;

    fn validate(&self) -> Result<(), ValidationError> {
        let entity = Self::KIND.label();
        require_text(entity, "name", &self.name)?;
        if self.levels.is_empty() {
            return Err(ValidationError::MissingField {
                entity,
                field: "levels",
            });
        }

        let mut seen = BTreeSet::new();
        for level in &self.levels {
            let normalized = level.trim().to_lowercase();
            if normalized.is_empty() {
                return Err(invalid(entity, "levels", "contains a blank level"));
            }
            if !seen.insert(normalized) {
                return Err(invalid(
                    entity,
                    "levels",
                    format!("duplicate level `{}`", level.trim()),
                ));
            }
        }
        Ok(())
    }
}
