//! Identity and lifecycle capabilities shared by every entity.
//!
//! # Responsibility
//! - Name the entity kinds and their live/archive collection names.
//! - Define the capability traits the versioned store is generic over.
//!
//! # Invariants
//! - Collection names are stable; they are persisted in every document row.
//! - `HasIdentity::persisted_id` never returns the nil identity.

use crate::model::validation::ValidationError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Opaque primary key of a live document.
pub type ObjectId = Uuid;

/// Unix epoch milliseconds.
pub type EpochMillis = i64;

/// Entity types served by the misc service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    State,
    Category,
    Hierarchy,
    Parameter,
    AttributeDefinition,
    ObjectTypeCustomization,
    StateTransitionRule,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::State,
        EntityKind::Category,
        EntityKind::Hierarchy,
        EntityKind::Parameter,
        EntityKind::AttributeDefinition,
        EntityKind::ObjectTypeCustomization,
        EntityKind::StateTransitionRule,
    ];

    /// Short singular label used in validation messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Category => "category",
            Self::Hierarchy => "hierarchy",
            Self::Parameter => "parameter",
            Self::AttributeDefinition => "attribute_definition",
            Self::ObjectTypeCustomization => "object_type_customization",
            Self::StateTransitionRule => "state_transition_rule",
        }
    }

    /// Name of the live collection.
    pub fn collection_name(self) -> &'static str {
        match self {
            Self::State => "states",
            Self::Category => "categories",
            Self::Hierarchy => "hierarchies",
            Self::Parameter => "parameters",
            Self::AttributeDefinition => "attribute_definitions",
            Self::ObjectTypeCustomization => "object_type_customizations",
            Self::StateTransitionRule => "state_transition_rules",
        }
    }

    /// Name of the append-only archive collection.
    pub fn archive_collection_name(self) -> &'static str {
        match self {
            Self::State => "states_archive",
            Self::Category => "categories_archive",
            Self::Hierarchy => "hierarchies_archive",
            Self::Parameter => "parameters_archive",
            Self::AttributeDefinition => "attribute_definitions_archive",
            Self::ObjectTypeCustomization => "object_type_customizations_archive",
            Self::StateTransitionRule => "state_transition_rules_archive",
        }
    }

    /// Resolves a live collection name. Archive names are not accepted.
    pub fn from_collection_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.collection_name() == name.trim())
    }
}

/// Lifecycle stamps carried by every entity.
///
/// Serialized inline (flattened) into the entity document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LifecycleInfo {
    /// Set once at first insert.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<EpochMillis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_at: Option<EpochMillis>,
    /// Only ever present on archived copies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<EpochMillis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_user: Option<String>,
}

/// Capability: the object may carry a store-assigned identity.
pub trait HasIdentity {
    fn id(&self) -> Option<ObjectId>;

    fn set_id(&mut self, id: ObjectId);

    /// Identity as persisted; the nil identity counts as absent.
    fn persisted_id(&self) -> Option<ObjectId> {
        self.id().filter(|id| !id.is_nil())
    }

    /// Whether the next save inserts rather than replaces.
    fn is_new(&self) -> bool {
        self.persisted_id().is_none()
    }
}

/// Capability: the object carries lifecycle stamps.
pub trait HasLifecycleInfo {
    fn lifecycle(&self) -> &LifecycleInfo;

    fn lifecycle_mut(&mut self) -> &mut LifecycleInfo;
}

/// An entity the versioned store can save, archive and delete.
pub trait DomainObject: HasIdentity + HasLifecycleInfo + Serialize + DeserializeOwned {
    const KIND: EntityKind;

    /// Entity-specific rules checked before any write.
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Deserializes an optional identity, treating `null` and `""` as absent.
pub(crate) fn deserialize_identity<'de, D>(deserializer: D) -> Result<Option<ObjectId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => Uuid::parse_str(text)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Implements `HasIdentity` and `HasLifecycleInfo` for a struct with `id` and
/// `lifecycle` fields.
macro_rules! impl_entity_capabilities {
    ($entity:ty) => {
        impl $crate::model::entity::HasIdentity for $entity {
            fn id(&self) -> Option<$crate::model::entity::ObjectId> {
                self.id
            }

            fn set_id(&mut self, id: $crate::model::entity::ObjectId) {
                self.id = Some(id);
            }
        }

        impl $crate::model::entity::HasLifecycleInfo for $entity {
            fn lifecycle(&self) -> &$crate::model::entity::LifecycleInfo {
                &self.lifecycle
            }

            fn lifecycle_mut(&mut self) -> &mut $crate::model::entity::LifecycleInfo {
                &mut self.lifecycle
            }
        }
    };
}

pub(crate) use impl_entity_capabilities;

#[cfg(test)]
mod tests {
    use super::EntityKind;

    #[test]
    fn collection_names_resolve_back_to_kind() {
        for kind in EntityKind::ALL {
            assert_eq!(
                EntityKind::from_collection_name(kind.collection_name()),
                Some(kind)
            );
            assert_eq!(
                EntityKind::from_collection_name(kind.archive_collection_name()),
                None
            );
        }
    }

    #[test]
    fn unknown_collection_name_is_rejected() {
        assert_eq!(EntityKind::from_collection_name("widgets"), None);
    }
}
