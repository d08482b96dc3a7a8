//! Object states and the rules that move objects between them.

use crate::model::entity::{
    impl_entity_capabilities, DomainObject, EntityKind, LifecycleInfo, ObjectId,
};
use crate::model::validation::{invalid, require_text, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A named state an object of some type can be in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    #[serde(
        default,
        deserialize_with = "crate::model::entity::deserialize_identity",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<ObjectId>,
    pub name: String,
    /// Object type this state applies to.
    pub object_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Objects enter their lifecycle in an initial state.
    #[serde(default)]
    pub initial: bool,
    /// No transition leaves a terminal state.
    #[serde(default)]
    pub terminal: bool,
    #[serde(flatten)]
    pub lifecycle: LifecycleInfo,
}

impl State {
    pub fn new(name: impl Into<String>, object_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            object_type: object_type.into(),
            ..Self::default()
        }
    }
}

impl_entity_capabilities!(State);

impl DomainObject for State {
    const KIND: EntityKind = EntityKind::State;

    fn validate(&self) -> Result<(), ValidationError> {
        let entity = Self::KIND.label();
        require_text(entity, "name", &self.name)?;
        require_text(entity, "objectType", &self.object_type)?;
        if self.initial && self.terminal {
            return Err(invalid(
                entity,
                "terminal",
                "a state cannot be both initial and terminal",
            ));
        }
        Ok(())
    }
}

/// Allowed move from one state to another for one object type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateTransitionRule {
    #[serde(
        default,
        deserialize_with = "crate::model::entity::deserialize_identity",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<ObjectId>,
    pub object_type: String,
    #[serde(
        default,
        deserialize_with = "crate::model::entity::deserialize_identity",
        skip_serializing_if = "Option::is_none"
    )]
    pub from_state: Option<ObjectId>,
    #[serde(
        default,
        deserialize_with = "crate::model::entity::deserialize_identity",
        skip_serializing_if = "Option::is_none"
    )]
    pub to_state: Option<ObjectId>,
    /// Roles allowed to trigger the transition; empty means unrestricted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_roles: Vec<String>,
    #[serde(flatten)]
    pub lifecycle: LifecycleInfo,
}

impl StateTransitionRule {
    pub fn new(object_type: impl Into<String>, from_state: ObjectId, to_state: ObjectId) -> Self {
        Self {
            object_type: object_type.into(),
            from_state: Some(from_state),
            to_state: Some(to_state),
            ..Self::default()
        }
    }
}

impl_entity_capabilities!(StateTransitionRule);

impl DomainObject for StateTransitionRule {
    const KIND: EntityKind = EntityKind::StateTransitionRule;

    fn validate(&self) -> Result<(), ValidationError> {
        let entity = Self::KIND.label();
        require_text(entity, "objectType", &self.object_type)?;
        let from_state = self
            .from_state
            .filter(|id| !id.is_nil())
            .ok_or(ValidationError::MissingField {
                entity,
                field: "fromState",
            })?;
        let to_state = self
            .to_state
            .filter(|id| !id.is_nil())
            .ok_or(ValidationError::MissingField {
                entity,
                field: "toState",
            })?;
        if from_state == to_state {
            return Err(invalid(entity, "toState", "must differ from fromState"));
        }

        let mut seen = BTreeSet::new();
        for role in &self.allowed_roles {
            let role = role.trim();
            if role.is_empty() {
                return Err(invalid(entity, "allowedRoles", "contains a blank role"));
            }
            if !seen.insert(role) {
                return Err(invalid(
                    entity,
                    "allowedRoles",
                    format!("duplicate role `{role}`"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{State, StateTransitionRule};
    use crate::model::entity::{DomainObject, HasIdentity};
    use crate::model::validation::ValidationError;
    use uuid::Uuid;

    #[test]
    fn state_requires_name_and_object_type() {
        let err = State::new(" ", "order").validate().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::MissingField { field: "name", .. }
        ));

        let err = State::new("open", "").validate().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::MissingField {
                field: "objectType",
                ..
            }
        ));
    }

    #[test]
    fn state_cannot_be_initial_and_terminal() {
        let mut state = State::new("open", "order");
        state.initial = true;
        state.terminal = true;
        assert!(state.validate().is_err());
    }

    #[test]
    fn transition_rule_rejects_self_loop() {
        let state = Uuid::new_v4();
        let rule = StateTransitionRule::new("order", state, state);
        assert!(rule.validate().is_err());
    }

    #[test]
    fn transition_rule_deserializes_camel_case_and_empty_id() {
        let from = Uuid::new_v4();
        let to = Uuid::new_v4();
        let rule: StateTransitionRule = serde_json::from_value(serde_json::json!({
            "id": "",
            "objectType": "order",
            "fromState": from.to_string(),
            "toState": to.to_string(),
            "allowedRoles": ["clerk"],
        }))
        .unwrap();

        assert!(rule.is_new());
        assert_eq!(rule.from_state, Some(from));
        assert_eq!(rule.to_state, Some(to));
        rule.validate().unwrap();
    }
}
