//! Named configuration parameters.

use crate::model::entity::{
    impl_entity_capabilities, DomainObject, EntityKind, LifecycleInfo, ObjectId,
};
use crate::model::validation::{invalid, require_text, ValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static PARAMETER_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_.\-]*$").expect("valid parameter name regex"));

/// Key/value parameter consumed by other services.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    #[serde(
        default,
        deserialize_with = "crate::model::entity::deserialize_identity",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<ObjectId>,
    /// Dotted key, e.g. `billing.retry_limit`.
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub lifecycle: LifecycleInfo,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Self::default()
        }
    }
}

impl_entity_capabilities!(Parameter);

impl DomainObject for Parameter {
    const KIND: EntityKind = EntityKind::Parameter;

    fn validate(&self) -> Result<(), ValidationError> {
        let entity = Self::KIND.label();
        require_text(entity, "name", &self.name)?;
        if !PARAMETER_NAME_RE.is_match(&self.name) {
            return Err(invalid(
                entity,
                "name",
                format!(
                    "`{}` must start with a letter and contain only letters, digits, `_`, `.` or `-`",
                    self.name
                ),
            ));
        }
        Ok(())
    }
}
