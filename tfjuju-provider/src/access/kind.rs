//! The capability every access target kind provides

use std::collections::HashMap;

use tfjuju_client::tag::{is_valid_service_account_id, is_valid_user_email, is_valid_uuid};
use tfjuju_client::tag::{with_service_account_domain, without_service_account_domain};
use tfjuju_client::{PrincipalKind, Tag};
use tfjuju_core::resource::{Value, get_string, get_string_set};
use tfjuju_core::schema::{AttributeSchema, AttributeType, ResourceSchema, ResourceValidator, types};

use super::{AccessError, GenericAccessData, Principals};

pub const ATTR_ACCESS: &str = "access";
pub const ATTR_ID: &str = "id";
pub const ATTR_USERS: &str = "users";
pub const ATTR_GROUPS: &str = "groups";
pub const ATTR_ROLES: &str = "roles";
pub const ATTR_SERVICE_ACCOUNTS: &str = "service_account_ids";

/// Configuration attribute holding the principals of `kind`
pub fn principal_attribute(kind: PrincipalKind) -> &'static str {
    match kind {
        PrincipalKind::User => ATTR_USERS,
        PrincipalKind::Group => ATTR_GROUPS,
        PrincipalKind::Role => ATTR_ROLES,
        PrincipalKind::ServiceAccount => ATTR_SERVICE_ACCOUNTS,
    }
}

pub(crate) fn validate_user(value: &Value) -> Result<(), String> {
    match value {
        Value::String(s) if is_valid_user_email(s) => Ok(()),
        Value::String(s) => Err(format!("{:?} is not a valid user email", s)),
        _ => Err("Expected string".to_string()),
    }
}

pub(crate) fn validate_uuid(value: &Value) -> Result<(), String> {
    match value {
        Value::String(s) if is_valid_uuid(s) => Ok(()),
        Value::String(s) => Err(format!("{:?} is not a valid UUID", s)),
        _ => Err("Expected string".to_string()),
    }
}

pub(crate) fn validate_service_account(value: &Value) -> Result<(), String> {
    match value {
        Value::String(s) if is_valid_service_account_id(&with_service_account_domain(s)) => Ok(()),
        Value::String(s) => Err(format!("{:?} is not a valid service account id", s)),
        _ => Err("Expected string".to_string()),
    }
}

/// Adapter between one target kind's configuration shape and
/// [`GenericAccessData`].
///
/// Implementations are stateless. The defaulted methods cover the shape all
/// kinds share; a kind overrides them where its target differs.
pub trait AccessTargetKind: Send + Sync + 'static {
    /// Resource type name, e.g. `juju_jaas_access_model`
    fn resource_type(&self) -> &'static str;

    /// Attribute naming the target; `None` when the target is implicit
    fn target_attribute(&self) -> Option<&'static str>;

    /// Schema type of the target attribute
    fn target_type(&self) -> AttributeType {
        types::non_empty_string()
    }

    fn supports_roles(&self) -> bool {
        true
    }

    /// Target of kinds without a target attribute
    fn implicit_target(&self) -> Option<Tag> {
        None
    }

    /// Parse a bare identifier, as given to import, into the target tag
    fn tag_from_id(&self, id: &str) -> Result<Tag, AccessError>;

    /// Expected shape of the import argument
    fn import_hint(&self) -> &'static str;

    /// Inverse of [`AccessTargetKind::tag_from_id`]
    fn id_from_tag(&self, tag: &Tag) -> String {
        tag.id().to_string()
    }

    /// Principal kinds this target accepts
    fn principal_kinds(&self) -> Vec<PrincipalKind> {
        PrincipalKind::ALL
            .into_iter()
            .filter(|kind| *kind != PrincipalKind::Role || self.supports_roles())
            .collect()
    }

    /// Extract the generic shape from plan or state attributes.
    ///
    /// Service account ids lose their domain here, matching what read-back
    /// produces.
    ///
    /// An absent target attribute yields `None` rather than an error: state
    /// being imported has no attributes yet.
    fn info(
        &self,
        attributes: &HashMap<String, Value>,
    ) -> Result<(GenericAccessData, Option<Tag>), AccessError> {
        let mut principals = Principals::default();
        for kind in PrincipalKind::ALL {
            let mut ids = get_string_set(attributes, principal_attribute(kind));
            if kind == PrincipalKind::ServiceAccount {
                ids = ids
                    .iter()
                    .map(|id| without_service_account_domain(id).to_string())
                    .collect();
            }
            if kind == PrincipalKind::Role && !self.supports_roles() && !ids.is_empty() {
                return Err(AccessError::UnsupportedPrincipal {
                    kind,
                    resource_type: self.resource_type(),
                });
            }
            *principals.get_mut(kind) = ids;
        }

        let data = GenericAccessData {
            id: get_string(attributes, ATTR_ID).map(str::to_string),
            access: get_string(attributes, ATTR_ACCESS)
                .unwrap_or_default()
                .to_string(),
            principals,
        };

        let tag = match self.target_attribute() {
            Some(attr) => match get_string(attributes, attr) {
                Some(id) => Some(self.tag_from_id(id)?),
                None => None,
            },
            None => self.implicit_target(),
        };

        Ok((data, tag))
    }

    /// Write the generic shape back into state attributes
    fn save(&self, data: &GenericAccessData, tag: &Tag) -> HashMap<String, Value> {
        let mut attributes = HashMap::new();

        if let Some(attr) = self.target_attribute() {
            attributes.insert(attr.to_string(), Value::String(self.id_from_tag(tag)));
        }
        attributes.insert(ATTR_ACCESS.to_string(), Value::String(data.access.clone()));
        attributes.insert(
            ATTR_ID.to_string(),
            Value::String(self.access_id(tag, &data.access)),
        );

        for kind in self.principal_kinds() {
            let ids = data.principals.get(kind);
            if !ids.is_empty() {
                attributes.insert(
                    principal_attribute(kind).to_string(),
                    Value::Set(ids.clone()),
                );
            }
        }

        attributes
    }

    /// `<target-id>:<access>`, the resource identifier and import argument
    fn access_id(&self, tag: &Tag, access: &str) -> String {
        format!("{}:{}", self.id_from_tag(tag), access)
    }

    /// Split an identifier produced by [`AccessTargetKind::access_id`].
    /// The access level never contains `:`, target ids (offer URLs) may.
    fn parse_access_id(&self, id: &str) -> Result<(Tag, String), AccessError> {
        let (target, access) = id
            .rsplit_once(':')
            .filter(|(target, access)| !target.is_empty() && !access.is_empty())
            .ok_or_else(|| AccessError::InvalidImportId(id.to_string(), self.import_hint()))?;
        Ok((self.tag_from_id(target)?, access.to_string()))
    }

    /// Plan schema: target and access force replacement, at least one
    /// principal must be named.
    fn schema(&self) -> ResourceSchema {
        let mut schema = ResourceSchema::new(self.resource_type())
            .attribute(
                AttributeSchema::new(ATTR_ACCESS, types::non_empty_string())
                    .required()
                    .requires_replace()
                    .with_description("Level of access to grant; valid values depend on the target"),
            )
            .attribute(
                AttributeSchema::new(ATTR_USERS, types::custom_string_set("UserEmail", validate_user))
                    .with_description("Users to grant access to"),
            )
            .attribute(
                AttributeSchema::new(ATTR_GROUPS, types::custom_string_set("GroupId", validate_uuid))
                    .with_description("Groups to grant access to"),
            )
            .attribute(
                AttributeSchema::new(
                    ATTR_SERVICE_ACCOUNTS,
                    types::custom_string_set("ServiceAccountId", validate_service_account),
                )
                .with_description("Service accounts to grant access to, without domain"),
            )
            .attribute(AttributeSchema::new(ATTR_ID, AttributeType::String).computed());

        if let Some(attr) = self.target_attribute() {
            schema = schema.attribute(
                AttributeSchema::new(attr, self.target_type())
                    .required()
                    .requires_replace(),
            );
        }

        let mut principal_attributes = vec![
            ATTR_USERS.to_string(),
            ATTR_GROUPS.to_string(),
            ATTR_SERVICE_ACCOUNTS.to_string(),
        ];
        if self.supports_roles() {
            schema = schema.attribute(
                AttributeSchema::new(ATTR_ROLES, types::custom_string_set("RoleId", validate_uuid))
                    .with_description("Roles to grant access to"),
            );
            principal_attributes.push(ATTR_ROLES.to_string());
        }

        schema.validator(ResourceValidator::AtLeastOneOf(principal_attributes))
    }
}
