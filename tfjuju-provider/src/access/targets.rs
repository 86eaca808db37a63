//! Access target kinds

use tfjuju_client::tag::without_service_account_domain;
use tfjuju_client::{Tag, TagKind};
use tfjuju_core::resource::Value;
use tfjuju_core::schema::{AttributeType, types};

use super::kind::{AccessTargetKind, validate_service_account, validate_uuid};
use super::AccessError;

fn tag(kind: TagKind, id: &str) -> Result<Tag, AccessError> {
    Tag::new(kind, id).map_err(|e| AccessError::invalid_id(id, e))
}

fn validate_cloud_name(value: &Value) -> Result<(), String> {
    match value {
        Value::String(s) if tfjuju_client::tag::is_valid_cloud_name(s) => Ok(()),
        Value::String(s) => Err(format!("{:?} is not a valid cloud name", s)),
        _ => Err("Expected string".to_string()),
    }
}

fn validate_offer_url(value: &Value) -> Result<(), String> {
    match value {
        Value::String(s) if tfjuju_client::tag::is_valid_offer_url(s) => Ok(()),
        Value::String(s) => Err(format!("{:?} is not a valid offer URL", s)),
        _ => Err("Expected string".to_string()),
    }
}

/// `juju_jaas_access_model`
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelTarget;

impl AccessTargetKind for ModelTarget {
    fn resource_type(&self) -> &'static str {
        "juju_jaas_access_model"
    }

    fn target_attribute(&self) -> Option<&'static str> {
        Some("model_uuid")
    }

    fn target_type(&self) -> AttributeType {
        types::custom_string("ModelUuid", validate_uuid)
    }

    fn tag_from_id(&self, id: &str) -> Result<Tag, AccessError> {
        tag(TagKind::Model, id)
    }

    fn import_hint(&self) -> &'static str {
        "<model-UUID>:<access-level>"
    }
}

/// `juju_jaas_access_cloud`
#[derive(Debug, Clone, Copy, Default)]
pub struct CloudTarget;

impl AccessTargetKind for CloudTarget {
    fn resource_type(&self) -> &'static str {
        "juju_jaas_access_cloud"
    }

    fn target_attribute(&self) -> Option<&'static str> {
        Some("cloud_name")
    }

    fn target_type(&self) -> AttributeType {
        types::custom_string("CloudName", validate_cloud_name)
    }

    fn tag_from_id(&self, id: &str) -> Result<Tag, AccessError> {
        tag(TagKind::Cloud, id)
    }

    fn import_hint(&self) -> &'static str {
        "<cloud-name>:<access-level>"
    }
}

/// `juju_jaas_access_offer`
#[derive(Debug, Clone, Copy, Default)]
pub struct OfferTarget;

impl AccessTargetKind for OfferTarget {
    fn resource_type(&self) -> &'static str {
        "juju_jaas_access_offer"
    }

    fn target_attribute(&self) -> Option<&'static str> {
        Some("offer_url")
    }

    fn target_type(&self) -> AttributeType {
        types::custom_string("OfferUrl", validate_offer_url)
    }

    fn tag_from_id(&self, id: &str) -> Result<Tag, AccessError> {
        tag(TagKind::ApplicationOffer, id)
    }

    fn import_hint(&self) -> &'static str {
        "<offer-url>:<access-level>"
    }
}

/// `juju_jaas_access_service_account`
///
/// The target attribute holds the client id without its domain; the tag
/// carries it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceAccountTarget;

impl AccessTargetKind for ServiceAccountTarget {
    fn resource_type(&self) -> &'static str {
        "juju_jaas_access_service_account"
    }

    fn target_attribute(&self) -> Option<&'static str> {
        Some("service_account_id")
    }

    fn target_type(&self) -> AttributeType {
        types::custom_string("ServiceAccountId", validate_service_account)
    }

    fn supports_roles(&self) -> bool {
        false
    }

    fn tag_from_id(&self, id: &str) -> Result<Tag, AccessError> {
        Tag::service_account(id).map_err(|e| AccessError::invalid_id(id, e))
    }

    fn id_from_tag(&self, tag: &Tag) -> String {
        without_service_account_domain(tag.id()).to_string()
    }

    fn import_hint(&self) -> &'static str {
        "<service-account-id>:<access-level>"
    }
}

/// `juju_jaas_access_role`
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleTarget;

impl AccessTargetKind for RoleTarget {
    fn resource_type(&self) -> &'static str {
        "juju_jaas_access_role"
    }

    fn target_attribute(&self) -> Option<&'static str> {
        Some("role_id")
    }

    fn target_type(&self) -> AttributeType {
        types::custom_string("RoleId", validate_uuid)
    }

    fn supports_roles(&self) -> bool {
        false
    }

    fn tag_from_id(&self, id: &str) -> Result<Tag, AccessError> {
        tag(TagKind::Role, id)
    }

    fn import_hint(&self) -> &'static str {
        "<role-UUID>:<access-level>"
    }
}

/// `juju_jaas_access_group`
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupTarget;

impl AccessTargetKind for GroupTarget {
    fn resource_type(&self) -> &'static str {
        "juju_jaas_access_group"
    }

    fn target_attribute(&self) -> Option<&'static str> {
        Some("group_id")
    }

    fn target_type(&self) -> AttributeType {
        types::custom_string("GroupId", validate_uuid)
    }

    fn supports_roles(&self) -> bool {
        false
    }

    fn tag_from_id(&self, id: &str) -> Result<Tag, AccessError> {
        tag(TagKind::Group, id)
    }

    fn import_hint(&self) -> &'static str {
        "<group-UUID>:<access-level>"
    }
}

/// `juju_jaas_access_controller`
///
/// JAAS exposes a single controller, so there is no target attribute.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControllerTarget;

impl AccessTargetKind for ControllerTarget {
    fn resource_type(&self) -> &'static str {
        "juju_jaas_access_controller"
    }

    fn target_attribute(&self) -> Option<&'static str> {
        None
    }

    fn implicit_target(&self) -> Option<Tag> {
        Some(Tag::controller())
    }

    fn tag_from_id(&self, id: &str) -> Result<Tag, AccessError> {
        tag(TagKind::Controller, id)
    }

    fn import_hint(&self) -> &'static str {
        "jimm:<access-level>"
    }
}
