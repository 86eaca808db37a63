//! Schema - Define type schemas for resources
//!
//! Each resource type declares a schema. Plans are validated against it
//! before any call reaches the controller, so malformed identifiers and
//! unsatisfied preconditions never turn into remote errors.

use std::collections::HashMap;
use std::fmt;

use crate::resource::Value;

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Boolean
    Bool,
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: fn(&Value) -> Result<(), String>,
    },
    /// List
    List(Box<AttributeType>),
    /// Set of unique strings, each checked against the inner type
    Set(Box<AttributeType>),
    /// Map
    Map(Box<AttributeType>),
}

impl AttributeType {
    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Custom { validate, base, .. }, v) => {
                base.validate(v)?;
                validate(v).map_err(|message| TypeError::ValidationFailed { message })
            }

            (AttributeType::List(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Set(inner), Value::Set(items)) => {
                for item in items {
                    inner
                        .validate(&Value::String(item.clone()))
                        .map_err(|e| TypeError::SetItemError {
                            item: item.clone(),
                            inner: Box::new(e),
                        })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name().to_string(),
            }),
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Set(inner) => format!("Set<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Attribute '{name}' is computed and cannot be set")]
    ComputedAttribute { name: String },

    #[error("At least one of [{}] must be set", names.join(", "))]
    AtLeastOneOf { names: Vec<String> },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Set item '{item}': {inner}")]
    SetItemError { item: String, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },

    #[error("Attribute '{name}': {inner}")]
    AttributeError { name: String, inner: Box<TypeError> },
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    /// Set by the provider, never by configuration
    pub computed: bool,
    /// May be set by configuration; the provider fills it in when unset
    pub optional_computed: bool,
    /// A change to this attribute destroys and recreates the resource
    pub requires_replace: bool,
    pub description: Option<String>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            computed: false,
            optional_computed: false,
            requires_replace: false,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn optional_computed(mut self) -> Self {
        self.optional_computed = true;
        self
    }

    pub fn requires_replace(mut self) -> Self {
        self.requires_replace = true;
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// Cross-attribute constraint checked at plan time
#[derive(Debug, Clone)]
pub enum ResourceValidator {
    /// At least one of the named attributes must be present and non-empty
    AtLeastOneOf(Vec<String>),
}

impl ResourceValidator {
    fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), TypeError> {
        match self {
            ResourceValidator::AtLeastOneOf(names) => {
                if names
                    .iter()
                    .any(|name| attributes.get(name).is_some_and(is_set))
                {
                    Ok(())
                } else {
                    Err(TypeError::AtLeastOneOf {
                        names: names.clone(),
                    })
                }
            }
        }
    }
}

fn is_set(value: &Value) -> bool {
    match value {
        Value::String(s) => !s.is_empty(),
        Value::List(items) => !items.is_empty(),
        Value::Set(items) => !items.is_empty(),
        Value::Map(map) => !map.is_empty(),
        Value::Int(_) | Value::Bool(_) => true,
    }
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub validators: Vec<ResourceValidator>,
    pub description: Option<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            validators: Vec::new(),
            description: None,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn validator(mut self, validator: ResourceValidator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Validate resource attributes of a plan
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        let mut errors = Vec::new();

        // Check required attributes
        for (name, schema) in &self.attributes {
            if schema.required && !attributes.contains_key(name) {
                errors.push(TypeError::MissingRequired { name: name.clone() });
            }
        }

        // Type check each attribute
        for (name, value) in attributes {
            let Some(schema) = self.attributes.get(name) else {
                continue;
            };
            if schema.computed && !schema.required {
                errors.push(TypeError::ComputedAttribute { name: name.clone() });
                continue;
            }
            if let Err(e) = schema.attr_type.validate(value) {
                errors.push(TypeError::AttributeError {
                    name: name.clone(),
                    inner: Box::new(e),
                });
            }
        }

        for validator in &self.validators {
            if let Err(e) = validator.validate(attributes) {
                errors.push(e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Helper functions for common types
pub mod types {
    use super::*;

    /// String checked by a validation function
    pub fn custom_string(
        name: impl Into<String>,
        validate: fn(&Value) -> Result<(), String>,
    ) -> AttributeType {
        AttributeType::Custom {
            name: name.into(),
            base: Box::new(AttributeType::String),
            validate,
        }
    }

    /// Set of strings, each checked by a validation function
    pub fn custom_string_set(
        name: impl Into<String>,
        validate: fn(&Value) -> Result<(), String>,
    ) -> AttributeType {
        AttributeType::Set(Box::new(custom_string(name, validate)))
    }

    /// String that must not be empty
    pub fn non_empty_string() -> AttributeType {
        custom_string("NonEmptyString", |value| match value {
            Value::String(s) if !s.trim().is_empty() => Ok(()),
            _ => Err("Value must not be empty".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access_schema() -> ResourceSchema {
        ResourceSchema::new("access")
            .attribute(AttributeSchema::new("access", types::non_empty_string()).required())
            .attribute(AttributeSchema::new(
                "users",
                AttributeType::Set(Box::new(AttributeType::String)),
            ))
            .attribute(AttributeSchema::new(
                "groups",
                AttributeType::Set(Box::new(AttributeType::String)),
            ))
            .attribute(AttributeSchema::new("id", AttributeType::String).computed())
            .validator(ResourceValidator::AtLeastOneOf(vec![
                "users".to_string(),
                "groups".to_string(),
            ]))
    }

    #[test]
    fn validate_string_type() {
        let t = AttributeType::String;
        assert!(t.validate(&Value::String("hello".to_string())).is_ok());
        assert!(t.validate(&Value::Int(42)).is_err());
    }

    #[test]
    fn validate_set_items() {
        let t = types::custom_string_set("Lowercase", |v| match v {
            Value::String(s) if s.chars().all(|c| c.is_ascii_lowercase()) => Ok(()),
            _ => Err("must be lowercase".to_string()),
        });
        assert!(t.validate(&Value::string_set(["abc", "def"])).is_ok());
        let err = t.validate(&Value::string_set(["abc", "DEF"])).unwrap_err();
        assert!(matches!(err, TypeError::SetItemError { ref item, .. } if item == "DEF"));
    }

    #[test]
    fn at_least_one_principal_required() {
        let schema = access_schema();
        let attrs = HashMap::from([
            ("access".to_string(), Value::String("reader".to_string())),
            ("users".to_string(), Value::Set(Default::default())),
        ]);
        let errors = schema.validate(&attrs).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], TypeError::AtLeastOneOf { .. }));
    }

    #[test]
    fn valid_access_plan() {
        let schema = access_schema();
        let attrs = HashMap::from([
            ("access".to_string(), Value::String("reader".to_string())),
            ("groups".to_string(), Value::string_set(["g1"])),
        ]);
        assert!(schema.validate(&attrs).is_ok());
    }

    #[test]
    fn computed_attribute_cannot_be_set() {
        let schema = access_schema();
        let attrs = HashMap::from([
            ("access".to_string(), Value::String("reader".to_string())),
            ("users".to_string(), Value::string_set(["a@x.com"])),
            ("id".to_string(), Value::String("x".to_string())),
        ]);
        let errors = schema.validate(&attrs).unwrap_err();
        assert!(matches!(errors[0], TypeError::ComputedAttribute { .. }));
    }

    #[test]
    fn missing_required_attribute() {
        let schema = access_schema();
        let attrs = HashMap::from([("users".to_string(), Value::string_set(["a@x.com"]))]);
        let errors = schema.validate(&attrs).unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, TypeError::MissingRequired { name } if name == "access"))
        );
    }
}
