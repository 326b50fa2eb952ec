use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::owner_type::OwnerType;

/// Name/value constraint on the values an attribute or field may hold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ValidationRule {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

/// One field of an object-type definition.
///
/// Serializes to the shape the create mutation expects, so it is copied into
/// creation inputs as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub name: String,
    pub key: String,
    pub description: Option<String>,
    pub required: bool,
    #[serde(rename = "type")]
    pub value_type: String,
    pub validations: Vec<ValidationRule>,
}

/// Custom structured content type ("metaobject definition") of a tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectTypeDefinition {
    pub id: String,
    pub name: String,
    /// Stable type name; the key used to match definitions across tenants
    #[serde(rename = "type")]
    pub type_name: String,
    pub description: Option<String>,
    pub display_name_key: Option<String>,
    pub field_definitions: Vec<FieldSpec>,
}

/// Typed attribute ("metafield definition") attachable to one owner type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDefinition {
    pub name: String,
    pub key: String,
    pub namespace: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub value_type: String,
    pub owner_type: OwnerType,
    /// Values of zero or below, or no value at all, mean the definition is not pinned
    pub pinned_position: Option<i64>,
    pub validations: Vec<ValidationRule>,
}

/// Payload for `metaobjectDefinitionCreate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectTypeDefinitionInput {
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
    pub description: Option<String>,
    pub display_name_key: Option<String>,
    pub field_definitions: Vec<FieldSpec>,
}

/// Payload for `metafieldDefinitionCreate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDefinitionInput {
    pub name: String,
    pub key: String,
    pub namespace: String,
    pub description: Option<String>,
    pub owner_type: OwnerType,
    #[serde(rename = "type")]
    pub value_type: String,
    pub validations: Vec<ValidationRule>,
    pub pin: bool,
}

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("{kind} is missing required field '{field}'")]
    MissingField { kind: &'static str, field: &'static str },

    #[error("Field definition '{key}' of type '{type_name}' has an empty type")]
    EmptyFieldType { type_name: String, key: String },
}

/// Structured type descriptor as returned by the API; only `name` is kept
#[derive(Debug, Clone, Deserialize)]
pub struct TypeDescriptor {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFieldDefinition {
    pub name: String,
    pub key: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "type")]
    pub value_type: TypeDescriptor,
    #[serde(default)]
    pub validations: Vec<ValidationRule>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawObjectTypeDefinition {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub display_name_key: Option<String>,
    #[serde(default)]
    pub field_definitions: Vec<RawFieldDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAttributeDefinition {
    pub name: String,
    pub key: String,
    pub namespace: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub pinned_position: Option<i64>,
    pub owner_type: OwnerType,
    #[serde(rename = "type")]
    pub value_type: TypeDescriptor,
    #[serde(default)]
    pub validations: Vec<ValidationRule>,
}

fn require(value: &str, kind: &'static str, field: &'static str) -> Result<(), DefinitionError> {
    if value.trim().is_empty() {
        return Err(DefinitionError::MissingField { kind, field });
    }
    Ok(())
}

impl TryFrom<RawObjectTypeDefinition> for ObjectTypeDefinition {
    type Error = DefinitionError;

    fn try_from(raw: RawObjectTypeDefinition) -> Result<Self, Self::Error> {
        require(&raw.id, "object-type definition", "id")?;
        require(&raw.type_name, "object-type definition", "type")?;

        let mut field_definitions = Vec::with_capacity(raw.field_definitions.len());
        for field in raw.field_definitions {
            require(&field.key, "field definition", "key")?;
            if field.value_type.name.trim().is_empty() {
                return Err(DefinitionError::EmptyFieldType {
                    type_name: raw.type_name.clone(),
                    key: field.key,
                });
            }
            field_definitions.push(FieldSpec {
                name: field.name,
                key: field.key,
                description: field.description,
                required: field.required,
                value_type: field.value_type.name,
                validations: field.validations,
            });
        }

        Ok(ObjectTypeDefinition {
            id: raw.id,
            name: raw.name,
            type_name: raw.type_name,
            description: raw.description,
            display_name_key: raw.display_name_key,
            field_definitions,
        })
    }
}

impl TryFrom<RawAttributeDefinition> for AttributeDefinition {
    type Error = DefinitionError;

    fn try_from(raw: RawAttributeDefinition) -> Result<Self, Self::Error> {
        require(&raw.key, "attribute definition", "key")?;
        require(&raw.namespace, "attribute definition", "namespace")?;
        require(&raw.value_type.name, "attribute definition", "type")?;

        Ok(AttributeDefinition {
            name: raw.name,
            key: raw.key,
            namespace: raw.namespace,
            description: raw.description,
            value_type: raw.value_type.name,
            owner_type: raw.owner_type,
            pinned_position: raw.pinned_position,
            validations: raw.validations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_type_flattens_field_types() {
        let raw: RawObjectTypeDefinition = serde_json::from_value(json!({
            "id": "gid://shopify/MetaobjectDefinition/1",
            "name": "Warranty",
            "type": "warranty",
            "description": null,
            "displayNameKey": "title",
            "fieldDefinitions": [{
                "name": "Title",
                "key": "title",
                "description": "Shown to customers",
                "required": true,
                "type": { "name": "single_line_text_field", "category": "TEXT" },
                "validations": [{ "name": "max", "value": "120" }]
            }]
        }))
        .unwrap();

        let definition = ObjectTypeDefinition::try_from(raw).unwrap();
        assert_eq!(definition.type_name, "warranty");
        assert_eq!(definition.field_definitions.len(), 1);
        assert_eq!(definition.field_definitions[0].value_type, "single_line_text_field");
        assert_eq!(
            definition.field_definitions[0].validations,
            vec![ValidationRule::new("max", "120")]
        );
    }

    #[test]
    fn test_object_type_rejects_empty_id() {
        let raw: RawObjectTypeDefinition = serde_json::from_value(json!({
            "id": "",
            "name": "Warranty",
            "type": "warranty",
            "fieldDefinitions": []
        }))
        .unwrap();

        let err = ObjectTypeDefinition::try_from(raw).unwrap_err();
        assert!(err.to_string().contains("'id'"));
    }

    #[test]
    fn test_malformed_node_fails_to_deserialize() {
        let result: Result<RawAttributeDefinition, _> = serde_json::from_value(json!({
            "name": "Care guide",
            "key": "care_guide",
            "ownerType": "PRODUCT"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_attribute_definition_from_raw() {
        let raw: RawAttributeDefinition = serde_json::from_value(json!({
            "name": "Care guide",
            "key": "care_guide",
            "namespace": "custom",
            "description": null,
            "pinnedPosition": 2,
            "ownerType": "PRODUCT",
            "type": { "name": "multi_line_text_field", "category": "TEXT" },
            "validations": []
        }))
        .unwrap();

        let definition = AttributeDefinition::try_from(raw).unwrap();
        assert_eq!(definition.value_type, "multi_line_text_field");
        assert_eq!(definition.owner_type, OwnerType::Product);
        assert_eq!(definition.pinned_position, Some(2));
    }

    #[test]
    fn test_validation_without_value_omits_key() {
        let rule = ValidationRule {
            name: "metaobject_definition_id".to_string(),
            value: None,
        };
        assert_eq!(
            serde_json::to_value(&rule).unwrap(),
            json!({ "name": "metaobject_definition_id" })
        );
    }

    #[test]
    fn test_attribute_input_wire_shape() {
        let input = AttributeDefinitionInput {
            name: "Care guide".to_string(),
            key: "care_guide".to_string(),
            namespace: "custom".to_string(),
            description: None,
            owner_type: OwnerType::Collection,
            value_type: "single_line_text_field".to_string(),
            validations: vec![],
            pin: true,
        };

        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({
                "name": "Care guide",
                "key": "care_guide",
                "namespace": "custom",
                "description": null,
                "ownerType": "COLLECTION",
                "type": "single_line_text_field",
                "validations": [],
                "pin": true
            })
        );
    }
}
