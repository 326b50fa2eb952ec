use tracing::warn;

use crate::{
    definition::{
        AttributeDefinition, AttributeDefinitionInput, ObjectTypeDefinition,
        ObjectTypeDefinitionInput, ValidationRule,
    },
    reconciler::{IdentifierMap, Resolution},
};

/// Validation naming the object-type definition a reference attribute points at
pub const METAOBJECT_DEFINITION_ID: &str = "metaobject_definition_id";

const METAOBJECT_REFERENCE_TYPES: [&str; 2] = ["metaobject_reference", "list.metaobject_reference"];

pub fn is_metaobject_reference(value_type: &str) -> bool {
    METAOBJECT_REFERENCE_TYPES.contains(&value_type)
}

/// Attribute creation payload together with the source identifiers it could not map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedAttribute {
    pub input: AttributeDefinitionInput,
    pub unresolved_references: Vec<String>,
}

/// Creation payload for an object-type definition.
///
/// Everything except the source identifier is copied over verbatim.
pub fn transform_object_type_definition(
    definition: &ObjectTypeDefinition,
) -> ObjectTypeDefinitionInput {
    ObjectTypeDefinitionInput {
        type_name: definition.type_name.clone(),
        name: definition.name.clone(),
        description: definition.description.clone(),
        display_name_key: definition.display_name_key.clone(),
        field_definitions: definition.field_definitions.clone(),
    }
}

/// Creation payload for an attribute definition, with object-type references
/// rewritten to the target tenant's identifiers.
///
/// An unmapped reference leaves the rule without a value and is reported in
/// `unresolved_references`.
pub fn transform_attribute_definition(
    definition: &AttributeDefinition,
    identifiers: &IdentifierMap,
) -> TransformedAttribute {
    let mut unresolved_references = Vec::new();

    let validations = if is_metaobject_reference(&definition.value_type) {
        definition
            .validations
            .iter()
            .map(|rule| rewrite_reference(rule, identifiers, &mut unresolved_references))
            .collect()
    } else {
        definition.validations.clone()
    };

    for source_id in &unresolved_references {
        warn!(
            "{}.{} ({}) references metaobject definition {} which has no counterpart in the target store",
            definition.namespace, definition.key, definition.owner_type, source_id
        );
    }

    TransformedAttribute {
        input: AttributeDefinitionInput {
            name: definition.name.clone(),
            key: definition.key.clone(),
            namespace: definition.namespace.clone(),
            description: definition.description.clone(),
            owner_type: definition.owner_type,
            value_type: definition.value_type.clone(),
            validations,
            pin: is_pinned(definition.pinned_position),
        },
        unresolved_references,
    }
}

pub fn is_pinned(pinned_position: Option<i64>) -> bool {
    pinned_position.is_some_and(|position| position > 0)
}

fn rewrite_reference(
    rule: &ValidationRule,
    identifiers: &IdentifierMap,
    unresolved: &mut Vec<String>,
) -> ValidationRule {
    if rule.name != METAOBJECT_DEFINITION_ID {
        return rule.clone();
    }

    let value = match rule.value.as_deref() {
        Some(source_id) => match identifiers.resolve(source_id) {
            Resolution::Mapped(target_id) => Some(target_id.to_string()),
            Resolution::Unresolved => {
                unresolved.push(source_id.to_string());
                None
            }
        },
        None => None,
    };

    ValidationRule {
        name: rule.name.clone(),
        value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::FieldSpec;
    use crate::owner_type::OwnerType;
    use serde_json::json;

    fn identifiers() -> IdentifierMap {
        let source = ObjectTypeDefinition {
            id: "gid://1".to_string(),
            name: "Warranty".to_string(),
            type_name: "warranty".to_string(),
            description: None,
            display_name_key: None,
            field_definitions: vec![],
        };
        let target = ObjectTypeDefinition {
            id: "gid://9".to_string(),
            ..source.clone()
        };
        IdentifierMap::from_snapshots(&[source], &[target])
    }

    fn attribute(value_type: &str, validations: Vec<ValidationRule>) -> AttributeDefinition {
        AttributeDefinition {
            name: "Warranty".to_string(),
            key: "warranty".to_string(),
            namespace: "custom".to_string(),
            description: Some("Coverage terms".to_string()),
            value_type: value_type.to_string(),
            owner_type: OwnerType::Product,
            pinned_position: None,
            validations,
        }
    }

    #[test]
    fn test_reference_is_rewritten_to_target_id() {
        let definition = attribute(
            "metaobject_reference",
            vec![ValidationRule::new(METAOBJECT_DEFINITION_ID, "gid://1")],
        );

        let transformed = transform_attribute_definition(&definition, &identifiers());

        assert_eq!(
            transformed.input.validations,
            vec![ValidationRule::new(METAOBJECT_DEFINITION_ID, "gid://9")]
        );
        assert!(transformed.unresolved_references.is_empty());
    }

    #[test]
    fn test_list_reference_is_rewritten() {
        let definition = attribute(
            "list.metaobject_reference",
            vec![ValidationRule::new(METAOBJECT_DEFINITION_ID, "gid://1")],
        );

        let transformed = transform_attribute_definition(&definition, &identifiers());
        assert_eq!(transformed.input.validations[0].value.as_deref(), Some("gid://9"));
    }

    #[test]
    fn test_unmapped_reference_loses_its_value() {
        let definition = attribute(
            "metaobject_reference",
            vec![ValidationRule::new(METAOBJECT_DEFINITION_ID, "gid://404")],
        );

        let transformed = transform_attribute_definition(&definition, &identifiers());

        assert_eq!(transformed.input.validations[0].name, METAOBJECT_DEFINITION_ID);
        assert_eq!(transformed.input.validations[0].value, None);
        assert_eq!(transformed.unresolved_references, vec!["gid://404".to_string()]);
        assert_eq!(
            serde_json::to_value(&transformed.input.validations).unwrap(),
            json!([{ "name": "metaobject_definition_id" }])
        );
    }

    #[test]
    fn test_other_rules_on_reference_types_pass_through() {
        let definition = attribute(
            "list.metaobject_reference",
            vec![
                ValidationRule::new("list.max", "5"),
                ValidationRule::new(METAOBJECT_DEFINITION_ID, "gid://1"),
            ],
        );

        let transformed = transform_attribute_definition(&definition, &identifiers());
        assert_eq!(transformed.input.validations[0], ValidationRule::new("list.max", "5"));
        assert_eq!(transformed.input.validations[1].value.as_deref(), Some("gid://9"));
    }

    #[test]
    fn test_non_reference_types_are_untouched() {
        let validations = vec![
            ValidationRule::new("regex", "^[A-Z]+$"),
            // Looks like a reference rule, but the type says otherwise.
            ValidationRule::new(METAOBJECT_DEFINITION_ID, "gid://1"),
        ];
        let definition = attribute("single_line_text_field", validations.clone());

        let transformed = transform_attribute_definition(&definition, &identifiers());

        assert_eq!(transformed.input.validations, validations);
        assert_eq!(
            serde_json::to_string(&transformed.input.validations).unwrap(),
            serde_json::to_string(&definition.validations).unwrap()
        );
    }

    #[test]
    fn test_pin_derivation() {
        assert!(!is_pinned(None));
        assert!(!is_pinned(Some(0)));
        assert!(!is_pinned(Some(-1)));
        assert!(is_pinned(Some(1)));
        assert!(is_pinned(Some(42)));

        let mut definition = attribute("single_line_text_field", vec![]);
        definition.pinned_position = Some(3);
        assert!(transform_attribute_definition(&definition, &IdentifierMap::default()).input.pin);
    }

    #[test]
    fn test_projection_keeps_public_fields() {
        let definition = attribute("single_line_text_field", vec![]);
        let transformed = transform_attribute_definition(&definition, &IdentifierMap::default());

        let payload = serde_json::to_value(&transformed.input).unwrap();
        assert_eq!(payload["name"], json!("Warranty"));
        assert_eq!(payload["description"], json!("Coverage terms"));
        assert_eq!(payload["ownerType"], json!("PRODUCT"));
        assert_eq!(payload["type"], json!("single_line_text_field"));
        assert!(payload.get("pinnedPosition").is_none());
    }

    #[test]
    fn test_object_type_input_drops_identifier_only() {
        let definition = ObjectTypeDefinition {
            id: "gid://1".to_string(),
            name: "Warranty".to_string(),
            type_name: "warranty".to_string(),
            description: Some("Coverage".to_string()),
            display_name_key: Some("title".to_string()),
            field_definitions: vec![FieldSpec {
                name: "Title".to_string(),
                key: "title".to_string(),
                description: None,
                required: true,
                value_type: "single_line_text_field".to_string(),
                validations: vec![ValidationRule::new("max", "100")],
            }],
        };

        let payload = serde_json::to_value(transform_object_type_definition(&definition)).unwrap();

        assert!(payload.get("id").is_none());
        assert_eq!(payload["type"], json!("warranty"));
        assert_eq!(payload["displayNameKey"], json!("title"));
        assert_eq!(
            payload["fieldDefinitions"][0],
            json!({
                "name": "Title",
                "key": "title",
                "description": null,
                "required": true,
                "type": "single_line_text_field",
                "validations": [{ "name": "max", "value": "100" }]
            })
        );
    }
}
