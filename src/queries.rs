//! GraphQL documents sent to the admin API.

pub const GET_METAOBJECT_DEFINITIONS_QUERY: &str = r#"
query getMetaObjectDefinitions($after: String, $limit: Int!) {
  metaobjectDefinitions(first: $limit,  after: $after) {
    edges {
      node {
        id
        name
        type
        description
        displayNameKey
        fieldDefinitions {
          name
          key
          description
          required
          type {
            name
            category
          }
          validations {
            name
            value
          }
        }
      }
    }
    pageInfo {
      endCursor
      hasNextPage
    }
  }
}
"#;

pub const ADD_METAOBJECT_DEFINITION_MUTATION: &str = r#"
mutation CreateMetaobjectDefinition($definition: MetaobjectDefinitionCreateInput!) {
  metaobjectDefinitionCreate(definition: $definition) {
    metaobjectDefinition {
      name
      type
      fieldDefinitions {
        name
        key
      }
    }
    userErrors {
      field
      message
      code
    }
  }
}
"#;

pub const GET_METAFIELD_DEFINITIONS_QUERY: &str = r#"
query getMetafieldDefinitions($limit: Int!, $after: String, $ownerType: MetafieldOwnerType!) {
  metafieldDefinitions(first: $limit, after: $after, ownerType: $ownerType) {
    edges {
      node {
        name
        key
        namespace
        description
        pinnedPosition
        ownerType
        type {
          name
          category
        }
        validations {
          name
          value
        }
      }
    }
    pageInfo {
      endCursor
      hasNextPage
    }
  }
}
"#;

pub const ADD_METAFIELD_DEFINITION_MUTATION: &str = r#"
mutation CreateMetafieldDefinition($definition: MetafieldDefinitionInput!) {
  metafieldDefinitionCreate(definition: $definition) {
    createdDefinition {
      id
      name
    }
    userErrors {
      field
      message
      code
    }
  }
}
"#;

/// Page size used when listing object-type definitions
pub const OBJECT_TYPE_PAGE_SIZE: u32 = 250;

/// Page size used when listing attribute definitions
pub const ATTRIBUTE_PAGE_SIZE: u32 = 10;

/// Top-level connection field each listing query reads
pub const METAOBJECT_DEFINITIONS_FIELD: &str = "metaobjectDefinitions";
pub const METAFIELD_DEFINITIONS_FIELD: &str = "metafieldDefinitions";
