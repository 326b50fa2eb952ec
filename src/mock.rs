//! In-memory stand-in for the schema API.
//!
//! `MockTransport` keeps a set of fake stores, each with its own object-type and
//! attribute definitions. It answers the four documents in [`crate::queries`]
//! the way the real API does: cursor pagination driven by `limit`/`after`,
//! creates that assign identifiers, and `userErrors` for rejected definitions.
//! Every request is recorded so tests can assert on payloads and call counts.
//!
//! ```ignore
//! let source = Tenant::new("source-shop", "token");
//! let mock = MockTransport::new().with_store(&source);
//! mock.add_object_type(&source, definition);
//! let client = SchemaClient::new(mock);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{
    definition::{
        AttributeDefinition, AttributeDefinitionInput, ObjectTypeDefinition,
        ObjectTypeDefinitionInput,
    },
    owner_type::OwnerType,
    queries::{
        ADD_METAFIELD_DEFINITION_MUTATION, ADD_METAOBJECT_DEFINITION_MUTATION,
        GET_METAFIELD_DEFINITIONS_QUERY, GET_METAOBJECT_DEFINITIONS_QUERY,
    },
    schema_client::{ClientError, GraphqlRequest, GraphqlTransport},
    tenant::Tenant,
    transformer::{is_metaobject_reference, METAOBJECT_DEFINITION_ID},
};

/// A call received by the mock
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub store_name: String,
    pub query: &'static str,
    pub variables: Value,
}

#[derive(Debug, Default)]
struct MockStore {
    access_token: String,
    object_types: Vec<ObjectTypeDefinition>,
    attributes: Vec<AttributeDefinition>,
    failing_owner_types: HashSet<OwnerType>,
    next_id: u64,
}

impl MockStore {
    fn allocate_id(&mut self, kind: &str) -> String {
        self.next_id += 1;
        format!("gid://shopify/{}/{}", kind, 1000 + self.next_id)
    }
}

/// Fake multi-store schema API
pub struct MockTransport {
    stores: RwLock<HashMap<String, MockStore>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            stores: RwLock::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Register a store that accepts `tenant`'s access token
    pub fn with_store(self, tenant: &Tenant) -> Self {
        if let Ok(mut stores) = self.stores.write() {
            stores.insert(
                tenant.store_name.clone(),
                MockStore {
                    access_token: tenant.access_token().to_string(),
                    ..MockStore::default()
                },
            );
        }
        self
    }

    pub fn add_object_type(&self, tenant: &Tenant, definition: ObjectTypeDefinition) {
        self.with_store_mut(tenant, |store| store.object_types.push(definition));
    }

    pub fn add_attribute(&self, tenant: &Tenant, definition: AttributeDefinition) {
        self.with_store_mut(tenant, |store| store.attributes.push(definition));
    }

    /// Make listing `owner_type` attribute definitions on `tenant` fail with a 503
    pub fn fail_owner_type(&self, tenant: &Tenant, owner_type: OwnerType) {
        self.with_store_mut(tenant, |store| {
            store.failing_owner_types.insert(owner_type);
        });
    }

    pub fn object_types(&self, tenant: &Tenant) -> Vec<ObjectTypeDefinition> {
        self.stores
            .read()
            .ok()
            .and_then(|stores| stores.get(&tenant.store_name).map(|s| s.object_types.clone()))
            .unwrap_or_default()
    }

    pub fn attributes(&self, tenant: &Tenant) -> Vec<AttributeDefinition> {
        self.stores
            .read()
            .ok()
            .and_then(|stores| stores.get(&tenant.store_name).map(|s| s.attributes.clone()))
            .unwrap_or_default()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Requests that carried exactly `query`
    pub fn requests_for(&self, query: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.query == query)
            .collect()
    }

    fn with_store_mut(&self, tenant: &Tenant, f: impl FnOnce(&mut MockStore)) {
        if let Ok(mut stores) = self.stores.write() {
            if let Some(store) = stores.get_mut(&tenant.store_name) {
                f(store);
            }
        }
    }

    fn handle(&self, store: &mut MockStore, request: &GraphqlRequest) -> Result<Value, ClientError> {
        let variables = &request.variables;
        if request.query == GET_METAOBJECT_DEFINITIONS_QUERY {
            let nodes: Vec<Value> = store.object_types.iter().map(object_type_node).collect();
            Ok(json!({ "data": { "metaobjectDefinitions": page(&nodes, variables) } }))
        } else if request.query == GET_METAFIELD_DEFINITIONS_QUERY {
            let owner_type: OwnerType = serde_json::from_value(variables["ownerType"].clone())
                .map_err(|e| ClientError::Graphql(format!("invalid ownerType: {}", e)))?;
            if store.failing_owner_types.contains(&owner_type) {
                return Err(ClientError::Status {
                    store: String::new(),
                    status: 503,
                    body: "Service Unavailable".to_string(),
                });
            }
            let nodes: Vec<Value> = store
                .attributes
                .iter()
                .filter(|definition| definition.owner_type == owner_type)
                .map(attribute_node)
                .collect();
            Ok(json!({ "data": { "metafieldDefinitions": page(&nodes, variables) } }))
        } else if request.query == ADD_METAOBJECT_DEFINITION_MUTATION {
            Ok(create_object_type(store, &variables["definition"]))
        } else if request.query == ADD_METAFIELD_DEFINITION_MUTATION {
            Ok(create_attribute(store, &variables["definition"]))
        } else {
            Ok(json!({ "errors": [{ "message": "Unsupported operation" }] }))
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphqlTransport for MockTransport {
    async fn execute(&self, tenant: &Tenant, request: &GraphqlRequest) -> Result<Value, ClientError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                store_name: tenant.store_name.clone(),
                query: request.query,
                variables: request.variables.clone(),
            });
        }

        let mut stores = self
            .stores
            .write()
            .map_err(|_| ClientError::Graphql("mock store lock poisoned".to_string()))?;

        match stores.get_mut(&tenant.store_name) {
            Some(store) if store.access_token == tenant.access_token() => {
                self.handle(store, request).map_err(|err| match err {
                    ClientError::Status { status, body, .. } => ClientError::Status {
                        store: tenant.store_name.clone(),
                        status,
                        body,
                    },
                    other => other,
                })
            }
            _ => Err(ClientError::Status {
                store: tenant.store_name.clone(),
                status: 401,
                body: r#"{"errors":"[API] Invalid API key or access token (unrecognized login or wrong password)"}"#
                    .to_string(),
            }),
        }
    }
}

/// Slice `nodes` according to the `limit` and `after` variables; cursors are offsets
fn page(nodes: &[Value], variables: &Value) -> Value {
    let limit = variables["limit"].as_u64().unwrap_or(50) as usize;
    let start = variables["after"]
        .as_str()
        .and_then(|cursor| cursor.parse::<usize>().ok())
        .unwrap_or(0)
        .min(nodes.len());
    let end = (start + limit).min(nodes.len());

    let edges: Vec<Value> = nodes[start..end]
        .iter()
        .map(|node| json!({ "node": node }))
        .collect();
    let end_cursor = if end > start { Some(end.to_string()) } else { None };

    json!({
        "edges": edges,
        "pageInfo": { "endCursor": end_cursor, "hasNextPage": end < nodes.len() }
    })
}

fn type_descriptor(name: &str) -> Value {
    let category = if name.contains("reference") { "REFERENCE" } else { "TEXT" };
    json!({ "name": name, "category": category })
}

fn object_type_node(definition: &ObjectTypeDefinition) -> Value {
    let fields: Vec<Value> = definition
        .field_definitions
        .iter()
        .map(|field| {
            json!({
                "name": field.name,
                "key": field.key,
                "description": field.description,
                "required": field.required,
                "type": type_descriptor(&field.value_type),
                "validations": field.validations,
            })
        })
        .collect();

    json!({
        "id": definition.id,
        "name": definition.name,
        "type": definition.type_name,
        "description": definition.description,
        "displayNameKey": definition.display_name_key,
        "fieldDefinitions": fields,
    })
}

fn attribute_node(definition: &AttributeDefinition) -> Value {
    json!({
        "name": definition.name,
        "key": definition.key,
        "namespace": definition.namespace,
        "description": definition.description,
        "pinnedPosition": definition.pinned_position,
        "ownerType": definition.owner_type,
        "type": type_descriptor(&definition.value_type),
        "validations": definition.validations,
    })
}

fn user_error(field: &[&str], message: String, code: &str) -> Value {
    json!({ "field": field, "message": message, "code": code })
}

fn create_object_type(store: &mut MockStore, definition: &Value) -> Value {
    let input: ObjectTypeDefinitionInput = match serde_json::from_value(definition.clone()) {
        Ok(input) => input,
        Err(e) => {
            return json!({ "errors": [{ "message": format!("Variable $definition was provided invalid value: {}", e) }] })
        }
    };

    if store
        .object_types
        .iter()
        .any(|existing| existing.type_name == input.type_name)
    {
        return json!({ "data": { "metaobjectDefinitionCreate": {
            "metaobjectDefinition": null,
            "userErrors": [user_error(&["definition", "type"], "Type has already been taken".to_string(), "TAKEN")],
        }}});
    }

    let created = ObjectTypeDefinition {
        id: store.allocate_id("MetaobjectDefinition"),
        name: input.name,
        type_name: input.type_name,
        description: input.description,
        display_name_key: input.display_name_key,
        field_definitions: input.field_definitions,
    };
    let fields: Vec<Value> = created
        .field_definitions
        .iter()
        .map(|field| json!({ "name": field.name, "key": field.key }))
        .collect();
    let response = json!({ "data": { "metaobjectDefinitionCreate": {
        "metaobjectDefinition": { "name": created.name, "type": created.type_name, "fieldDefinitions": fields },
        "userErrors": [],
    }}});
    store.object_types.push(created);
    response
}

fn create_attribute(store: &mut MockStore, definition: &Value) -> Value {
    let input: AttributeDefinitionInput = match serde_json::from_value(definition.clone()) {
        Ok(input) => input,
        Err(e) => {
            return json!({ "errors": [{ "message": format!("Variable $definition was provided invalid value: {}", e) }] })
        }
    };

    let rejected = |field: &[&str], message: String, code: &str| {
        json!({ "data": { "metafieldDefinitionCreate": {
            "createdDefinition": null,
            "userErrors": [user_error(field, message, code)],
        }}})
    };

    if store.attributes.iter().any(|existing| {
        existing.owner_type == input.owner_type
            && existing.namespace == input.namespace
            && existing.key == input.key
    }) {
        return rejected(
            &["definition", "key"],
            format!(
                "Key is in use for {} metafields on the '{}' namespace.",
                input.owner_type, input.namespace
            ),
            "TAKEN",
        );
    }

    if is_metaobject_reference(&input.value_type) {
        let referenced = input
            .validations
            .iter()
            .find(|rule| rule.name == METAOBJECT_DEFINITION_ID)
            .and_then(|rule| rule.value.as_deref());
        let known = referenced
            .is_some_and(|id| store.object_types.iter().any(|existing| existing.id == id));
        if !known {
            return rejected(
                &["definition", "validations"],
                "Validations metaobject_definition_id must reference an existing metaobject definition."
                    .to_string(),
                "INVALID_OPTION",
            );
        }
    }

    let pinned_position = if input.pin {
        let pinned = store
            .attributes
            .iter()
            .filter(|existing| {
                existing.owner_type == input.owner_type
                    && existing.pinned_position.is_some_and(|p| p > 0)
            })
            .count();
        Some(pinned as i64 + 1)
    } else {
        None
    };

    let id = store.allocate_id("MetafieldDefinition");
    let response = json!({ "data": { "metafieldDefinitionCreate": {
        "createdDefinition": { "id": id, "name": input.name },
        "userErrors": [],
    }}});
    store.attributes.push(AttributeDefinition {
        name: input.name,
        key: input.key,
        namespace: input.namespace,
        description: input.description,
        value_type: input.value_type,
        owner_type: input.owner_type,
        pinned_position,
        validations: input.validations,
    });
    response
}
