//! Client for the tenant schema API.
//!
//! - [`GraphqlTransport`] abstracts how a GraphQL document reaches a tenant
//! - [`HttpTransport`] is the production transport backed by `reqwest`
//! - [`SchemaClient`] implements cursor pagination and the create operations
//!   on top of any transport
//!
//! Transport failures (network, non-2xx, auth rejection, unreadable bodies) are
//! returned as [`ClientError`]. Validation failures reported by the API for a
//! single create call are not errors; they travel inside [`CreationResult`].

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    definition::{
        AttributeDefinition, AttributeDefinitionInput, DefinitionError, ObjectTypeDefinition,
        ObjectTypeDefinitionInput, RawAttributeDefinition, RawObjectTypeDefinition,
    },
    owner_type::OwnerType,
    queries::{
        ADD_METAFIELD_DEFINITION_MUTATION, ADD_METAOBJECT_DEFINITION_MUTATION,
        ATTRIBUTE_PAGE_SIZE, GET_METAFIELD_DEFINITIONS_QUERY, GET_METAOBJECT_DEFINITIONS_QUERY,
        METAFIELD_DEFINITIONS_FIELD, METAOBJECT_DEFINITIONS_FIELD, OBJECT_TYPE_PAGE_SIZE,
    },
    tenant::{Tenant, DEFAULT_API_VERSION},
};

pub const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{store} responded with status {status}: {body}")]
    Status {
        store: String,
        status: u16,
        body: String,
    },

    #[error("GraphQL request failed: {0}")]
    Graphql(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Invalid definition in response: {0}")]
    InvalidDefinition(#[from] DefinitionError),
}

/// Body of a GraphQL call
#[derive(Debug, Clone, Serialize)]
pub struct GraphqlRequest {
    pub query: &'static str,
    pub variables: Value,
}

/// Delivers a GraphQL document to a tenant and returns the decoded response body.
///
/// Implementations return `Err` only for transport-level failures. A body that
/// carries `errors` or `userErrors` is still a successful delivery.
#[async_trait]
pub trait GraphqlTransport: Send + Sync {
    async fn execute(&self, tenant: &Tenant, request: &GraphqlRequest) -> Result<Value, ClientError>;
}

#[async_trait]
impl<T: GraphqlTransport + ?Sized> GraphqlTransport for Arc<T> {
    async fn execute(&self, tenant: &Tenant, request: &GraphqlRequest) -> Result<Value, ClientError> {
        (**self).execute(tenant, request).await
    }
}

/// Production transport that posts to the tenant's admin GraphQL endpoint
pub struct HttpTransport {
    client: ReqwestClient,
    api_version: String,
}

impl HttpTransport {
    pub fn new(api_version: impl Into<String>) -> Self {
        Self {
            client: ReqwestClient::new(),
            api_version: api_version.into(),
        }
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_API_VERSION)
    }
}

#[async_trait]
impl GraphqlTransport for HttpTransport {
    async fn execute(&self, tenant: &Tenant, request: &GraphqlRequest) -> Result<Value, ClientError> {
        let response = self
            .client
            .post(tenant.endpoint(&self.api_version))
            .header(ACCESS_TOKEN_HEADER, tenant.access_token())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::Status {
                store: tenant.store_name.clone(),
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            ClientError::MalformedResponse(format!("{} returned non-JSON body: {}", tenant, e))
        })
    }
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<Map<String, Value>>,
    #[serde(default)]
    errors: Vec<GraphqlErrorMessage>,
}

#[derive(Debug, Deserialize)]
struct GraphqlErrorMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection<N> {
    edges: Vec<Edge<N>>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
struct Edge<N> {
    node: N,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    end_cursor: Option<String>,
    has_next_page: bool,
}

/// Pull one top-level field out of a response body, surfacing GraphQL errors
/// when the field is missing or null.
fn take_data_field(body: Value, field: &str) -> Result<Value, ClientError> {
    let response: GraphqlResponse = serde_json::from_value(body)
        .map_err(|e| ClientError::MalformedResponse(e.to_string()))?;

    let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
    let value = response
        .data
        .and_then(|mut data| data.remove(field))
        .filter(|value| !value.is_null());

    match value {
        Some(value) => {
            if !messages.is_empty() {
                warn!("Partial GraphQL errors for '{}': {}", field, messages.join("; "));
            }
            Ok(value)
        }
        None if !messages.is_empty() => Err(ClientError::Graphql(messages.join("; "))),
        None => Err(ClientError::MalformedResponse(format!(
            "response data has no '{}'",
            field
        ))),
    }
}

/// One API validation failure attached to a create call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserError {
    #[serde(default)]
    pub field: Option<Vec<String>>,
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

/// Raw response of a create call, plus any cross-tenant references that could
/// not be resolved while building the payload.
///
/// Serializes as the raw response body with an extra `unresolvedReferences`
/// array when that list is non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreationResult {
    #[serde(flatten)]
    pub response: Map<String, Value>,
    #[serde(
        rename = "unresolvedReferences",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub unresolved_references: Vec<String>,
}

impl CreationResult {
    pub fn from_response(body: Value) -> Result<Self, ClientError> {
        match body {
            Value::Object(response) => Ok(Self {
                response,
                unresolved_references: Vec::new(),
            }),
            other => Err(ClientError::MalformedResponse(format!(
                "expected a JSON object, got {}",
                other
            ))),
        }
    }

    pub fn with_unresolved_references(mut self, references: Vec<String>) -> Self {
        self.unresolved_references = references;
        self
    }

    /// Mutation payload, e.g. the value of `data.metafieldDefinitionCreate`
    fn payload(&self) -> Option<&Map<String, Value>> {
        self.response
            .get("data")
            .and_then(Value::as_object)
            .and_then(|data| data.values().find_map(Value::as_object))
    }

    pub fn user_errors(&self) -> Vec<UserError> {
        self.payload()
            .and_then(|payload| payload.get("userErrors"))
            .and_then(|errors| serde_json::from_value(errors.clone()).ok())
            .unwrap_or_default()
    }

    pub fn graphql_errors(&self) -> Vec<String> {
        self.response
            .get("errors")
            .and_then(Value::as_array)
            .map(|errors| {
                errors
                    .iter()
                    .filter_map(|e| e.get("message").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True when the API created the definition without complaint
    pub fn is_success(&self) -> bool {
        if !self.graphql_errors().is_empty() || !self.user_errors().is_empty() {
            return false;
        }
        self.payload().is_some_and(|payload| {
            payload
                .iter()
                .any(|(key, value)| key != "userErrors" && !value.is_null())
        })
    }

    /// All failure messages, top-level errors first
    pub fn error_messages(&self) -> Vec<String> {
        let mut messages = self.graphql_errors();
        messages.extend(self.user_errors().into_iter().map(|e| match e.code {
            Some(code) => format!("{} ({})", e.message, code),
            None => e.message,
        }));
        messages
    }
}

/// Reads and writes definitions on any tenant through a [`GraphqlTransport`]
pub struct SchemaClient<T> {
    transport: T,
}

impl<T: GraphqlTransport> SchemaClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch every object-type definition of `tenant`, in API page order
    pub async fn fetch_object_type_definitions(
        &self,
        tenant: &Tenant,
    ) -> Result<Vec<ObjectTypeDefinition>, ClientError> {
        let raw: Vec<RawObjectTypeDefinition> = self
            .fetch_all(
                tenant,
                GET_METAOBJECT_DEFINITIONS_QUERY,
                METAOBJECT_DEFINITIONS_FIELD,
                json!({ "limit": OBJECT_TYPE_PAGE_SIZE }),
            )
            .await?;

        let definitions = raw
            .into_iter()
            .map(ObjectTypeDefinition::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            "Fetched {} metaobject definitions from {}",
            definitions.len(),
            tenant
        );
        Ok(definitions)
    }

    /// Fetch every attribute definition of `tenant` attached to `owner_type`
    pub async fn fetch_attribute_definitions(
        &self,
        owner_type: OwnerType,
        tenant: &Tenant,
    ) -> Result<Vec<AttributeDefinition>, ClientError> {
        let raw: Vec<RawAttributeDefinition> = self
            .fetch_all(
                tenant,
                GET_METAFIELD_DEFINITIONS_QUERY,
                METAFIELD_DEFINITIONS_FIELD,
                json!({ "limit": ATTRIBUTE_PAGE_SIZE, "ownerType": owner_type }),
            )
            .await?;

        let definitions = raw
            .into_iter()
            .map(AttributeDefinition::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            "Fetched {} {} metafield definitions from {}",
            definitions.len(),
            owner_type,
            tenant
        );
        Ok(definitions)
    }

    pub async fn create_object_type_definition(
        &self,
        tenant: &Tenant,
        definition: &ObjectTypeDefinitionInput,
    ) -> Result<CreationResult, ClientError> {
        let request = GraphqlRequest {
            query: ADD_METAOBJECT_DEFINITION_MUTATION,
            variables: json!({ "definition": definition }),
        };
        let body = self.transport.execute(tenant, &request).await?;
        CreationResult::from_response(body)
    }

    pub async fn create_attribute_definition(
        &self,
        tenant: &Tenant,
        definition: &AttributeDefinitionInput,
    ) -> Result<CreationResult, ClientError> {
        let request = GraphqlRequest {
            query: ADD_METAFIELD_DEFINITION_MUTATION,
            variables: json!({ "definition": definition }),
        };
        let body = self.transport.execute(tenant, &request).await?;
        CreationResult::from_response(body)
    }

    /// Follow `endCursor` until `hasNextPage` is false and concatenate every page
    async fn fetch_all<N: DeserializeOwned>(
        &self,
        tenant: &Tenant,
        query: &'static str,
        field: &str,
        variables: Value,
    ) -> Result<Vec<N>, ClientError> {
        let mut nodes = Vec::new();
        let mut after: Option<String> = None;
        let mut page = 0usize;

        loop {
            let mut page_variables = variables.clone();
            page_variables["after"] = json!(after);

            let request = GraphqlRequest {
                query,
                variables: page_variables,
            };
            let body = self.transport.execute(tenant, &request).await?;
            let connection: Connection<N> = serde_json::from_value(take_data_field(body, field)?)
                .map_err(|e| ClientError::MalformedResponse(format!("{}: {}", field, e)))?;

            page += 1;
            debug!(
                "{} page {} from {}: {} nodes, has_next_page={}",
                field,
                page,
                tenant,
                connection.edges.len(),
                connection.page_info.has_next_page
            );
            nodes.extend(connection.edges.into_iter().map(|edge| edge.node));

            if !connection.page_info.has_next_page {
                break;
            }

            after = Some(connection.page_info.end_cursor.ok_or_else(|| {
                ClientError::MalformedResponse(format!(
                    "{} reported another page without an endCursor",
                    field
                ))
            })?);
        }

        Ok(nodes)
    }
}
