use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::stream::{self, StreamExt, TryStreamExt};
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};

use crate::{
    owner_type::OwnerType,
    reconciler::{build_identifier_map, IdentifierMap},
    schema_client::{ClientError, CreationResult, GraphqlTransport, SchemaClient},
    tenant::Tenant,
    transformer::{transform_attribute_definition, transform_object_type_definition},
};

/// Errors that abort a migration run
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Replays definitions from a source tenant onto a target tenant.
///
/// The two entry points are independent: attribute migration always rebuilds
/// its identifier map from fresh snapshots of both tenants, even if object
/// types were migrated moments earlier by the same engine.
pub struct MigrationEngine<T> {
    client: SchemaClient<T>,
    source: Tenant,
    target: Tenant,
    owner_types: Vec<OwnerType>,
    concurrency: usize,
    next_run_id: AtomicU64,
}

/// State owned by exactly one invocation; never shared between runs
struct MigrationRun {
    id: u64,
    identifiers: IdentifierMap,
    results: Vec<CreationResult>,
}

impl<T: GraphqlTransport> MigrationEngine<T> {
    pub fn new(client: SchemaClient<T>, source: Tenant, target: Tenant) -> Self {
        Self {
            client,
            source,
            target,
            owner_types: OwnerType::ALL.to_vec(),
            concurrency: 1,
            next_run_id: AtomicU64::new(1),
        }
    }

    /// Number of owner types, and of create calls within one owner type, in flight at once
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    pub fn with_owner_types(mut self, owner_types: Vec<OwnerType>) -> Self {
        self.owner_types = owner_types;
        self
    }

    pub fn client(&self) -> &SchemaClient<T> {
        &self.client
    }

    pub fn source(&self) -> &Tenant {
        &self.source
    }

    pub fn target(&self) -> &Tenant {
        &self.target
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Copy every object-type definition of the source tenant to the target tenant
    pub async fn migrate_object_type_definitions(
        &self,
    ) -> Result<Vec<CreationResult>, MigrationError> {
        let run_id = self.next_run_id.fetch_add(1, Ordering::Relaxed);
        let span = info_span!("migration", run = run_id, kind = "metaobject_definitions");

        async {
            info!("Migrating metaobject definitions from {} to {}", self.source, self.target);
            let definitions = self.client.fetch_object_type_definitions(&self.source).await?;

            let results = ordered_bounded(definitions, self.concurrency, |definition| async move {
                let input = transform_object_type_definition(&definition);
                let result = self
                    .client
                    .create_object_type_definition(&self.target, &input)
                    .await?;
                log_outcome(&definition.type_name, &result);
                Ok::<_, MigrationError>(result)
            })
            .await?;

            log_summary("metaobject definitions", &results);
            Ok::<_, MigrationError>(results)
        }
        .instrument(span)
        .await
    }

    /// Copy every attribute definition of every owner type, rewriting object-type
    /// references to the target tenant's identifiers
    pub async fn migrate_attribute_definitions(
        &self,
    ) -> Result<Vec<CreationResult>, MigrationError> {
        let run_id = self.next_run_id.fetch_add(1, Ordering::Relaxed);
        let span = info_span!("migration", run = run_id, kind = "metafield_definitions");

        async {
            info!("Migrating metafield definitions from {} to {}", self.source, self.target);

            // Both snapshots are complete before any attribute is transformed.
            let mut run = MigrationRun {
                id: run_id,
                identifiers: build_identifier_map(&self.client, &self.source, &self.target)
                    .await?,
                results: Vec::new(),
            };

            let identifiers = &run.identifiers;
            let per_owner_type = ordered_bounded(
                self.owner_types.clone(),
                self.concurrency,
                |owner_type| self.migrate_owner_type(identifiers, owner_type),
            )
            .await?;
            run.results.extend(per_owner_type.into_iter().flatten());

            info!("Run {} finished", run.id);
            log_summary("metafield definitions", &run.results);
            Ok::<_, MigrationError>(run.results)
        }
        .instrument(span)
        .await
    }

    /// Build the source → target identifier map on its own
    pub async fn identifier_map(&self) -> Result<IdentifierMap, MigrationError> {
        Ok(build_identifier_map(&self.client, &self.source, &self.target).await?)
    }

    async fn migrate_owner_type(
        &self,
        identifiers: &IdentifierMap,
        owner_type: OwnerType,
    ) -> Result<Vec<CreationResult>, MigrationError> {
        let definitions = self
            .client
            .fetch_attribute_definitions(owner_type, &self.source)
            .await?;

        let transformed: Vec<_> = definitions
            .iter()
            .map(|definition| transform_attribute_definition(definition, identifiers))
            .collect();

        ordered_bounded(transformed, self.concurrency, |attribute| async move {
            let label = format!(
                "{}.{} ({})",
                attribute.input.namespace, attribute.input.key, owner_type
            );
            let result = self
                .client
                .create_attribute_definition(&self.target, &attribute.input)
                .await?
                .with_unresolved_references(attribute.unresolved_references);
            log_outcome(&label, &result);
            Ok::<_, MigrationError>(result)
        })
        .await
    }
}

/// Run `f` over `items` with at most `limit` futures in flight.
///
/// Results come back in input order regardless of completion order. The first
/// error cancels everything still running.
async fn ordered_bounded<I, R, F, Fut>(
    items: Vec<I>,
    limit: usize,
    f: F,
) -> Result<Vec<R>, MigrationError>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<R, MigrationError>>,
{
    let mut tagged: Vec<(usize, R)> = stream::iter(items.into_iter().enumerate())
        .map(move |(index, item)| {
            let pending = f(item);
            async move { pending.await.map(|result| (index, result)) }
        })
        .buffer_unordered(limit.max(1))
        .try_collect()
        .await?;

    tagged.sort_unstable_by_key(|(index, _)| *index);
    Ok(tagged.into_iter().map(|(_, result)| result).collect())
}

fn log_outcome(label: &str, result: &CreationResult) {
    if result.is_success() {
        info!("Created {}", label);
    } else {
        warn!("{} was not created: {}", label, result.error_messages().join("; "));
    }
}

fn log_summary(kind: &str, results: &[CreationResult]) {
    let created = results.iter().filter(|r| r.is_success()).count();
    info!("Created {} of {} {}", created, results.len(), kind);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{AttributeDefinition, FieldSpec, ObjectTypeDefinition, ValidationRule};
    use crate::mock::MockTransport;
    use crate::queries::{
        ADD_METAFIELD_DEFINITION_MUTATION, ADD_METAOBJECT_DEFINITION_MUTATION,
        GET_METAFIELD_DEFINITIONS_QUERY,
    };
    use crate::transformer::METAOBJECT_DEFINITION_ID;
    use serde_json::json;
    use std::sync::Arc;

    fn tenants() -> (Tenant, Tenant) {
        (Tenant::new("source-shop", "src-token"), Tenant::new("target-shop", "dst-token"))
    }

    fn object_type(id: &str, type_name: &str) -> ObjectTypeDefinition {
        ObjectTypeDefinition {
            id: id.to_string(),
            name: type_name.replace('_', " "),
            type_name: type_name.to_string(),
            description: None,
            display_name_key: Some("title".to_string()),
            field_definitions: vec![FieldSpec {
                name: "Title".to_string(),
                key: "title".to_string(),
                description: None,
                required: true,
                value_type: "single_line_text_field".to_string(),
                validations: vec![],
            }],
        }
    }

    fn attribute(key: &str, owner_type: OwnerType, value_type: &str) -> AttributeDefinition {
        AttributeDefinition {
            name: key.to_string(),
            key: key.to_string(),
            namespace: "custom".to_string(),
            description: None,
            value_type: value_type.to_string(),
            owner_type,
            pinned_position: None,
            validations: vec![],
        }
    }

    fn engine(mock: Arc<MockTransport>) -> MigrationEngine<Arc<MockTransport>> {
        let (source, target) = tenants();
        MigrationEngine::new(SchemaClient::new(mock), source, target)
    }

    #[tokio::test]
    async fn test_reference_rewritten_end_to_end() {
        let (source, target) = tenants();
        let mock = Arc::new(MockTransport::new().with_store(&source).with_store(&target));
        mock.add_object_type(&source, object_type("gid://1", "warranty"));
        mock.add_object_type(&target, object_type("gid://9", "warranty"));
        let mut warranty = attribute("warranty", OwnerType::Product, "list.metaobject_reference");
        warranty.validations = vec![ValidationRule::new(METAOBJECT_DEFINITION_ID, "gid://1")];
        mock.add_attribute(&source, warranty);

        // The mock only accepts references to ids it knows about.
        let results = engine(mock.clone())
            .migrate_attribute_definitions()
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        let creates = mock.requests_for(ADD_METAFIELD_DEFINITION_MUTATION);
        assert_eq!(creates.len(), 1);
        assert_eq!(creates[0].store_name, "target-shop");
        let payload = &creates[0].variables["definition"];
        assert_eq!(
            payload["validations"],
            json!([{ "name": "metaobject_definition_id", "value": "gid://9" }])
        );
        assert_eq!(payload["pin"], json!(false));
        assert_eq!(payload["type"], json!("list.metaobject_reference"));
    }

    #[tokio::test]
    async fn test_unresolved_reference_is_reported_in_result() {
        let (source, target) = tenants();
        let mock = Arc::new(MockTransport::new().with_store(&source).with_store(&target));
        mock.add_object_type(&source, object_type("gid://1", "warranty"));
        let mut warranty = attribute("warranty", OwnerType::Product, "metaobject_reference");
        warranty.validations = vec![ValidationRule::new(METAOBJECT_DEFINITION_ID, "gid://1")];
        mock.add_attribute(&source, warranty);

        let results = engine(mock.clone())
            .migrate_attribute_definitions()
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].unresolved_references, vec!["gid://1".to_string()]);
        assert!(!results[0].is_success());
        assert_eq!(results[0].user_errors()[0].code.as_deref(), Some("INVALID_OPTION"));
        let payload = &mock.requests_for(ADD_METAFIELD_DEFINITION_MUTATION)[0].variables;
        assert_eq!(
            payload["definition"]["validations"],
            json!([{ "name": "metaobject_definition_id" }])
        );
    }

    #[tokio::test]
    async fn test_results_follow_owner_type_order() {
        let (source, target) = tenants();
        let mock = Arc::new(MockTransport::new().with_store(&source).with_store(&target));
        mock.add_attribute(&source, attribute("order_note", OwnerType::Order, "single_line_text_field"));
        mock.add_attribute(&source, attribute("collection_banner", OwnerType::Collection, "file_reference"));
        mock.add_attribute(&source, attribute("product_care", OwnerType::Product, "multi_line_text_field"));
        mock.add_attribute(&source, attribute("product_size", OwnerType::Product, "single_line_text_field"));

        let results = engine(mock.clone())
            .migrate_attribute_definitions()
            .await
            .unwrap();

        assert_eq!(results.len(), 4);
        let keys: Vec<String> = mock
            .requests_for(ADD_METAFIELD_DEFINITION_MUTATION)
            .iter()
            .map(|r| r.variables["definition"]["key"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            keys,
            vec!["product_care", "product_size", "collection_banner", "order_note"]
        );
        assert_eq!(mock.attributes(&target).len(), 4);
    }

    #[tokio::test]
    async fn test_output_order_matches_processing_order_under_concurrency() {
        let (source, target) = tenants();
        let mock = Arc::new(MockTransport::new().with_store(&source).with_store(&target));
        mock.add_attribute(&source, attribute("order_note", OwnerType::Order, "single_line_text_field"));
        mock.add_attribute(&source, attribute("collection_banner", OwnerType::Collection, "file_reference"));
        for i in 0..12 {
            mock.add_attribute(
                &source,
                attribute(&format!("product_{:02}", i), OwnerType::Product, "single_line_text_field"),
            );
        }

        let results = engine(mock.clone())
            .with_concurrency(8)
            .migrate_attribute_definitions()
            .await
            .unwrap();

        let names: Vec<String> = results
            .iter()
            .map(|r| r.response["data"]["metafieldDefinitionCreate"]["createdDefinition"]["name"]
                .as_str()
                .unwrap()
                .to_string())
            .collect();
        let mut expected: Vec<String> = (0..12).map(|i| format!("product_{:02}", i)).collect();
        expected.push("collection_banner".to_string());
        expected.push("order_note".to_string());
        assert_eq!(names, expected);
    }

    #[tokio::test]
    async fn test_attribute_pages_are_fetched_sequentially() {
        let (source, target) = tenants();
        let mock = Arc::new(MockTransport::new().with_store(&source).with_store(&target));
        for i in 0..25 {
            mock.add_attribute(
                &source,
                attribute(&format!("field_{}", i), OwnerType::Product, "single_line_text_field"),
            );
        }

        let results = engine(mock.clone())
            .with_owner_types(vec![OwnerType::Product])
            .migrate_attribute_definitions()
            .await
            .unwrap();

        assert_eq!(results.len(), 25);
        let pages = mock.requests_for(GET_METAFIELD_DEFINITIONS_QUERY);
        assert_eq!(pages.len(), 3);
        assert!(pages[0].variables["after"].is_null());
        assert_eq!(pages[1].variables["after"], json!("10"));
        assert_eq!(pages[2].variables["after"], json!("20"));
    }

    #[tokio::test]
    async fn test_failing_owner_type_aborts_run() {
        let (source, target) = tenants();
        let mock = Arc::new(MockTransport::new().with_store(&source).with_store(&target));
        mock.add_attribute(&source, attribute("care", OwnerType::Product, "single_line_text_field"));
        mock.add_attribute(&source, attribute("note", OwnerType::Order, "single_line_text_field"));
        mock.fail_owner_type(&source, OwnerType::Collection);

        let result = engine(mock.clone()).migrate_attribute_definitions().await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("503"));
        let fetched_orders = mock
            .requests_for(GET_METAFIELD_DEFINITIONS_QUERY)
            .iter()
            .any(|r| r.variables["ownerType"] == json!("ORDER"));
        assert!(!fetched_orders);
    }

    #[tokio::test]
    async fn test_object_type_migration_collects_user_errors() {
        let (source, target) = tenants();
        let mock = Arc::new(MockTransport::new().with_store(&source).with_store(&target));
        mock.add_object_type(&source, object_type("gid://1", "warranty"));
        mock.add_object_type(&source, object_type("gid://2", "size_chart"));
        mock.add_object_type(&source, object_type("gid://3", "care_guide"));
        mock.add_object_type(&target, object_type("gid://9", "size_chart"));

        let results = engine(mock.clone())
            .migrate_object_type_definitions()
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert!(results[0].is_success());
        assert!(!results[1].is_success());
        assert_eq!(results[1].user_errors()[0].code.as_deref(), Some("TAKEN"));
        assert!(results[2].is_success());

        let creates = mock.requests_for(ADD_METAOBJECT_DEFINITION_MUTATION);
        assert_eq!(creates.len(), 3);
        assert!(creates[0].variables["definition"].get("id").is_none());
        assert_eq!(mock.object_types(&target).len(), 3);
    }

    #[tokio::test]
    async fn test_attribute_run_rebuilds_map_after_object_types() {
        let (source, target) = tenants();
        let mock = Arc::new(MockTransport::new().with_store(&source).with_store(&target));
        mock.add_object_type(&source, object_type("gid://1", "warranty"));
        let mut warranty = attribute("warranty", OwnerType::Product, "metaobject_reference");
        warranty.validations = vec![ValidationRule::new(METAOBJECT_DEFINITION_ID, "gid://1")];
        mock.add_attribute(&source, warranty);
        let engine = engine(mock.clone());

        engine.migrate_object_type_definitions().await.unwrap();
        let results = engine.migrate_attribute_definitions().await.unwrap();

        assert!(results[0].is_success());
        assert!(results[0].unresolved_references.is_empty());
        let new_id = mock.object_types(&target)[0].id.clone();
        let payload = &mock.requests_for(ADD_METAFIELD_DEFINITION_MUTATION)[0].variables;
        assert_eq!(payload["definition"]["validations"][0]["value"], json!(new_id));
    }

    #[tokio::test]
    async fn test_concurrent_runs_are_independent() {
        let (source, target) = tenants();
        let mock = Arc::new(MockTransport::new().with_store(&source).with_store(&target));
        mock.add_object_type(&source, object_type("gid://1", "warranty"));
        mock.add_object_type(&target, object_type("gid://9", "warranty"));
        let mut warranty = attribute("warranty", OwnerType::Product, "metaobject_reference");
        warranty.validations = vec![ValidationRule::new(METAOBJECT_DEFINITION_ID, "gid://1")];
        mock.add_attribute(&source, warranty);
        mock.add_attribute(&source, attribute("note", OwnerType::Order, "single_line_text_field"));
        let engine = engine(mock.clone());

        let (first, second) = tokio::join!(
            engine.migrate_attribute_definitions(),
            engine.migrate_attribute_definitions()
        );
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        // One run creates each definition, the other hits a duplicate-key error.
        for index in 0..2 {
            assert_ne!(first[index].is_success(), second[index].is_success());
        }
        let creates = mock.requests_for(ADD_METAFIELD_DEFINITION_MUTATION);
        assert_eq!(creates.len(), 4);
        assert!(creates
            .iter()
            .filter(|r| r.variables["definition"]["key"] == json!("warranty"))
            .all(|r| r.variables["definition"]["validations"][0]["value"] == json!("gid://9")));
    }

    #[tokio::test]
    async fn test_transport_failure_is_fatal() {
        let (source, _) = tenants();
        let mock = Arc::new(MockTransport::new().with_store(&source));
        let result = engine(mock).migrate_attribute_definitions().await;
        assert!(matches!(
            result,
            Err(MigrationError::Client(ClientError::Status { status: 401, .. }))
        ));
    }

    #[tokio::test]
    async fn test_ordered_bounded_preserves_input_order() {
        let items: Vec<u64> = (0..10).collect();
        let results = ordered_bounded(items, 4, |n| async move {
            // Later items finish first.
            tokio::time::sleep(std::time::Duration::from_millis(20 - n * 2)).await;
            Ok::<_, MigrationError>(n * 10)
        })
        .await
        .unwrap();
        assert_eq!(results, (0..10).map(|n| n * 10).collect::<Vec<_>>());
    }
}
