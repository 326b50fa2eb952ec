use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{info, warn};

use crate::{
    definition::ObjectTypeDefinition,
    schema_client::{ClientError, GraphqlTransport, SchemaClient},
    tenant::Tenant,
};

/// Maps source-tenant object-type identifiers to target-tenant identifiers.
///
/// Built from complete snapshots of both tenants and matched on type name.
/// Only valid for the run that built it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IdentifierMap {
    entries: BTreeMap<String, String>,
}

/// Outcome of looking up one source identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    Mapped(&'a str),
    Unresolved,
}

impl<'a> Resolution<'a> {
    pub fn mapped(self) -> Option<&'a str> {
        match self {
            Resolution::Mapped(id) => Some(id),
            Resolution::Unresolved => None,
        }
    }
}

impl IdentifierMap {
    /// Pair up definitions whose type names match.
    ///
    /// When the target holds several definitions with the same type name the
    /// first one wins. Source definitions without a counterpart are left out.
    pub fn from_snapshots(
        source: &[ObjectTypeDefinition],
        target: &[ObjectTypeDefinition],
    ) -> Self {
        let mut target_by_type: HashMap<&str, &str> = HashMap::with_capacity(target.len());
        for definition in target {
            target_by_type
                .entry(definition.type_name.as_str())
                .or_insert(definition.id.as_str());
        }

        let mut entries = BTreeMap::new();
        for definition in source {
            match target_by_type.get(definition.type_name.as_str()) {
                Some(target_id) => {
                    entries.insert(definition.id.clone(), (*target_id).to_string());
                }
                None => warn!(
                    "Metaobject type '{}' ({}) has no counterpart in the target store",
                    definition.type_name, definition.id
                ),
            }
        }

        Self { entries }
    }

    pub fn resolve(&self, source_id: &str) -> Resolution<'_> {
        match self.entries.get(source_id) {
            Some(target_id) => Resolution::Mapped(target_id.as_str()),
            None => Resolution::Unresolved,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Fetch both tenants' object-type definitions in full and match them by type name
pub async fn build_identifier_map<T: GraphqlTransport>(
    client: &SchemaClient<T>,
    source: &Tenant,
    target: &Tenant,
) -> Result<IdentifierMap, ClientError> {
    let source_definitions = client.fetch_object_type_definitions(source).await?;
    let target_definitions = client.fetch_object_type_definitions(target).await?;

    let map = IdentifierMap::from_snapshots(&source_definitions, &target_definitions);
    info!(
        "Matched {} of {} metaobject definitions between {} and {}",
        map.len(),
        source_definitions.len(),
        source,
        target
    );
    Ok(map)
}
