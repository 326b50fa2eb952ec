// Store schema migration: metaobject and metafield definitions between stores
pub mod config;
pub mod definition;
pub mod migration;
pub mod mock;
pub mod owner_type;
pub mod queries;
pub mod reconciler;
pub mod reporter;
pub mod schema_client;
pub mod server;
pub mod tenant;
pub mod transformer;

// Re-export core types for convenience
pub use config::Settings;
pub use definition::{AttributeDefinition, ObjectTypeDefinition, ValidationRule};
pub use migration::{MigrationEngine, MigrationError};
pub use owner_type::OwnerType;
pub use reconciler::{IdentifierMap, Resolution};
pub use reporter::{MigrationReport, MigrationReporter, ReportFormat};
pub use schema_client::{ClientError, CreationResult, GraphqlTransport, HttpTransport, SchemaClient};
pub use tenant::Tenant;
