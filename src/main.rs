use std::net::SocketAddr;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use shop_schema_migrate::{
    config::{Settings, SERVER_HOST},
    migration::{MigrationEngine, MigrationError},
    owner_type::OwnerType,
    reporter::{MigrationReporter, ReportError, ReportFormat},
    schema_client::{ClientError, CreationResult, HttpTransport, SchemaClient},
    server::{self, AppState},
    tenant::Tenant,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "shop-schema-migrate")]
#[command(about = "Copy metaobject and metafield definitions from one store to another")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Admin API version (overrides SHOPIFY_API_VERSION)
    #[arg(long, global = true, value_name = "VERSION")]
    api_version: Option<String>,

    /// Maximum create calls in flight (overrides MIGRATION_CONCURRENCY)
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Output format for migration reports and dumps
    #[arg(long, global = true, value_enum, default_value = "console")]
    format: ReportFormat,

    /// Print the raw creation results instead of a report
    #[arg(long, global = true)]
    raw: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Listen for HTTP triggers (default)
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(long)]
        port: Option<u16>,

        /// Reject a trigger while the same store pair is already migrating
        #[arg(long)]
        deduplicate_runs: bool,
    },
    /// Copy every metaobject definition to the target store
    MigrateObjectTypes,
    /// Copy every metafield definition to the target store
    MigrateAttributes,
    /// Print one store's metaobject definitions
    FetchObjectTypes {
        #[arg(long, value_enum, default_value = "source")]
        tenant: TenantRole,
    },
    /// Print one store's metafield definitions for an owner type
    FetchAttributes {
        #[arg(long, value_name = "OWNER_TYPE")]
        owner_type: OwnerType,

        #[arg(long, value_enum, default_value = "source")]
        tenant: TenantRole,
    },
    /// Print the source to target metaobject definition id map
    IdentifierMap,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TenantRole {
    Source,
    Target,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to encode output: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .compact()
        .init();

    let args = Args::parse();
    let settings = Settings::from_env();

    if let Err(e) = run(args, settings).await {
        eprintln!("✗ {}", e);
        process::exit(1);
    }
}

async fn run(args: Args, settings: Settings) -> Result<(), CliError> {
    let api_version = args
        .api_version
        .clone()
        .unwrap_or_else(|| settings.api_version.clone());
    let concurrency = args.concurrency.unwrap_or(settings.concurrency);

    let client = SchemaClient::new(HttpTransport::new(api_version));
    let engine = MigrationEngine::new(client, settings.source.clone(), settings.target.clone())
        .with_concurrency(concurrency);

    let command = args.command.unwrap_or(Command::Serve {
        port: None,
        deduplicate_runs: false,
    });

    match command {
        Command::Serve {
            port,
            deduplicate_runs,
        } => {
            let mut state = AppState::new(engine);
            if deduplicate_runs || settings.deduplicate_runs {
                state = state.with_guard();
            }
            let addr = SocketAddr::from((SERVER_HOST, port.unwrap_or(settings.port)));
            info!("Starting migration trigger server...");
            server::run_server(server::create_app(state), addr).await?;
        }
        Command::MigrateObjectTypes => {
            let results = engine.migrate_object_type_definitions().await?;
            print_results("metaobject definitions", &results, args.format, args.raw)?;
        }
        Command::MigrateAttributes => {
            let results = engine.migrate_attribute_definitions().await?;
            print_results("metafield definitions", &results, args.format, args.raw)?;
        }
        Command::FetchObjectTypes { tenant } => {
            let tenant = select(&settings, tenant);
            let definitions = engine.client().fetch_object_type_definitions(tenant).await?;
            println!("{}", render(&definitions, args.format)?);
            println!("ℹ {} metaobject definitions in {}", definitions.len(), tenant);
        }
        Command::FetchAttributes { owner_type, tenant } => {
            let tenant = select(&settings, tenant);
            let definitions = engine
                .client()
                .fetch_attribute_definitions(owner_type, tenant)
                .await?;
            println!("{}", render(&definitions, args.format)?);
            println!(
                "ℹ {} {} metafield definitions in {}",
                definitions.len(),
                owner_type,
                tenant
            );
        }
        Command::IdentifierMap => {
            let map = engine.identifier_map().await?;
            println!("{}", render(&map, args.format)?);
        }
    }

    Ok(())
}

fn select(settings: &Settings, role: TenantRole) -> &Tenant {
    match role {
        TenantRole::Source => &settings.source,
        TenantRole::Target => &settings.target,
    }
}

fn render<S: Serialize>(value: &S, format: ReportFormat) -> Result<String, CliError> {
    match format {
        ReportFormat::Yaml => Ok(serde_yaml::to_string(value)?),
        ReportFormat::Console | ReportFormat::Json => Ok(serde_json::to_string_pretty(value)?),
    }
}

fn print_results(
    kind: &str,
    results: &[CreationResult],
    format: ReportFormat,
    raw: bool,
) -> Result<(), CliError> {
    if raw {
        println!("{}", render(&results, format)?);
        return Ok(());
    }

    let reporter = MigrationReporter::new().with_format(format);
    let report = reporter.generate_report(kind, results);
    println!("{}", reporter.format_report(&report)?);
    Ok(())
}
