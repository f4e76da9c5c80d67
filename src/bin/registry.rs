//! ODM Registry CLI
//!
//! Inspects a schema registry: owners, projections, lint findings, and
//! cascading deletes against a JSON seed loaded into the in-memory store.

use std::path::PathBuf;
use clap::{Parser, Subcommand};
use familiar_odm::lint::lint_schemas;
use familiar_odm::{
    find_owners, load_from_path, CascadeDeleteEngine, DeleteRequest, DepthSpec, DocumentId, Filter,
    MemoryStore, OdmConfig, OdmError, ProjectionBuilder, SchemaRegistry,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "odm-registry")]
#[command(about = "Inspect schemas, projections and cascading deletes")]
struct Cli {
    /// Path to schema definitions (defaults to [registry].path)
    #[arg(short, long)]
    registry: Option<PathBuf>,

    /// Config file
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show registry statistics
    Stats,

    /// List owner references of a collection
    Owners {
        collection: String,
        /// Also show every collection a hard cascade could reach
        #[arg(long)]
        reach: bool,
    },

    /// Print the projection spec of a schema
    Project {
        schema: String,
        /// Depth as JSON: `2` or `{"author": 1, "comments": {"user": 0}}`
        #[arg(short, long)]
        depth: Option<String>,
    },

    /// Check a projection request (JSON) against a schema's spec
    Validate {
        schema: String,
        projection: String,
        #[arg(short, long)]
        depth: Option<String>,
    },

    /// Lint all definitions
    Lint,

    /// Delete a document from a seeded in-memory store
    Delete {
        /// JSON seed: `{ "collection": [documents...] }`
        #[arg(long)]
        data: PathBuf,
        collection: String,
        /// Document `_id` as JSON (`"u1"` or `42`)
        id: String,
        #[arg(long)]
        hard_cascade: bool,
        /// Write the remaining documents back to the seed file
        #[arg(long)]
        write: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match OdmConfig::load_from(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli, config) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli, config: OdmConfig) -> Result<(), Box<dyn std::error::Error>> {
    let path = cli.registry.clone().unwrap_or_else(|| config.registry_path());
    let registry = load_from_path(&path, &config.load_config())?;

    match cli.command {
        Commands::Stats => {
            let graph = registry.ownership_graph();
            println!("📊 Registry: {:?}", path);
            println!("  Schemas:          {}", registry.schema_count());
            println!("  Relation fields:  {}", registry.relation_count());
            println!(
                "  Standalone:       {}",
                registry.schemas().filter(|s| s.relations().is_empty()).count()
            );
            println!("  Ownership edges:  {}", graph.edge_count());
            println!("  Fingerprint:      {}", registry.fingerprint().short());
            Ok(())
        }

        Commands::Owners { collection, reach } => {
            registry.get_schema(&collection)?;
            let owners = find_owners(&registry, &collection);
            if owners.is_empty() {
                println!("'{}' has no owners", collection);
            } else {
                println!("Owners of '{}':", collection);
                for owner in &owners {
                    println!("  {}  (filter: {})", owner, owner.embedded_id_path());
                }
            }

            if reach {
                let reached = registry
                    .ownership_graph()
                    .cascade_reach(&collection, Some(config.cascade.max_depth));
                println!();
                println!("Hard cascade reach:");
                for node in reached {
                    println!("  {:>3}  {}", node.depth, node.schema);
                }
            }
            Ok(())
        }

        Commands::Project { schema, depth } => {
            let spec = build_projection(&registry, &config, &schema, depth.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&spec.to_document())?);
            Ok(())
        }

        Commands::Validate { schema, projection, depth } => {
            let spec = build_projection(&registry, &config, &schema, depth.as_deref())?;
            let request: serde_json::Value = serde_json::from_str(&projection)?;
            match spec.validate(&request) {
                Ok(()) => {
                    println!("✅ Projection is valid for '{}'", schema);
                    Ok(())
                }
                Err(violation) => {
                    println!("❌ {}", violation);
                    std::process::exit(1);
                }
            }
        }

        Commands::Lint => {
            let results = lint_schemas(registry.schemas());
            let mut errors = 0;
            for result in &results {
                for error in &result.errors {
                    println!("❌ [{}] {}: {}", error.code, error.path, error.message);
                    errors += 1;
                }
                for warning in &result.warnings {
                    println!("⚠️  [{}] {}: {}", warning.code, warning.path, warning.message);
                }
            }
            if errors > 0 {
                std::process::exit(1);
            }
            println!("✅ {} schemas checked", registry.schema_count());
            Ok(())
        }

        Commands::Delete { data, collection, id, hard_cascade, write } => {
            let seed: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&data)?)?;
            let id: serde_json::Value = serde_json::from_str(&id)?;
            let store = MemoryStore::from_json(&seed).map_err(OdmError::from)?;

            let request = DeleteRequest::new(collection, Filter::by_id(&DocumentId::new(id)))
                .hard_cascade(hard_cascade || config.cascade.hard_cascade);

            let runtime = tokio::runtime::Runtime::new()?;
            let engine = CascadeDeleteEngine::new(&store, &registry).with_config(&config.cascade);
            let deleted = runtime.block_on(engine.delete_one(request))?;

            println!("🗑  Deleted {}/{}", deleted.collection, deleted.id);
            for step in &deleted.cascaded {
                let ids: Vec<String> = step.deleted_ids.iter().map(|i| i.to_string()).collect();
                println!("  └─ {} via {}: {}", step.owner.owner_schema, step.owner, ids.join(", "));
            }

            if write {
                let remaining = runtime.block_on(store.dump());
                std::fs::write(&data, serde_json::to_string_pretty(&remaining)?)?;
                println!("✅ Wrote remaining documents to {:?}", data);
            }
            Ok(())
        }
    }
}

fn build_projection(
    registry: &SchemaRegistry,
    config: &OdmConfig,
    schema: &str,
    depth: Option<&str>,
) -> Result<familiar_odm::ProjectionSpec, Box<dyn std::error::Error>> {
    let builder = ProjectionBuilder::new(registry).with_config(&config.projection);
    let spec = match depth {
        Some(raw) => {
            let depth: DepthSpec = serde_json::from_str(raw)?;
            builder.select(schema, &depth)?
        }
        None => builder.select_default(schema)?,
    };
    Ok(spec)
}
