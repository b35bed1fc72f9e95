use anyhow::Result;
use clap::{Parser, Subcommand};
use datagraph::{Config, DataGraph, EntityKind};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "datagraph")]
#[command(about = "Privacy data graph engine: entities, relationships, similarity, ingestion")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize the database (run migrations) and verify the ontology seed
    Init,
    /// Extract a graph from a document file and persist it
    Ingest {
        /// Path to a UTF-8 text document
        file: PathBuf,
    },
    /// Find entities similar to a name/description in one collection
    Similar {
        /// Entity type (Asset, ProcessingActivity, DataElement, DataSubjectType, Vendor)
        entity_type: EntityKind,
        name: String,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// List entities of one type
    List {
        entity_type: EntityKind,
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
    },
    /// List relationships, optionally filtered by entity id or type
    Relationships {
        #[arg(short, long)]
        entity_id: Option<String>,
        #[arg(short = 't', long)]
        relationship_type: Option<String>,
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
    },
    /// Print the ontology catalog (entity types, properties, valid relationships)
    Ontology,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();

    let config = Config::load()?;
    let engine = DataGraph::open(config, Path::new("migrations"))?;

    match args.command {
        Command::Init => {
            // Migrations already ran in open(); report the seeded catalog
            let types = engine.list_entity_types().await?;
            log::info!("Database initialized with {} entity types", types.len());
            for t in types {
                println!("{} -> {}", t.type_name, t.table_name);
            }
        }
        Command::Ingest { file } => {
            let text = std::fs::read_to_string(&file)?;
            log::info!("Ingesting {}", file.display());
            let report = engine.ingest_document(&text).await?;
            println!(
                "Persisted {} entities and {} relationships",
                report.nodes_found, report.relationships_found
            );
            for outcome in report.node_outcomes.iter().filter(|o| o.skipped.is_some()) {
                println!(
                    "Skipped node '{}': {}",
                    outcome.name,
                    outcome.skipped.as_deref().unwrap_or("")
                );
            }
            for outcome in report.edge_outcomes.iter().filter(|o| o.skipped.is_some()) {
                println!(
                    "Skipped edge '{}' {} -> {}: {}",
                    outcome.relationship_type,
                    outcome.source,
                    outcome.target,
                    outcome.skipped.as_deref().unwrap_or("")
                );
            }
        }
        Command::Similar {
            entity_type,
            name,
            description,
            limit,
        } => {
            let hits = engine
                .find_similar(entity_type, &name, description.as_deref(), limit)
                .await?;
            if hits.is_empty() {
                println!("No {} entities stored", entity_type);
            }
            for hit in hits {
                println!("{:.4}  {}  {}", hit.distance, hit.entity_id, hit.name);
            }
        }
        Command::List { entity_type, limit } => {
            for record in engine.list_entities(entity_type, limit).await? {
                println!(
                    "{}  {}  {}",
                    record.entity_id,
                    record.name,
                    record.description.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Relationships {
            entity_id,
            relationship_type,
            limit,
        } => {
            let edges = if entity_id.is_none() && relationship_type.is_none() {
                engine.list_all_relationships(limit, true).await?
            } else {
                engine
                    .get_relationships(entity_id.as_deref(), relationship_type.as_deref(), limit)
                    .await?
            };
            for edge in edges {
                let source = edge
                    .source_detail
                    .as_ref()
                    .map(|d| d.name.clone())
                    .unwrap_or_else(|| edge.source_id.clone());
                let target = edge
                    .target_detail
                    .as_ref()
                    .map(|d| d.name.clone())
                    .unwrap_or_else(|| edge.target_id.clone());
                println!(
                    "{}  {} -[{}]-> {}",
                    edge.relationship_id, source, edge.relationship_type, target
                );
            }
        }
        Command::Ontology => {
            println!("Entity types:");
            for t in engine.list_entity_types().await? {
                println!("  {}: {}", t.type_name, t.description.as_deref().unwrap_or("-"));
                for p in engine.list_entity_type_properties(&t.type_name).await? {
                    let required = if p.required { " (required)" } else { "" };
                    println!("    {}: {}{}", p.property_name, p.data_type, required);
                }
            }
            println!("Relationships:");
            for r in engine.list_relationship_ontology().await? {
                println!(
                    "  {} -[{}]-> {}",
                    r.source_type, r.relationship_type, r.target_type
                );
            }
        }
    }

    Ok(())
}
