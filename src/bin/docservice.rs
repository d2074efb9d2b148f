use std::path::{Path, PathBuf};

use bson::{Bson, Document};
use clap::{Parser, Subcommand};
use docservice::types::to_json;
use docservice::{
    FindResult, MemoryStore, Model, OneOrMany, Paginated, Params, Service, ServiceConfig,
    ServiceOptions, logger,
};

#[derive(Parser, Debug)]
#[command(name = "docservice", version, about = "Run data service calls against an in-memory collection", long_about = None)]
struct Cli {
    #[arg(long, help = "Path to a service config file (TOML). If omitted, defaults are used.")]
    config: Option<PathBuf>,
    #[arg(long, help = "JSON file holding an array of documents to load before the call")]
    seed: Option<PathBuf>,
    #[arg(long, default_value = "{}", help = "Query object (JSON) passed as params.query")]
    query: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Find records matching a query (JSON)")]
    Find {
        #[arg(default_value = "{}", help = "Query object including $select/$sort/$limit/$skip")]
        query: String,
    },
    #[command(about = "Get one record by id")]
    Get {
        #[arg(help = "Record id")]
        id: String,
    },
    #[command(about = "Create one record (JSON object) or a batch (JSON array)")]
    Create {
        #[arg(help = "Record or array of records")]
        data: String,
    },
    #[command(about = "Patch one record, or every match when id is '-'")]
    Patch {
        #[arg(help = "Record id, or '-' for every record matching --query")]
        id: String,
        #[arg(help = "Fields to set; $-prefixed keys are passed as modifiers")]
        data: String,
    },
    #[command(about = "Replace one record")]
    Update {
        #[arg(help = "Record id")]
        id: String,
        #[arg(help = "Replacement record")]
        data: String,
    },
    #[command(about = "Remove one record, or every match when id is '-'")]
    Remove {
        #[arg(help = "Record id, or '-' for every record matching --query")]
        id: String,
    },
}

fn parse_json(s: &str) -> Result<Bson, Box<dyn std::error::Error>> {
    let value: serde_json::Value = serde_json::from_str(s)?;
    Ok(Bson::try_from(value)?)
}

fn parse_document(s: &str) -> Result<Document, Box<dyn std::error::Error>> {
    match parse_json(s)? {
        Bson::Document(d) => Ok(d),
        other => Err(format!("expected a JSON object, got {other}").into()),
    }
}

fn parse_payload(s: &str) -> Result<OneOrMany<Document>, Box<dyn std::error::Error>> {
    match parse_json(s)? {
        Bson::Document(d) => Ok(OneOrMany::One(d)),
        Bson::Array(items) => items
            .into_iter()
            .map(|i| match i {
                Bson::Document(d) => Ok(d),
                other => Err(format!("batch entries must be objects, got {other}").into()),
            })
            .collect::<Result<Vec<_>, Box<dyn std::error::Error>>>()
            .map(OneOrMany::Many),
        other => Err(format!("expected an object or array, got {other}").into()),
    }
}

fn parse_id(s: &str) -> Option<Bson> {
    (s != "-").then(|| Bson::String(s.to_string()))
}

fn load_seed(path: &Path) -> Result<Vec<Document>, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    match parse_json(&text)? {
        Bson::Array(items) => items
            .into_iter()
            .map(|i| match i {
                Bson::Document(d) => Ok(d),
                other => Err(format!("seed entries must be objects, got {other}").into()),
            })
            .collect(),
        _ => Err("seed file must hold a JSON array".into()),
    }
}

fn print_many(result: OneOrMany<Document>) -> Result<(), Box<dyn std::error::Error>> {
    let out = match result {
        OneOrMany::One(d) => to_json(&d),
        OneOrMany::Many(v) => serde_json::Value::Array(v.iter().map(to_json).collect()),
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    if let Err(e) = logger::configure_from_env() {
        eprintln!("logging disabled: {e}");
    }

    let config = match &cli.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };
    let docs = match &cli.seed {
        Some(path) => load_seed(path)?,
        None => Vec::new(),
    };
    let store = MemoryStore::with_documents("docservice", docs)?;
    let service = Service::new(ServiceOptions::new(Model::ready(store), config))?;
    let mut params = Params::with_query(parse_document(&cli.query)?);

    match cli.command {
        Commands::Find { query } => {
            for (k, v) in parse_document(&query)? {
                params.query.insert(k, v);
            }
            let out = match service.find(&params).await? {
                FindResult::Page(page) => serde_json::to_value(Paginated {
                    total: page.total,
                    limit: page.limit,
                    skip: page.skip,
                    data: page.data.iter().map(to_json).collect::<Vec<_>>(),
                })?,
                FindResult::All(docs) => {
                    serde_json::Value::Array(docs.iter().map(to_json).collect())
                }
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Commands::Get { id } => {
            let doc = service.get(&Bson::String(id), &params).await?;
            println!("{}", serde_json::to_string_pretty(&to_json(&doc))?);
        }
        Commands::Create { data } => {
            print_many(service.create(parse_payload(&data)?, &params).await?)?;
        }
        Commands::Patch { id, data } => {
            let id = parse_id(&id);
            print_many(service.patch(id.as_ref(), parse_document(&data)?, &params).await?)?;
        }
        Commands::Update { id, data } => {
            let doc = service.update(&Bson::String(id), parse_document(&data)?, &params).await?;
            println!("{}", serde_json::to_string_pretty(&to_json(&doc))?);
        }
        Commands::Remove { id } => {
            let id = parse_id(&id);
            print_many(service.remove(id.as_ref(), &params).await?)?;
        }
    }
    Ok(())
}
