use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use docindex_elastic::{ElasticConfig, ElasticsearchBackend};
use docindex_embed::OpenAiEmbeddings;
use docindex_engine::{DocumentIndex, EngineConfig, IdentityIndex, ScoredResult};

mod input;

#[cfg(test)]
mod tests;

#[derive(Parser)]
#[command(name = "docindex")]
#[command(about = "Hybrid vector and keyword search over grouped documents", long_about = None)]
struct Cli {
    /// Index to use instead of ELASTICSEARCH_INDEX
    #[arg(short, long, global = true)]
    index: Option<String>,

    /// Log engine activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Embed and index a file as one document group
    Ingest {
        /// Text file (one document per paragraph) or JSON array of documents
        path: PathBuf,
        /// Group id; defaults to a slug of the file name
        #[arg(short, long)]
        group: Option<String>,
    },
    /// Hybrid search within document groups
    Search {
        query: String,
        /// Group ids to search (repeatable)
        #[arg(short, long = "group", required = true)]
        groups: Vec<String>,
        /// Minimum score instead of DOCINDEX_MIN_SCORE
        #[arg(long)]
        min_score: Option<f64>,
        /// Maximum results instead of DOCINDEX_MAX_RESULTS
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// List every record id in the index
    Ids,
    /// Show stored documents by record id
    Fetch { ids: Vec<String> },
    /// Report which of the given group ids have indexed records
    Groups {
        group_ids: Vec<String>,
        /// Also print the record count per existing group
        #[arg(short, long)]
        count: bool,
    },
    /// Delete every record of a group
    Delete { group: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { "info" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut elastic_config = ElasticConfig::from_env()?;
    if let Some(index) = cli.index.clone() {
        elastic_config.index = index;
        elastic_config.validate()?;
    }
    let backend = Arc::new(ElasticsearchBackend::new(elastic_config)?);

    match cli.command {
        Command::Ingest { path, group } => {
            let index = document_index(backend, EngineConfig::from_env()?)?;
            let group_id = match group {
                Some(group) => group,
                None => input::group_id_from_path(&path).with_context(|| {
                    format!("Cannot derive a group id from {}; pass --group", path.display())
                })?,
            };
            let documents = input::load_documents(&path)?;
            println!(
                "{} Ingesting {} documents as {}",
                "📥".blue(),
                documents.len(),
                group_id.bold()
            );

            let report = index.ingest(&group_id, documents).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if report.summary.is_complete() {
                println!(
                    "{} Wrote {} records ({} stale removed)",
                    "✅".green(),
                    report.summary.written,
                    report.purged
                );
            } else {
                println!(
                    "{} Wrote {} records, {} failed",
                    "⚠️".yellow(),
                    report.summary.written,
                    report.summary.failed
                );
                for error in &report.summary.errors {
                    println!("  {} {}", "•".yellow(), error);
                }
            }
        }
        Command::Search {
            query,
            groups,
            min_score,
            limit,
        } => {
            let mut engine_config = EngineConfig::from_env()?;
            if let Some(min_score) = min_score {
                engine_config = engine_config.with_min_score(min_score);
            }
            if let Some(limit) = limit {
                engine_config = engine_config.with_max_results(limit);
            }
            let index = document_index(backend, engine_config)?;

            let results = index.search(&query, &groups).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_results(&results);
            }
        }
        Command::Ids => {
            let ids = IdentityIndex::new(backend).all_ids().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&ids)?);
            } else {
                for id in &ids {
                    println!("{}", id);
                }
                println!("{}", format!("{} records", ids.len()).dimmed());
            }
        }
        Command::Fetch { ids } => {
            let documents = IdentityIndex::new(backend).fetch_by_ids(&ids).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&documents)?);
            } else {
                for document in &documents {
                    let group = document.group_id().unwrap_or("-");
                    println!("{} {}", "▸".cyan(), group.bold());
                    println!("  {}", document.content);
                }
                if documents.len() < ids.len() {
                    println!(
                        "{}",
                        format!("{} of {} ids not found", ids.len() - documents.len(), ids.len())
                            .dimmed()
                    );
                }
            }
        }
        Command::Groups { group_ids, count } => {
            let identity = IdentityIndex::new(backend);
            let existing = identity.filter_existing_group_ids(&group_ids).await?;
            if cli.json && !count {
                println!("{}", serde_json::to_string_pretty(&existing)?);
                return Ok(());
            }

            let mut counts = Vec::with_capacity(existing.len());
            for group_id in &existing {
                let records = if count {
                    Some(identity.count_group_records(group_id).await?)
                } else {
                    None
                };
                counts.push((group_id.clone(), records));
            }

            if cli.json {
                let body: serde_json::Map<String, serde_json::Value> = counts
                    .into_iter()
                    .map(|(group_id, records)| (group_id, serde_json::json!(records)))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                for group_id in &group_ids {
                    match counts.iter().find(|(g, _)| g == group_id) {
                        Some((_, Some(records))) => {
                            println!("{} {} ({} records)", "✓".green(), group_id, records)
                        }
                        Some((_, None)) => println!("{} {}", "✓".green(), group_id),
                        None => println!("{} {}", "✗".red(), group_id.dimmed()),
                    }
                }
            }
        }
        Command::Delete { group } => {
            let deleted = IdentityIndex::new(backend).delete_group(&group).await?;
            println!("{} Deleted {} records of {}", "🗑".red(), deleted, group.bold());
        }
    }

    Ok(())
}

/// Index with an embedding provider; only ingest and search need one
fn document_index(
    backend: Arc<ElasticsearchBackend>,
    config: EngineConfig,
) -> Result<DocumentIndex<ElasticsearchBackend, OpenAiEmbeddings>> {
    let provider = Arc::new(OpenAiEmbeddings::from_env()?);
    Ok(DocumentIndex::new(backend, provider, config)?)
}

fn print_results(results: &[ScoredResult]) {
    if results.is_empty() {
        println!("{}", "No results".dimmed());
        return;
    }
    for (rank, result) in results.iter().enumerate() {
        println!(
            "{} {} {}",
            format!("{:>2}.", rank + 1).bold(),
            format!("[{:.3}]", result.score).cyan(),
            result.document.group_id().unwrap_or("-").dimmed()
        );
        println!("    {}", result.document.content);
    }
}
