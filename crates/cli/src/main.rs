use anyhow::Result;
use clap::{Parser, Subcommand};
use docdex_core::config::{self, AppConfig};
use docdex_core::fingerprint;
use docdex_core::reconcile::{self, ReconcileOutcome};
use docdex_core::retrieve;
use storage::artifacts::IndexArtifacts;
use storage::manifest::ManifestStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Reconcile { json } => run_reconcile(cfg, json).await,
        Commands::Search { query, topk, json } => run_search(cfg, query, topk, json).await,
        Commands::Context { query } => run_context(cfg, query).await,
        Commands::Status { json } => run_status(cfg, json),
    }
}

#[derive(Parser)]
#[command(name = "docdex")]
#[command(about = "Incremental vector index over a folder of documents", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring the index up to date with the document folder
    Reconcile {
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
    /// Reconcile, then run a similarity search
    Search {
        /// Query text to embed and search
        query: String,
        /// Number of results
        #[arg(short, long, default_value_t = 5)]
        topk: usize,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Reconcile, then print the joined retrieval context for a query
    Context {
        /// Query text
        query: String,
    },
    /// Show the pending diff between folder and manifest without indexing
    Status {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
}

async fn run_reconcile(cfg: AppConfig, json: bool) -> Result<()> {
    let registry = reconcile::build_registry(&cfg);
    let ReconcileOutcome { index, summary } = reconcile::reconcile(&cfg, &registry).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "status": "ok",
                "mode": summary.mode.as_str(),
                "documents": summary.documents,
                "new": summary.new_documents,
                "removed": summary.removed_documents,
                "modified": summary.modified_documents,
                "embedded_chunks": summary.embedded_chunks,
                "indexed_chunks": index.len(),
            }))?
        );
    } else {
        println!(
            "{}: {} documents, {} chunks embedded, {} chunks indexed",
            summary.mode.as_str(),
            summary.documents,
            summary.embedded_chunks,
            index.len()
        );
    }
    Ok(())
}

async fn run_search(cfg: AppConfig, query: String, topk: usize, json: bool) -> Result<()> {
    let registry = reconcile::build_registry(&cfg);
    let ReconcileOutcome { index, .. } = reconcile::reconcile(&cfg, &registry).await?;
    let hits = index.search(&query, topk).await?;

    if json {
        let vals: Vec<serde_json::Value> = hits
            .iter()
            .map(|h| {
                serde_json::json!({
                    "source": h.chunk.source,
                    "page": h.chunk.page,
                    "score": h.score,
                    "text": h.chunk.text,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&vals)?);
    } else if hits.is_empty() {
        println!("no results");
    } else {
        for hit in &hits {
            println!(
                "{:.3}  {} p.{}  {}",
                hit.score,
                hit.chunk.source,
                hit.chunk.page,
                snippet(&hit.chunk.text, 120)
            );
        }
    }
    Ok(())
}

async fn run_context(cfg: AppConfig, query: String) -> Result<()> {
    let k = cfg.retrieval.context_k;
    let registry = reconcile::build_registry(&cfg);
    let ReconcileOutcome { index, .. } = reconcile::reconcile(&cfg, &registry).await?;
    let context = retrieve::retrieve_relevant_context(&index, &query, k).await?;
    println!("{context}");
    Ok(())
}

fn run_status(cfg: AppConfig, json: bool) -> Result<()> {
    let artifacts = IndexArtifacts::new(&cfg.index.path);
    let store = ManifestStore::new(artifacts.manifest_path());

    let current = fingerprint::scan_folder(
        std::path::Path::new(&cfg.documents.folder),
        &cfg.documents.extensions,
        &cfg.documents.exclude,
    )?;
    let previous = store.load();
    let diff = reconcile::diff_manifests(&current, &previous);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "documents": current.len(),
                "index_complete": artifacts.is_complete(),
                "new": diff.new,
                "removed": diff.removed,
                "modified": diff.modified,
            }))?
        );
    } else {
        println!(
            "{} documents on disk, index {}",
            current.len(),
            if artifacts.is_complete() {
                "present"
            } else {
                "missing"
            }
        );
        if diff.is_empty() {
            println!("up to date");
        } else {
            for name in &diff.new {
                println!("new:      {name}");
            }
            for name in &diff.modified {
                println!("modified: {name}");
            }
            for name in &diff.removed {
                println!("removed:  {name}");
            }
        }
    }
    Ok(())
}

fn snippet(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.len() <= max {
        flat
    } else {
        let mut end = max;
        while !flat.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &flat[..end])
    }
}
