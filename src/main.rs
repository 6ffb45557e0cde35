//! # docvault CLI (`dvt`)
//!
//! The `dvt` binary is the primary interface for docvault. It provides
//! commands for database initialization, document upload and management,
//! ingestion, retrieval, quota inspection, and starting the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! dvt --config ./config/docvault.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dvt init` | Create the SQLite database and run schema migrations |
//! | `dvt upload <file> --tenant <t>` | Validate and store a document |
//! | `dvt documents --tenant <t>` | List a tenant's documents |
//! | `dvt delete <id> --tenant <t>` | Delete a document and its stored file |
//! | `dvt purge --tenant <t>` | Delete all documents, files, and the index |
//! | `dvt ingest --tenant <t>` | Rebuild the tenant's vector index |
//! | `dvt status --tenant <t>` | Show ingestion status counts |
//! | `dvt query "<text>" --tenant <t>` | Rank indexed chunks against a query |
//! | `dvt quota --tenant <t>` | Show usage against tier limits |
//! | `dvt tier <tier> --tenant <t>` | Change a tenant's tier |
//! | `dvt serve http` | Start the JSON HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! dvt init --config ./config/docvault.toml
//!
//! # Upload and index a policy document
//! dvt upload ./handbook.pdf --tenant acme
//! dvt ingest --tenant acme
//!
//! # Ask a question
//! dvt query "how many PTO days do employees get" --tenant acme -k 5
//!
//! # Start the HTTP API
//! dvt serve http
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docvault::config::{self, Config};
use docvault::index::IndexManager;
use docvault::models::{DocumentStatus, Tier};
use docvault::{db, ingest, migrate, quota, repo, retrieve, server, upload};

/// docvault CLI — a multi-tenant document ingestion and retrieval engine.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docvault.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "dvt",
    about = "docvault — a multi-tenant document ingestion and retrieval engine",
    version,
    long_about = "docvault validates and stores uploaded documents per tenant, enforces tier-based \
    quotas, chunks and embeds document text into a per-tenant vector index, and serves similarity \
    search over it via a CLI and a JSON HTTP server."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docvault.toml`. Database, storage, validation,
    /// chunking, embedding, and server settings are read from this file.
    #[arg(long, global = true, default_value = "./config/docvault.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (documents, tenant_quotas). This command is idempotent — running it
    /// multiple times is safe.
    Init,

    /// Validate and store a document for a tenant.
    ///
    /// The file is checked against the extension allow-list, executable
    /// signatures, and size limits, then admitted against the tenant's
    /// document and storage quotas. The document stays `pending` until the
    /// next `ingest` run.
    Upload {
        /// Path to the file to upload.
        file: PathBuf,

        /// Tenant the document belongs to.
        #[arg(long)]
        tenant: String,
    },

    /// List a tenant's documents.
    Documents {
        /// Tenant to list documents for.
        #[arg(long)]
        tenant: String,

        /// Filter by status: `pending`, `ingested`, or `error`.
        #[arg(long)]
        status: Option<String>,
    },

    /// Delete a document and its stored file.
    ///
    /// The document's chunks remain searchable until the next `ingest` run
    /// rebuilds the index.
    Delete {
        /// Document UUID.
        id: String,

        /// Tenant the document belongs to.
        #[arg(long)]
        tenant: String,
    },

    /// Delete all of a tenant's documents, stored files, and index.
    ///
    /// Quota counters are recalculated from the (now empty) documents table.
    Purge {
        /// Tenant to purge.
        #[arg(long)]
        tenant: String,
    },

    /// Rebuild the tenant's vector index from all stored documents.
    ///
    /// Extracts text, chunks it, embeds every chunk, and atomically replaces
    /// the tenant's index. Documents that fail extraction are marked `error`
    /// and skipped; the rest are indexed.
    Ingest {
        /// Tenant to ingest.
        #[arg(long)]
        tenant: String,
    },

    /// Show ingestion status: per-status document counts and whether a
    /// searchable index exists.
    Status {
        /// Tenant to inspect.
        #[arg(long)]
        tenant: String,
    },

    /// Rank indexed chunks against a query.
    ///
    /// Counts against the tenant's daily query quota. Returns the top-k
    /// chunks by cosine similarity with their source document IDs.
    Query {
        /// The query text.
        query: String,

        /// Tenant whose index to search.
        #[arg(long)]
        tenant: String,

        /// Number of results to return (defaults to `[retrieval].top_k`).
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Show usage against tier limits.
    Quota {
        /// Tenant to inspect.
        #[arg(long)]
        tenant: String,
    },

    /// Change a tenant's tier: `free`, `pro`, or `enterprise`.
    ///
    /// Existing usage is kept; only the limits change.
    Tier {
        /// Target tier.
        tier: String,

        /// Tenant to change.
        #[arg(long)]
        tenant: String,
    },

    /// Start the JSON HTTP server.
    ///
    /// Exposes upload, ingestion, retrieval, and quota endpoints scoped
    /// under `/tenants/{tenant}`.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },
}

/// Server subcommands.
#[derive(Subcommand)]
enum ServeService {
    /// Start the HTTP API server.
    ///
    /// Binds to the address configured in `[server].bind`.
    Http,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Upload { file, tenant } => {
            run_upload(&cfg, &file, &tenant).await?;
        }
        Commands::Documents { tenant, status } => {
            run_documents(&cfg, &tenant, status.as_deref()).await?;
        }
        Commands::Delete { id, tenant } => {
            run_delete(&cfg, &id, &tenant).await?;
        }
        Commands::Purge { tenant } => {
            run_purge(&cfg, &tenant).await?;
        }
        Commands::Ingest { tenant } => {
            run_ingest(&cfg, &tenant).await?;
        }
        Commands::Status { tenant } => {
            run_status(&cfg, &tenant).await?;
        }
        Commands::Query {
            query,
            tenant,
            top_k,
        } => {
            run_query(&cfg, &query, &tenant, top_k).await?;
        }
        Commands::Quota { tenant } => {
            run_quota(&cfg, &tenant).await?;
        }
        Commands::Tier { tier, tenant } => {
            run_tier(&cfg, &tier, &tenant).await?;
        }
        Commands::Serve { service } => match service {
            ServeService::Http => {
                server::run_server(&cfg).await?;
            }
        },
    }

    Ok(())
}

async fn run_upload(cfg: &Config, file: &PathBuf, tenant: &str) -> anyhow::Result<()> {
    let pool = db::connect(cfg).await?;
    migrate::apply_schema(&pool).await?;

    let bytes = std::fs::read(file)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", file.display(), e))?;
    let declared = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("File path has no usable name: {}", file.display()))?;

    let doc = upload::upload_document(&pool, cfg, tenant, declared, &bytes).await?;

    println!("Uploaded {} ({} bytes)", doc.filename, doc.size_bytes);
    println!("  id:     {}", doc.id);
    println!("  tenant: {}", doc.tenant_id);
    println!("  status: {}", doc.status.as_str());
    println!("Run `dvt ingest --tenant {}` to make it searchable.", tenant);
    Ok(())
}

async fn run_documents(cfg: &Config, tenant: &str, status: Option<&str>) -> anyhow::Result<()> {
    let pool = db::connect(cfg).await?;
    migrate::apply_schema(&pool).await?;

    let filter = match status {
        Some(raw) => Some(
            DocumentStatus::parse(raw)
                .ok_or_else(|| anyhow::anyhow!("Unknown status filter: {}", raw))?,
        ),
        None => None,
    };

    let docs = repo::list(&pool, tenant, filter).await?;
    if docs.is_empty() {
        println!("No documents for tenant '{}'.", tenant);
        return Ok(());
    }

    println!("{} document(s) for tenant '{}':", docs.len(), tenant);
    for doc in docs {
        let chunks = doc
            .chunk_count
            .map(|c| format!("{} chunks", c))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {}  {:<10} {:>10} bytes  {}  {}",
            doc.id,
            doc.status.as_str(),
            doc.size_bytes,
            chunks,
            doc.filename
        );
        if let Some(msg) = &doc.error_message {
            println!("      error: {}", msg);
        }
    }
    Ok(())
}

async fn run_delete(cfg: &Config, id: &str, tenant: &str) -> anyhow::Result<()> {
    let pool = db::connect(cfg).await?;
    migrate::apply_schema(&pool).await?;

    let doc = repo::get(&pool, id)
        .await?
        .filter(|d| d.tenant_id == tenant)
        .ok_or_else(|| anyhow::anyhow!("No document {} for tenant '{}'", id, tenant))?;

    repo::delete(&pool, &cfg.storage.upload_root, &doc.id).await?;
    quota::release_document(&pool, tenant, doc.size_bytes).await?;

    println!("Deleted {} ({})", doc.filename, doc.id);
    println!(
        "Run `dvt ingest --tenant {}` to remove its chunks from the index.",
        tenant
    );
    Ok(())
}

async fn run_purge(cfg: &Config, tenant: &str) -> anyhow::Result<()> {
    let pool = db::connect(cfg).await?;
    migrate::apply_schema(&pool).await?;
    let indexes = IndexManager::new(cfg.storage.vector_root.clone());

    let deleted = ingest::purge_tenant(&pool, cfg, &indexes, tenant).await?;

    println!("Purged tenant '{}': {} document(s) removed.", tenant, deleted);
    Ok(())
}

async fn run_ingest(cfg: &Config, tenant: &str) -> anyhow::Result<()> {
    let pool = db::connect(cfg).await?;
    migrate::apply_schema(&pool).await?;
    let indexes = IndexManager::new(cfg.storage.vector_root.clone());

    let result = ingest::ingest_tenant(&pool, cfg, &indexes, tenant).await?;
    if result.status == "no_documents" {
        println!("No documents to ingest for tenant '{}'.", tenant);
        return Ok(());
    }

    println!("Ingestion complete for tenant '{}':", tenant);
    println!("  processed: {}", result.documents_processed);
    println!("  failed:    {}", result.documents_failed);
    println!("  chunks:    {}", result.chunks_created);
    Ok(())
}

async fn run_status(cfg: &Config, tenant: &str) -> anyhow::Result<()> {
    let pool = db::connect(cfg).await?;
    migrate::apply_schema(&pool).await?;
    let indexes = IndexManager::new(cfg.storage.vector_root.clone());

    let status = ingest::ingest_status(&pool, &indexes, tenant).await?;
    println!("Ingestion status for tenant '{}':", tenant);
    println!("  pending:  {}", status.pending);
    println!("  ingested: {}", status.ingested);
    println!("  error:    {}", status.error);
    println!(
        "  index:    {}",
        if status.index_exists { "ready" } else { "absent" }
    );
    Ok(())
}

async fn run_query(
    cfg: &Config,
    query: &str,
    tenant: &str,
    top_k: Option<usize>,
) -> anyhow::Result<()> {
    let pool = db::connect(cfg).await?;
    migrate::apply_schema(&pool).await?;
    let indexes = IndexManager::new(cfg.storage.vector_root.clone());

    let results = retrieve::retrieve(&pool, cfg, &indexes, tenant, query, top_k).await?;
    if results.is_empty() {
        println!("No results. Has this tenant been ingested?");
        return Ok(());
    }

    println!("{} result(s):", results.len());
    for (i, r) in results.iter().enumerate() {
        println!(
            "{}. [score {:.4}] document {} chunk {}",
            i + 1,
            r.score,
            r.document_id,
            r.ordinal
        );
        let preview: String = r.text.chars().take(200).collect();
        println!("   {}", preview.replace('\n', " "));
    }
    Ok(())
}

async fn run_quota(cfg: &Config, tenant: &str) -> anyhow::Result<()> {
    let pool = db::connect(cfg).await?;
    migrate::apply_schema(&pool).await?;

    let u = quota::usage(&pool, tenant).await?;
    println!("Quota for tenant '{}' ({} tier):", u.tenant_id, u.tier);
    println!("  documents: {}", format_usage(u.document_count, u.max_documents));
    println!(
        "  storage:   {}",
        format_usage(u.total_storage_bytes, u.max_storage_bytes)
    );
    println!(
        "  queries:   {} today",
        format_usage(u.queries_today, u.max_queries_per_day)
    );
    Ok(())
}

async fn run_tier(cfg: &Config, tier: &str, tenant: &str) -> anyhow::Result<()> {
    let pool = db::connect(cfg).await?;
    migrate::apply_schema(&pool).await?;

    let parsed = Tier::parse(tier)
        .ok_or_else(|| anyhow::anyhow!("Unknown tier '{}'. Must be free, pro, or enterprise.", tier))?;
    quota::upgrade_tier(&pool, tenant, parsed).await?;
    println!("Tenant '{}' is now on the {} tier.", tenant, parsed.as_str());
    Ok(())
}

fn format_usage(used: i64, limit: i64) -> String {
    if limit < 0 {
        format!("{} / unlimited", used)
    } else {
        format!("{} / {}", used, limit)
    }
}
