//! # docvault
//!
//! A multi-tenant document ingestion and retrieval engine.
//!
//! Tenants upload documents, which are validated (extension allow-list,
//! executable-signature and zip-bomb checks, filename sanitization), stored
//! on disk, and recorded in SQLite. Ingestion extracts text, chunks it into
//! overlapping windows, embeds every chunk, and atomically rebuilds the
//! tenant's vector index. Retrieval embeds a query and ranks chunks by
//! cosine similarity. Tier-based quotas bound document count, total
//! storage, and daily query volume per tenant.
//!
//! The `dvt` binary wraps this library with a CLI and a JSON HTTP server.
//!
//! ## Module map
//!
//! - [`validate`] — upload validation and filename sanitization
//! - [`repo`] — document metadata rows and stored files
//! - [`quota`] — per-tenant tier limits and usage counters
//! - [`extract`] / [`chunk`] / [`embedding`] — the ingestion stages
//! - [`ingest`] — the pipeline that ties the stages together
//! - [`index`] — per-tenant vector index snapshots and caching
//! - [`retrieve`] — similarity search over a tenant's index
//! - [`server`] — the tenant-scoped JSON HTTP API

pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod quota;
pub mod repo;
pub mod retrieve;
pub mod server;
pub mod upload;
pub mod validate;
