//! Persistence for the clip pipeline.
//!
//! This crate provides:
//! - Repository traits for projects, processing jobs and batch exports
//! - An in-memory backend for tests and single-process deployments
//! - A Firestore REST backend with token caching, retries and metrics

pub mod client;
pub mod error;
pub mod firestore_repos;
pub mod memory;
pub mod metrics;
pub mod repository;
pub mod retry;
pub mod token_cache;
pub mod types;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{StoreError, StoreResult};
pub use firestore_repos::{FirestoreBatchRepository, FirestoreJobRepository, FirestoreProjectRepository};
pub use memory::{MemoryBatchRepository, MemoryJobRepository, MemoryProjectRepository};
pub use repository::{BatchRepository, JobRepository, JobVersion, ProjectRepository, Repositories};
pub use types::{Document, Value};
