//! Object storage for project media.
//!
//! This crate provides:
//! - The [`ObjectStore`] trait used by the pipeline (upload/download URLs,
//!   existence checks, prefix deletion)
//! - A Cloudflare R2 backend over the S3 API
//! - An in-memory backend

pub mod error;
pub mod memory;
pub mod r2;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryObjectStore;
pub use r2::{R2Client, R2Config};
pub use store::{ObjectInfo, ObjectStore};
