//! Client for the external render worker.
//!
//! The render worker receives a job identifier, loads the job record itself
//! and reports progress back out-of-band. Dispatch is a single short POST;
//! callers treat failures as non-fatal and rely on the job's `queued` status
//! for redelivery.

pub mod client;
pub mod error;

pub use client::{DispatchRequest, HttpRenderDispatcher, RenderClientConfig, RenderDispatcher};
pub use error::{RenderClientError, RenderClientResult};
