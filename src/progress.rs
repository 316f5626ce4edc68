//! Progress-callback trait for per-chunk conversion events.
//!
//! Inject an [`Arc<dyn ChunkProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the orchestrator dispatches and collects chunks.
//!
//! Chunks run concurrently, so `on_chunk_start`, `on_chunk_complete` and
//! `on_chunk_error` may be called from several tasks at once and in any
//! order. Protect shared state with a `Mutex` or atomics.
//!
//! # Example
//!
//! ```rust
//! use pdf_splitter::{ChunkProgressCallback, PipelineConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ChunkProgressCallback for CountingCallback {
//!     fn on_chunk_complete(&self, ordinal: usize, total_chunks: usize) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("chunk {} done ({}/{})", ordinal, done, total_chunks);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(counter as Arc<dyn ChunkProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as chunks move through conversion.
///
/// All methods have no-op defaults; override what you need.
pub trait ChunkProgressCallback: Send + Sync {
    /// Called once before any chunk is dispatched.
    fn on_run_start(&self, total_chunks: usize) {
        let _ = total_chunks;
    }

    /// Called when a worker picks up chunk `ordinal` (0-based).
    fn on_chunk_start(&self, ordinal: usize, total_chunks: usize) {
        let _ = (ordinal, total_chunks);
    }

    /// Called when chunk `ordinal` converted successfully.
    fn on_chunk_complete(&self, ordinal: usize, total_chunks: usize) {
        let _ = (ordinal, total_chunks);
    }

    /// Called when chunk `ordinal` failed, with the failure reason.
    fn on_chunk_error(&self, ordinal: usize, total_chunks: usize, error: &str) {
        let _ = (ordinal, total_chunks, error);
    }

    /// Called once after every chunk has a result.
    fn on_run_complete(&self, total_chunks: usize, succeeded: usize) {
        let _ = (total_chunks, succeeded);
    }
}

/// Default when no callback is configured.
pub struct NoopProgressCallback;

impl ChunkProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn ChunkProgressCallback>;
