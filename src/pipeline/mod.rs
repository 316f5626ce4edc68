//! Pipeline stages for splitting and converting large PDFs.
//!
//! Each submodule implements one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ source ──▶ plan ──▶ split ──▶ orchestrate ──▶ merge ──▶ validate
//! (URL/path) (pdfium)  (ranges)  (chunk PDFs) (workers)   (fold)    (coverage)
//! ```
//!
//! 1. [`input`]    — canonicalise the user-supplied path or URL to a local file
//! 2. [`source`]   — page count, metadata and outline; pdfium in `spawn_blocking`
//! 3. [`plan`]     — boundary planning from bookmarks or a fixed sweep
//! 4. [`split`]    — write one chunk PDF per boundary
//! 5. [`orchestrate`] — convert chunks in a bounded pool of worker processes;
//!    [`worker`] is the conversion seam and the worker side of the protocol
//! 6. [`merge`]    — fold chunk documents into one, offsetting page numbers
//! 7. [`validate`] — per-chunk and global coverage checks

pub mod input;
pub mod merge;
pub mod orchestrate;
pub mod plan;
pub mod source;
pub mod split;
pub mod validate;
pub mod worker;
