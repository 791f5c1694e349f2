//! The rowbatch execution engine: batched multi-row insertion,
//! memory-bounded chunked reads, and page/cursor pagination.
//!
//! Everything here is synchronous and blocking; operations execute on the
//! caller's thread, one statement at a time, over a caller-owned
//! connection. Every raw driver failure is routed through the classifier in
//! `rowbatch-core` before it reaches a caller.

pub mod batch;
pub mod chunk;
pub mod paginate;

pub use batch::{DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE, effective_batch_size, save_all};
pub use chunk::{DEFAULT_CHUNK_SIZE, LazyRows, chunk, chunk_by_id, effective_chunk_size, lazy};
pub use paginate::{
    Cursor, CursorPage, DEFAULT_PER_PAGE, Page, count, cursor_paginate, paginate,
};
