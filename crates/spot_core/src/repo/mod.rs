//! Persistence contracts and implementations.
//!
//! # Responsibility
//! - Define the durable key-value contract the task store writes through.
//! - Keep SQLite and JSON encoding details out of the store.
//!
//! # Invariants
//! - The task sequence is always written wholesale under one key.
//! - Read paths reject invalid persisted state instead of masking it.

pub mod kv_repo;
pub mod task_codec;
