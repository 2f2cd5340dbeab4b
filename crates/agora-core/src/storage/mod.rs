//! # Storage Module
//!
//! Persistent storage backends for Agora.
//!
//! - `RedbStore`: ACID disk-backed document store built on redb.
//!
//! The in-memory `MemoryStore` lives in [`crate::store`] next to the
//! `DocumentStore` trait it implements.

mod redb_store;

pub use redb_store::RedbStore;
