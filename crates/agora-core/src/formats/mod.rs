//! # Formats Module
//!
//! Binary snapshot format for the in-memory store. File I/O is done by the
//! app layer; these functions only transform bytes.

pub mod persistence;

pub use persistence::{MAX_SNAPSHOT_SIZE, PersistenceHeader, store_from_bytes, store_to_bytes};
