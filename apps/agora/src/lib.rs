//! # Agora Application Library
//!
//! The HTTP surface and configuration of the Agora binary, exposed as a
//! library so integration tests can build the router directly.

pub mod api;
pub mod config;
