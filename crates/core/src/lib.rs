//! Domain types and pure statistics for the HTTP/2 vs HTTP/3 benchmark engine.
//!
//! Nothing in this crate performs process or network I/O. The pipeline crate
//! feeds it samples; the db and api crates persist and present what it
//! computes.

pub mod comparison;
pub mod error;
pub mod head_to_head;
pub mod numeric;
pub mod protocol;
pub mod scenario;
pub mod stability;
pub mod store;
pub mod summary;
pub mod types;
