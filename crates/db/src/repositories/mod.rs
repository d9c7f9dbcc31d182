//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod result_repo;
pub mod run_repo;

pub use result_repo::ResultRepo;
pub use run_repo::RunRepo;
